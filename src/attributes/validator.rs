//! Registry consistency checks, run once at load.

use crate::attributes::registry::ResourceRegistry;
use crate::error::ConfigError;
use crate::service::validation::is_known_validator;

pub fn validate_registry(registry: &ResourceRegistry) -> Result<(), ConfigError> {
    for (collection, attrs) in registry.collections() {
        if registry.singular_of(collection).is_none() {
            return Err(ConfigError::InvalidAttribute {
                collection: collection.to_string(),
                attribute: String::new(),
                reason: "collection has no singular name".into(),
            });
        }
        let mut primary_keys = 0;
        for (name, spec) in attrs {
            let invalid = |reason: String| ConfigError::InvalidAttribute {
                collection: collection.to_string(),
                attribute: name.clone(),
                reason,
            };
            for rule in spec.validate.keys() {
                if !is_known_validator(rule) {
                    return Err(invalid(format!("unknown validator {}", rule)));
                }
            }
            if spec.primary_key {
                primary_keys += 1;
                if spec.allow_post || spec.allow_put {
                    return Err(invalid("primary key must be read-only".into()));
                }
            }
        }
        if primary_keys > 1 {
            return Err(ConfigError::InvalidAttribute {
                collection: collection.to_string(),
                attribute: String::new(),
                reason: "more than one primary key".into(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::types::{AttributeMap, AttributeSpec};

    #[test]
    fn core_registry_is_valid() {
        validate_registry(&ResourceRegistry::core()).unwrap();
    }

    #[test]
    fn writable_primary_key_is_rejected() {
        let mut r = ResourceRegistry::core();
        let mut extra = AttributeMap::new();
        extra.insert("uuid".into(), AttributeSpec::new(true, false).primary_key());
        r.extend("networks", extra);
        assert!(validate_registry(&r).is_err());
    }

    #[test]
    fn collection_without_plural_is_rejected() {
        let mut r = ResourceRegistry::core();
        r.extend("routers", AttributeMap::new());
        let err = validate_registry(&r).unwrap_err();
        assert!(err.to_string().contains("routers"));
    }
}
