//! Load attribute extensions from a JSON file and merge them into the registry.

use crate::attributes::registry::ResourceRegistry;
use crate::attributes::types::AttributeMap;
use crate::attributes::validate_registry;
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Extension document: extra attributes per collection, plus plurals and foreign keys for new collections.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExtensionConfig {
    #[serde(default)]
    pub collections: BTreeMap<String, AttributeMap>,
    #[serde(default)]
    pub plurals: BTreeMap<String, String>,
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, String>,
}

pub fn parse_extensions(s: &str) -> Result<ExtensionConfig, ConfigError> {
    serde_json::from_str(s).map_err(|e| ConfigError::Load(format!("invalid extension document: {}", e)))
}

/// Merge extensions into `registry` and re-validate the result.
pub fn apply_extensions(registry: &mut ResourceRegistry, ext: ExtensionConfig) -> Result<(), ConfigError> {
    for (plural, singular) in &ext.plurals {
        registry.add_plural(plural, singular);
    }
    for (collection, attrs) in ext.collections {
        tracing::info!(collection = %collection, attributes = attrs.len(), "extending collection");
        registry.extend(&collection, attrs);
    }
    for (collection, attribute) in &ext.foreign_keys {
        registry.add_foreign_key(collection, attribute);
    }
    validate_registry(registry)
}

/// Core registry, extended from `path` when given.
pub async fn load_registry(path: Option<&Path>) -> Result<ResourceRegistry, ConfigError> {
    let mut registry = ResourceRegistry::core();
    if let Some(path) = path {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let ext = parse_extensions(&content)?;
        apply_extensions(&mut registry, ext)?;
    } else {
        validate_registry(&registry)?;
    }
    Ok(registry)
}
