//! Request-body preparation against the attribute registry.

use crate::attributes::{AttrValue, AttributeMap, Attributes, TENANT_ID};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::service::convert::convert;
use crate::service::validation::run_validator;
use serde_json::{Map, Value};

/// Fill or check `tenant_id` against the authenticated tenant.
pub fn populate_tenant_id(
    ctx: &RequestContext,
    body: &mut Map<String, Value>,
    attr_info: &AttributeMap,
    is_create: bool,
) -> Result<(), AppError> {
    if let Some(requested) = body.get(TENANT_ID) {
        let matches_ctx = requested.as_str().is_some() && requested.as_str() == ctx.tenant_id.as_deref();
        if !matches_ctx && !ctx.is_admin {
            return Err(AppError::BadRequest(
                "Specifying 'tenant_id' other than authenticated tenant in request requires admin privileges".into(),
            ));
        }
    }
    if is_create && !body.contains_key(TENANT_ID) {
        if let Some(tenant_id) = &ctx.tenant_id {
            body.insert(TENANT_ID.to_string(), Value::String(tenant_id.clone()));
        } else if attr_info.contains_key(TENANT_ID) {
            return Err(AppError::BadRequest(
                "Running without keystone AuthN requires that tenant_id is specified".into(),
            ));
        }
    }
    Ok(())
}

/// Reject keys the registry does not know.
pub fn verify_attributes(body: &Map<String, Value>, attr_info: &AttributeMap) -> Result<(), AppError> {
    let mut extra: Vec<&str> = body
        .keys()
        .filter(|k| !attr_info.contains_key(k.as_str()))
        .map(String::as_str)
        .collect();
    extra.sort_unstable();
    if extra.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unrecognized attribute(s) '{}'", extra.join(", "))))
    }
}

/// Apply create-time defaults. Required attributes must be present; with `check_allow_post`,
/// attributes that cannot be set on create must be absent.
pub fn fill_default_value(
    attr_info: &AttributeMap,
    mut body: Map<String, Value>,
    check_allow_post: bool,
) -> Result<Attributes, AppError> {
    let mut out = Attributes::new();
    for (attr, spec) in attr_info {
        if spec.allow_post {
            match (body.remove(attr), &spec.default) {
                (Some(v), _) => {
                    out.insert(attr.clone(), AttrValue::Set(v));
                }
                (None, Some(default)) => {
                    out.insert(attr.clone(), default.to_attr());
                }
                (None, None) => {
                    return Err(AppError::BadRequest(format!(
                        "Failed to parse request. Required attribute '{}' not specified",
                        attr
                    )));
                }
            }
        } else if body.contains_key(attr) {
            if check_allow_post {
                return Err(AppError::BadRequest(format!("Attribute '{}' not allowed in POST", attr)));
            }
            if let Some(v) = body.remove(attr) {
                out.insert(attr.clone(), AttrValue::Set(v));
            }
        }
    }
    for (attr, v) in body {
        out.insert(attr, AttrValue::Set(v));
    }
    Ok(out)
}

/// Reject attributes that may not change after create.
pub fn check_allow_put(attr_info: &AttributeMap, body: &Map<String, Value>) -> Result<(), AppError> {
    for attr in body.keys() {
        if let Some(spec) = attr_info.get(attr) {
            if !spec.allow_put {
                return Err(AppError::BadRequest(format!("Cannot update read-only attribute {}", attr)));
            }
        }
    }
    Ok(())
}

/// Convert then validate every specified attribute.
pub fn convert_value(attr_info: &AttributeMap, body: &mut Attributes) -> Result<(), AppError> {
    for (attr, spec) in attr_info {
        let Some(AttrValue::Set(value)) = body.get_mut(attr) else {
            continue;
        };
        if let Some(converter) = spec.convert_to {
            let taken = std::mem::take(value);
            *value = convert(converter, taken).map_err(|e| invalid_input(attr, &e.to_string()))?;
        }
        for (rule, arg) in &spec.validate {
            if let Some(reason) = run_validator(rule, value, arg) {
                return Err(invalid_input(attr, &reason));
            }
        }
    }
    Ok(())
}

fn invalid_input(attr: &str, reason: &str) -> AppError {
    AppError::BadRequest(format!("Invalid input for {}. Reason: {}.", attr, reason))
}

/// Full preparation of one resource body for create or update.
pub fn prepare_request_body(
    ctx: &RequestContext,
    body: Value,
    is_create: bool,
    attr_info: &AttributeMap,
) -> Result<Attributes, AppError> {
    let Value::Object(mut body) = body else {
        return Err(AppError::BadRequest("Resource body must be a JSON object".into()));
    };
    populate_tenant_id(ctx, &mut body, attr_info, is_create)?;
    verify_attributes(&body, attr_info)?;
    let mut attrs = if is_create {
        fill_default_value(attr_info, body, true)?
    } else {
        check_allow_put(attr_info, &body)?;
        body.into_iter().map(|(k, v)| (k, AttrValue::Set(v))).collect()
    };
    convert_value(attr_info, &mut attrs)?;
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{ResourceRegistry, NETWORKS, PORTS, SUBNETS};
    use serde_json::json;

    const NET_ID: &str = "6f0d7f5e-3b0e-4a5c-9f7f-1d2c3b4a5e6f";

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn message(e: AppError) -> String {
        match e {
            AppError::BadRequest(m) => m,
            other => panic!("expected bad request, got {:?}", other),
        }
    }

    #[test]
    fn defaults_are_filled_on_create() {
        let registry = ResourceRegistry::core();
        let attrs = registry.get_collection_info(NETWORKS).unwrap();
        let ctx = RequestContext::tenant("t1");
        let out = prepare_request_body(&ctx, json!({ "name": "net1" }), true, attrs).unwrap();
        assert_eq!(out["name"], AttrValue::Set(json!("net1")));
        assert_eq!(out["admin_state_up"], AttrValue::Set(json!(true)));
        assert_eq!(out["shared"], AttrValue::Set(json!(false)));
        assert_eq!(out["tenant_id"], AttrValue::Set(json!("t1")));
        assert!(!out.contains_key("subnets"));
        assert!(!out.contains_key("status"));
    }

    #[test]
    fn generated_defaults_stay_not_specified() {
        let registry = ResourceRegistry::core();
        let attrs = registry.get_collection_info(PORTS).unwrap();
        let out = prepare_request_body(
            &RequestContext::tenant("t1"),
            json!({ "network_id": NET_ID }),
            true,
            attrs,
        )
        .unwrap();
        assert_eq!(out["mac_address"], AttrValue::NotSpecified);
        assert_eq!(out["fixed_ips"], AttrValue::NotSpecified);
    }

    #[test]
    fn every_required_attribute_is_enforced() {
        let registry = ResourceRegistry::core();
        for (collection, attrs) in registry.collections() {
            if !attrs.values().any(|s| s.is_required_on_create()) {
                continue;
            }
            let msg = message(fill_default_value(attrs, Map::new(), true).unwrap_err());
            assert!(msg.starts_with("Failed to parse request. Required attribute"), "{}", collection);
        }
    }

    #[test]
    fn each_missing_required_attribute_is_named() {
        let registry = ResourceRegistry::core();
        let attrs = registry.get_collection_info(SUBNETS).unwrap();
        let full = json!({ "ip_version": 4, "network_id": NET_ID, "tenant_id": "t1" });
        for required in ["ip_version", "network_id", "tenant_id"] {
            let mut body = map(full.clone());
            body.remove(required);
            let msg = message(fill_default_value(attrs, body, true).unwrap_err());
            assert_eq!(msg, format!("Failed to parse request. Required attribute '{}' not specified", required));
        }
    }

    #[test]
    fn every_non_postable_attribute_is_rejected_on_create() {
        let registry = ResourceRegistry::core();
        for (collection, attrs) in registry.collections() {
            for (name, _) in attrs.iter().filter(|(_, s)| !s.allow_post) {
                let mut body = Map::new();
                for (req, _) in attrs.iter().filter(|(_, s)| s.is_required_on_create()) {
                    body.insert(req.clone(), json!("x"));
                }
                body.insert(name.clone(), json!("x"));
                let msg = message(fill_default_value(attrs, body, true).unwrap_err());
                assert_eq!(msg, format!("Attribute '{}' not allowed in POST", name), "{}", collection);
            }
        }
    }

    #[test]
    fn every_collection_rejects_unknown_keys() {
        let registry = ResourceRegistry::core();
        for (_, attrs) in registry.collections() {
            let body = map(json!({ "bogus": 1, "also_bogus": 2 }));
            let msg = message(verify_attributes(&body, attrs).unwrap_err());
            assert_eq!(msg, "Unrecognized attribute(s) 'also_bogus, bogus'");
        }
    }

    #[test]
    fn foreign_tenant_requires_admin() {
        let registry = ResourceRegistry::core();
        let attrs = registry.get_collection_info(NETWORKS).unwrap();
        let body = json!({ "tenant_id": "t2" });
        let err = prepare_request_body(&RequestContext::tenant("t1"), body.clone(), true, attrs).unwrap_err();
        assert!(message(err).contains("requires admin privileges"));
        let out = prepare_request_body(&RequestContext::admin(Some("t1")), body, true, attrs).unwrap();
        assert_eq!(out["tenant_id"], AttrValue::Set(json!("t2")));
    }

    #[test]
    fn anonymous_create_needs_explicit_tenant() {
        let registry = ResourceRegistry::core();
        let attrs = registry.get_collection_info(NETWORKS).unwrap();
        let err = prepare_request_body(&RequestContext::default(), json!({}), true, attrs).unwrap_err();
        assert!(message(err).contains("Running without keystone AuthN"));
    }

    #[test]
    fn conversion_and_validation_failures_name_the_attribute() {
        let registry = ResourceRegistry::core();
        let attrs = registry.get_collection_info(SUBNETS).unwrap();
        let ctx = RequestContext::tenant("t1");
        let out = prepare_request_body(
            &ctx,
            json!({ "ip_version": "4", "network_id": NET_ID, "cidr": "10.0.0.0/24", "enable_dhcp": "false" }),
            true,
            attrs,
        )
        .unwrap();
        assert_eq!(out["ip_version"], AttrValue::Set(json!(4)));
        assert_eq!(out["enable_dhcp"], AttrValue::Set(json!(false)));

        let err = prepare_request_body(&ctx, json!({ "ip_version": 5, "network_id": NET_ID }), true, attrs).unwrap_err();
        assert_eq!(message(err), "Invalid input for ip_version. Reason: '5' is not in [4, 6].");
    }

    #[test]
    fn update_rejects_read_only_attributes() {
        let registry = ResourceRegistry::core();
        let attrs = registry.get_collection_info(PORTS).unwrap();
        let ctx = RequestContext::tenant("t1");
        let err = prepare_request_body(&ctx, json!({ "network_id": NET_ID }), false, attrs).unwrap_err();
        assert_eq!(message(err), "Cannot update read-only attribute network_id");
        let out = prepare_request_body(&ctx, json!({ "name": "p2" }), false, attrs).unwrap();
        assert_eq!(out.len(), 1);
    }
}
