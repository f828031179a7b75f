//! Named request parameters read from a `{"<resource>": {...}}` body.

use crate::error::AppError;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug)]
pub struct Param {
    pub name: &'static str,
    pub required: bool,
}

pub const PORTPROFILE_NAME: &str = "portprofile-name";
pub const VLAN_ID: &str = "vlan-id";
pub const QOS_NAME: &str = "qos-name";
pub const NETWORK_ID: &str = "network-id";
pub const PORT_ID: &str = "port-id";

/// Create answers with the detail view of the new profile.
pub const PORTPROFILE_PARAMS: &[Param] = &[
    Param { name: PORTPROFILE_NAME, required: true },
    Param { name: VLAN_ID, required: true },
    Param { name: QOS_NAME, required: false },
];

/// Update only renames, so `portprofile-name` is the sole required parameter.
/// Older controllers also demanded `vlan-id` here; it is now ignored if sent.
pub const RENAME_PARAMS: &[Param] = &[Param { name: PORTPROFILE_NAME, required: true }];

pub const ASSIGNMENT_PARAMS: &[Param] = &[
    Param { name: NETWORK_ID, required: true },
    Param { name: PORT_ID, required: true },
];

/// Present parameters by name. Numbers are accepted and kept in their decimal form;
/// a null value counts as absent.
pub fn parse_request_params(
    body: &Value,
    resource: &str,
    params: &[Param],
) -> Result<BTreeMap<&'static str, String>, AppError> {
    let data = body
        .get(resource)
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Failed to parse request. Resource: {} not found in request body",
                resource
            ))
        })?;
    let mut out = BTreeMap::new();
    for param in params {
        let value = match data.get(param.name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(AppError::BadRequest(format!(
                    "Failed to parse request. Parameter: {} has invalid value {}",
                    param.name, other
                )))
            }
        };
        match value {
            Some(v) => {
                out.insert(param.name, v);
            }
            None if param.required => {
                return Err(AppError::BadRequest(format!(
                    "Failed to parse request. Parameter: {} not specified",
                    param.name
                )))
            }
            None => {}
        }
    }
    Ok(out)
}
