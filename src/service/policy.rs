//! Attribute policy: ownership for reads and writes, admin-only rules for enforced attributes.

use crate::attributes::{AttrValue, AttributeMap, Attributes, DefaultValue, SHARED, TENANT_ID};
use crate::error::{AppError, ConfigError};
use crate::extractors::RequestContext;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Rule names follow `<action>_<resource>:<attribute>`, e.g. `create_network:shared`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Policy {
    #[serde(default)]
    pub admin_only: BTreeSet<String>,
}

impl Default for Policy {
    fn default() -> Self {
        let admin_only = [
            "create_network:shared",
            "update_network:shared",
            "create_port:mac_address",
            "update_port:mac_address",
            "create_subnetpool:shared",
            "create_subnetpool:is_default",
            "update_subnetpool:is_default",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        Policy { admin_only }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
        }
    }
}

impl Policy {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Load(format!("invalid policy document: {}", e)))
    }

    /// Reject explicitly set enforced attributes that an admin-only rule covers.
    pub fn enforce(
        &self,
        ctx: &RequestContext,
        action: Action,
        resource: &str,
        attr_info: &AttributeMap,
        body: &Attributes,
    ) -> Result<(), AppError> {
        if ctx.is_admin {
            return Ok(());
        }
        for (name, spec) in attr_info.iter().filter(|(_, s)| s.enforce_policy) {
            let Some(AttrValue::Set(v)) = body.get(name) else {
                continue;
            };
            let is_default = matches!(&spec.default, Some(DefaultValue::Value(d)) if d == v);
            if is_default && action == Action::Create {
                continue;
            }
            let rule = format!("{}_{}:{}", action.as_str(), resource, name);
            if self.admin_only.contains(&rule) {
                tracing::info!(rule = %rule, tenant = ?ctx.tenant_id, "policy denied");
                return Err(AppError::Forbidden(format!("Policy doesn't allow {} to be performed.", rule)));
            }
        }
        Ok(())
    }
}

/// A record is visible to admins, its owner, and everyone when shared.
pub fn can_read(ctx: &RequestContext, record: &Map<String, Value>) -> bool {
    ctx.is_admin
        || ctx.owns(record.get(TENANT_ID).and_then(Value::as_str))
        || record.get(SHARED).and_then(Value::as_bool).unwrap_or(false)
}

/// Only admins and the owner may change or delete a record.
pub fn check_owner(ctx: &RequestContext, resource: &str, record: &Map<String, Value>) -> Result<(), AppError> {
    if ctx.is_admin || ctx.owns(record.get(TENANT_ID).and_then(Value::as_str)) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Policy doesn't allow modifying {} owned by another tenant.",
            resource
        )))
    }
}
