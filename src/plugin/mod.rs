//! Backend plugin contract. Controllers only translate requests into these calls.

mod defaults;
pub mod memory;
pub mod postgres;

pub use defaults::{apply_update, build_record};
pub use memory::InMemoryPlugin;
pub use postgres::PgPlugin;

use crate::attributes::Attributes;
use crate::error::AppError;
use crate::extractors::RequestContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A stored resource as the plugin returns it.
pub type Record = Map<String, Value>;

/// Attribute to accepted values; a record matches when every attribute matches one value.
pub type Filters = BTreeMap<String, Vec<Value>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub network_id: String,
    pub port_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortProfile {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub vlan_id: u16,
    pub qos_name: Option<String>,
    pub assignment: Vec<PortBinding>,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Records of `collection` visible to the caller that match `filters`.
    async fn get_all(&self, ctx: &RequestContext, collection: &str, filters: &Filters) -> Result<Vec<Record>, AppError>;

    async fn get_details(&self, ctx: &RequestContext, collection: &str, id: &str) -> Result<Record, AppError>;

    /// Create from a prepared body; not-specified attributes are generated here.
    /// Referenced resources must exist and be readable by the caller (404 otherwise).
    async fn create(&self, ctx: &RequestContext, collection: &str, attrs: Attributes) -> Result<Record, AppError>;

    async fn update(&self, ctx: &RequestContext, collection: &str, id: &str, attrs: Attributes) -> Result<Record, AppError>;

    /// Fails with 409 while any resource of another tenant or the caller still references it.
    async fn delete(&self, ctx: &RequestContext, collection: &str, id: &str) -> Result<(), AppError>;

    async fn get_all_portprofiles(&self, tenant_id: &str) -> Result<Vec<PortProfile>, AppError>;

    async fn get_portprofile_details(&self, tenant_id: &str, id: &str) -> Result<PortProfile, AppError>;

    async fn create_portprofile(
        &self,
        tenant_id: &str,
        name: &str,
        vlan_id: u16,
        qos_name: Option<&str>,
    ) -> Result<PortProfile, AppError>;

    async fn rename_portprofile(&self, tenant_id: &str, id: &str, new_name: &str) -> Result<PortProfile, AppError>;

    async fn delete_portprofile(&self, tenant_id: &str, id: &str) -> Result<(), AppError>;

    async fn associate_portprofile(
        &self,
        tenant_id: &str,
        network_id: &str,
        port_id: &str,
        portprofile_id: &str,
    ) -> Result<(), AppError>;

    async fn disassociate_portprofile(
        &self,
        tenant_id: &str,
        network_id: &str,
        port_id: &str,
        portprofile_id: &str,
    ) -> Result<(), AppError>;
}

/// A referenced resource still has dependents pointing at it.
pub(crate) fn in_use(resource: &str, id: &str, dependent: &str) -> AppError {
    AppError::Conflict(format!(
        "Unable to complete operation on {} {}. There are one or more {} in use.",
        resource, id, dependent
    ))
}

/// Filter match. An object filter value (from `kvp_list_to_dict`) matches a list of objects
/// when some element has, for every key, one of the listed values.
pub fn matches_filters(record: &Record, filters: &Filters) -> bool {
    filters.iter().all(|(attr, wanted)| {
        let actual = record.get(attr).unwrap_or(&Value::Null);
        wanted.iter().any(|w| value_matches(actual, w))
    })
}

fn value_matches(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Value::Array(items), Value::Object(spec)) => items.iter().any(|item| {
            spec.iter().all(|(k, allowed)| match (item.get(k), allowed) {
                (Some(v), Value::Array(options)) => options.contains(v),
                (Some(v), single) => v == single,
                (None, _) => false,
            })
        }),
        (Value::String(a), Value::String(w)) => a == w,
        (Value::Number(a), Value::Number(w)) => a.as_f64() == w.as_f64(),
        (Value::Number(a), Value::String(w)) => a.to_string() == *w,
        (Value::Bool(a), Value::String(w)) => a.to_string().eq_ignore_ascii_case(w),
        _ => actual == wanted,
    }
}
