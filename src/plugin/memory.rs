//! In-memory plugin. Used when no database is configured, and by tests.

use crate::attributes::{Attributes, ResourceRegistry, NETWORKS, PORTS, SUBNETS};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::plugin::{apply_update, build_record, in_use, matches_filters, Filters, Plugin, PortBinding, PortProfile, Record};
use crate::service::policy::can_read;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Table = BTreeMap<String, Record>;

/// Lock order: `tables` before `portprofiles`.
pub struct InMemoryPlugin {
    registry: Arc<ResourceRegistry>,
    tables: RwLock<HashMap<String, Table>>,
    portprofiles: RwLock<BTreeMap<String, PortProfile>>,
}

impl InMemoryPlugin {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        InMemoryPlugin {
            registry,
            tables: RwLock::new(HashMap::new()),
            portprofiles: RwLock::new(BTreeMap::new()),
        }
    }

    fn resource_name<'a>(&'a self, collection: &'a str) -> &'a str {
        self.registry.singular_of(collection).unwrap_or(collection)
    }

    fn not_found(&self, collection: &str, id: &str) -> AppError {
        AppError::not_found(self.resource_name(collection), id)
    }
}

fn network_subnets<'a>(
    tables: &'a mut HashMap<String, Table>,
    network_id: Option<&Value>,
) -> Option<&'a mut Vec<Value>> {
    let network_id = network_id?.as_str()?;
    tables
        .get_mut(NETWORKS)?
        .get_mut(network_id)?
        .get_mut("subnets")?
        .as_array_mut()
}

fn profile_for_tenant<'a>(
    profiles: &'a mut BTreeMap<String, PortProfile>,
    tenant_id: &str,
    id: &str,
) -> Result<&'a mut PortProfile, AppError> {
    profiles
        .get_mut(id)
        .filter(|p| p.tenant_id == tenant_id)
        .ok_or_else(|| AppError::PortprofileNotFound(id.to_string()))
}

#[async_trait]
impl Plugin for InMemoryPlugin {
    async fn get_all(&self, ctx: &RequestContext, collection: &str, filters: &Filters) -> Result<Vec<Record>, AppError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(collection)
            .map(|t| {
                t.values()
                    .filter(|r| can_read(ctx, r) && matches_filters(r, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn get_details(&self, ctx: &RequestContext, collection: &str, id: &str) -> Result<Record, AppError> {
        let tables = self.tables.read().await;
        tables
            .get(collection)
            .and_then(|t| t.get(id))
            .filter(|r| can_read(ctx, r))
            .cloned()
            .ok_or_else(|| self.not_found(collection, id))
    }

    async fn create(&self, ctx: &RequestContext, collection: &str, attrs: Attributes) -> Result<Record, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = build_record(collection, &id, attrs)?;
        let mut tables = self.tables.write().await;
        for (target, attr) in self.registry.references_from(collection) {
            let Some(target_id) = record.get(attr).and_then(Value::as_str) else {
                continue;
            };
            let readable = tables
                .get(target)
                .and_then(|t| t.get(target_id))
                .map(|r| can_read(ctx, r))
                .unwrap_or(false);
            if !readable {
                return Err(self.not_found(target, target_id));
            }
        }
        if collection == SUBNETS {
            if let Some(subnets) = network_subnets(&mut tables, record.get("network_id")) {
                subnets.push(Value::String(id.clone()));
            }
        }
        tables
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), record.clone());
        tracing::debug!(collection = %collection, id = %id, "created");
        Ok(record)
    }

    async fn update(&self, ctx: &RequestContext, collection: &str, id: &str, attrs: Attributes) -> Result<Record, AppError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(collection)
            .and_then(|t| t.get_mut(id))
            .filter(|r| can_read(ctx, r))
            .ok_or_else(|| self.not_found(collection, id))?;
        apply_update(record, attrs);
        Ok(record.clone())
    }

    async fn delete(&self, ctx: &RequestContext, collection: &str, id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let visible = tables
            .get(collection)
            .and_then(|t| t.get(id))
            .map(|r| can_read(ctx, r))
            .unwrap_or(false);
        if !visible {
            return Err(self.not_found(collection, id));
        }
        // dependents owned by other tenants count too
        for (dependent, attr) in self.registry.referencing(collection) {
            let referenced = tables
                .get(dependent)
                .map(|t| t.values().any(|r| r.get(attr).and_then(Value::as_str) == Some(id)))
                .unwrap_or(false);
            if referenced {
                return Err(in_use(self.resource_name(collection), id, dependent));
            }
        }
        let removed = tables
            .get_mut(collection)
            .and_then(|t| t.remove(id))
            .ok_or_else(|| self.not_found(collection, id))?;
        if collection == SUBNETS {
            if let Some(subnets) = network_subnets(&mut tables, removed.get("network_id")) {
                subnets.retain(|s| s.as_str() != Some(id));
            }
        }
        if collection == PORTS {
            let mut profiles = self.portprofiles.write().await;
            for profile in profiles.values_mut() {
                profile.assignment.retain(|b| b.port_id != id);
            }
        }
        tracing::debug!(collection = %collection, id = %id, "deleted");
        Ok(())
    }

    async fn get_all_portprofiles(&self, tenant_id: &str) -> Result<Vec<PortProfile>, AppError> {
        let profiles = self.portprofiles.read().await;
        Ok(profiles
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn get_portprofile_details(&self, tenant_id: &str, id: &str) -> Result<PortProfile, AppError> {
        let profiles = self.portprofiles.read().await;
        profiles
            .get(id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| AppError::PortprofileNotFound(id.to_string()))
    }

    async fn create_portprofile(
        &self,
        tenant_id: &str,
        name: &str,
        vlan_id: u16,
        qos_name: Option<&str>,
    ) -> Result<PortProfile, AppError> {
        let profile = PortProfile {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            vlan_id,
            qos_name: qos_name.map(String::from),
            assignment: Vec::new(),
        };
        let mut profiles = self.portprofiles.write().await;
        profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    async fn rename_portprofile(&self, tenant_id: &str, id: &str, new_name: &str) -> Result<PortProfile, AppError> {
        let mut profiles = self.portprofiles.write().await;
        let profile = profile_for_tenant(&mut profiles, tenant_id, id)?;
        profile.name = new_name.to_string();
        Ok(profile.clone())
    }

    async fn delete_portprofile(&self, tenant_id: &str, id: &str) -> Result<(), AppError> {
        let mut profiles = self.portprofiles.write().await;
        let profile = profile_for_tenant(&mut profiles, tenant_id, id)?;
        if !profile.assignment.is_empty() {
            return Err(AppError::Conflict(format!(
                "portprofile {} is associated with {} port(s)",
                id,
                profile.assignment.len()
            )));
        }
        profiles.remove(id);
        Ok(())
    }

    async fn associate_portprofile(
        &self,
        tenant_id: &str,
        network_id: &str,
        port_id: &str,
        portprofile_id: &str,
    ) -> Result<(), AppError> {
        let tables = self.tables.read().await;
        let mut profiles = self.portprofiles.write().await;
        profile_for_tenant(&mut profiles, tenant_id, portprofile_id)?;
        let port_exists = tables
            .get(PORTS)
            .and_then(|t| t.get(port_id))
            .map(|p| {
                p.get("network_id").and_then(Value::as_str) == Some(network_id)
                    && p.get("tenant_id").and_then(Value::as_str) == Some(tenant_id)
            })
            .unwrap_or(false);
        if !port_exists {
            return Err(AppError::PortNotFound {
                network_id: network_id.to_string(),
                port_id: port_id.to_string(),
            });
        }
        if let Some(other) = profiles
            .values()
            .find(|p| p.id != portprofile_id && p.assignment.iter().any(|b| b.port_id == port_id))
        {
            return Err(AppError::Conflict(format!(
                "port {} is already associated with portprofile {}",
                port_id, other.id
            )));
        }
        let profile = profile_for_tenant(&mut profiles, tenant_id, portprofile_id)?;
        if !profile.assignment.iter().any(|b| b.port_id == port_id) {
            profile.assignment.push(PortBinding {
                network_id: network_id.to_string(),
                port_id: port_id.to_string(),
            });
        }
        Ok(())
    }

    async fn disassociate_portprofile(
        &self,
        tenant_id: &str,
        network_id: &str,
        port_id: &str,
        portprofile_id: &str,
    ) -> Result<(), AppError> {
        let mut profiles = self.portprofiles.write().await;
        let profile = profile_for_tenant(&mut profiles, tenant_id, portprofile_id)?;
        let before = profile.assignment.len();
        profile
            .assignment
            .retain(|b| !(b.port_id == port_id && b.network_id == network_id));
        if profile.assignment.len() == before {
            return Err(AppError::PortNotFound {
                network_id: network_id.to_string(),
                port_id: port_id.to_string(),
            });
        }
        Ok(())
    }
}
