//! PostgreSQL plugin. Resources are stored as JSONB documents keyed by (collection, id);
//! port profiles and their port bindings have their own tables. All tables live in the
//! schema from `NETAPI_SCHEMA` (default `netapi`).

use crate::attributes::{Attributes, ResourceRegistry, NETWORKS, PORTS, SUBNETS};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::plugin::{apply_update, build_record, in_use, matches_filters, Filters, Plugin, PortBinding, PortProfile, Record};
use crate::service::policy::can_read;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::Arc;

pub struct PgPlugin {
    pool: PgPool,
    schema: String,
    registry: Arc<ResourceRegistry>,
}

type ProfileRow = (String, String, String, i32, Option<String>);

impl PgPlugin {
    pub async fn connect(database_url: &str, schema: &str, registry: Arc<ResourceRegistry>) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let plugin = PgPlugin {
            pool,
            schema: schema.to_string(),
            registry,
        };
        plugin.ensure_tables().await?;
        Ok(plugin)
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }

    /// Create the schema and tables if they do not exist.
    pub async fn ensure_tables(&self) -> Result<(), AppError> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
            .execute(&self.pool)
            .await?;
        let ddl = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    collection TEXT NOT NULL,
                    id TEXT NOT NULL,
                    tenant_id TEXT,
                    body JSONB NOT NULL,
                    PRIMARY KEY (collection, id)
                )
                "#,
                self.table("resources")
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    tenant_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    vlan_id INTEGER NOT NULL,
                    qos_name TEXT
                )
                "#,
                self.table("portprofiles")
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    port_id TEXT PRIMARY KEY,
                    network_id TEXT NOT NULL,
                    portprofile_id TEXT NOT NULL REFERENCES {}(id)
                )
                "#,
                self.table("portprofile_bindings"),
                self.table("portprofiles")
            ),
        ];
        for stmt in ddl {
            sqlx::query(&stmt).execute(&self.pool).await?;
        }
        tracing::info!(schema = %self.schema, "plugin tables ready");
        Ok(())
    }

    fn not_found(&self, collection: &str, id: &str) -> AppError {
        AppError::not_found(self.registry.singular_of(collection).unwrap_or(collection), id)
    }

    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        let sql = format!("SELECT body FROM {} WHERE collection = $1 AND id = $2", self.table("resources"));
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(body,)| match body {
            Value::Object(m) => Some(m),
            _ => None,
        }))
    }

    /// Row lock on a resource inside the caller's transaction. `None` once it is gone.
    async fn lock(
        &self,
        conn: &mut PgConnection,
        collection: &str,
        id: &str,
        mode: &str,
    ) -> Result<Option<Record>, AppError> {
        let sql = format!(
            "SELECT body FROM {} WHERE collection = $1 AND id = $2 FOR {}",
            self.table("resources"),
            mode
        );
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.and_then(|(body,)| match body {
            Value::Object(m) => Some(m),
            _ => None,
        }))
    }

    async fn lock_visible(
        &self,
        conn: &mut PgConnection,
        ctx: &RequestContext,
        collection: &str,
        id: &str,
    ) -> Result<Record, AppError> {
        self.lock(conn, collection, id, "UPDATE")
            .await?
            .filter(|r| can_read(ctx, r))
            .ok_or_else(|| self.not_found(collection, id))
    }

    async fn fetch_visible(&self, ctx: &RequestContext, collection: &str, id: &str) -> Result<Record, AppError> {
        self.fetch(collection, id)
            .await?
            .filter(|r| can_read(ctx, r))
            .ok_or_else(|| self.not_found(collection, id))
    }

    async fn bindings(&self, portprofile_ids: &[String]) -> Result<HashMap<String, Vec<PortBinding>>, AppError> {
        let sql = format!(
            "SELECT portprofile_id, network_id, port_id FROM {} WHERE portprofile_id = ANY($1) ORDER BY port_id",
            self.table("portprofile_bindings")
        );
        let rows: Vec<(String, String, String)> = sqlx::query_as(&sql)
            .bind(portprofile_ids)
            .fetch_all(&self.pool)
            .await?;
        let mut out: HashMap<String, Vec<PortBinding>> = HashMap::new();
        for (pp, network_id, port_id) in rows {
            out.entry(pp).or_default().push(PortBinding { network_id, port_id });
        }
        Ok(out)
    }

    async fn profiles(&self, rows: Vec<ProfileRow>) -> Result<Vec<PortProfile>, AppError> {
        let ids: Vec<String> = rows.iter().map(|r| r.0.clone()).collect();
        let mut bindings = self.bindings(&ids).await?;
        rows.into_iter()
            .map(|(id, tenant_id, name, vlan_id, qos_name)| -> Result<PortProfile, AppError> {
                let vlan_id = stored_vlan(vlan_id)?;
                Ok(PortProfile {
                    assignment: bindings.remove(&id).unwrap_or_default(),
                    id,
                    tenant_id,
                    name,
                    vlan_id,
                    qos_name,
                })
            })
            .collect()
    }

    async fn profile_row(&self, tenant_id: &str, id: &str) -> Result<ProfileRow, AppError> {
        let sql = format!(
            "SELECT id, tenant_id, name, vlan_id, qos_name FROM {} WHERE id = $1 AND tenant_id = $2",
            self.table("portprofiles")
        );
        sqlx::query_as(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::PortprofileNotFound(id.to_string()))
    }

    async fn lock_profile(&self, conn: &mut PgConnection, tenant_id: &str, id: &str, mode: &str) -> Result<(), AppError> {
        let sql = format!(
            "SELECT id FROM {} WHERE id = $1 AND tenant_id = $2 FOR {}",
            self.table("portprofiles"),
            mode
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(|_| ())
            .ok_or_else(|| AppError::PortprofileNotFound(id.to_string()))
    }
}

/// `vlan_id` column values that do not fit a u16 surface as a decode fault.
fn stored_vlan(vlan_id: i32) -> Result<u16, AppError> {
    u16::try_from(vlan_id).map_err(|_| {
        AppError::Db(sqlx::Error::Decode(
            format!("stored vlan id {} out of range", vlan_id).into(),
        ))
    })
}

#[async_trait]
impl Plugin for PgPlugin {
    async fn get_all(&self, ctx: &RequestContext, collection: &str, filters: &Filters) -> Result<Vec<Record>, AppError> {
        let sql = format!("SELECT body FROM {} WHERE collection = $1 ORDER BY id", self.table("resources"));
        let rows: Vec<(Value,)> = sqlx::query_as(&sql).bind(collection).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(body,)| match body {
                Value::Object(m) => Some(m),
                _ => None,
            })
            .filter(|r| can_read(ctx, r) && matches_filters(r, filters))
            .collect())
    }

    async fn get_details(&self, ctx: &RequestContext, collection: &str, id: &str) -> Result<Record, AppError> {
        self.fetch_visible(ctx, collection, id).await
    }

    async fn create(&self, ctx: &RequestContext, collection: &str, attrs: Attributes) -> Result<Record, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = build_record(collection, &id, attrs)?;
        let tenant_id = record.get("tenant_id").and_then(Value::as_str).map(String::from);
        let mut tx = self.pool.begin().await?;
        // referenced rows stay locked until commit
        for (target, attr) in self.registry.references_from(collection) {
            if let Some(target_id) = record.get(attr).and_then(Value::as_str) {
                self.lock_visible(&mut tx, ctx, target, target_id).await?;
            }
        }
        let sql = format!(
            "INSERT INTO {} (collection, id, tenant_id, body) VALUES ($1, $2, $3, $4)",
            self.table("resources")
        );
        sqlx::query(&sql)
            .bind(collection)
            .bind(&id)
            .bind(tenant_id)
            .bind(Value::Object(record.clone()))
            .execute(&mut *tx)
            .await?;
        if collection == SUBNETS {
            if let Some(network_id) = record.get("network_id").and_then(Value::as_str) {
                let sql = format!(
                    "UPDATE {} SET body = jsonb_set(body, '{{subnets}}', COALESCE(body->'subnets', '[]'::jsonb) || to_jsonb($1::text)) WHERE collection = $2 AND id = $3",
                    self.table("resources")
                );
                sqlx::query(&sql)
                    .bind(&id)
                    .bind(NETWORKS)
                    .bind(network_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        tracing::debug!(collection = %collection, id = %id, "created");
        Ok(record)
    }

    async fn update(&self, ctx: &RequestContext, collection: &str, id: &str, attrs: Attributes) -> Result<Record, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut record = self.lock_visible(&mut tx, ctx, collection, id).await?;
        apply_update(&mut record, attrs);
        let sql = format!(
            "UPDATE {} SET body = $1 WHERE collection = $2 AND id = $3",
            self.table("resources")
        );
        sqlx::query(&sql)
            .bind(Value::Object(record.clone()))
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn delete(&self, ctx: &RequestContext, collection: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let record = self.lock_visible(&mut tx, ctx, collection, id).await?;
        // dependents owned by other tenants count too
        for (dependent, attr) in self.registry.referencing(collection) {
            let sql = format!(
                "SELECT 1 FROM {} WHERE collection = $1 AND body->>$2 = $3 LIMIT 1",
                self.table("resources")
            );
            let found: Option<(i32,)> = sqlx::query_as(&sql)
                .bind(dependent)
                .bind(attr)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            if found.is_some() {
                let resource = self.registry.singular_of(collection).unwrap_or(collection);
                return Err(in_use(resource, id, dependent));
            }
        }
        let sql = format!("DELETE FROM {} WHERE collection = $1 AND id = $2", self.table("resources"));
        sqlx::query(&sql).bind(collection).bind(id).execute(&mut *tx).await?;
        if collection == SUBNETS {
            if let Some(network_id) = record.get("network_id").and_then(Value::as_str) {
                let sql = format!(
                    "UPDATE {} SET body = jsonb_set(body, '{{subnets}}', COALESCE(body->'subnets', '[]'::jsonb) - $1::text) WHERE collection = $2 AND id = $3",
                    self.table("resources")
                );
                sqlx::query(&sql)
                    .bind(id)
                    .bind(NETWORKS)
                    .bind(network_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        if collection == PORTS {
            let sql = format!("DELETE FROM {} WHERE port_id = $1", self.table("portprofile_bindings"));
            sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::debug!(collection = %collection, id = %id, "deleted");
        Ok(())
    }

    async fn get_all_portprofiles(&self, tenant_id: &str) -> Result<Vec<PortProfile>, AppError> {
        let sql = format!(
            "SELECT id, tenant_id, name, vlan_id, qos_name FROM {} WHERE tenant_id = $1 ORDER BY id",
            self.table("portprofiles")
        );
        let rows: Vec<ProfileRow> = sqlx::query_as(&sql).bind(tenant_id).fetch_all(&self.pool).await?;
        self.profiles(rows).await
    }

    async fn get_portprofile_details(&self, tenant_id: &str, id: &str) -> Result<PortProfile, AppError> {
        let row = self.profile_row(tenant_id, id).await?;
        self.profiles(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::PortprofileNotFound(id.to_string()))
    }

    async fn create_portprofile(
        &self,
        tenant_id: &str,
        name: &str,
        vlan_id: u16,
        qos_name: Option<&str>,
    ) -> Result<PortProfile, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, name, vlan_id, qos_name) VALUES ($1, $2, $3, $4, $5)",
            self.table("portprofiles")
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(tenant_id)
            .bind(name)
            .bind(i32::from(vlan_id))
            .bind(qos_name)
            .execute(&self.pool)
            .await?;
        Ok(PortProfile {
            id,
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            vlan_id,
            qos_name: qos_name.map(String::from),
            assignment: Vec::new(),
        })
    }

    async fn rename_portprofile(&self, tenant_id: &str, id: &str, new_name: &str) -> Result<PortProfile, AppError> {
        let sql = format!(
            "UPDATE {} SET name = $1 WHERE id = $2 AND tenant_id = $3",
            self.table("portprofiles")
        );
        let result = sqlx::query(&sql)
            .bind(new_name)
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::PortprofileNotFound(id.to_string()));
        }
        self.get_portprofile_details(tenant_id, id).await
    }

    async fn delete_portprofile(&self, tenant_id: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        self.lock_profile(&mut tx, tenant_id, id, "UPDATE").await?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE portprofile_id = $1",
            self.table("portprofile_bindings")
        );
        let (bound,): (i64,) = sqlx::query_as(&sql).bind(id).fetch_one(&mut *tx).await?;
        if bound > 0 {
            return Err(AppError::Conflict(format!(
                "portprofile {} is associated with {} port(s)",
                id, bound
            )));
        }
        let sql = format!("DELETE FROM {} WHERE id = $1 AND tenant_id = $2", self.table("portprofiles"));
        sqlx::query(&sql).bind(id).bind(tenant_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn associate_portprofile(
        &self,
        tenant_id: &str,
        network_id: &str,
        port_id: &str,
        portprofile_id: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        self.lock_profile(&mut tx, tenant_id, portprofile_id, "SHARE").await?;
        let port = self.lock(&mut tx, PORTS, port_id, "SHARE").await?;
        let port_exists = port
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
        let sql = format!(
            "INSERT INTO {} (port_id, network_id, portprofile_id) VALUES ($1, $2, $3) ON CONFLICT (port_id) DO NOTHING RETURNING portprofile_id",
            self.table("portprofile_bindings")
        );
        let inserted: Option<(String,)> = sqlx::query_as(&sql)
            .bind(port_id)
            .bind(network_id)
            .bind(portprofile_id)
            .fetch_optional(&mut *tx)
            .await?;
        if inserted.is_some() {
            tx.commit().await?;
            return Ok(());
        }
        let sql = format!(
            "SELECT portprofile_id FROM {} WHERE port_id = $1",
            self.table("portprofile_bindings")
        );
        let (bound_to,): (String,) = sqlx::query_as(&sql).bind(port_id).fetch_one(&mut *tx).await?;
        if bound_to == portprofile_id {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "port {} is already associated with portprofile {}",
                port_id, bound_to
            )))
        }
    }

    async fn disassociate_portprofile(
        &self,
        tenant_id: &str,
        network_id: &str,
        port_id: &str,
        portprofile_id: &str,
    ) -> Result<(), AppError> {
        self.profile_row(tenant_id, portprofile_id).await?;
        let sql = format!(
            "DELETE FROM {} WHERE port_id = $1 AND network_id = $2 AND portprofile_id = $3",
            self.table("portprofile_bindings")
        );
        let result = sqlx::query(&sql)
            .bind(port_id)
            .bind(network_id)
            .bind(portprofile_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::PortNotFound {
                network_id: network_id.to_string(),
                port_id: port_id.to_string(),
            });
        }
        Ok(())
    }
}
