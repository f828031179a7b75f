//! Process settings from the environment (`.env` is loaded by the binary via dotenvy).

use crate::error::ConfigError;
use regex::Regex;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9696";
pub const DEFAULT_SCHEMA: &str = "netapi";
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    /// No database URL selects the in-memory plugin.
    pub database_url: Option<String>,
    /// Schema for the PostgreSQL plugin tables. Must be a valid PostgreSQL identifier.
    pub schema: String,
    pub extensions_path: Option<PathBuf>,
    pub policy_path: Option<PathBuf>,
    pub body_limit: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let schema = get("NETAPI_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.into());
        if !is_identifier(&schema) {
            return Err(ConfigError::Setting {
                name: "NETAPI_SCHEMA",
                reason: format!("'{}' is not a valid identifier", schema),
            });
        }
        let body_limit = match get("NETAPI_BODY_LIMIT") {
            Some(v) => v.parse::<usize>().map_err(|e| ConfigError::Setting {
                name: "NETAPI_BODY_LIMIT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_BODY_LIMIT,
        };
        Ok(Settings {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            database_url: get("DATABASE_URL"),
            schema,
            extensions_path: get("NETAPI_EXTENSIONS").map(PathBuf::from),
            policy_path: get("NETAPI_POLICY").map(PathBuf::from),
            body_limit,
        })
    }
}

fn is_identifier(s: &str) -> bool {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}
