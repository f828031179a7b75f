//! Network resource API: an attribute registry describing every resource, request
//! preparation against it, and HTTP controllers over a pluggable backend.

pub mod attributes;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod plugin;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod state;
pub mod views;

pub use attributes::{load_registry, ResourceRegistry};
pub use error::{AppError, ConfigError};
pub use extractors::RequestContext;
pub use plugin::{InMemoryPlugin, PgPlugin, Plugin};
pub use routes::{app, common_routes, portprofile_routes, resource_routes};
pub use service::Policy;
pub use settings::Settings;
pub use state::AppState;
