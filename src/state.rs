//! Shared application state for all routes.

use crate::attributes::ResourceRegistry;
use crate::plugin::Plugin;
use crate::service::Policy;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub plugin: Arc<dyn Plugin>,
    pub registry: Arc<ResourceRegistry>,
    pub policy: Arc<Policy>,
}

impl AppState {
    pub fn new(plugin: Arc<dyn Plugin>, registry: Arc<ResourceRegistry>, policy: Policy) -> Self {
        AppState {
            plugin,
            registry,
            policy: Arc::new(policy),
        }
    }
}
