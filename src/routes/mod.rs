//! Router assembly.

pub mod common;
pub mod portprofile;
pub mod resource;

pub use common::common_routes;
pub use portprofile::portprofile_routes;
pub use resource::resource_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Full API: common routes, `/v2.0` resources and `/v1.0` port profiles.
pub fn app(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .merge(common_routes())
        .nest("/v2.0", resource_routes(state.clone()))
        .nest("/v1.0", portprofile_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}
