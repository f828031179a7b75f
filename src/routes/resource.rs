//! Generic v2 routes for every registry collection.

use crate::handlers::resource::{create, delete, list, show, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:collection", get(list).post(create))
        .route("/:collection/:id", get(show).put(update).delete(delete))
        .with_state(state)
}
