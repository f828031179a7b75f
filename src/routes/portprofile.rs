//! Port-profile extension routes, tenant scoped.

use crate::handlers::portprofile::{
    associate_portprofile, create, delete, detail, disassociate_portprofile, index, show, update,
};
use crate::state::AppState;
use axum::{routing::get, routing::put, Router};

pub fn portprofile_routes(state: AppState) -> Router {
    Router::new()
        .route("/tenants/:tenant_id/portprofiles", get(index).post(create))
        .route("/tenants/:tenant_id/portprofiles/detail", get(detail))
        .route(
            "/tenants/:tenant_id/portprofiles/:id",
            get(show).put(update).delete(delete),
        )
        .route(
            "/tenants/:tenant_id/portprofiles/:id/associate_portprofile",
            put(associate_portprofile),
        )
        .route(
            "/tenants/:tenant_id/portprofiles/:id/disassociate_portprofile",
            put(disassociate_portprofile),
        )
        .with_state(state)
}
