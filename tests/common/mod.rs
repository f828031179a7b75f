#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use netapi::extractors::{ROLES_HEADER, TENANT_ID_HEADER};
use netapi::{app, AppState, InMemoryPlugin, Policy, ResourceRegistry};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub fn router() -> Router {
    let registry = Arc::new(ResourceRegistry::core());
    let plugin = Arc::new(InMemoryPlugin::new(registry.clone()));
    app(AppState::new(plugin, registry, Policy::default()), 64 * 1024)
}

pub enum Caller<'a> {
    Tenant(&'a str),
    Admin,
    Anonymous,
}

pub async fn send(app: &Router, caller: Caller<'_>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    match caller {
        Caller::Tenant(t) => req = req.header(TENANT_ID_HEADER, t),
        Caller::Admin => req = req.header(TENANT_ID_HEADER, "admin").header(ROLES_HEADER, "admin"),
        Caller::Anonymous => {}
    }
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
