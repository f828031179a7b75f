//! Response envelope helpers: a singular key for one resource, the plural key for a list.

use axum::{http::StatusCode, Json};
use serde_json::{Map, Value};

fn envelope(key: &str, data: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert(key.to_string(), data);
    Json(Value::Object(body))
}

pub fn success_one(resource: &str, data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, envelope(resource, data))
}

pub fn success_one_ok(resource: &str, data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, envelope(resource, data))
}

pub fn success_many(collection: &str, data: Vec<Value>) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, envelope(collection, Value::Array(data)))
}

pub fn success_many_created(collection: &str, data: Vec<Value>) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, envelope(collection, Value::Array(data)))
}
