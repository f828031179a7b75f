//! Generic v2 resource handlers: list, show, create (single or bulk), update, delete.

use crate::attributes::{AttributeMap, PORTPROFILES};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::plugin::{Filters, Record};
use crate::response::{success_many, success_many_created, success_one, success_one_ok};
use crate::service::convert::convert;
use crate::service::policy::check_owner;
use crate::service::{prepare_request_body, Action};
use crate::state::AppState;
use crate::views::ResourceView;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

/// Port profiles have their own controller.
fn collection_info<'a>(state: &'a AppState, collection: &str) -> Result<(&'a AttributeMap, &'a str), AppError> {
    let not_found = || AppError::not_found("collection", collection);
    if collection == PORTPROFILES {
        return Err(not_found());
    }
    let attr_info = state.registry.get_collection_info(collection).ok_or_else(not_found)?;
    let resource = state.registry.singular_of(collection).ok_or_else(not_found)?;
    Ok((attr_info, resource))
}

/// Split the query string into `fields` selections and converted attribute filters.
/// Keys that are not attributes of the collection are ignored.
fn parse_query(attr_info: &AttributeMap, params: Vec<(String, String)>) -> Result<(Filters, Vec<String>), AppError> {
    let mut fields = Vec::new();
    let mut raw = Filters::new();
    for (key, value) in params {
        if key == "fields" {
            fields.push(value);
        } else if attr_info.contains_key(&key) {
            raw.entry(key).or_default().push(Value::String(value));
        }
    }
    let mut filters = Filters::new();
    for (key, values) in raw {
        let Some(spec) = attr_info.get(&key) else {
            continue;
        };
        let values = if let Some(converter) = spec.convert_list_to {
            match convert(converter, Value::Array(values))? {
                Value::Array(items) => items,
                other => vec![other],
            }
        } else if let Some(converter) = spec.convert_to {
            values
                .into_iter()
                .map(|v| convert(converter, v))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            values
        };
        filters.insert(key, values);
    }
    Ok((filters, fields))
}

/// Items of a create body: `{"<resource>": {...}}` or bulk `{"<collection>": [...]}`.
fn create_items(body: Value, resource: &str, collection: &str) -> Result<(Vec<Value>, bool), AppError> {
    let Value::Object(mut body) = body else {
        return Err(AppError::BadRequest("Resource body required".into()));
    };
    if let Some(items) = body.remove(collection) {
        return match items {
            Value::Array(items) if !items.is_empty() => Ok((items, true)),
            _ => Err(AppError::BadRequest("Resources required".into())),
        };
    }
    let item = single_item(Value::Object(body), resource)?;
    Ok((vec![item], false))
}

fn single_item(body: Value, resource: &str) -> Result<Value, AppError> {
    match body {
        Value::Object(mut body) => body
            .remove(resource)
            .ok_or_else(|| AppError::BadRequest(format!("Unable to find '{}' in request body", resource))),
        _ => Err(AppError::BadRequest("Resource body required".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let (attr_info, _) = collection_info(&state, &collection)?;
    let (filters, fields) = parse_query(attr_info, params)?;
    let records = state.plugin.get_all(&ctx, &collection, &filters).await?;
    let view = ResourceView::new(attr_info).with_fields(fields);
    Ok(success_many(&collection, view.build_all(&records)))
}

pub async fn show(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let (attr_info, resource) = collection_info(&state, &collection)?;
    let fields = params.into_iter().filter(|(k, _)| k == "fields").map(|(_, v)| v).collect();
    let record = state.plugin.get_details(&ctx, &collection, &id).await?;
    let view = ResourceView::new(attr_info).with_fields(fields);
    Ok(success_one_ok(resource, view.build(&record)))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let (attr_info, resource) = collection_info(&state, &collection)?;
    let (items, is_bulk) = create_items(body, resource, &collection)?;

    let mut prepared = Vec::with_capacity(items.len());
    for item in items {
        let attrs = prepare_request_body(&ctx, item, true, attr_info)?;
        state.policy.enforce(&ctx, Action::Create, resource, attr_info, &attrs)?;
        prepared.push(attrs);
    }

    let mut created: Vec<Record> = Vec::with_capacity(prepared.len());
    for attrs in prepared {
        match state.plugin.create(&ctx, &collection, attrs).await {
            Ok(record) => created.push(record),
            Err(e) => {
                rollback(&state, &ctx, &collection, &created).await;
                return Err(e);
            }
        }
    }
    tracing::info!(collection = %collection, count = created.len(), "created");

    let view = ResourceView::new(attr_info);
    if is_bulk {
        Ok(success_many_created(&collection, view.build_all(&created)))
    } else {
        let record = created.first().map(|r| view.build(r)).unwrap_or(Value::Null);
        Ok(success_one(resource, record))
    }
}

/// Undo the part of a bulk create that already succeeded.
async fn rollback(state: &AppState, ctx: &RequestContext, collection: &str, created: &[Record]) {
    for record in created.iter().rev() {
        let Some(id) = record.get("id").and_then(Value::as_str) else {
            continue;
        };
        if let Err(e) = state.plugin.delete(ctx, collection, id).await {
            tracing::warn!(collection = %collection, id = %id, error = %e, "bulk rollback failed");
        }
    }
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let (attr_info, resource) = collection_info(&state, &collection)?;
    let item = single_item(body, resource)?;
    let existing = state.plugin.get_details(&ctx, &collection, &id).await?;
    check_owner(&ctx, resource, &existing)?;
    let attrs = prepare_request_body(&ctx, item, false, attr_info)?;
    state.policy.enforce(&ctx, Action::Update, resource, attr_info, &attrs)?;
    let record = state.plugin.update(&ctx, &collection, &id, attrs).await?;
    Ok(success_one_ok(resource, ResourceView::new(attr_info).build(&record)))
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((collection, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (_, resource) = collection_info(&state, &collection)?;
    let existing = state.plugin.get_details(&ctx, &collection, &id).await?;
    check_owner(&ctx, resource, &existing)?;

    state.plugin.delete(&ctx, &collection, &id).await?;
    tracing::info!(collection = %collection, id = %id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}
