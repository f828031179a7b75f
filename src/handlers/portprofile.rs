//! Port-profile handlers under `/v1.0/tenants/:tenant_id/portprofiles`.

use crate::attributes::{AttrValue, AttributeMap, Attributes, PORTPROFILE, PORTPROFILES};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::handlers::params::{
    parse_request_params, ASSIGNMENT_PARAMS, NETWORK_ID, PORTPROFILE_NAME, PORTPROFILE_PARAMS, PORT_ID, QOS_NAME,
    RENAME_PARAMS, VLAN_ID,
};
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::convert_value;
use crate::state::AppState;
use crate::views::PortProfileView;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

/// Non-admin callers may only address their own tenant. Without a tenant header
/// the path tenant is trusted.
fn check_tenant(ctx: &RequestContext, tenant_id: &str) -> Result<(), AppError> {
    match &ctx.tenant_id {
        Some(mine) if !ctx.is_admin && mine != tenant_id => Err(AppError::Forbidden(format!(
            "Policy doesn't allow access to tenant {}.",
            tenant_id
        ))),
        _ => Ok(()),
    }
}

fn attr_info(state: &AppState) -> Result<&AttributeMap, AppError> {
    Ok(state.registry.collection_or_err(PORTPROFILES)?)
}

/// Convert and validate profile attributes through the registry rules.
fn validated(attr_info: &AttributeMap, pairs: Vec<(&str, Value)>) -> Result<Attributes, AppError> {
    let mut attrs: Attributes = pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), AttrValue::Set(v)))
        .collect();
    convert_value(attr_info, &mut attrs)?;
    Ok(attrs)
}

fn set_str(attrs: &Attributes, key: &str) -> Option<String> {
    attrs.get(key).and_then(AttrValue::specified).and_then(Value::as_str).map(String::from)
}

async fn items(state: &AppState, tenant_id: &str, is_detail: bool) -> Result<Vec<Value>, AppError> {
    let view = PortProfileView::new(attr_info(state)?);
    let profiles = state.plugin.get_all_portprofiles(tenant_id).await?;
    Ok(profiles.iter().map(|p| view.build(p, is_detail)).collect())
}

pub async fn index(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(tenant_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    Ok(success_many(PORTPROFILES, items(&state, &tenant_id, false).await?))
}

pub async fn detail(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(tenant_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    Ok(success_many(PORTPROFILES, items(&state, &tenant_id, true).await?))
}

pub async fn show(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((tenant_id, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    let profile = state.plugin.get_portprofile_details(&tenant_id, &id).await?;
    let view = PortProfileView::new(attr_info(&state)?);
    Ok(success_one_ok(PORTPROFILE, view.build(&profile, true)))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(tenant_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    let params = parse_request_params(&body, PORTPROFILE, PORTPROFILE_PARAMS)?;
    let attr_info = attr_info(&state)?;
    let mut pairs = vec![
        ("name", Value::String(params[PORTPROFILE_NAME].clone())),
        ("vlan_id", Value::String(params[VLAN_ID].clone())),
    ];
    if let Some(qos) = params.get(QOS_NAME) {
        pairs.push(("qos_name", Value::String(qos.clone())));
    }
    let attrs = validated(attr_info, pairs)?;

    let name = set_str(&attrs, "name").unwrap_or_default();
    let vlan_id = attrs
        .get("vlan_id")
        .and_then(AttrValue::specified)
        .and_then(Value::as_u64)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid input for vlan_id: {}", params[VLAN_ID])))?;
    let qos_name = set_str(&attrs, "qos_name");

    let profile = state
        .plugin
        .create_portprofile(&tenant_id, &name, vlan_id, qos_name.as_deref())
        .await?;
    tracing::info!(tenant = %tenant_id, id = %profile.id, vlan_id, "portprofile created");
    let view = PortProfileView::new(attr_info);
    Ok(success_one(PORTPROFILE, view.build(&profile, true)))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((tenant_id, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    let params = parse_request_params(&body, PORTPROFILE, RENAME_PARAMS)?;
    let attr_info = attr_info(&state)?;
    let attrs = validated(attr_info, vec![("name", Value::String(params[PORTPROFILE_NAME].clone()))])?;
    let name = set_str(&attrs, "name").unwrap_or_default();
    let profile = state.plugin.rename_portprofile(&tenant_id, &id, &name).await?;
    let view = PortProfileView::new(attr_info);
    Ok(success_one_ok(PORTPROFILE, view.build(&profile, true)))
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((tenant_id, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    state.plugin.delete_portprofile(&tenant_id, &id).await?;
    tracing::info!(tenant = %tenant_id, id = %id, "portprofile deleted");
    Ok(StatusCode::ACCEPTED)
}

fn assignment(body: &Value) -> Result<(String, String), AppError> {
    let params = parse_request_params(body, PORTPROFILE, ASSIGNMENT_PARAMS)?;
    Ok((
        params[NETWORK_ID].trim().to_string(),
        params[PORT_ID].trim().to_string(),
    ))
}

pub async fn associate_portprofile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((tenant_id, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    let (network_id, port_id) = assignment(&body)?;
    state
        .plugin
        .associate_portprofile(&tenant_id, &network_id, &port_id, &id)
        .await?;
    tracing::info!(portprofile = %id, network = %network_id, port = %port_id, "portprofile associated");
    Ok(StatusCode::ACCEPTED)
}

pub async fn disassociate_portprofile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((tenant_id, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    check_tenant(&ctx, &tenant_id)?;
    let (network_id, port_id) = assignment(&body)?;
    state
        .plugin
        .disassociate_portprofile(&tenant_id, &network_id, &port_id, &id)
        .await?;
    tracing::info!(portprofile = %id, network = %network_id, port = %port_id, "portprofile disassociated");
    Ok(StatusCode::ACCEPTED)
}
