//! Request context from headers: the authenticated tenant and whether the caller is an admin.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the authenticated tenant id.
pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";
/// Comma-separated role list; `admin` grants admin privileges.
pub const ROLES_HEADER: &str = "X-Roles";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: Option<String>,
    pub is_admin: bool,
}

impl RequestContext {
    pub fn tenant(tenant_id: &str) -> Self {
        RequestContext {
            tenant_id: Some(tenant_id.to_string()),
            is_admin: false,
        }
    }

    pub fn admin(tenant_id: Option<&str>) -> Self {
        RequestContext {
            tenant_id: tenant_id.map(String::from),
            is_admin: true,
        }
    }

    pub fn owns(&self, tenant_id: Option<&str>) -> bool {
        match (self.tenant_id.as_deref(), tenant_id) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let tenant_id = header(TENANT_ID_HEADER);
        let is_admin = header(ROLES_HEADER)
            .map(|roles| roles.split(',').any(|r| r.trim().eq_ignore_ascii_case("admin")))
            .unwrap_or(false);
        Ok(RequestContext { tenant_id, is_admin })
    }
}
