//! Typed errors and fault mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("collection {collection}: attribute {attribute}: {reason}")]
    InvalidAttribute {
        collection: String,
        attribute: String,
        reason: String,
    },
    #[error("config load: {0}")]
    Load(String),
    #[error("invalid setting {name}: {reason}")]
    Setting { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{resource} {id} could not be found")]
    ResourceNotFound { resource: String, id: String },
    #[error("portprofile {0} could not be found")]
    PortprofileNotFound(String),
    #[error("port {port_id} could not be found on network {network_id}")]
    PortNotFound { network_id: String, port_id: String },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::ResourceNotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ResourceNotFound { .. }
            | AppError::PortprofileNotFound(_)
            | AppError::PortNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::ResourceNotFound { .. } => "not_found",
            AppError::PortprofileNotFound(_) => "portprofile_not_found",
            AppError::PortNotFound { .. } => "port_not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::Db(_) => "database_error",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "fault");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_family_maps_to_404() {
        assert_eq!(AppError::not_found("network", "n1").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::PortprofileNotFound("p".into()).status(), StatusCode::NOT_FOUND);
        let e = AppError::PortNotFound {
            network_id: "n".into(),
            port_id: "p".into(),
        };
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        assert_eq!(e.code(), "port_not_found");
    }

    #[test]
    fn messages_name_the_missing_resource() {
        let e = AppError::not_found("subnet", "abc");
        assert_eq!(e.to_string(), "subnet abc could not be found");
    }
}
