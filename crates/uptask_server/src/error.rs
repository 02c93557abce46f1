//! HTTP error mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;
use thiserror::Error;
use uptask_core::ServiceError;

/// Error returned by every handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// No session token was presented.
    #[error("authentication required")]
    Unauthenticated,

    /// The session token is malformed, expired or names a missing account.
    #[error("invalid session")]
    InvalidSession,

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    ///
    /// - Validation and undecodable bodies: 400
    /// - Missing or invalid session, bad password, unknown token: 401
    /// - Not permitted, unconfirmed account: 403
    /// - Missing entity or malformed id: 404
    /// - Already a partner, creator as partner, email taken: 409
    /// - Persistence and partial cascade failures: 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(_) | ServiceError::UnknownAccount(_) => {
                    StatusCode::NOT_FOUND
                }
                ServiceError::Forbidden(_) | ServiceError::AccountNotConfirmed(_) => {
                    StatusCode::FORBIDDEN
                }
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::InvalidCredentials(_) | ServiceError::InvalidToken => {
                    StatusCode::UNAUTHORIZED
                }
                ServiceError::PartialWrite { .. }
                | ServiceError::CascadeIncomplete { .. }
                | ServiceError::Repo(_)
                | ServiceError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthenticated | Self::InvalidSession => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("event=http_error module=server status=error detail={self}");
            return (status, Json(json!({ "message": "internal server error" }))).into_response();
        }

        let body = match &self {
            Self::Service(err) => match err.field_errors() {
                Some(errors) => json!({ "errors": errors }),
                None => json!({ "message": err.to_string() }),
            },
            other => json!({ "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Internal(value.to_string())
    }
}
