//! API error taxonomy and HTTP status mapping
//!
//! Handlers speak six statuses: 401 for missing identity, 400 for
//! malformed input, 403 for denied actions, 404 for absent resources,
//! 409 for idempotency conflicts, 500 for everything internal. The
//! string carried by each variant is the wire message; internal causes
//! are logged and never leave the process.

use crate::types::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use roundtable_core::core_identity::IdentityError;
use roundtable_core::core_invite::InviteError;
use roundtable_core::core_store::StoreError;
use thiserror::Error;
use tracing::error;

/// Convenience alias for handler results
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: No valid session")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    /// 500 with a route-appropriate wire message. The underlying cause
    /// goes to the log, never to the client.
    pub fn internal(public: &str, cause: impl std::fmt::Display) -> Self {
        error!("{}: {}", public, cause);
        ApiError::Internal(public.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal("Internal server error", err)
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Anonymous => ApiError::Unauthorized,
            IdentityError::MalformedPrincipal(_) => ApiError::Unauthorized,
            IdentityError::UnknownUser => ApiError::NotFound("User not found".to_string()),
            IdentityError::Store(cause) => ApiError::internal("Internal server error", cause),
        }
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        match err {
            InviteError::UnknownCode => ApiError::NotFound("Invalid invite code".to_string()),
            InviteError::Store(cause) => ApiError::internal("Internal server error", cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::validation("bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("gone").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("dup".to_string()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("oops".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_is_wire_message() {
        let response = ApiError::forbidden("Forbidden: nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Forbidden: nope");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_invite_errors_map_to_not_found() {
        let err: ApiError = InviteError::UnknownCode.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Invalid invite code");
    }
}
