use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

static EXPOSE_DETAIL: OnceLock<bool> = OnceLock::new();

/// Enables the `detail` field on 500 responses. Called once at startup for
/// non-production environments; unset means "hide".
pub fn expose_error_detail(enabled: bool) {
    let _ = EXPOSE_DETAIL.set(enabled);
}

fn detail_exposed() -> bool {
    EXPOSE_DETAIL.get().copied().unwrap_or(false)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{1}")]
    Unauthorized(&'static str, String),
    #[error("{1}")]
    Forbidden(&'static str, String),
    #[error("{1}")]
    BadRequest(&'static str, String),
    #[error("{1}")]
    NotFound(&'static str, String),
    #[error("{1}")]
    Conflict(&'static str, String),
    #[error("{1}")]
    PayloadTooLarge(&'static str, String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Invalid email or password".into())
    }

    pub fn inactive_account() -> Self {
        ApiError::Unauthorized("INACTIVE_ACCOUNT", "User account is inactive".into())
    }

    pub fn authentication_required() -> Self {
        ApiError::Unauthorized("AUTH_REQUIRED", "Authentication required".into())
    }

    pub fn invalid_token() -> Self {
        ApiError::Unauthorized("INVALID_TOKEN", "Invalid or expired token".into())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden(
            "FORBIDDEN",
            "You do not have permission to perform this action".into(),
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound("NOT_FOUND", format!("{what} not found"))
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge("PAYLOAD_TOO_LARGE", msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        ApiError::BadRequest("DUPLICATE", msg.into())
    }

    /// Maps constraint violations on writes to 400, everything else to a 500.
    pub fn from_write(err: sqlx::Error) -> Self {
        let kind = err.as_database_error().map(|db| {
            (
                db.is_unique_violation(),
                db.is_foreign_key_violation(),
                db.is_check_violation(),
            )
        });
        match kind {
            Some((true, _, _)) => {
                ApiError::duplicate("A record with the same unique value already exists")
            }
            Some((_, true, _)) => ApiError::validation("A referenced record does not exist"),
            Some((_, _, true)) => {
                ApiError::validation("A field has a value outside its allowed set")
            }
            _ => ApiError::Database(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Conflict(..) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(..) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_error_response(&self, expose_detail: bool) -> ErrorResponse {
        let (code, message, detail) = match self {
            ApiError::Unauthorized(code, msg)
            | ApiError::Forbidden(code, msg)
            | ApiError::BadRequest(code, msg)
            | ApiError::NotFound(code, msg)
            | ApiError::Conflict(code, msg)
            | ApiError::PayloadTooLarge(code, msg) => (*code, msg.clone(), None),
            ApiError::Internal(_) | ApiError::Database(_) => (
                "INTERNAL",
                "Internal server error".to_string(),
                expose_detail.then(|| self.to_string()),
            ),
        };

        ErrorResponse {
            success: false,
            code: code.to_string(),
            message,
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(self.to_error_response(detail_exposed()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(ApiError::invalid_token().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("Patient").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::payload_too_large("too big").status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_only_when_exposed() {
        let err = ApiError::Internal("pool timed out".into());

        let hidden = err.to_error_response(false);
        assert_eq!(hidden.code, "INTERNAL");
        assert_eq!(hidden.message, "Internal server error");
        assert!(hidden.detail.is_none());

        let shown = err.to_error_response(true);
        assert_eq!(shown.detail.as_deref(), Some("internal error: pool timed out"));
    }

    #[test]
    fn client_errors_keep_their_message() {
        let body = ApiError::not_found("Appointment").to_error_response(true);
        assert!(!body.success);
        assert_eq!(body.message, "Appointment not found");
        assert!(body.detail.is_none());
    }
}
