//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Keeps error responses uniform across the administrative, guarded, and
//! system endpoints.
//!
//! # Key invariants and assumptions
//! - Error responses carry a stable `code` and a human-readable `message`.
//! - Status codes match the error category.
//!
//! # Security considerations
//! - Store failures are logged server-side; clients get a generic message.
use crate::api::types::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use policy_opensearch::AdapterError;

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use gatekeeper::api::error::ApiError;
/// use gatekeeper::api::types::ErrorResponse;
///
/// let err = ApiError {
///     status: StatusCode::FORBIDDEN,
///     body: ErrorResponse {
///         code: "forbidden".to_string(),
///         message: "Forbidden".to_string(),
///         request_id: None,
///     },
/// };
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

/// Build a 400 Bad Request validation error.
pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Build a 500 without an underlying error to log.
pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Translate an adapter failure.
///
/// Rejected input becomes a 400 carrying the validation detail. Store
/// failures are logged and become a generic 500 with `message`.
pub fn api_adapter_error(message: &str, err: &AdapterError) -> ApiError {
    match err {
        AdapterError::InvalidRule(detail) => api_validation_error(detail),
        _ => {
            tracing::error!(error = %err, "policy store error");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable", message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_opensearch::StoreError;

    #[test]
    fn api_error_helpers_build_expected_codes() {
        let unauthorized = api_unauthorized("nope");
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.body.code, "unauthorized");

        let forbidden = api_forbidden("nope");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
        assert_eq!(forbidden.body.code, "forbidden");

        let validation = api_validation_error("bad");
        assert_eq!(validation.status, StatusCode::BAD_REQUEST);
        assert_eq!(validation.body.code, "validation_error");

        let internal = api_internal_message("oops");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.body.code, "internal");
    }

    #[test]
    fn adapter_errors_split_by_cause() {
        let invalid = api_adapter_error("write failed", &AdapterError::InvalidRule("short".into()));
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.body.message, "short");

        let store = api_adapter_error(
            "write failed",
            &AdapterError::StoreUnavailable(StoreError::Status {
                status: 503,
                body: "internal detail".to_string(),
            }),
        );
        assert_eq!(store.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.body.code, "store_unavailable");
        assert_eq!(store.body.message, "write failed");
    }
}
