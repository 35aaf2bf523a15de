//! Error types for the farm API
//!
//! `StoreError` covers everything that can go wrong talking to the key-value
//! backend. `ApiError` is the HTTP-facing taxonomy; each variant maps to one
//! stable status code and message.

use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Failure of a backend operation.
///
/// A missing key is not an error: reads return `Ok(None)` for that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Dialing the backend or running a command failed
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A checkout or command did not finish within its bound
    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    /// The pool has been shut down
    #[error("connection pool is closed")]
    Closed,
}

// == API Error Enum ==
/// Every non-success outcome of a request.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No record stored under the requested animal name
    #[error("The animal {0} was not found.")]
    AnimalNotFound(String),

    /// Missing, malformed, or wrong Basic credentials
    #[error("Incorrect credentials with Basic Auth.")]
    Unauthenticated,

    /// Valid credentials without the admin flag
    #[error("Unauthorized action, administrative access required.")]
    Forbidden,

    /// User update body without a usable `password` and `admin`
    #[error("Request must have a valid json body with a password and admin field")]
    MalformedRequest,

    /// The backend could not serve the request
    #[error(transparent)]
    Backend(#[from] StoreError),

    /// Anything else that went wrong on our side
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(err) => ApiError::Backend(err),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Challenge sent with every 401.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="Login Required""#;

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::AnimalNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, BASIC_CHALLENGE)],
                self.to_string(),
            )
                .into_response(),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()).into_response(),
            ApiError::MalformedRequest => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(self.to_string())),
            )
                .into_response(),
            ApiError::Backend(err) => {
                tracing::error!(error = %err, "backend request failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorResponse::new("The farm's storage is unavailable.")),
                )
                    .into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Internal server error.")),
                )
                    .into_response()
            }
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for request handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
