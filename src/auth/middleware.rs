//! Authentication and authorization middleware
//!
//! Both layers read the Basic credentials themselves, so either works alone.
//! Stack `require_auth` outside `require_admin` to get 401 before 403.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::{AuthService, BasicCredentials};
use crate::error::ApiError;

/// Rejects requests without valid Basic credentials with 401.
pub async fn require_auth(
    State(auth): State<AuthService>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(credentials) = BasicCredentials::from_headers(request.headers()) else {
        debug!(path = %request.uri().path(), "missing or malformed basic credentials");
        return Err(ApiError::Unauthenticated);
    };
    if !auth
        .check_auth(&credentials.username, &credentials.password)
        .await
    {
        debug!(username = %credentials.username, "authentication failed");
        return Err(ApiError::Unauthenticated);
    }
    Ok(next.run(request).await)
}

/// Rejects requests whose Basic user is not an administrator with 403.
pub async fn require_admin(
    State(auth): State<AuthService>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(credentials) = BasicCredentials::from_headers(request.headers()) else {
        return Err(ApiError::Forbidden);
    };
    if !auth.check_admin(&credentials.username).await {
        debug!(username = %credentials.username, "admin access denied");
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}
