//! API Routes
//!
//! Configures the Axum router with all farm endpoints.

use axum::{
    handler::Handler,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{add_animal, speak, update_user, welcome, AppState};
use crate::auth::{require_admin, require_auth};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /` - Welcome text
/// - `GET /animals/:name` - What does this animal say
/// - `PUT /animals/:name` - Store a sound (admin)
/// - `POST /users/:username` - Create or update a user (admin)
///
/// # Middleware
/// - Admin routes: Basic auth (401), then admin flag (403)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Outermost first: a bad password is a 401 even for non-admins.
    let admin_only = ServiceBuilder::new()
        .layer(from_fn_with_state(state.auth.clone(), require_auth))
        .layer(from_fn_with_state(state.auth.clone(), require_admin));

    Router::new()
        .route("/", get(welcome))
        .route(
            "/animals/:name",
            get(speak).put(add_animal.layer(admin_only.clone())),
        )
        .route("/users/:username", post(update_user.layer(admin_only)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
