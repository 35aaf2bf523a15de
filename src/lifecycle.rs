//! Server lifecycle hooks
//!
//! `on_start` runs before the listener accepts requests; `on_stop` runs once
//! after the server has drained.

use tracing::info;

use crate::api::AppState;
use crate::auth::{AuthError, BOOTSTRAP_USER};
use crate::config::FarmerConfig;

/// Dials the backend and seeds the bootstrap administrator.
///
/// The farmer's `hash` and `admin` fields are refreshed on every start; any
/// other fields already on the record are left as they are.
pub async fn on_start(state: &AppState, farmer: &FarmerConfig) -> Result<(), AuthError> {
    state.pool().initialize().await?;
    state.auth.seed_bootstrap_user(&farmer.password).await?;
    info!(user = BOOTSTRAP_USER, "bootstrap user seeded");
    Ok(())
}

/// Closes the connection pool. Safe to call more than once.
pub async fn on_stop(state: &AppState) {
    state.pool().shutdown().await;
}
