//! API Handlers
//!
//! HTTP request handlers for each farm endpoint. Authentication and admin
//! checks happen in middleware before `add_animal` and `update_user` run.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::auth::{Argon2Hasher, AuthService};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{responses, UpdateUserRequest};
use crate::store::{animal_key, ConnectionPool, RedisDialer, StoreClient};

/// Application state shared across all handlers.
///
/// Owns the one connection pool of the process; every clone shares it.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: StoreClient,
    pub auth: AuthService,
    /// Pause before a successful lookup answers
    pub lookup_delay: Duration,
}

impl AppState {
    /// Creates a new AppState over `pool`.
    pub fn new(pool: Arc<ConnectionPool>, hasher: Argon2Hasher, lookup_delay: Duration) -> Self {
        let store = StoreClient::new(pool);
        let auth = AuthService::new(store.clone(), hasher);
        Self {
            store,
            auth,
            lookup_delay,
        }
    }

    /// Creates a new AppState backed by Redis as configured.
    ///
    /// Nothing is dialed here; the pool connects on first use.
    pub fn from_config(config: &Config) -> Self {
        let pool = ConnectionPool::new(
            RedisDialer::new(config.redis.clone()),
            config.redis.timeout(),
        );
        Self::new(
            Arc::new(pool),
            Argon2Hasher::default(),
            config.server.lookup_delay(),
        )
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        self.store.pool()
    }
}

/// Handler for GET /
pub async fn welcome() -> &'static str {
    responses::WELCOME
}

/// Handler for GET /animals/:name
///
/// Answers with the stored sound after the configured delay.
pub async fn speak(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
    let Some(sound) = state.store.get(&animal_key(&name)).await? else {
        return Err(ApiError::AnimalNotFound(name));
    };

    tokio::time::sleep(state.lookup_delay).await;

    Ok(match String::from_utf8(sound) {
        Ok(text) => text.into_response(),
        Err(raw) => raw.into_bytes().into_response(),
    })
}

/// Handler for PUT /animals/:name
///
/// Stores the request body verbatim.
pub async fn add_animal(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, String)> {
    state.store.set(&animal_key(&name), body.to_vec()).await?;
    info!(animal = %name, bytes = body.len(), "animal stored");
    Ok((StatusCode::CREATED, responses::animal_added(&name)))
}

/// Handler for POST /users/:username
///
/// Creates or updates a user from a JSON body with `password` and `admin`.
pub async fn update_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, String)> {
    let request = UpdateUserRequest::from_body(&body).ok_or(ApiError::MalformedRequest)?;
    state
        .auth
        .set_user(&username, &request.password, request.admin.as_stored())
        .await?;
    Ok((StatusCode::CREATED, responses::user_added(&username)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBackend, MemoryDialer};

    fn memory_state(backend: &MemoryBackend) -> AppState {
        let pool = ConnectionPool::new(
            MemoryDialer::new(backend.clone()),
            Duration::from_millis(200),
        );
        AppState::new(Arc::new(pool), Argon2Hasher::insecure_fast(), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_welcome_handler() {
        assert_eq!(welcome().await, "Welcome to the farm!");
    }

    #[tokio::test]
    async fn test_add_then_speak() {
        let backend = MemoryBackend::new(4);
        let state = memory_state(&backend);

        let (status, message) = add_animal(
            State(state.clone()),
            Path("cow".to_string()),
            Bytes::from_static(b"moo"),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message, "Added cow to the farm");

        let response = speak(State(state), Path("cow".to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_speak_not_found() {
        let backend = MemoryBackend::new(4);
        let state = memory_state(&backend);

        let result = speak(State(state), Path("yak".to_string())).await;
        assert!(matches!(result, Err(ApiError::AnimalNotFound(name)) if name == "yak"));
    }

    #[tokio::test]
    async fn test_speak_waits_for_lookup_delay() {
        let backend = MemoryBackend::new(4);
        backend.insert(animal_key("cow"), "moo").await;
        let mut state = memory_state(&backend);
        state.lookup_delay = Duration::from_millis(100);

        let started = std::time::Instant::now();
        speak(State(state), Path("cow".to_string())).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_missing_animal_skips_delay() {
        let backend = MemoryBackend::new(4);
        let mut state = memory_state(&backend);
        state.lookup_delay = Duration::from_secs(30);

        let started = std::time::Instant::now();
        assert!(speak(State(state), Path("yak".to_string())).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_update_user_malformed_body() {
        let backend = MemoryBackend::new(4);
        let state = memory_state(&backend);

        let result = update_user(
            State(state),
            Path("ann".to_string()),
            Bytes::from_static(br#"{"admin": "true"}"#),
        )
        .await;
        assert!(matches!(result, Err(ApiError::MalformedRequest)));
    }

    #[tokio::test]
    async fn test_backend_outage_is_backend_error() {
        let backend = MemoryBackend::new(4);
        let state = memory_state(&backend);
        state.pool().shutdown().await;

        let result = speak(State(state), Path("cow".to_string())).await;
        assert!(matches!(result, Err(ApiError::Backend(_))));
    }
}
