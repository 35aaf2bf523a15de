//! API Module
//!
//! HTTP handlers and routing for the farm API.
//!
//! # Endpoints
//! - `GET /` - Welcome text
//! - `GET /animals/:name` - Look up an animal's sound (slow on purpose)
//! - `PUT /animals/:name` - Store an animal's sound (admin)
//! - `POST /users/:username` - Create or update a user (admin)

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
