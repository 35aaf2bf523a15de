//! Request and response models for the farm API

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{AdminField, UpdateUserRequest};
pub use responses::ErrorResponse;
