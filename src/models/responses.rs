//! Response bodies for the farm API
//!
//! Success responses are plain text; JSON is used for error bodies.

use serde::Serialize;

/// Body of `GET /`
pub const WELCOME: &str = "Welcome to the farm!";

/// Confirmation for `PUT /animals/:name`
pub fn animal_added(name: &str) -> String {
    format!("Added {name} to the farm")
}

/// Confirmation for `POST /users/:username`
pub fn user_added(username: &str) -> String {
    format!("Added user {username}")
}

/// Error response body for JSON error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmations() {
        assert_eq!(animal_added("cow"), "Added cow to the farm");
        assert_eq!(user_added("ann"), "Added user ann");
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"error":"Something went wrong"}"#);
    }
}
