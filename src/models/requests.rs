//! Request DTOs for the farm API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Body of `POST /users/:username`
///
/// `admin` is stored as a string; JSON booleans are accepted and stored as
/// `"true"` / `"false"`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub password: String,
    pub admin: AdminField,
}

/// The `admin` member, as a string or a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AdminField {
    Text(String),
    Flag(bool),
}

impl AdminField {
    /// Value written to the user record.
    pub fn as_stored(&self) -> &str {
        match self {
            AdminField::Text(text) => text,
            AdminField::Flag(true) => "true",
            AdminField::Flag(false) => "false",
        }
    }
}

impl UpdateUserRequest {
    /// Parses a raw request body. Returns `None` unless it is a JSON object
    /// with a non-empty `password` and an `admin` member.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let request: Self = serde_json::from_slice(body).ok()?;
        if request.password.is_empty() {
            return None;
        }
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_admin() {
        let req = UpdateUserRequest::from_body(br#"{"password": "pw", "admin": "true"}"#).unwrap();
        assert_eq!(req.password, "pw");
        assert_eq!(req.admin.as_stored(), "true");
    }

    #[test]
    fn test_parse_bool_admin() {
        let req = UpdateUserRequest::from_body(br#"{"password": "pw", "admin": false}"#).unwrap();
        assert_eq!(req.admin, AdminField::Flag(false));
        assert_eq!(req.admin.as_stored(), "false");
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(UpdateUserRequest::from_body(br#"{"admin": "true"}"#).is_none());
        assert!(UpdateUserRequest::from_body(br#"{"password": "pw"}"#).is_none());
        assert!(UpdateUserRequest::from_body(br#"{"password": "", "admin": "true"}"#).is_none());
    }

    #[test]
    fn test_non_json_rejected() {
        assert!(UpdateUserRequest::from_body(b"").is_none());
        assert!(UpdateUserRequest::from_body(b"password=pw&admin=true").is_none());
        assert!(UpdateUserRequest::from_body(br#"["pw", "true"]"#).is_none());
        assert!(UpdateUserRequest::from_body(br#"{"password": 5, "admin": "true"}"#).is_none());
    }
}
