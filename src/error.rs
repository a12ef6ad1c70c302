//! Error taxonomy shared by every store.
//!
//! Backend commands reject with values of unknown shape (plain strings, error objects,
//! nested `{ error: { message } }` bodies). Everything is funnelled through
//! [`extract_error_message`] so the view layer only ever sees readable text.

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Fallback text when a rejection carries nothing readable.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Coarse classification used to decide how a failure is surfaced.
#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected locally before any call was made
    Validation,
    /// Bad credential or expired token
    Unauthorized,
    /// Missing alert or installation
    NotFound,
    /// Network or backend unreachable
    Transport,
    Unknown,
}

/// Error type for client-side operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("{0}")]
    Unknown(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Unauthorized(_) => ErrorKind::Unauthorized,
            ClientError::NotFound(_) => ErrorKind::NotFound,
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            ClientError::Unauthorized(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            ClientError::NotFound(err.to_string())
        } else if err.is_decode() {
            ClientError::Unknown(format!("Failed to parse response: {}", err))
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<BackendError> for ClientError {
    fn from(err: BackendError) -> Self {
        ClientError::Transport(err.message())
    }
}

impl Serialize for ClientError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A rejected backend command.
///
/// Holds the raw rejection value as delivered by the host bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError(pub Value);

impl BackendError {
    /// Rejection with a plain string payload
    pub fn msg(message: impl Into<String>) -> Self {
        BackendError(Value::String(message.into()))
    }

    /// Readable message extracted from the raw payload
    pub fn message(&self) -> String {
        extract_error_message(&self.0)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        BackendError::msg(message)
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        BackendError::msg(message)
    }
}

/// Pull a human-readable message out of an arbitrary rejection value.
///
/// Tried in order: string literal, `message`, `error` (string), `msg`, `description`,
/// nested `error.message`, then the serialized value itself.
pub fn extract_error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => UNKNOWN_ERROR_MESSAGE.to_string(),
        Value::Object(map) => {
            for field in ["message", "error", "msg", "description"] {
                if let Some(Value::String(s)) = map.get(field) {
                    return s.clone();
                }
            }

            if let Some(Value::String(s)) = map
                .get("error")
                .and_then(|nested| nested.as_object())
                .and_then(|nested| nested.get("message"))
            {
                return s.clone();
            }

            if map.is_empty() {
                return UNKNOWN_ERROR_MESSAGE.to_string();
            }

            serde_json::to_string(value).unwrap_or_else(|_| UNKNOWN_ERROR_MESSAGE.to_string())
        }
        other => other.to_string(),
    }
}

/// Serializable `{ success, error }` shape handed to the view layer.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl<E: std::fmt::Display> From<Result<(), E>> for ActionResult {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_string() {
        assert_eq!(extract_error_message(&json!("daemon offline")), "daemon offline");
    }

    #[test]
    fn test_extract_field_precedence() {
        let value = json!({ "description": "d", "msg": "m", "error": "e", "message": "first" });
        assert_eq!(extract_error_message(&value), "first");

        let value = json!({ "description": "d", "msg": "m" });
        assert_eq!(extract_error_message(&value), "m");

        let value = json!({ "description": "only description" });
        assert_eq!(extract_error_message(&value), "only description");
    }

    #[test]
    fn test_extract_nested_error_object() {
        let value = json!({ "error": { "code": "E1", "message": "nested" } });
        assert_eq!(extract_error_message(&value), "nested");
    }

    #[test]
    fn test_extract_never_renders_object_placeholder() {
        assert_eq!(extract_error_message(&json!({})), UNKNOWN_ERROR_MESSAGE);
        assert_eq!(extract_error_message(&Value::Null), UNKNOWN_ERROR_MESSAGE);

        let value = json!({ "code": 42 });
        assert_eq!(extract_error_message(&value), r#"{"code":42}"#);
        assert_eq!(extract_error_message(&json!(17)), "17");
    }

    #[test]
    fn test_client_error_kind_and_serialize() {
        let err = ClientError::NotFound("alert a1".to_string());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(serde_json::to_value(&err).unwrap(), json!("Not found: alert a1"));
    }

    #[test]
    fn test_action_result_from_result() {
        let ok: Result<(), ClientError> = Ok(());
        assert_eq!(ActionResult::from(ok), ActionResult::ok());

        let failed: Result<(), ClientError> = Err(ClientError::Validation("too short".into()));
        assert_eq!(ActionResult::from(failed), ActionResult::failed("too short"));
    }
}
