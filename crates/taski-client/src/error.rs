use serde_json::Value;
use taski_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Refresh failed after a 401; the session has been cleared.
    #[error("{0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("token storage: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    /// Short text suitable for a status line or an inline form error.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => {
                "Could not reach the server. Please try again later.".into()
            }
            ClientError::Internal(_) => "Something went wrong. Please try again.".into(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Internal(format!("json decode: {e}"))
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// Pull a readable message out of an error body.
///
/// Tries `detail`, then `error`, then the first field holding a list of
/// messages (field validation errors), then falls back to `fallback`.
pub fn extract_error_message(body: &str, fallback: &str) -> String {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return fallback.to_string();
    };

    for key in ["detail", "error"] {
        if let Some(msg) = map.get(key).and_then(Value::as_str) {
            if !msg.trim().is_empty() {
                return msg.to_string();
            }
        }
    }

    for (field, value) in &map {
        let Value::Array(entries) = value else {
            continue;
        };
        let joined = entries
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            continue;
        }
        return if field == "non_field_errors" {
            joined
        } else {
            format!("{field}: {joined}")
        };
    }

    fallback.to_string()
}
