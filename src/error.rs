//! Error types for the relay.

use crate::upstream::UpstreamBody;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The upstream answered with a non-2xx status. `body` holds the
    /// response if it parsed as JSON.
    #[error("Request failed with status code {status}")]
    Upstream {
        status: u16,
        body: Option<serde_json::Value>,
    },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RelayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// The detail a caller may see when the endpoint forwards error detail.
    ///
    /// Structured upstream errors are passed through: the `error` member when
    /// the body has one, otherwise the whole body. Everything else collapses to
    /// the local message.
    pub fn caller_detail(&self) -> serde_json::Value {
        match self {
            Self::Upstream {
                body: Some(body), ..
            } => body
                .get("error")
                .cloned()
                .unwrap_or_else(|| body.clone()),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// What a relay hands back to its HTTP handler: the untouched upstream body,
/// or the envelope the endpoint's exposure policy allows.
pub type Outcome = std::result::Result<UpstreamBody, ErrorEnvelope>;

/// How much of a failure an endpoint reveals to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorExposure {
    /// Always answer with the same fixed message.
    Generic(&'static str),
    /// Forward structured upstream detail, or the local failure message.
    Detailed,
}

impl ErrorExposure {
    pub fn envelope(self, err: &RelayError) -> ErrorEnvelope {
        match self {
            Self::Generic(message) => ErrorEnvelope::new(message),
            Self::Detailed => ErrorEnvelope {
                error: err.caller_detail(),
            },
        }
    }
}

/// Body returned to callers on every failure: `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub error: serde_json::Value,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: serde_json::Value::String(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generic_exposure_hides_upstream_detail() {
        let err = RelayError::Upstream {
            status: 403,
            body: Some(json!({"error": {"message": "API key invalid"}})),
        };
        let envelope = ErrorExposure::Generic("Translation failed").envelope(&err);
        assert_eq!(envelope.error, json!("Translation failed"));
    }

    #[test]
    fn test_detailed_exposure_forwards_error_member() {
        let err = RelayError::Upstream {
            status: 401,
            body: Some(json!({"error": {"message": "bad key", "type": "auth"}})),
        };
        let envelope = ErrorExposure::Detailed.envelope(&err);
        assert_eq!(envelope.error, json!({"message": "bad key", "type": "auth"}));
    }

    #[test]
    fn test_detailed_exposure_forwards_whole_body_without_error_member() {
        let err = RelayError::Upstream {
            status: 502,
            body: Some(json!({"detail": "overloaded"})),
        };
        let envelope = ErrorExposure::Detailed.envelope(&err);
        assert_eq!(envelope.error, json!({"detail": "overloaded"}));
    }

    #[test]
    fn test_detailed_exposure_falls_back_to_status_message() {
        let err = RelayError::Upstream {
            status: 503,
            body: None,
        };
        let envelope = ErrorExposure::Detailed.envelope(&err);
        assert_eq!(envelope.error, json!("Request failed with status code 503"));
    }

    #[test]
    fn test_config_error_message() {
        let err = RelayError::config("OpenAI API key is not configured");
        assert_eq!(
            err.to_string(),
            "Configuration error: OpenAI API key is not configured"
        );
    }
}
