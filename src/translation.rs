//! Translation relay: `{text, targetLanguage}` in, upstream payload out.

use crate::config::TranslationConfig;
use crate::credentials::{Credential, CredentialDiagnostics};
use crate::error::{ErrorExposure, Outcome, RelayError};
use crate::logging::{LogLevel, Record, SharedLogger};
use crate::upstream::{self, CallContext};

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

const COMPONENT: &str = "translate";

/// Translation failures never reveal upstream detail.
pub const EXPOSURE: ErrorExposure = ErrorExposure::Generic("Translation failed");

/// Both fields pass through untyped: the upstream also takes an array of
/// strings as `q` for batch translation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub text: Option<serde_json::Value>,
    pub target_language: Option<serde_json::Value>,
}

/// Upstream wire shape. Absent caller fields are left out.
#[derive(Debug, Serialize)]
pub struct TranslationPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<&'a serde_json::Value>,
}

impl TranslationRequest {
    pub fn payload(&self) -> TranslationPayload<'_> {
        TranslationPayload {
            q: self.text.as_ref(),
            target: self.target_language.as_ref(),
        }
    }
}

pub async fn relay_translation(
    req: &TranslationRequest,
    config: &TranslationConfig,
    credential: Option<&Credential>,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Outcome {
    let call = CallContext {
        component: COMPONENT,
        request_id: Uuid::new_v4(),
    };

    let result = match credential {
        Some(key) => {
            upstream::forward_json(client, &config.endpoint, key, &req.payload(), logger, call).await
        }
        None => Err(RelayError::config(format!(
            "{} is not configured",
            config.api_key_env
        ))),
    };

    match result {
        Ok(body) => {
            logger.record(
                Record::new(LogLevel::Info, COMPONENT, "Translation succeeded")
                    .request(call.request_id),
            );
            Ok(body)
        }
        Err(err) => {
            logger.record(
                Record::new(LogLevel::Error, COMPONENT, format!("Translation error: {}", err))
                    .request(call.request_id)
                    .context(json!({
                        "upstream_status": upstream_status(&err),
                        "credential": CredentialDiagnostics::of(credential),
                    })),
            );
            Err(EXPOSURE.envelope(&err))
        }
    }
}

fn upstream_status(err: &RelayError) -> Option<u16> {
    match err {
        RelayError::Upstream { status, .. } => Some(*status),
        _ => None,
    }
}
