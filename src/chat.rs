//! Chat-completion relay.
//!
//! Callers may send a full `messages` sequence or just a line of text
//! (`message` or `prompt`). [`build_default_payload`] fills every gap from
//! [`ChatConfig`] before the request goes upstream.

use crate::config::ChatConfig;
use crate::credentials::{Credential, CredentialDiagnostics};
use crate::error::{ErrorEnvelope, ErrorExposure, Outcome};
use crate::logging::{LogLevel, Record, SharedLogger};
use crate::upstream::{self, CallContext};

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

const COMPONENT: &str = "ai-assistant";

pub const MISSING_KEY_MESSAGE: &str = "OpenAI API key is not configured";

/// Chat failures forward whatever detail the upstream gave.
pub const EXPOSURE: ErrorExposure = ErrorExposure::Detailed;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    pub message: Option<String>,
    pub prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl ChatRequest {
    /// Free-text user input; `message` wins over `prompt`.
    pub fn user_text(&self) -> Option<&str> {
        self.message.as_deref().or(self.prompt.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    /// Anything else the caller put on the message (`name`, tool fields).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: Option<&str>) -> Self {
        Self {
            role: role.into(),
            content: content.map(|c| serde_json::Value::String(c.to_string())),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u64,
    pub temperature: f64,
}

/// Resolve every optional field of `input` against `defaults`.
///
/// - `model`: caller's unless absent or empty
/// - `messages`: caller's sequence as given, even when empty; otherwise the
///   system prompt followed by one user message holding the free text
/// - `temperature`, `max_tokens`: caller's unless absent
pub fn build_default_payload(input: &ChatRequest, defaults: &ChatConfig) -> ChatPayload {
    let model = input
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or(&defaults.default_model)
        .to_string();

    let messages = match input.messages {
        Some(ref messages) => messages.clone(),
        None => vec![
            ChatMessage::new("system", Some(defaults.system_prompt.as_str())),
            ChatMessage::new("user", input.user_text()),
        ],
    };

    ChatPayload {
        model,
        messages,
        max_tokens: input.max_tokens.unwrap_or(defaults.default_max_tokens),
        temperature: input.temperature.unwrap_or(defaults.default_temperature),
    }
}

pub async fn relay_chat(
    req: &ChatRequest,
    config: &ChatConfig,
    credential: Option<&Credential>,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Outcome {
    let call = CallContext {
        component: COMPONENT,
        request_id: Uuid::new_v4(),
    };
    let diagnostics = CredentialDiagnostics::of(credential);

    logger.record(
        Record::new(LogLevel::Info, COMPONENT, "AI Assistant Request")
            .request(call.request_id)
            .context(json!({ "credential": diagnostics })),
    );

    let Some(key) = credential else {
        logger.record(
            Record::new(
                LogLevel::Error,
                COMPONENT,
                format!("{} ({})", MISSING_KEY_MESSAGE, config.api_key_env),
            )
            .request(call.request_id),
        );
        return Err(ErrorEnvelope::new(MISSING_KEY_MESSAGE));
    };

    let payload = build_default_payload(req, config);

    match upstream::forward_json(client, &config.endpoint, key, &payload, logger, call).await {
        Ok(body) => {
            let tokens = body
                .json()
                .and_then(|v| v.pointer("/usage/total_tokens").cloned());
            logger.record(
                Record::new(LogLevel::Info, COMPONENT, "AI Assistant Response")
                    .request(call.request_id)
                    .context(json!({ "status": "success", "tokens": tokens })),
            );
            Ok(body)
        }
        Err(err) => {
            logger.record(
                Record::new(LogLevel::Error, COMPONENT, format!("AI Assistant Error: {}", err))
                    .request(call.request_id)
                    .context(json!({ "credential": diagnostics })),
            );
            Err(EXPOSURE.envelope(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SYSTEM_PROMPT;

    fn request(body: serde_json::Value) -> ChatRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_defaults_for_bare_message() {
        let payload = build_default_payload(
            &request(json!({"message": "Best ramen in Osaka?"})),
            &ChatConfig::default(),
        );

        assert_eq!(payload.model, "deepseek-chat");
        assert_eq!(payload.max_tokens, 500);
        assert!((payload.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(payload.messages.len(), 2);
        assert_eq!(payload.messages[0].role, "system");
        assert_eq!(payload.messages[0].content, Some(json!(DEFAULT_SYSTEM_PROMPT)));
        assert_eq!(payload.messages[1].role, "user");
        assert_eq!(payload.messages[1].content, Some(json!("Best ramen in Osaka?")));
    }

    #[test]
    fn test_prompt_is_an_alias_for_message() {
        let payload =
            build_default_payload(&request(json!({"prompt": "Hi"})), &ChatConfig::default());
        assert_eq!(payload.messages[1].content, Some(json!("Hi")));

        let both = build_default_payload(
            &request(json!({"prompt": "from prompt", "message": "from message"})),
            &ChatConfig::default(),
        );
        assert_eq!(both.messages[1].content, Some(json!("from message")));
    }

    #[test]
    fn test_user_content_omitted_without_text() {
        let payload = build_default_payload(&ChatRequest::default(), &ChatConfig::default());
        let wire = serde_json::to_value(&payload).unwrap();
        assert_eq!(wire["messages"][1], json!({"role": "user"}));
    }

    #[test]
    fn test_caller_overrides_are_kept() {
        let payload = build_default_payload(
            &request(json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "Hello", "name": "ana"}],
                "temperature": 0.0,
                "max_tokens": 42,
                "message": "ignored"
            })),
            &ChatConfig::default(),
        );

        assert_eq!(payload.model, "gpt-4o");
        assert_eq!(payload.max_tokens, 42);
        assert_eq!(payload.temperature, 0.0);
        assert_eq!(payload.messages.len(), 1);
        assert_eq!(payload.messages[0].extra.get("name"), Some(&json!("ana")));
    }

    #[test]
    fn test_empty_messages_are_forwarded_as_is() {
        let payload =
            build_default_payload(&request(json!({"messages": []})), &ChatConfig::default());
        assert!(payload.messages.is_empty());
    }

    #[test]
    fn test_empty_model_falls_back() {
        let payload =
            build_default_payload(&request(json!({"model": ""})), &ChatConfig::default());
        assert_eq!(payload.model, "deepseek-chat");
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SharedLogger::new(dir.path().join("c.log"), "test").unwrap();
        let config = ChatConfig {
            endpoint: "http://0.0.0.0:1/never".to_string(),
            ..ChatConfig::default()
        };

        let err = relay_chat(
            &request(json!({"message": "hi"})),
            &config,
            None,
            &reqwest::Client::new(),
            &logger,
        )
        .await
        .unwrap_err();

        assert_eq!(err.error, json!(MISSING_KEY_MESSAGE));
        assert!(logger
            .recent(10)
            .iter()
            .all(|e| !e.message.starts_with("POST")));
    }
}
