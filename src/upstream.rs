//! The one outbound call every relay makes.

use crate::credentials::Credential;
use crate::error::{RelayError, Result};
use crate::logging::{LogLevel, Record, SharedLogger};

use axum::body::Bytes;
use serde::Serialize;
use uuid::Uuid;

/// Identifies a relay call in the diagnostic log.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub component: &'a str,
    pub request_id: Uuid,
}

/// A successful upstream reply, kept byte for byte.
#[derive(Debug, Clone)]
pub struct UpstreamBody {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UpstreamBody {
    /// Parse the body for inspection. The relayed bytes are never rebuilt
    /// from this value.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.bytes).ok()
    }
}

/// POST `payload` as JSON to `url` with `credential` as bearer token.
///
/// A 2xx response yields its raw body and content type, whatever the body
/// holds. Any other status becomes [`RelayError::Upstream`] carrying the body
/// when it is JSON.
pub async fn forward_json<P: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    credential: &Credential,
    payload: &P,
    logger: &SharedLogger,
    call: CallContext<'_>,
) -> Result<UpstreamBody> {
    logger.record(
        Record::new(LogLevel::Debug, call.component, format!("POST {}", url))
            .request(call.request_id),
    );

    let response = client
        .post(url)
        .header("Authorization", credential.bearer())
        .header("Content-Type", "application/json")
        .json(payload)
        .send()
        .await?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?;

    logger.record(
        Record::new(
            LogLevel::Debug,
            call.component,
            format!("Response status={} body_len={}", status.as_u16(), bytes.len()),
        )
        .request(call.request_id),
    );

    if !status.is_success() {
        return Err(RelayError::Upstream {
            status: status.as_u16(),
            body: serde_json::from_slice(&bytes).ok(),
        });
    }

    Ok(UpstreamBody {
        content_type,
        bytes,
    })
}
