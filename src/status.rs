//! Read-only status reports. Credentials appear only as presence flags.

use crate::config::RelayConfig;
use crate::credentials::{Credential, Credentials};

use axum::http::{header, HeaderMap};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::time::Instant;
use sysinfo::{ProcessesToUpdate, System};

/// How presence flags are spelled. `/health` uses lower case, the key and
/// config reports use title case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagStyle {
    Lower,
    Title,
}

impl FlagStyle {
    fn label(self, present: bool) -> &'static str {
        match (self, present) {
            (Self::Lower, true) => "configured",
            (Self::Lower, false) => "not configured",
            (Self::Title, true) => "Configured",
            (Self::Title, false) => "Not Configured",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyFlags {
    #[serde(rename = "googleTranslate")]
    pub google_translate: &'static str,
    #[serde(rename = "openAI")]
    pub open_ai: &'static str,
}

impl KeyFlags {
    pub fn of(credentials: &Credentials, style: FlagStyle) -> Self {
        let flag = |c: &Option<Credential>| style.label(c.is_some());
        Self {
            google_translate: flag(&credentials.translation),
            open_ai: flag(&credentials.chat),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryUsage {
    /// Resident set size in bytes.
    pub rss: u64,
    #[serde(rename = "virtual")]
    pub virtual_bytes: u64,
}

impl MemoryUsage {
    /// Memory footprint of this process; zeros when the platform won't say.
    pub fn current() -> Self {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return Self::default();
        };
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|p| Self {
                rss: p.memory(),
                virtual_bytes: p.virtual_memory(),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub environment: String,
    pub timestamp: String,
    pub version: &'static str,
    /// Seconds since startup.
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub api_keys: KeyFlags,
}

impl HealthReport {
    pub fn collect(config: &RelayConfig, credentials: &Credentials, started_at: Instant) -> Self {
        Self {
            status: "ok",
            environment: config.environment.clone(),
            timestamp: rfc3339(Utc::now()),
            version: env!("CARGO_PKG_VERSION"),
            uptime: started_at.elapsed().as_secs_f64(),
            memory: MemoryUsage::current(),
            api_keys: KeyFlags::of(credentials, FlagStyle::Lower),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysReport {
    pub message: &'static str,
    pub environment: String,
    pub keys: KeyFlags,
    pub server_time: String,
    pub server_url: String,
}

impl KeysReport {
    pub fn collect(config: &RelayConfig, credentials: &Credentials, server_url: String) -> Self {
        Self {
            message: "API Keys Status",
            environment: config.environment.clone(),
            keys: KeyFlags::of(credentials, FlagStyle::Title),
            server_time: rfc3339(Utc::now()),
            server_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReport {
    pub server_url: String,
    pub environment: String,
    pub keys: KeyFlags,
    pub env_file: String,
}

impl ConfigReport {
    pub fn collect(config: &RelayConfig, credentials: &Credentials) -> Self {
        Self {
            server_url: config.effective_public_url(),
            environment: config.environment.clone(),
            keys: KeyFlags::of(credentials, FlagStyle::Title),
            env_file: config.env_file_label().to_string(),
        }
    }
}

/// `<proto>://<host>` as the caller addressed us.
///
/// Honors `X-Forwarded-Proto` from a fronting proxy, else assumes `http`.
pub fn request_base_url(headers: &HeaderMap, fallback_host: &str) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(fallback_host);
    format!("{proto}://{host}")
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
