//! Server-held API keys.
//!
//! A [`Credential`] never prints its value: `Debug` is redacted and the only
//! accessors meant for logs are [`Credential::diagnostics`] and friends. The
//! raw value is handed out solely to build an `Authorization` header.

use crate::config::RelayConfig;
use serde::Serialize;
use std::fmt;

const PREFIX_CHARS: usize = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key. Surrounding whitespace is dropped; a blank key is no key.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// First few characters followed by `...`. Never more than half the key.
    pub fn prefix(&self) -> String {
        let take = PREFIX_CHARS.min(self.len() / 2);
        let head: String = self.0.chars().take(take).collect();
        format!("{head}...")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

/// Loggable view of an optional credential.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialDiagnostics {
    pub configured: bool,
    pub length: usize,
    pub prefix: String,
}

impl CredentialDiagnostics {
    pub fn of(credential: Option<&Credential>) -> Self {
        match credential {
            Some(c) => Self {
                configured: true,
                length: c.len(),
                prefix: c.prefix(),
            },
            None => Self {
                configured: false,
                length: 0,
                prefix: "None".to_string(),
            },
        }
    }
}

/// Both upstream keys, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub translation: Option<Credential>,
    pub chat: Option<Credential>,
}

impl Credentials {
    /// Read the keys from the environment variables named in the config.
    pub fn from_env(config: &RelayConfig) -> Self {
        let read = |name: &str| std::env::var(name).ok().and_then(|v| Credential::new(v));
        Self {
            translation: read(&config.translation.api_key_env),
            chat: read(&config.chat.api_key_env),
        }
    }
}
