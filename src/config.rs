use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful travel and food assistant. \
Provide concise, accurate information about travel destinations, local cuisine, and cultural \
experiences. Always prioritize safety and cultural sensitivity in your recommendations.";

const PRODUCTION_URL: &str = "https://travfood-backend.herokuapp.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub port: u16,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Label of the active configuration profile (`ENV_FILE`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,
    /// Unset means outbound calls never time out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_timeout_secs: Option<u64>,
    pub translation: TranslationConfig,
    pub chat: ChatConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key_env: String,
    pub default_model: String,
    pub default_temperature: f64,
    pub default_max_tokens: u64,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            environment: "development".to_string(),
            public_url: None,
            env_file: None,
            upstream_timeout_secs: None,
            translation: TranslationConfig::default(),
            chat: ChatConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translation.googleapis.com/language/translate/v2".to_string(),
            api_key_env: "GOOGLE_TRANSLATE_API_KEY".to_string(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            default_model: "deepseek-chat".to_string(),
            default_temperature: 0.7,
            default_max_tokens: 500,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 15 * 60,
        }
    }
}

impl RelayConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `PORT`, `APP_ENV` and `ENV_FILE` from the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| RelayError::config(format!("PORT is not a valid port: '{port}'")))?;
        }
        if let Some(env) = lookup("APP_ENV").filter(|v| !v.trim().is_empty()) {
            self.environment = env.trim().to_string();
        }
        if let Some(label) = lookup("ENV_FILE").filter(|v| !v.trim().is_empty()) {
            self.env_file = Some(label);
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// The externally visible base URL of this server.
    pub fn effective_public_url(&self) -> String {
        if let Some(ref url) = self.public_url {
            return url.clone();
        }
        if self.is_production() {
            PRODUCTION_URL.to_string()
        } else {
            format!("http://localhost:{}", self.port)
        }
    }

    pub fn env_file_label(&self) -> &str {
        self.env_file.as_deref().unwrap_or("Not specified")
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("travfood-relay.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("travfood-relay").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("travfood-relay").join("config.toml"));
        paths.push(home.join(".travfood-relay.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
