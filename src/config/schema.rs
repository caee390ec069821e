use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

pub const DEFAULT_WEBHOOK_URL: &str = "https://hook.us2.make.com/1715gyjveo6zawga8ucnc8f45228v3p2";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate]
    pub webhook: WebhookConfig,

    #[serde(default)]
    #[validate]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    #[validate]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_url")]
    #[validate(url)]
    pub url: String,

    /// The request is aborted once this much time has passed.
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    #[serde(default = "default_cooldown_secs")]
    #[validate(range(min = 1))]
    pub rate_limit_cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LimitsConfig {
    /// Minimum spacing between two searches from this client.
    #[serde(default = "default_min_interval_ms")]
    pub min_request_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Json { path: String },
    Sqlite { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UiConfig {
    #[serde(default = "default_loading_interval_ms")]
    #[validate(range(min = 1))]
    pub loading_message_interval_ms: u64,

    #[serde(default = "default_copied_ms")]
    pub copied_indicator_ms: u64,

    #[serde(default = "default_tick_ms")]
    #[validate(range(min = 1))]
    pub cooldown_tick_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: default_webhook_url(),
            timeout_ms: default_timeout_ms(),
            rate_limit_cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: default_min_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Json {
            path: default_state_path().display().to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            loading_message_interval_ms: default_loading_interval_ms(),
            copied_indicator_ms: default_copied_ms(),
            cooldown_tick_ms: default_tick_ms(),
        }
    }
}

fn default_webhook_url() -> String {
    DEFAULT_WEBHOOK_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_cooldown_secs() -> u64 {
    86_400
}

fn default_min_interval_ms() -> u64 {
    3_600_000
}

fn default_loading_interval_ms() -> u64 {
    4_000
}

fn default_copied_ms() -> u64 {
    2_000
}

fn default_tick_ms() -> u64 {
    1_000
}

/// `$HOME/.clients-radar/state.json`, or the working directory when there is no home.
pub fn default_state_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clients-radar")
        .join("state.json")
}
