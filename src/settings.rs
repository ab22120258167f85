use std::path::Path;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatcher::DispatcherConfig;
use crate::model::DEFAULT_SNAPSHOT_LIMIT;
use crate::store::{read_json, write_json, StoreError};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

// ── LLM provider types ──────────────────────────────────────────

/// Which model-serving API the translator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum LlmProvider {
    Anthropic,
    #[default]
    OpenAiCompatible,
}

/// Full configuration for the chosen LLM provider.
///
/// The `api_key` field is never written to `settings.json`. It is stored in a
/// separate credentials file and loaded/saved via [`load_api_key`]/[`save_api_key`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub provider: LlmProvider,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL for OpenAI-compatible providers (ignored for Anthropic).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model override. None = use provider default.
    #[serde(default)]
    pub model: Option<String>,
}

// ── Component settings ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Maximum tasks (and links) listed in the prompt.
    pub snapshot_limit: usize,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            timeout_secs: 60,
            max_tokens: 4096,
        }
    }
}

impl TranslatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Origin allowed by CORS.
    pub frontend_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3001,
            frontend_origin: "http://localhost:3000".to_string(),
        }
    }
}

// ── App settings ─────────────────────────────────────────────────

/// Application-level settings stored in the OS config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub version: u32,
    #[serde(default)]
    pub llm: LlmProviderConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Append every dispatched command to the JSONL audit log.
    #[serde(default)]
    pub audit: bool,
}

const SETTINGS_VERSION: u32 = 1;

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            llm: LlmProviderConfig::default(),
            translator: TranslatorConfig::default(),
            dispatcher: DispatcherConfig::default(),
            server: ServerConfig::default(),
            audit: false,
        }
    }
}

impl AppSettings {
    /// Apply environment overrides from a variable lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("ANTHROPIC_API_KEY") {
            if get("OPENAI_API_KEY").is_none() {
                self.llm.provider = LlmProvider::Anthropic;
                self.llm.api_key = Some(key);
            }
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.provider = LlmProvider::OpenAiCompatible;
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = get("GANTT_PILOT_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(origin) = get("FRONTEND_ORIGIN") {
            self.server.frontend_origin = origin;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| SettingsError::InvalidEnv { var: "PORT", value: port })?;
        }
        Ok(())
    }
}

/// Load the API key from the separate credentials file.
pub fn load_api_key(app_config_dir: &Path) -> Option<String> {
    let path = crate::paths::credentials_path(app_config_dir);
    std::fs::read_to_string(path)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Save the API key to the separate credentials file (atomic write).
pub fn save_api_key(app_config_dir: &Path, key: &str) -> Result<(), StoreError> {
    std::fs::create_dir_all(app_config_dir)?;
    let path = crate::paths::credentials_path(app_config_dir);
    if key.is_empty() {
        let _ = std::fs::remove_file(&path);
    } else {
        crate::store::atomic_write(&path, key.as_bytes())?;
    }
    Ok(())
}

/// Load settings from the app config directory. Returns None if no settings file exists.
pub fn load_settings(app_config_dir: &Path) -> Option<AppSettings> {
    let path = crate::paths::settings_path(app_config_dir);
    if !path.exists() {
        return None;
    }
    let mut settings = match read_json::<AppSettings>(&path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            return None;
        }
    };
    if settings.llm.api_key.is_none() {
        settings.llm.api_key = load_api_key(app_config_dir);
    }
    Some(settings)
}

/// Settings file (or defaults) with the environment applied on top.
pub fn resolve_settings(app_config_dir: &Path) -> Result<AppSettings, SettingsError> {
    let mut settings = load_settings(app_config_dir).unwrap_or_else(|| {
        let mut s = AppSettings::default();
        s.llm.api_key = load_api_key(app_config_dir);
        s
    });
    settings.apply_env(|var| std::env::var(var).ok())?;
    Ok(settings)
}

/// Save settings to the app config directory.
pub fn save_settings(app_config_dir: &Path, settings: &AppSettings) -> Result<(), StoreError> {
    std::fs::create_dir_all(app_config_dir)?;
    write_json(&crate::paths::settings_path(app_config_dir), settings)
}
