use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::prompts::SYSTEM_INSTRUCTION;

/// Default address the relay listens on and the client connects to.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prompt relay (server side) settings
    pub relay: RelayConfig,

    /// Relay client settings used by the chat UI
    pub client: ClientConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// Speech-to-text capture
    pub voice: VoiceConfig,

    /// Vision home directory
    #[serde(skip)]
    pub vision_home: PathBuf,
}

/// Server-side relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind: String,
    pub model: String,
    pub api_base_url: String,
    /// API key for Gemini; normally left empty and taken from the environment
    pub api_key: Option<String>,
    pub system_instruction: String,
    /// Upper bound on a single model call, in seconds
    pub request_timeout_secs: u64,
    /// Keyed conversations kept alive at once; the least recently used is dropped first
    pub max_sessions: usize,
}

/// Client-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Public base URL of the relay
    pub base_url: String,
    /// Keeps this client's conversation apart from other key-less callers
    pub session: Option<String>,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub theme: String,
    pub contact_url: Option<String>,
}

/// Voice input configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Speech-to-text program and arguments; prints one transcript per line
    pub command: Option<Vec<String>>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            request_timeout_secs: 60,
            max_sessions: crate::session::DEFAULT_MAX_SESSIONS,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: format!("http://{}", DEFAULT_BIND),
            session: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            contact_url: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            relay: RelayConfig::default(),
            client: ClientConfig::default(),
            ui: UiConfig::default(),
            voice: VoiceConfig::default(),
            vision_home: home.join(".vision"),
        }
    }
}

impl Config {
    /// Load `~/.vision/config.toml` (or `path`), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let vision_home = home.join(".vision");

        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => vision_home.join("config.toml"),
        };

        let mut config = Self::from_file(&config_path)?;
        config.vision_home = vision_home;
        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Overlay environment variables on top of file values
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty("VISION_BASE_URL") {
            self.client.base_url = url;
        }
        if let Some(bind) = non_empty("VISION_BIND") {
            self.relay.bind = bind;
        }
        if let Some(model) = non_empty("VISION_MODEL") {
            self.relay.model = model;
        }
        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            self.relay.api_key = Some(key);
        }
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.relay.api_key.is_some()
    }

    /// Relay base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.client.base_url.trim_end_matches('/')
    }

    /// Where the chat UI writes its log file
    pub fn log_path(&self) -> PathBuf {
        self.vision_home.join("vision.log")
    }
}
