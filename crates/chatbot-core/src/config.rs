use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::state::GenerationSettings;

/// Environment variable that overrides the configured endpoint.
pub const ENDPOINT_ENV: &str = "CHATBOT_ENDPOINT";

pub const DEFAULT_MODELS: [&str; 6] = [
    "gpt-4o",
    "gpt-4o-mini",
    "Meta-Llama-3-70B-Instruct",
    "Meta-Llama-3-8B-Instruct",
    "Phi-3-medium-128k-instruct",
    "Phi-3-mini-4k-instruct",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub heading: String,
    pub models: Vec<String>,
    pub theme: Theme,
    pub initial_model: String,
    pub initial_temperature: f32,
    pub initial_max_tokens: u32,
    pub initial_top_p: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            heading: "Chat with AI".to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            theme: Theme::Dark,
            initial_model: "gpt-4o".to_string(),
            initial_temperature: 1.0,
            initial_max_tokens: 4096,
            initial_top_p: 1.0,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the user config directory, falling back to defaults when
    /// no file exists yet. `CHATBOT_ENDPOINT` wins over the file.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CHATBOT_ENDPOINT`. The override lives in memory only.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
    }

    /// Re-read the file at `path`, let `change` edit it and write it back.
    ///
    /// Only what `change` touches differs from what was on disk, so
    /// in-memory overrides never leak into the file.
    pub fn update_file(path: &Path, change: impl FnOnce(&mut Config)) -> Result<(), ConfigError> {
        let mut stored = Self::load_from(path)?;
        change(&mut stored);
        stored.save_to(path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Generation settings a fresh window starts with.
    pub fn initial_settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.initial_model.clone(),
            temperature: self.initial_temperature,
            max_tokens: self.initial_max_tokens,
            top_p: self.initial_top_p,
        }
    }

    /// Remember `settings` as the starting point for the next run.
    pub fn remember_settings(&mut self, settings: &GenerationSettings) {
        self.initial_model = settings.model.clone();
        self.initial_temperature = settings.temperature;
        self.initial_max_tokens = settings.max_tokens;
        self.initial_top_p = settings.top_p;
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join("chatbot").join("config.json"))
    }
}
