use crate::chat::AuthorHeuristic;
use crate::llm::Provider;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub const MIN_API_TIMEOUT_SECS: u64 = 5;
pub const MAX_API_TIMEOUT_SECS: u64 = 60;
pub const MIN_REPLY_WORDS: u32 = 10;
pub const MAX_REPLY_WORDS: u32 = 50;

/// Platforms with a known launcher name and reference image prefix.
pub const PLATFORMS: &[&str] = &["whatsapp", "telegram", "messenger"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings")]
    SerializeError(#[from] serde_json::Error),
    #[error("api timeout must be between 5 and 60 seconds, got {0}")]
    ApiTimeoutOutOfRange(u64),
    #[error("reply length must be between 10 and 50 words, got {0}")]
    MaxLengthOutOfRange(u32),
    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    TemperatureOutOfRange(f64),
}

/// Reads an environment variable. Injected so key resolution can be tested
/// without touching the process environment.
pub type EnvLookup = fn(&str) -> Option<String>;

pub fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Screen coordinates, stored as a `[x, y]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coords(pub i32, pub i32);

/// Rectangle that is drag-selected to copy the chat transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatArea {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Fixed calibrated coordinates.
    #[default]
    Coordinates,
    /// Reference images located on screen.
    Template,
}

/// Flat settings record persisted as JSON. Keys absent from the file take
/// their built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub provider: Provider,
    pub model: String,
    pub persona_name: String,
    pub language_mix: String,
    pub tone: String,
    /// Reply length in words.
    pub max_length: u32,
    pub temperature: f64,
    pub platform: String,
    /// All durations below are in seconds.
    pub check_interval: u64,
    pub inactivity_timeout: u64,
    pub api_timeout: u64,
    pub error_backoff: u64,
    pub stop_join_timeout: u64,
    pub use_fallback_mode: bool,
    pub author_heuristic: AuthorHeuristic,
    pub capture_mode: CaptureMode,
    pub app_coords: Coords,
    pub chat_area: ChatArea,
    pub message_box_coords: Coords,
    pub assets_dir: PathBuf,
    pub confidence_threshold: f32,
    /// Captures this short or shorter are treated as empty.
    pub min_capture_len: usize,
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: Provider::Cohere,
            model: "command-a-03-2025".to_string(),
            persona_name: "Nitesh".to_string(),
            language_mix: "Hindi-English".to_string(),
            tone: "warm".to_string(),
            max_length: 20,
            temperature: 0.75,
            platform: "whatsapp".to_string(),
            check_interval: 4,
            inactivity_timeout: 600,
            api_timeout: 10,
            error_backoff: 5,
            stop_join_timeout: 3,
            use_fallback_mode: true,
            author_heuristic: AuthorHeuristic::Prefix,
            capture_mode: CaptureMode::Coordinates,
            app_coords: Coords(1124, 860),
            chat_area: ChatArea {
                start_x: 400,
                start_y: 100,
                end_x: 1200,
                end_y: 900,
            },
            message_box_coords: Coords(652, 950),
            assets_dir: PathBuf::from("assets"),
            confidence_threshold: 0.7,
            min_capture_len: 10,
            debug_mode: false,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. Never fails: a missing, empty, unreadable
    /// or malformed file yields the defaults.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no configuration file found, using defaults");
                return Self::default();
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "error reading configuration, using defaults");
                return Self::default();
            }
        };
        if contents.trim().is_empty() {
            info!(path = %path.display(), "configuration file is empty, using defaults");
            return Self::default();
        }
        match serde_json::from_str(&contents) {
            Ok(settings) => {
                info!(path = %path.display(), "configuration loaded");
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid JSON in configuration, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Picks the API key from, in order: the explicit override, the
    /// provider's environment variable, the settings file. Blank values are
    /// ignored.
    pub fn resolve_api_key(&self, explicit: Option<&str>, env: EnvLookup) -> Option<String> {
        let from_env = self.env_api_key(env);
        explicit
            .map(str::to_string)
            .into_iter()
            .chain(from_env)
            .chain(self.api_key.clone())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
    }

    /// The provider's API key from the environment, if set and not blank.
    pub fn env_api_key(&self, env: EnvLookup) -> Option<String> {
        env(self.provider.api_key_env_var()).filter(|key| !key.trim().is_empty())
    }

    pub fn set_api_timeout(&mut self, secs: u64) -> Result<(), ConfigError> {
        if !(MIN_API_TIMEOUT_SECS..=MAX_API_TIMEOUT_SECS).contains(&secs) {
            return Err(ConfigError::ApiTimeoutOutOfRange(secs));
        }
        self.api_timeout = secs;
        Ok(())
    }

    pub fn set_max_length(&mut self, words: u32) -> Result<(), ConfigError> {
        if !(MIN_REPLY_WORDS..=MAX_REPLY_WORDS).contains(&words) {
            return Err(ConfigError::MaxLengthOutOfRange(words));
        }
        self.max_length = words;
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f64) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::TemperatureOutOfRange(temperature));
        }
        self.temperature = temperature;
        Ok(())
    }

    pub fn toggle_fallback_mode(&mut self) -> bool {
        self.use_fallback_mode = !self.use_fallback_mode;
        self.use_fallback_mode
    }
}
