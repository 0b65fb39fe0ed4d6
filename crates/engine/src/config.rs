// crates/engine/src/config.rs
//! Runtime configuration.
//!
//! Values come from `<config dir>/switchboard/config.json` (created with
//! defaults on first run), then a `.env` file, then the environment:
//! - `SWITCHBOARD_MODEL` - model identifier. Defaults to `qwen3:8b`.
//! - `SWITCHBOARD_MODEL_URL` - chat endpoint. Defaults to `http://localhost:11434/api/chat`.
//! - `SWITCHBOARD_MAX_ROUNDS` - model rounds allowed per user turn. Defaults to `10`.
//! - `SWITCHBOARD_STREAMING` - stream model output (`true`/`false`).
//! - `SWITCHBOARD_SEARCH_MAX_RESULTS` - default result count for web search. Defaults to `2`.
//! - `TAVILY_API_KEY` - enables the web search toolbelt. Never written to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are my AI assistant, please answer my query to the best of your ability.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the user config directory")]
    NoConfigDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 2,
            api_key: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub model_url: String,
    pub system_prompt: String,
    pub max_rounds: u32,
    pub streaming: bool,
    pub parallel_tools: bool,
    pub request_timeout_secs: u64,
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "qwen3:8b".to_string(),
            model_url: "http://localhost:11434/api/chat".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_rounds: crate::task::DEFAULT_MAX_ROUNDS,
            streaming: false,
            parallel_tools: true,
            request_timeout_secs: 120,
            search: SearchConfig::default(),
        }
    }
}

/// Keys accepted by [`Config::set`], in display order.
pub const KEYS: &[&str] = &[
    "model",
    "model_url",
    "system_prompt",
    "max_rounds",
    "streaming",
    "parallel_tools",
    "request_timeout_secs",
    "search.max_results",
];

const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SWITCHBOARD_MODEL", "model"),
    ("SWITCHBOARD_MODEL_URL", "model_url"),
    ("SWITCHBOARD_MAX_ROUNDS", "max_rounds"),
    ("SWITCHBOARD_STREAMING", "streaming"),
    ("SWITCHBOARD_SEARCH_MAX_RESULTS", "search.max_results"),
];

impl Config {
    /// Loads from `path` (or the default location), then applies `.env`
    /// and environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "ignoring unreadable .env file");
            }
        }

        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file at `path`, writing defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "created default config");
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("switchboard").join("config.json"))
    }

    /// Applies environment-style overrides through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                self.set(key, value.trim())?;
            }
        }

        if let Some(key) = lookup("TAVILY_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.search.api_key = Some(key.trim().to_string());
        }

        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "model" => self.model = non_empty(key, value)?,
            "model_url" => self.model_url = parse_url(key, value)?,
            "system_prompt" => self.system_prompt = value.to_string(),
            "max_rounds" => self.max_rounds = parse_positive(key, value)?,
            "streaming" => self.streaming = parse_bool(key, value)?,
            "parallel_tools" => self.parallel_tools = parse_bool(key, value)?,
            "request_timeout_secs" => self.request_timeout_secs = parse_positive(key, value)?,
            "search.max_results" => self.search.max_results = parse_positive(key, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Current value for each of [`KEYS`].
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("model", self.model.clone()),
            ("model_url", self.model_url.clone()),
            ("system_prompt", self.system_prompt.clone()),
            ("max_rounds", self.max_rounds.to_string()),
            ("streaming", self.streaming.to_string()),
            ("parallel_tools", self.parallel_tools.to_string()),
            ("request_timeout_secs", self.request_timeout_secs.to_string()),
            ("search.max_results", self.search.max_results.to_string()),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("model", &self.model)?;
        parse_url("model_url", &self.model_url)?;
        if self.max_rounds == 0 {
            return Err(invalid("max_rounds", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(key, "cannot be empty"));
    }
    Ok(value.to_string())
}

fn parse_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let value = non_empty(key, value)?;
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(invalid(key, "must start with http:// or https://"));
    }
    Ok(value)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(invalid(key, format!("expected true or false, got '{}'", other))),
    }
}

fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| invalid(key, format!("expected a positive integer, got '{}'", value.trim())))?;
    if parsed <= T::default() {
        return Err(invalid(key, "must be at least 1"));
    }
    Ok(parsed)
}
