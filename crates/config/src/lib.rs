//! Configuration loading, validation, and management for Deo.
//!
//! Loads configuration from `~/.deo/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deo/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Project root the agent may write into. Defaults to the current dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// Inference endpoint settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Workspace context limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Session persistence settings
    #[serde(default)]
    pub sessions: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Explicit model. When unset the first model the endpoint lists is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Used when no model is configured and the endpoint lists none.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    #[serde(default = "default_true")]
    pub stream: bool,

    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_fallback_model() -> String {
    "qwen2.5:latest".into()
}
fn default_format() -> String {
    "json".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: None,
            fallback_model: default_fallback_model(),
            stream: true,
            format: default_format(),
            temperature: default_temperature(),
        }
    }
}

/// How the agent loop drives the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// One action per round, results replayed into the next prompt.
    #[default]
    Iterative,
    /// One multi-action plan executed in a single round.
    SingleShot,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iterative => "iterative",
            Self::SingleShot => "single_shot",
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoopMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "iterative" => Ok(Self::Iterative),
            "single_shot" | "singleshot" => Ok(Self::SingleShot),
            other => Err(ConfigError::ValidationError(format!(
                "unknown agent mode '{other}' (expected 'iterative' or 'single_shot')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub mode: LoopMode,

    /// Inference rounds per turn in iterative mode.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Action/result pairs replayed into the next iterative prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Recent messages folded into the memory digest.
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
}

fn default_max_steps() -> usize {
    15
}
fn default_history_window() -> usize {
    10
}
fn default_memory_window() -> usize {
    15
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            mode: LoopMode::default(),
            max_steps: default_max_steps(),
            history_window: default_history_window(),
            memory_window: default_memory_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_max_total_chars")]
    pub max_total_chars: usize,

    /// Files larger than this are skipped outright.
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,

    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

fn default_max_depth() -> usize {
    3
}
fn default_max_files() -> usize {
    10
}
fn default_max_total_chars() -> usize {
    20_000
}
fn default_max_file_chars() -> usize {
    10_000
}
fn default_excluded_dirs() -> Vec<String> {
    [
        "node_modules",
        "target",
        "dist",
        "build",
        "out",
        "vendor",
        "__pycache__",
        "venv",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_files: default_max_files(),
            max_total_chars: default_max_total_chars(),
            max_file_chars: default_max_file_chars(),
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// JSON file backing the session store. Defaults to `~/.deo/sessions.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

fn default_max_sessions() -> usize {
    20
}
fn default_max_messages() -> usize {
    200
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            max_messages: default_max_messages(),
            store_path: None,
        }
    }
}

impl SessionConfig {
    /// Where sessions are persisted.
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("sessions.json"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deo/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `DEO_ENDPOINT`
    /// - `DEO_MODEL`
    /// - `DEO_MODE`
    /// - `DEO_WORKSPACE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// `load`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("DEO_ENDPOINT").filter(|v| !v.is_empty()) {
            self.inference.endpoint = endpoint;
        }
        if let Some(model) = lookup("DEO_MODEL").filter(|v| !v.is_empty()) {
            self.inference.model = Some(model);
        }
        if let Some(mode) = lookup("DEO_MODE").filter(|v| !v.is_empty()) {
            self.agent.mode = mode.parse()?;
        }
        if let Some(workspace) = lookup("DEO_WORKSPACE").filter(|v| !v.is_empty()) {
            self.workspace = Some(PathBuf::from(workspace));
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deo")
    }

    /// The workspace root: configured, or else the current directory.
    pub fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.temperature < 0.0 || self.inference.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "inference.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(self.inference.endpoint.starts_with("http://")
            || self.inference.endpoint.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "inference.endpoint must be an http(s) URL, got '{}'",
                self.inference.endpoint
            )));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be > 0".into(),
            ));
        }

        if self.sessions.max_sessions == 0 || self.sessions.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_sessions and sessions.max_messages must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            inference: InferenceConfig::default(),
            agent: AgentSettings::default(),
            context: ContextConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
