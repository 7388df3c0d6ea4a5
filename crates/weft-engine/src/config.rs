//! Process configuration with hierarchical layering.
//!
//! Settings merge from four sources, highest priority last:
//!
//! ```text
//! 1. Default values (compile-time)
//! 2. Global config (~/.weft/config.toml)
//! 3. Project config (<project>/.weft/config.toml)
//! 4. Environment variables (WEFT_*)
//! ```
//!
//! Document-level `!key=value` declarations are a separate mechanism
//! (see [`components::GlobalConfig`](crate::components::GlobalConfig));
//! directive handlers consult parameters first, then the document
//! declarations, then this process configuration.
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `WEFT_DEBUG` | `debug` | bool |
//! | `WEFT_MODEL` | `model.default` | String |
//! | `WEFT_API_KEY` | `model.api_key` | String |
//! | `WEFT_MAX_TOKENS` | `model.max_tokens` | u32 |
//! | `WEFT_PYTHON_EXEC` | `run.python_exec` | String |
//!
//! # Example Configuration
//!
//! ```toml
//! # ~/.weft/config.toml
//! debug = false
//!
//! [model]
//! default = "gpt-4o-mini"
//! max_tokens = 1024
//!
//! [run]
//! python_exec = "/usr/bin/python3"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use weft_types::ErrorCode;

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".weft";

/// Config file name, global and per-project.
pub const CONFIG_FILE: &str = "config.toml";

/// Default global config file path (`~/.weft/config.toml`).
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROJECT_CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Configuration error type.
///
/// All variants are startup failures the user must fix; none are
/// recoverable at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file that exists.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid environment variable value.
    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ",
            Self::ParseToml { .. } => "CONFIG_PARSE",
            Self::InvalidEnvVar { .. } => "CONFIG_ENV",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Main configuration structure after merging all layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeftConfig {
    /// Enable debug mode (verbose logging).
    pub debug: bool,

    /// Language-model settings.
    pub model: ModelConfig,

    /// `run` directive settings.
    pub run: RunConfig,
}

impl WeftConfig {
    /// Deserializes from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns the underlying TOML error on malformed input.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one. Values from `other`
    /// override only where they differ from the defaults, which is
    /// what makes layering work.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.debug != default.debug {
            self.debug = other.debug;
        }
        self.model.merge(&other.model);
        self.run.merge(&other.run);
    }
}

/// Language-model settings for the `gen` and `web` directives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name used when neither the directive nor the document
    /// names one.
    pub default: String,

    /// API credential. Usually supplied per environment rather than
    /// checked into a config file.
    pub api_key: Option<String>,

    /// Completion-length cap applied when a directive does not set
    /// `max-tokens`.
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.default != default.default {
            self.default = other.default.clone();
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key.clone();
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
    }
}

/// `run` directive settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Interpreter substituted for a literal leading `python` token.
    pub python_exec: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            python_exec: "python3".to_string(),
        }
    }
}

impl RunConfig {
    fn merge(&mut self, other: &Self) {
        if other.python_exec != Self::default().python_exec {
            self.python_exec = other.python_exec.clone();
        }
    }
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// let config = ConfigLoader::new()
///     .with_project_root("/path/to/project")
///     .skip_env_vars()  // For testing
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global_config_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    skip_env: bool,
    skip_global: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root; project config is loaded from
    /// `<project_root>/.weft/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading. Useful for deterministic
    /// tests.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file exists but cannot be
    /// read or parsed, or an environment variable holds an unparseable
    /// value. Missing config files are silently ignored.
    pub fn load(&self) -> Result<WeftConfig, ConfigError> {
        let mut config = WeftConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);
            if let Some(global) = self.load_file(&global_path)? {
                debug!(path = %global_path.display(), "loaded global config");
                config.merge(&global);
            }
        }

        if let Some(ref project_root) = self.project_root {
            let project_path = project_root.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE);
            if let Some(project) = self.load_file(&project_path)? {
                debug!(path = %project_path.display(), "loaded project config");
                config.merge(&project);
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }

    fn load_file(&self, path: &Path) -> Result<Option<WeftConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config =
            WeftConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
        Ok(Some(config))
    }
}

fn apply_env_vars(config: &mut WeftConfig) -> Result<(), ConfigError> {
    if let Ok(val) = std::env::var("WEFT_DEBUG") {
        config.debug = parse_bool(&val)
            .ok_or_else(|| ConfigError::invalid_env_var("WEFT_DEBUG", "expected bool"))?;
    }
    if let Ok(val) = std::env::var("WEFT_MODEL") {
        config.model.default = val;
    }
    if let Ok(val) = std::env::var("WEFT_API_KEY") {
        config.model.api_key = Some(val);
    }
    if let Ok(val) = std::env::var("WEFT_MAX_TOKENS") {
        let parsed = val
            .parse::<u32>()
            .map_err(|_| ConfigError::invalid_env_var("WEFT_MAX_TOKENS", "expected u32"))?;
        config.model.max_tokens = Some(parsed);
    }
    if let Ok(val) = std::env::var("WEFT_PYTHON_EXEC") {
        config.run.python_exec = val;
    }
    Ok(())
}

/// Accepts "true", "false", "1", "0", "yes", "no", "on", "off"
/// (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use weft_types::assert_error_codes;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, content).expect("write config fixture");
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_env_vars()
            .load()
            .expect("defaults always load");
        assert_eq!(config, WeftConfig::default());
        assert_eq!(config.run.python_exec, "python3");
    }

    #[test]
    fn load_global_config() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_config(
            temp.path(),
            r#"
debug = true

[model]
default = "test-model"
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&path)
            .skip_env_vars()
            .load()
            .expect("valid config");
        assert!(config.debug);
        assert_eq!(config.model.default, "test-model");
    }

    #[test]
    fn project_overrides_global() {
        let global_temp = TempDir::new().expect("tempdir");
        let project_temp = TempDir::new().expect("tempdir");

        let weft_dir = project_temp.path().join(PROJECT_CONFIG_DIR);
        std::fs::create_dir_all(&weft_dir).expect("mkdir");

        let global_path = write_config(
            global_temp.path(),
            r#"
debug = true

[model]
default = "global-model"
"#,
        );
        write_config(
            &weft_dir,
            r#"
[model]
default = "project-model"
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global_path)
            .with_project_root(project_temp.path())
            .skip_env_vars()
            .load()
            .expect("valid configs");

        // debug comes from global (not overridden in project).
        assert!(config.debug);
        assert_eq!(config.model.default, "project-model");
    }

    #[test]
    fn missing_config_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_project_root("/nonexistent/project")
            .skip_env_vars()
            .load()
            .expect("missing files are not errors");
        assert_eq!(config, WeftConfig::default());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_config(temp.path(), "debug = not-a-bool");

        let err = ConfigLoader::new()
            .with_global_config(&path)
            .skip_env_vars()
            .load()
            .expect_err("parse must fail");
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("invalid"), None);
    }

    #[test]
    fn all_error_codes_valid() {
        let errs = vec![
            ConfigError::read_file(
                "/x",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ),
            ConfigError::invalid_env_var("WEFT_DEBUG", "expected bool"),
        ];
        assert_error_codes(&errs, "CONFIG_");
    }
}
