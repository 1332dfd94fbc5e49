//! Host configuration persisted as `config.yaml`.
//!
//! The file lives under `~/.config/consent/` and is created with defaults on
//! first load. Scenario scripts live next to it in `scenarios/`.

use std::fs;
use std::path::{Path, PathBuf};

use consent_engine::PromptSpec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::LogLevel;

/// File name of the configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Directory name (inside the config directory) holding user scenarios.
pub const SCENARIOS_DIR_NAME: &str = "scenarios";

/// Default time the relay waits for a host event before cancelling.
pub const DEFAULT_RESULT_TIMEOUT_MS: u64 = 5_000;

/// Scenario host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level written to the debug log.
    pub log_level: LogLevel,

    /// Prompt shown by scenarios that opt into `use_default_prompt`.
    pub default_prompt: PromptSpec,

    /// How long the relay waits for the next host event before it cancels
    /// the outstanding negotiation.
    pub result_timeout_ms: u64,

    /// Open the host settings screen after a permanently denied verdict.
    pub open_settings_on_permanent_denial: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            default_prompt: PromptSpec::new(
                "Permission needed",
                "This feature needs access to continue.",
                "Continue",
            )
            .with_decline_label("Not now"),
            result_timeout_ms: DEFAULT_RESULT_TIMEOUT_MS,
            open_settings_on_permanent_denial: true,
        }
    }
}

impl Config {
    /// Load from the default location, creating the file with defaults when
    /// it does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_dir(&Self::config_dir())
    }

    /// Load `config.yaml` from `dir`, creating it with defaults if missing.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        log::info!("Config path: {:?}", config_path);

        if !config_path.exists() {
            log::info!("Config file not found, creating default at {:?}", config_path);
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        if let Err(e) = Self::validate_config_path(&config_path, dir) {
            log::error!("Config path validation failed: {e}");
            return Err(e);
        }

        Self::load_file(&config_path)
    }

    /// Load an explicit configuration file (the `--config` flag).
    ///
    /// Unlike [`Self::load_from_dir`], a missing file is an error.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading existing config from {:?}", path);
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_yaml_ng::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Reject values the relay cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.result_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "result_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.default_prompt.accept_label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_prompt.accept_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate that `path` (which must already exist on disk) resolves to a
    /// location inside `expected_base`.
    ///
    /// Symlinks are resolved with `canonicalize` before the containment check.
    pub fn validate_config_path(path: &Path, expected_base: &Path) -> Result<PathBuf, ConfigError> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("cannot canonicalize {}: {e}", path.display()),
            )
        })?;

        // If the base doesn't exist yet (first run), use the un-resolved path.
        let canonical_base =
            fs::canonicalize(expected_base).unwrap_or_else(|_| expected_base.to_path_buf());

        if !canonical.starts_with(&canonical_base) {
            return Err(ConfigError::PathTraversal(format!(
                "path '{}' resolves to '{}' which is outside the expected directory '{}'",
                path.display(),
                canonical.display(),
                canonical_base.display(),
            )));
        }

        Ok(canonical)
    }

    /// Get the configuration directory (XDG convention on every platform
    /// except Windows).
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("consent")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("consent")
            } else {
                PathBuf::from(".")
            }
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join(CONFIG_FILE_NAME)
    }

    /// Get the user scenarios directory
    pub fn scenarios_dir() -> PathBuf {
        Self::config_dir().join(SCENARIOS_DIR_NAME)
    }

    /// Result timeout as a [`std::time::Duration`].
    pub fn result_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.result_timeout_ms)
    }
}
