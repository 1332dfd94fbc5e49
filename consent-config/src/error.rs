//! Typed error variants for the consent-config crate.
//!
//! Callers can match on the failure mode instead of inspecting strings:
//!
//! ```rust,no_run
//! use consent_config::{Config, ConfigError};
//!
//! match Config::load() {
//!     Ok(config) => println!("log level: {:?}", config.log_level),
//!     Err(ConfigError::Parse(e)) => eprintln!("config.yaml is not valid YAML: {e}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or saving configuration and scenarios.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred reading or writing a file.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// `config.yaml` could not be parsed or serialized.
    #[error("YAML parse error in config: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// A scenario file contained invalid TOML.
    #[error("Scenario parse error in {path}: {source}")]
    Scenario {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A field value failed semantic validation.
    ///
    /// The inner string describes which field is invalid and why.
    #[error("Config validation error: {0}")]
    Validation(String),

    /// A path resolved outside the expected configuration directory.
    #[error("Path traversal detected: {0}")]
    PathTraversal(String),

    /// No scenario with the requested identity or path exists.
    #[error("Scenario not found: {0}")]
    NotFound(String),
}
