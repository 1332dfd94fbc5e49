//! Configuration for the consent scenario host.
//!
//! - [`Config`] - `config.yaml` with the log level, default prompt and relay timeout
//! - [`Scenario`] - TOML scenario scripts, embedded defaults and user overrides
//! - [`ConfigError`] - typed load/save failures

pub mod config;
pub mod error;
pub mod scenario;
pub mod types;

pub use config::{CONFIG_FILE_NAME, Config, DEFAULT_RESULT_TIMEOUT_MS, SCENARIOS_DIR_NAME};
pub use error::ConfigError;
pub use scenario::{
    HANDLER_NAMES, PromptAnswer, ResponseScript, Scenario, discover_scenarios, embedded_scenarios,
    load_scenario_file, load_scenarios_from_dir, resolve_scenario,
};
pub use types::LogLevel;
