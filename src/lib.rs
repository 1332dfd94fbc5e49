//! consent: scenario host for the `consent-engine` negotiation engine.
//!
//! - [`cli`] - clap command-line surface (`run`, `list`, `check`)
//! - [`debug`] - `log` bridge writing to the debug log file
//! - [`host`] - Scripted host adapters posting [`host::HostEvent`]s
//! - [`relay`] - Async relay loop driving one session per scenario
//! - [`report`] - Text and JSON scenario reports

pub mod cli;
pub mod debug;
pub mod host;
pub mod relay;
pub mod report;

pub use relay::{RelayOptions, run_scenario};
pub use report::ScenarioReport;
