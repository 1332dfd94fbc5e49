//! Command-line interface for the consent scenario host.
//!
//! `consent run <scenario>` replays one scenario, `consent list` shows what
//! is available and `consent check` replays everything and compares each
//! fired handler with the scenario's expectation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use consent_config::{Config, LogLevel, discover_scenarios, resolve_scenario};

use crate::debug;
use crate::relay::{RelayOptions, run_scenario};
use crate::report::ScenarioReport;

/// consent - replay capability negotiation scenarios against a scripted host
#[derive(Parser)]
#[command(name = "consent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set debug log level (overrides config and RUST_LOG)
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Config file to use instead of ~/.config/consent/config.yaml
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Seconds to wait for each host event before cancelling (overrides config)
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout_seconds: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay one scenario, by identity or by path to a .toml file
    Run {
        #[arg(value_name = "SCENARIO")]
        scenario: String,
    },
    /// List available scenarios
    List,
    /// Replay every scenario and compare against its expected handler
    Check,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Off => LogLevel::Off,
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

impl Cli {
    /// `--timeout-seconds` as a duration, if given.
    pub fn timeout_override(&self) -> Result<Option<Duration>> {
        let Some(seconds) = self.timeout_seconds else {
            return Ok(None);
        };
        if seconds <= 0.0 {
            bail!("--timeout-seconds must be greater than zero, got {seconds}");
        }
        Duration::try_from_secs_f64(seconds)
            .map(Some)
            .with_context(|| format!("invalid --timeout-seconds value {seconds}"))
    }

    /// Directory scenarios are discovered in: next to `--config` when given,
    /// otherwise the default config directory.
    pub fn scenario_root(&self) -> PathBuf {
        self.config
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::config_dir)
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

fn print_report(report: &ScenarioReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

/// Run the parsed command. Returns the process exit code.
pub async fn execute(cli: &Cli) -> Result<i32> {
    let config = load_config(cli)?;
    if debug::apply_config_level(config.log_level) {
        log::debug!("Log level taken from config: {}", config.log_level);
    }

    let mut options = RelayOptions::from_config(&config);
    if let Some(timeout) = cli.timeout_override()? {
        options = options.with_timeout(timeout);
    }
    let root = cli.scenario_root();

    match &cli.command {
        Commands::List => {
            let scenarios = discover_scenarios(&root);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&scenarios)?);
            } else {
                for scenario in &scenarios {
                    println!("{:<26} {}", scenario.identity, scenario.description);
                }
            }
            Ok(0)
        }
        Commands::Run { scenario } => {
            let scenario = resolve_scenario(scenario, &root)?;
            let report = run_scenario(&scenario, &options).await?;
            print_report(&report, cli.json)?;
            Ok(if report.matches_expectation() == Some(false) {
                1
            } else {
                0
            })
        }
        Commands::Check => {
            let mut reports = Vec::new();
            for scenario in discover_scenarios(&root) {
                reports.push(run_scenario(&scenario, &options).await?);
            }
            let failures = reports
                .iter()
                .filter(|r| r.matches_expectation() == Some(false))
                .count();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report, false)?;
                    println!();
                }
                println!("{} scenarios, {failures} failed", reports.len());
            }
            Ok(if failures == 0 { 0 } else { 1 })
        }
    }
}
