//! Debug logging for the consent host.
//!
//! Routes every `log::info!()` etc. to `consent_debug.log` in the temp
//! directory so the report on stdout stays clean. When `RUST_LOG` is set the
//! same lines are mirrored to stderr.
//!
//! Level precedence: `--log-level`, then `RUST_LOG`, then `config.yaml`
//! (applied once the config is loaded, via [`apply_config_level`]).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use consent_config::LogLevel;
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

const LOG_FILE_NAME: &str = "consent_debug.log";

enum LogFile {
    Unopened,
    Open(File),
    /// Opening failed once; stay silent instead of retrying every line.
    Unavailable,
}

struct LogBridge {
    file: Mutex<LogFile>,
    mirror_stderr: bool,
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Set when the CLI flag or `RUST_LOG` chose the level, so the config value
/// must not override it.
static LEVEL_PINNED: AtomicBool = AtomicBool::new(false);

/// Location of the debug log.
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join(LOG_FILE_NAME)
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

fn open_log_file() -> LogFile {
    let path = log_path();
    match OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(&path)
    {
        Ok(mut file) => {
            let _ = write!(
                file,
                "\n{}\nconsent debug session started at {} (level={})\n{}\n",
                "=".repeat(80),
                get_timestamp(),
                log::max_level(),
                "=".repeat(80)
            );
            LogFile::Open(file)
        }
        // Never let a missing temp dir break the report on stdout.
        Err(_) => LogFile::Unavailable,
    }
}

impl LogBridge {
    fn write_line(&self, line: &str) {
        {
            let mut file = self.file.lock();
            if matches!(*file, LogFile::Unopened) {
                *file = open_log_file();
            }
            if let LogFile::Open(f) = &mut *file {
                let _ = f.write_all(line.as_bytes());
                let _ = f.flush();
            }
        }
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.write_line(&format!(
            "[{}] [{:<5}] [{}] {}\n",
            get_timestamp(),
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {
        if let LogFile::Open(f) = &mut *self.file.lock() {
            let _ = f.flush();
        }
    }
}

/// Parse a `RUST_LOG` value. Module directives (`consent=debug`) are reduced
/// to their level; the most verbose level mentioned wins.
pub fn parse_env_level(value: &str) -> Option<LevelFilter> {
    value
        .split(',')
        .filter_map(|directive| {
            let level = directive.rsplit('=').next().unwrap_or(directive);
            level.parse::<LogLevel>().ok()
        })
        .map(LogLevel::to_level_filter)
        .max()
}

/// Pick the startup level. Returns the level and whether it is pinned
/// against the config file.
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    env_level: Option<LevelFilter>,
) -> (LevelFilter, bool) {
    match (cli_level, env_level) {
        (Some(level), _) => (level.to_level_filter(), true),
        (None, Some(level)) => (level, true),
        (None, None) => (LogLevel::default().to_level_filter(), false),
    }
}

/// Install the bridge as the global `log` logger. Safe to call more than
/// once; later calls only adjust the level.
pub fn init_log_bridge(cli_level: Option<LogLevel>) -> LevelFilter {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_level = rust_log.as_deref().and_then(parse_env_level);
    let (level, pinned) = resolve_level(cli_level, env_level);

    let bridge = BRIDGE.get_or_init(|| LogBridge {
        file: Mutex::new(LogFile::Unopened),
        mirror_stderr: rust_log.is_some(),
    });
    if log::set_logger(bridge).is_err() {
        log::debug!("Log bridge already installed");
    }
    log::set_max_level(level);
    LEVEL_PINNED.store(pinned, Ordering::Relaxed);
    level
}

/// Apply the level from `config.yaml` unless the CLI or `RUST_LOG` already
/// chose one. Returns whether the level changed.
pub fn apply_config_level(level: LogLevel) -> bool {
    if LEVEL_PINNED.load(Ordering::Relaxed) {
        return false;
    }
    log::set_max_level(level.to_level_filter());
    true
}
