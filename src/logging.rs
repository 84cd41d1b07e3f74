use crate::error::{Result, WorkspaceError};
use env_logger::{Builder, Env};
use log::{self, LevelFilter};
use chrono::Local;
use std::io::Write;
use yansi::Paint;

/// Initializes the logging system with the specified log level
///
/// `RUST_LOG` takes precedence over `log_level` when set.
/// Valid log levels are: error, warn, info, debug, trace
pub fn init(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level).to_string().to_lowercase();
    let env = Env::default()
        .filter_or("RUST_LOG", level)
        .write_style_or("RUST_LOG_STYLE", "auto");

    Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "{}", format_log(record)))
        .try_init()
        .map_err(|e| WorkspaceError::Config(format!("Failed to initialize logger: {}", e)))
}

/// Formats a log record as `[timestamp] LEVEL [target] message`
pub fn format_log(record: &log::Record) -> String {
    let level = match record.level() {
        log::Level::Error => Paint::red("ERROR").bold(),
        log::Level::Warn => Paint::yellow("WARN ").bold(),
        log::Level::Info => Paint::cyan("INFO ").bold(),
        log::Level::Debug => Paint::blue("DEBUG").bold(),
        log::Level::Trace => Paint::new("TRACE"),
    };

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let target = if !record.target().is_empty() {
        record.target()
    } else {
        record.module_path().unwrap_or("unknown")
    };

    format!("[{}] {} [{}] {}", timestamp, level, target, record.args())
}

/// Parses a log level string into a LevelFilter, defaulting to Warn
pub fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    }
}
