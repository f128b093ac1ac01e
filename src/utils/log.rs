use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

static GLOBAL_LOG_LEVEL: OnceLock<AtomicU8> = OnceLock::new();

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn from_u8(val: u8) -> LogLevel {
        match val {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }

    /// Parse a level name, e.g. from the `DEPOT_LOG` environment variable.
    pub fn parse(name: &str) -> Option<LogLevel> {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

fn level_cell() -> &'static AtomicU8 {
    // Default to Error: stdout carries the wire-visible output (port line,
    // state dumps) and stderr the startup errors, so a depot at default
    // verbosity prints nothing else.
    GLOBAL_LOG_LEVEL.get_or_init(|| AtomicU8::new(LogLevel::Error as u8))
}

fn should_log(level: LogLevel) -> bool {
    level >= LogLevel::from_u8(level_cell().load(Ordering::Relaxed))
}

pub fn set_global_log_level(level: LogLevel) {
    level_cell().store(level as u8, Ordering::Relaxed);
}

pub fn log(level: LogLevel, name: &str, msg: &str) {
    if !should_log(level) {
        return;
    }

    let cur_thread = std::thread::current().id();
    eprintln!("[{}] [{:?}] [{}] {}", level.as_str(), cur_thread, name, msg);
}

pub fn debug(name: &str, msg: &str) {
    log(LogLevel::Debug, name, msg);
}

pub fn info(name: &str, msg: &str) {
    log(LogLevel::Info, name, msg);
}

pub fn warn(name: &str, msg: &str) {
    log(LogLevel::Warning, name, msg);
}

pub fn error(name: &str, msg: &str) {
    log(LogLevel::Error, name, msg);
}
