use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use thiserror::Error;

/// What a callback sink receives for every enabled record.
///
/// The borrowed fields live only for the duration of the callback; copy
/// what needs to be kept.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub level: Level,
    pub target: &'a str,
    pub message: &'a str,
    pub file: &'a str,
    pub line: u32,
}

/// Sink for programs embedding the library that want diagnostics routed
/// into their own logging instead of stderr.
pub type LogCallback = fn(&LogRecord<'_>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    /// Another `log` backend was installed first; only the max level is
    /// ours to change.
    #[error("another logger is already installed")]
    ExternalLogger,
}

const MODE_DISABLED: u8 = 0;
const MODE_STDERR: u8 = 1;
const MODE_CALLBACK: u8 = 2;

pub struct PermtraceLogger {
    mode: AtomicU8,
    level: AtomicU8,
    callback: Mutex<Option<LogCallback>>,
}

impl PermtraceLogger {
    const fn new() -> Self {
        Self {
            mode: AtomicU8::new(MODE_DISABLED),
            level: AtomicU8::new(LevelFilter::Off as u8),
            callback: Mutex::new(None),
        }
    }

    fn level(&self) -> LevelFilter {
        filter_from_u8(self.level.load(Ordering::Relaxed))
    }

    fn set_level(&self, level: LevelFilter) {
        self.level.store(level as u8, Ordering::Relaxed);
        log::set_max_level(level);
    }

    fn set_mode(&self, mode: u8) {
        self.mode.store(mode, Ordering::Relaxed);
    }

    fn set_callback(&self, callback: Option<LogCallback>) {
        if let Ok(mut slot) = self.callback.lock() {
            *slot = callback;
        }
    }
}

impl Log for PermtraceLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match self.mode.load(Ordering::Relaxed) {
            MODE_STDERR => {
                eprintln!("[permtrace][{}] {}", record.level(), record.args());
            }
            MODE_CALLBACK => {
                let Ok(slot) = self.callback.lock() else {
                    return;
                };
                let Some(callback) = *slot else {
                    return;
                };
                let message = record.args().to_string();
                callback(&LogRecord {
                    level: record.level(),
                    target: record.target(),
                    message: &message,
                    file: record.file().unwrap_or(""),
                    line: record.line().unwrap_or(0),
                });
            }
            _ => {}
        }
    }

    fn flush(&self) {}
}

static LOGGER: PermtraceLogger = PermtraceLogger::new();
static LOGGER_STATE: OnceLock<LoggerInstall> = OnceLock::new();

#[derive(Copy, Clone)]
enum LoggerInstall {
    Installed,
    External,
}

fn init_logger() -> LoggerInstall {
    *LOGGER_STATE.get_or_init(|| match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(LevelFilter::Off);
            LoggerInstall::Installed
        }
        Err(_) => LoggerInstall::External,
    })
}

fn filter_from_u8(level: u8) -> LevelFilter {
    match level {
        x if x == LevelFilter::Error as u8 => LevelFilter::Error,
        x if x == LevelFilter::Warn as u8 => LevelFilter::Warn,
        x if x == LevelFilter::Info as u8 => LevelFilter::Info,
        x if x == LevelFilter::Debug as u8 => LevelFilter::Debug,
        x if x == LevelFilter::Trace as u8 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Writes enabled records to stderr as `[permtrace][LEVEL] message`. This is
/// what the command line uses.
pub fn log_set_stderr(level: LevelFilter) -> Result<(), LogError> {
    if matches!(init_logger(), LoggerInstall::External) {
        return Err(LogError::ExternalLogger);
    }
    LOGGER.set_mode(MODE_STDERR);
    LOGGER.set_level(level);
    Ok(())
}

/// Hands every enabled record to `callback` instead of printing it.
///
/// The callback runs on the thread that logged, with an internal lock held, so
/// it must not call back into these setters.
pub fn log_set_callback(callback: LogCallback, level: LevelFilter) -> Result<(), LogError> {
    if matches!(init_logger(), LoggerInstall::External) {
        return Err(LogError::ExternalLogger);
    }
    LOGGER.set_callback(Some(callback));
    LOGGER.set_mode(MODE_CALLBACK);
    LOGGER.set_level(level);
    Ok(())
}

pub fn log_set_level(level: LevelFilter) -> Result<(), LogError> {
    match init_logger() {
        LoggerInstall::Installed => LOGGER.set_level(level),
        LoggerInstall::External => log::set_max_level(level),
    }
    Ok(())
}

pub fn log_disable() -> Result<(), LogError> {
    match init_logger() {
        LoggerInstall::Installed => {
            LOGGER.set_mode(MODE_DISABLED);
            LOGGER.set_callback(None);
            LOGGER.set_level(LevelFilter::Off);
        }
        LoggerInstall::External => log::set_max_level(LevelFilter::Off),
    }
    Ok(())
}
