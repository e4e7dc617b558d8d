/// Structured logging for the converter
///
/// Provides levelled logging tagged with the pipeline stage and the file or
/// water body being processed. Supports console output and an optional log
/// file that entries are appended to.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::convert::ConversionError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl LogLevel {
    /// Parses the names accepted in configuration files.
    pub fn from_name(name: &str) -> Option<LogLevel> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reader,
    Writer,
    Units,
    Pipeline,
    Cli,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Reader => write!(f, "READ"),
            Stage::Writer => write!(f, "WRITE"),
            Stage::Units => write!(f, "UNITS"),
            Stage::Pipeline => write!(f, "PIPE"),
            Stage::Cli => write!(f, "CLI"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the user supplied a bad file, date, unit or format
    Expected,
    /// Unexpected failure - no processor registered for a format
    Unexpected,
    /// Unknown - the file system refused a read or a write
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let entry = format_entry(level, stage, subject, message);
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, subject_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", stage, subject_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn format_entry(level: LogLevel, stage: Stage, subject: Option<&str>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, stage, subject_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn dispatch(level: LogLevel, stage: Stage, subject: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, subject, message);
        }
    }
}

pub fn info(stage: Stage, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, stage, subject, message);
}

pub fn warn(stage: Stage, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, stage, subject, message);
}

pub fn error(stage: Stage, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, stage, subject, message);
}

pub fn debug(stage: Stage, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, stage, subject, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a conversion failure by what caused it
pub fn classify_failure(err: &ConversionError) -> FailureType {
    match err {
        ConversionError::Validation(_)
        | ConversionError::Parse { .. }
        | ConversionError::InvalidStartDate(_)
        | ConversionError::Config(_) => FailureType::Expected,
        ConversionError::Dispatch(_) => FailureType::Unexpected,
        ConversionError::InputUnavailable { .. } | ConversionError::OutputUnwritable { .. } => {
            FailureType::Unknown
        }
    }
}

/// Log a conversion failure with automatic classification
pub fn log_conversion_failure(subject: &str, operation: &str, err: &ConversionError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Stage::Pipeline, Some(subject), &message),
        FailureType::Unexpected => error(Stage::Pipeline, Some(subject), &message),
        FailureType::Unknown => warn(Stage::Pipeline, Some(subject), &message),
    }
}

// ---------------------------------------------------------------------------
// Conversion Summary Logging
// ---------------------------------------------------------------------------

/// Log the outcome of a completed conversion
pub fn log_conversion_summary(subject: &str, observations: usize, near_zero: bool) {
    let message = format!("Conversion complete: {} observation(s) written", observations);

    if observations == 0 {
        warn(Stage::Pipeline, Some(subject), &message);
    } else if near_zero {
        warn(
            Stage::Pipeline,
            Some(subject),
            &format!("{} (all values below display precision)", message),
        );
    } else {
        info(Stage::Pipeline, Some(subject), &message);
    }
}
