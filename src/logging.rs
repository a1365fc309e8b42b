use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use clap::ValueEnum;

use crate::error::{AppError, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Trace => Some(tracing::Level::TRACE),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

impl FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, true)
            .map_err(|_| AppError::Config(format!("unknown log level '{}'", s)))
    }
}

/// Send tracing output to `file`. The terminal belongs to the UI.
pub fn setup_tracing(level: LogLevel, file: &Path) -> Result<()> {
    let Some(level) = level.to_tracing_level() else {
        return Ok(());
    };
    let writer = OpenOptions::new().create(true).append(true).open(file)?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .with_writer(Mutex::new(writer))
        .try_init()
        .map_err(|e| AppError::Config(format!("logging already initialized: {}", e)))
}
