use std::path::PathBuf;
use thiserror::Error;

/// Main error type for daemon lifecycle operations
#[derive(Debug, Error)]
pub enum DaemonError {
    // Daemonization errors
    #[error("fork #{stage} failed: {reason}")]
    ForkFailed { stage: u8, reason: String },

    #[error("Failed to redirect standard stream: {0}")]
    RedirectError(String),

    #[error("Daemonization is only supported on Unix systems")]
    Unsupported,

    // PID file errors
    #[error("PID file {} exists but PID is not a number: {content:?}", .path.display())]
    MalformedPidFile { path: PathBuf, content: String },

    #[error("PID file error: {0}")]
    PidFileError(String),

    // Work routine errors
    #[error("run: no work routine was supplied to the daemon")]
    NotImplemented,

    #[error("Work routine failed: {0}")]
    WorkError(String),

    // System errors
    #[error("Signal error: {0}")]
    SignalError(String),

    #[error("System error: {0}")]
    SystemError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
