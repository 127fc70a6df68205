use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggerError {
    #[error("invalid log format: {0} (expected text|json|journald)")]
    InvalidFormat(String),
    #[error("journald logging is unavailable (non-linux target or `journald` feature disabled)")]
    JournaldNotSupported,
    #[error("a global logger is already installed")]
    AlreadyInitialized,
    #[error("logger initialization failed: {0}")]
    InitializationFailed(String),
    #[error("invalid log filter: {0}")]
    InvalidLogLevel(String),
}
