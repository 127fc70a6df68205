use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `seqpod.core.build=debug,info`.
    pub level: String,
    pub with_targets: bool,
    /// ANSI colors; only honored when the selected stream is a terminal.
    pub use_color: bool,
    /// Write records to stderr instead of stdout.
    pub to_stderr: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: true,
            to_stderr: false,
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `SEQPOD_LOG_FORMAT` and `SEQPOD_LOG` (falling back to `RUST_LOG`).
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggerError> {
        let mut cfg = Self::default();
        if let Some(format) = lookup("SEQPOD_LOG_FORMAT") {
            cfg.format = format.parse()?;
        }
        if let Some(level) = lookup("SEQPOD_LOG").or_else(|| lookup("RUST_LOG")) {
            cfg.level = level;
        }
        if cfg.format != LoggerFormat::Text {
            cfg.use_color = false;
        }
        Ok(cfg)
    }

    /// Whether colored output should be emitted on the stream records are written to.
    pub fn ansi(&self) -> bool {
        let terminal = if self.to_stderr {
            std::io::stderr().is_terminal()
        } else {
            std::io::stdout().is_terminal()
        };
        self.use_color && terminal
    }
}
