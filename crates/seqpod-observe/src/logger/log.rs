use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::OffsetTime, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError};

pub(crate) struct Logger;

impl Logger {
    pub fn text(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let layer = fmt::layer()
            .with_ansi(cfg.ansi())
            .with_target(cfg.with_targets)
            .with_timer(local_timer())
            .with_writer(writer(cfg));

        init_with(tracing_subscriber::registry().with(filter(&cfg.level)?).with(layer))
    }

    pub fn json(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(local_timer())
            .with_writer(writer(cfg));

        init_with(tracing_subscriber::registry().with(filter(&cfg.level)?).with(layer))
    }

    pub fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        journald(filter(&cfg.level)?)
    }
}

fn writer(cfg: &LoggerConfig) -> BoxMakeWriter {
    if cfg.to_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    }
}

fn filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

/// RFC 3339 timestamps in the local offset, UTC when the offset cannot be determined.
fn local_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(|e| {
        let msg = e.to_string();
        // global dispatcher or `log` bridge already installed
        if msg.contains("SetGlobalDefaultError") || msg.contains("already") {
            LoggerError::AlreadyInitialized
        } else {
            LoggerError::InitializationFailed(msg)
        }
    })
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald(filter: EnvFilter) -> Result<(), LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("seqpod".to_string());
    init_with(tracing_subscriber::registry().with(filter).with(layer))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald(_filter: EnvFilter) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_rejected() {
        assert!(matches!(
            filter("seqpod=[[oops"),
            Err(LoggerError::InvalidLogLevel(_))
        ));
        assert!(filter("seqpod.core.build=debug,info").is_ok());
    }

    #[test]
    fn second_init_reports_already_initialized() {
        let cfg = LoggerConfig {
            use_color: false,
            ..LoggerConfig::default()
        };
        // the first call may lose to another test in this binary; either way a second fails
        let _ = Logger::text(&cfg);
        assert_eq!(Logger::json(&cfg), Err(LoggerError::AlreadyInitialized));
    }
}
