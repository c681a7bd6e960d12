//! Logging initialization for services embedding the clinical core
//!
//! Supports JSON or human-readable output, optional file logging with rotation,
//! and `RUST_LOG` overrides of the configured level.

use std::fs;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter,
};

use crate::config::{LogFileConfig, LogRotation, LoggingConfig};

/// Keeps the non-blocking file writer alive. Drop it only at shutdown.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize logging from configuration.
///
/// If a global subscriber is already installed (tests, or an embedding service that set up
/// its own), the existing one is kept.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let subscriber = tracing_subscriber::registry().with(build_env_filter(config));

    let file_guard = if config.json {
        init_json_logging_with_subscriber(subscriber, config)?
    } else {
        init_human_logging_with_subscriber(subscriber, config)?
    };

    tracing::info!(
        level = %config.level,
        json = config.json,
        file = config.file.is_some(),
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Keep sqlx statement logging quiet unless explicitly requested
        EnvFilter::new(format!("clinical_core={},sqlx=warn", config.level))
    })
}

fn init_json_logging_with_subscriber<S>(
    subscriber: S,
    config: &LoggingConfig,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + Send + Sync + 'static,
{
    let console_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(std::io::stdout);

    if let Some(file) = &config.file {
        let (file_appender, file_guard) = create_file_appender(file)?;
        let file_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(file_appender);

        report_existing(subscriber.with(console_layer).with(file_layer).try_init());
        Ok(Some(file_guard))
    } else {
        report_existing(subscriber.with(console_layer).try_init());
        Ok(None)
    }
}

fn init_human_logging_with_subscriber<S>(
    subscriber: S,
    config: &LoggingConfig,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + Send + Sync + 'static,
{
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stdout);

    if let Some(file) = &config.file {
        let (file_appender, file_guard) = create_file_appender(file)?;
        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(file_appender);

        report_existing(subscriber.with(console_layer).with(file_layer).try_init());
        Ok(Some(file_guard))
    } else {
        report_existing(subscriber.with(console_layer).try_init());
        Ok(None)
    }
}

fn report_existing(result: Result<(), tracing_subscriber::util::TryInitError>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "Global subscriber already installed, keeping it");
    }
}

fn create_file_appender(
    file: &LogFileConfig,
) -> anyhow::Result<(
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    fs::create_dir_all(&file.directory)?;

    let file_appender = match file.rotation {
        LogRotation::Daily => tracing_appender::rolling::daily(&file.directory, &file.prefix),
        LogRotation::Hourly => tracing_appender::rolling::hourly(&file.directory, &file.prefix),
        LogRotation::Minutely => {
            tracing_appender::rolling::minutely(&file.directory, &file.prefix)
        }
        LogRotation::Never => tracing_appender::rolling::never(&file.directory, &file.prefix),
    };

    Ok(tracing_appender::non_blocking(file_appender))
}
