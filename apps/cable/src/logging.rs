// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::{self, LogFormat};

type DynLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn env_filter_or_level(default_level: tracing::Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()))
}

fn make_console_layer(console_level: tracing::Level) -> DynLayer {
    tracing_subscriber::fmt::layer()
        .with_thread_names(true)
        .with_filter(env_filter_or_level(console_level))
        .boxed()
}

fn make_file_layer(
    non_blocking: tracing_appender::non_blocking::NonBlocking,
    file_level: tracing::Level,
    file_format: LogFormat,
) -> DynLayer {
    match file_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json()
            .with_filter(env_filter_or_level(file_level))
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_thread_names(true)
            .with_filter(env_filter_or_level(file_level))
            .boxed(),
    }
}

fn setup_file_appender(
    log_config: &config::LogConfig,
) -> Result<
    (tracing_appender::non_blocking::NonBlocking, tracing_appender::non_blocking::WorkerGuard),
    Box<dyn std::error::Error>,
> {
    let log_path = std::path::Path::new(&log_config.file_path);
    let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let log_filename = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("cable.log"));

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        return Err(format!("Failed to create log directory {}: {}", log_dir.display(), e).into());
    }

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    Ok(tracing_appender::non_blocking(file_appender))
}

/// Initialize logging based on configuration.
///
/// Console and file layers filter independently; `RUST_LOG` overrides both.
/// The returned guard flushes the file writer when dropped.
///
/// # Errors
///
/// Returns an error if file logging is enabled but the log directory cannot be created.
pub fn init_logging(
    log_config: &config::LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    let mut guard = None;
    let mut layers: Vec<DynLayer> = Vec::new();

    if log_config.file_enable {
        let (non_blocking, file_guard) = setup_file_appender(log_config)?;
        guard = Some(file_guard);
        let file_level: tracing::Level = log_config.file_level.clone().into();
        layers.push(make_file_layer(non_blocking, file_level, log_config.file_format));
    }

    if log_config.console_enable {
        let console_level: tracing::Level = log_config.console_level.clone().into();
        layers.push(make_console_layer(console_level));
    }

    let fallback = !log_config.console_enable && !log_config.file_enable;
    if fallback {
        layers.push(make_console_layer(tracing::Level::INFO));
    }

    tracing_subscriber::registry().with(layers).init();

    if fallback {
        tracing::warn!("Both console and file logging are disabled, falling back to console logging");
    }

    Ok(guard)
}
