//! Structured logging for the validator.
//!
//! JSON lines in production, human-readable output while developing. Logs go
//! to stderr unless told otherwise since stdout carries the report.

use anyhow::{Context, Result};
use std::path::PathBuf;
use strum::EnumString;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

/// Noisy dependencies are held at a coarser level than the validator itself.
const DEPENDENCY_DIRECTIVES: &str = "hyper=info,reqwest=info,oxigraph=warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Where log files land when `output` is `File`.
    pub log_dir: PathBuf,
    pub file_prefix: String,
    pub rotate_daily: bool,
    pub environment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl LoggingConfig {
    /// Reads `ENVIRONMENT`/`ENV`, `LOG_FORMAT`, `LOG_OUTPUT` and `LOG_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    /// Unrecognized values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("ENV"))
            .unwrap_or_else(|| "development".to_string());
        let default_format = if is_production(&environment) {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };

        Self {
            format: lookup("LOG_FORMAT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(default_format),
            output: lookup("LOG_OUTPUT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(LogOutput::Stderr),
            log_dir: lookup("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            file_prefix: env!("CARGO_PKG_NAME").to_string(),
            rotate_daily: true,
            environment,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = if is_production(&self.environment) {
                "info"
            } else {
                "debug"
            };
            EnvFilter::new(format!("{level},{DEPENDENCY_DIRECTIVES}"))
        })
    }
}

fn is_production(environment: &str) -> bool {
    matches!(environment, "production" | "prod")
}

/// Installs the global subscriber. Keep the returned guard alive until exit,
/// dropping it flushes buffered lines.
pub fn init_logging(config: LoggingConfig) -> Result<WorkerGuard> {
    let (writer, guard) = match config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir)
                .with_context(|| format!("failed to create log directory {:?}", config.log_dir))?;
            let rotation = if config.rotate_daily {
                Rotation::DAILY
            } else {
                Rotation::NEVER
            };
            tracing_appender::non_blocking(tracing_appender::rolling::RollingFileAppender::new(
                rotation,
                &config.log_dir,
                &config.file_prefix,
            ))
        }
    };

    let json = (config.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer.clone())
    });
    let pretty = (config.format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_ansi(config.output != LogOutput::File)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(config.filter())
        .with(json)
        .with(pretty)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!(
        environment = %config.environment,
        format = ?config.format,
        output = ?config.output,
        "logging initialized"
    );
    Ok(guard)
}

/// Span wrapping one validation run.
pub fn run_span(run_id: Uuid) -> tracing::Span {
    tracing::info_span!(
        "validation_run",
        %run_id,
        version = env!("CARGO_PKG_VERSION")
    )
}
