//! Logging bootstrap and span helpers.
//!
//! The engine only emits `tracing` events and spans. Installing a subscriber
//! is left to the host process; [`init_logging`] is the stock way to do it.

use crate::errors::StepflowError;
use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

/// Installs a global subscriber writing to stderr.
///
/// Reads `RUST_LOG`, falling back to `default_directive` (e.g. `"info"` or
/// `"stepflow=debug"`) when unset or invalid.
///
/// # Errors
///
/// Returns `Config` if a global subscriber is already installed.
pub fn init_logging(format: LogFormat, default_directive: &str) -> Result<(), StepflowError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Plain => registry
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init(),
    };

    result.map_err(|err| StepflowError::Config(format!("logging already initialized: {err}")))
}

/// Span covering one pipeline run.
#[must_use]
pub fn pipeline_span(pipeline: &str, execution_id: &str) -> Span {
    tracing::info_span!("pipeline", pipeline = %pipeline, execution_id = %execution_id)
}

/// Span covering one step of a run.
#[must_use]
pub fn step_span(step: &str, index: usize) -> Span {
    tracing::debug_span!("step", step = %step, index)
}
