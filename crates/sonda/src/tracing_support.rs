//! Structured logging setup.
//!
//! The engine only emits `tracing` events:
//!
//! - **trace**: every unsatisfied poll
//! - **debug**: satisfied waits, dispatched actions, chord resolution
//! - **info**: scenario phase transitions
//! - **warn**: scenario failures
//!
//! Binaries call [`init_tracing`] once. `RUST_LOG` wins over the configured
//! filter; later calls are no-ops.

use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Output encoding for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
    /// Line format
    pub format: LogFormat,
    /// Colored output (text format only)
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::Text,
            ansi: true,
        }
    }
}

impl TracingConfig {
    /// Create a new config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default filter directive
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the output format
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable colors
    #[must_use]
    pub const fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    fn env_filter(&self) -> ProbeResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.filter)
            .map_err(|e| ProbeError::config(format!("invalid log filter '{}': {e}", self.filter)))
    }
}

/// Install the global subscriber (stderr)
pub fn init_tracing(config: &TracingConfig) -> ProbeResult<()> {
    if INITIALISED.get().is_some() {
        return Ok(());
    }
    let filter = config.env_filter()?;
    let installed = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.ansi),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| ProbeError::config(format!("tracing setup failed: {e}")))?;
    let _ = INITIALISED.set(());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = TracingConfig::new()
            .with_filter("sonda=debug")
            .with_format(LogFormat::Json)
            .with_ansi(false);
        assert_eq!(config.filter, "sonda=debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.ansi);
        assert_eq!(TracingConfig::default().filter, "info");
    }

    #[test]
    fn test_format_serde_name() {
        let yaml = serde_yaml_ng::to_string(&LogFormat::Json).unwrap();
        assert_eq!(yaml.trim(), "json");
    }
}
