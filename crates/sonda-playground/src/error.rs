//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Unknown scenario name
    #[error("Unknown scenario '{name}' (run `sonda-playground list`)")]
    UnknownScenario {
        /// Requested name
        name: String,
    },

    /// One or more scenarios did not end as expected
    #[error("{failed} of {total} scenarios did not end as expected")]
    ScenariosFailed {
        /// Unexpected outcomes
        failed: usize,
        /// Scenarios run
        total: usize,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sonda library error
    #[error("Sonda error: {0}")]
    Sonda(#[from] sonda::ProbeError),

    /// Report serialization error
    #[error("Report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unknown scenario error
    #[must_use]
    pub fn unknown_scenario(name: impl Into<String>) -> Self {
        Self::UnknownScenario { name: name.into() }
    }
}
