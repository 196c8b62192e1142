//! Result and error types for Sonda.
//!
//! Every failure that can end a scenario step carries enough context to be
//! diagnosed from the report alone: the selector, what was expected or
//! attempted, and the last state that was actually observed.

use std::time::Duration;
use thiserror::Error;

/// Result type for Sonda operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur in Sonda
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A handle (or a scope handle) is no longer attached to the document
    #[error("Stale element: {selector} (node {node}) is no longer attached")]
    StaleElement {
        /// Selector or description of the element
        selector: String,
        /// Node identifier that went stale
        node: u64,
    },

    /// A condition never became true within its budget
    #[error("Timed out after {}ms waiting for {waited_for}; last observed: {last_observed}", timeout.as_millis())]
    Timeout {
        /// Description of the condition
        waited_for: String,
        /// Budget that elapsed
        timeout: Duration,
        /// Last observed state
        last_observed: String,
    },

    /// The target is covered by another element that receives pointer events
    #[error("Cannot {intent} {selector}: obscured by {obscured_by}")]
    Obscured {
        /// Target selector
        selector: String,
        /// Attempted intent
        intent: String,
        /// Description of the element receiving the pointer events
        obscured_by: String,
    },

    /// The target is attached but cannot be interacted with
    #[error("Cannot {intent} {selector}: {reason}")]
    NotActionable {
        /// Target selector
        selector: String,
        /// Attempted intent
        intent: String,
        /// Why the target is not actionable
        reason: String,
    },

    /// External cancellation fired while waiting
    #[error("Cancelled while waiting for {waited_for}; last observed: {last_observed}")]
    Cancelled {
        /// Description of the condition
        waited_for: String,
        /// Last observed state
        last_observed: String,
    },

    /// An expectation was still false when its timeout elapsed
    #[error("Assertion failed after {}ms: expected {selector} {expectation}; last observed: {actual}", timeout.as_millis())]
    Assertion {
        /// Target selector
        selector: String,
        /// Expectation description, including the expected value
        expectation: String,
        /// Last observed actual value
        actual: String,
        /// Assertion timeout
        timeout: Duration,
    },

    /// Selector text could not be parsed
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector {
        /// Selector source text
        selector: String,
        /// Error message
        message: String,
    },

    /// Key chord text could not be parsed
    #[error("Invalid key chord '{chord}': {message}")]
    InvalidKeyChord {
        /// Chord source text
        chord: String,
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// The page context reported a failure
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Browser launch or connection error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Clipboard capability failed
    #[error("Clipboard error: {message}")]
    Clipboard {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StaleElement { .. } => "stale_element",
            Self::Timeout { .. } => "timeout",
            Self::Obscured { .. } => "obscured",
            Self::NotActionable { .. } => "not_actionable",
            Self::Cancelled { .. } => "cancelled",
            Self::Assertion { .. } => "assertion",
            Self::InvalidSelector { .. } => "invalid_selector",
            Self::InvalidKeyChord { .. } => "invalid_key_chord",
            Self::Navigation { .. } => "navigation",
            Self::Page { .. } => "page",
            Self::BrowserLaunch { .. } => "browser_launch",
            Self::Clipboard { .. } => "clipboard",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }

    /// Whether this error is a stale-handle failure
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_includes_last_observed() {
        let err = ProbeError::Timeout {
            waited_for: "#login visible".into(),
            timeout: Duration::from_millis(250),
            last_observed: "hidden".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("250ms"));
        assert!(msg.contains("#login visible"));
        assert!(msg.contains("hidden"));
    }

    #[test]
    fn test_assertion_message_has_selector_expectation_and_actual() {
        let err = ProbeError::Assertion {
            selector: "#updatingButton".into(),
            expectation: "to have text \"My_Sample_Button\"".into(),
            actual: "\"Button\"".into(),
            timeout: Duration::from_secs(5),
        };
        let msg = err.to_string();
        assert!(msg.contains("#updatingButton"));
        assert!(msg.contains("My_Sample_Button"));
        assert!(msg.contains("\"Button\""));
        assert_eq!(err.kind(), "assertion");
    }

    #[test]
    fn test_kinds_and_stale_flag() {
        let stale = ProbeError::StaleElement {
            selector: "div".into(),
            node: 7,
        };
        assert!(stale.is_stale());
        assert_eq!(stale.kind(), "stale_element");
        assert!(!ProbeError::page("boom").is_stale());
        assert_eq!(ProbeError::config("bad").kind(), "config");
    }
}
