//! Probe configuration, loadable from YAML.
//!
//! ```yaml
//! base_url: http://uitestingplayground.com
//! action_timeout_ms: 30000
//! expect_timeout_ms: 5000
//! poll_interval_ms: 50
//! scenario_timeout_ms: 120000
//! platform: macos
//! tracing:
//!   filter: sonda=debug
//!   format: json
//! ```

use crate::keyboard::Platform;
use crate::result::{ProbeError, ProbeResult};
use crate::tracing_support::TracingConfig;
use crate::wait::{WaitPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default budget for actionability waits (30 seconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Default budget for a whole scenario (2 minutes)
pub const DEFAULT_SCENARIO_TIMEOUT_MS: u64 = 120_000;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Prefix for relative navigation targets
    pub base_url: Option<String>,
    /// Budget for locator waits, navigation and actionability
    pub action_timeout_ms: u64,
    /// Budget for expectations
    pub expect_timeout_ms: u64,
    /// Sleep between poll evaluations
    pub poll_interval_ms: u64,
    /// Budget for one whole scenario
    pub scenario_timeout_ms: u64,
    /// Platform for chord naming (host platform when unset)
    pub platform: Option<Platform>,
    /// Logging
    pub tracing: TracingConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            expect_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            scenario_timeout_ms: DEFAULT_SCENARIO_TIMEOUT_MS,
            platform: None,
            tracing: TracingConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Create a new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML and validate
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file and validate
    pub fn from_file(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text).map_err(|e| match e {
            ProbeError::Yaml(inner) => {
                ProbeError::config(format!("{}: {inner}", path.display()))
            }
            other => other,
        })
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject settings the poller cannot honour
    pub fn validate(&self) -> ProbeResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ProbeError::config("poll_interval_ms must be positive"));
        }
        for (name, value) in [
            ("action_timeout_ms", self.action_timeout_ms),
            ("expect_timeout_ms", self.expect_timeout_ms),
            ("scenario_timeout_ms", self.scenario_timeout_ms),
        ] {
            if value < self.poll_interval_ms {
                return Err(ProbeError::config(format!(
                    "{name} ({value}) is shorter than poll_interval_ms ({})",
                    self.poll_interval_ms
                )));
            }
        }
        if let Some(base) = &self.base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(ProbeError::config(format!(
                    "base_url must be an http(s) URL, got '{base}'"
                )));
            }
        }
        Ok(())
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the action timeout
    #[must_use]
    pub const fn with_action_timeout_ms(mut self, ms: u64) -> Self {
        self.action_timeout_ms = ms;
        self
    }

    /// Set the expectation timeout
    #[must_use]
    pub const fn with_expect_timeout_ms(mut self, ms: u64) -> Self {
        self.expect_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the scenario timeout
    #[must_use]
    pub const fn with_scenario_timeout_ms(mut self, ms: u64) -> Self {
        self.scenario_timeout_ms = ms;
        self
    }

    /// Override the platform
    #[must_use]
    pub const fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Effective platform
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_default()
    }

    /// Scenario budget
    #[must_use]
    pub const fn scenario_timeout(&self) -> Duration {
        Duration::from_millis(self.scenario_timeout_ms)
    }

    /// Policy for locator waits and navigation
    #[must_use]
    pub fn action_policy(&self) -> WaitPolicy {
        WaitPolicy::new()
            .with_timeout_ms(self.action_timeout_ms)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
    }

    /// Policy for expectations
    #[must_use]
    pub fn expect_policy(&self) -> WaitPolicy {
        WaitPolicy::new()
            .with_timeout_ms(self.expect_timeout_ms)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
    }

    /// Absolute URL for `target` (absolute targets pass through)
    #[must_use]
    pub fn url_for(&self, target: &str) -> String {
        if target.contains("://") {
            return target.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                target.trim_start_matches('/')
            ),
            None => target.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tracing_support::LogFormat;
    use std::io::Write;

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = ProbeConfig::from_yaml_str(
                "base_url: http://uitestingplayground.com\nplatform: macos\ntracing:\n  format: json\n",
            )
            .unwrap();
            assert_eq!(config.platform(), Platform::MacOs);
            assert_eq!(config.expect_timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(config.tracing.format, LogFormat::Json);
            assert_eq!(config.tracing.filter, "info");
        }

        #[test]
        fn test_invalid_values_rejected() {
            assert!(matches!(
                ProbeConfig::from_yaml_str("poll_interval_ms: 0"),
                Err(ProbeError::Config { .. })
            ));
            assert!(ProbeConfig::from_yaml_str("expect_timeout_ms: 10\npoll_interval_ms: 50").is_err());
            assert!(ProbeConfig::from_yaml_str("base_url: ftp://x").is_err());
            assert!(matches!(
                ProbeConfig::from_yaml_str("poll_interval_ms: [1]"),
                Err(ProbeError::Yaml(_))
            ));
        }

        #[test]
        fn test_round_trip_through_file() {
            let config = ProbeConfig::new()
                .with_base_url("http://localhost:8080")
                .with_expect_timeout_ms(2_000);
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(config.to_yaml().unwrap().as_bytes()).unwrap();
            assert_eq!(ProbeConfig::from_file(file.path()).unwrap(), config);
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = ProbeConfig::from_file("/nonexistent/sonda.yaml").unwrap_err();
            assert_eq!(err.kind(), "io");
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_url_for() {
            let config = ProbeConfig::new().with_base_url("http://host/");
            assert_eq!(config.url_for("/ajax"), "http://host/ajax");
            assert_eq!(config.url_for("ajax"), "http://host/ajax");
            assert_eq!(config.url_for("https://other/x"), "https://other/x");
            assert_eq!(ProbeConfig::new().url_for("/"), "/");
        }

        #[test]
        fn test_policies() {
            let config = ProbeConfig::new().with_poll_interval_ms(25);
            assert_eq!(config.expect_policy().timeout, Duration::from_secs(5));
            assert_eq!(config.action_policy().timeout, Duration::from_secs(30));
            assert_eq!(config.action_policy().poll_interval, Duration::from_millis(25));
        }
    }
}
