//! Probe: the entry point a scenario holds for one page.
//!
//! A `Probe` bundles the externally supplied page, the configuration, the
//! executor (platform and clipboard) and a cancellation token that every
//! wait started through it observes.

use crate::action::Executor;
use crate::clipboard::Clipboard;
use crate::config::ProbeConfig;
use crate::driver::{PageContext, Point};
use crate::keyboard::KeyChord;
use crate::locator::Locator;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;
use crate::wait::{wait_until, Condition, Observation, WaitOutcome, WaitPolicy};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle on one page plus everything needed to probe it
#[derive(Clone)]
pub struct Probe {
    page: Arc<dyn PageContext>,
    config: Arc<ProbeConfig>,
    executor: Executor,
    cancel: CancellationToken,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Probe {
    /// Create a probe over `page`
    #[must_use]
    pub fn new(page: Arc<dyn PageContext>, config: ProbeConfig) -> Self {
        let executor = Executor::new(config.platform());
        Self {
            page,
            config: Arc::new(config),
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a clipboard capability
    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.executor = self.executor.with_clipboard(clipboard);
        self
    }

    /// Use `cancel` as the root token for every wait
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The page
    #[must_use]
    pub fn page(&self) -> &dyn PageContext {
        self.page.as_ref()
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Executor
    #[must_use]
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Root cancellation token
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Policy for locator waits, derived from the root token
    #[must_use]
    pub fn action_policy(&self) -> WaitPolicy {
        self.config
            .action_policy()
            .with_cancel(self.cancel.child_token())
    }

    /// Policy for expectations, derived from the root token
    #[must_use]
    pub fn expect_policy(&self) -> WaitPolicy {
        self.config
            .expect_policy()
            .with_cancel(self.cancel.child_token())
    }

    /// Locator for a selector
    #[must_use]
    pub fn locator(&self, selector: Selector) -> Locator {
        let label = selector.to_string();
        Locator::new(self.clone(), selector, label)
    }

    /// Locator for selector shorthand (`text=...`, `id=...`, CSS, XPath)
    pub fn locate(&self, source: &str) -> ProbeResult<Locator> {
        let selector = Selector::parse(source)?;
        Ok(Locator::new(self.clone(), selector, source.trim().to_string()))
    }

    /// Navigate (relative targets join the base URL) and wait for readiness
    pub async fn navigate(&self, target: &str) -> ProbeResult<WaitOutcome> {
        let url = self.config.url_for(target);
        debug!(url = %url, "navigating");
        self.page.navigate(&url).await?;
        self.wait_until_ready().await
    }

    /// Wait until the document reports it has loaded
    pub async fn wait_until_ready(&self) -> ProbeResult<WaitOutcome> {
        wait_until(self.page(), &DocumentReady, &self.action_policy()).await
    }

    /// Press a chord on whatever has focus
    pub async fn press(&self, chord: &str) -> ProbeResult<()> {
        let chord = KeyChord::parse(chord)?;
        self.executor.press(self.page(), &chord).await
    }

    /// Mouse wheel at the top-left of the viewport
    pub async fn wheel(&self, delta_x: f64, delta_y: f64) -> ProbeResult<()> {
        self.executor
            .wheel(self.page(), Point::new(0.0, 0.0), delta_x, delta_y)
            .await
    }

    /// Current clipboard value
    pub fn clipboard_value(&self) -> ProbeResult<String> {
        self.executor
            .clipboard()
            .ok_or_else(|| ProbeError::Clipboard {
                message: "no clipboard attached to this probe".into(),
            })?
            .read_current_value()
    }
}

/// Condition: the document has finished loading
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentReady;

#[async_trait]
impl Condition for DocumentReady {
    async fn evaluate(&self, page: &dyn PageContext) -> ProbeResult<Observation> {
        let ready = page.is_ready().await?;
        Ok(Observation::new(
            ready,
            if ready { "complete" } else { "loading" },
        ))
    }

    fn describe(&self) -> String {
        "document to finish loading".into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::mock::MockPage;
    use std::time::Duration;

    fn slow_site() -> Arc<MockPage> {
        Arc::new(MockPage::with_site(|dom| {
            dom.route("/slow", |d| d.ready_after(Duration::from_secs(3)));
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_waits_for_readiness() {
        let page = slow_site();
        let probe = Probe::new(page.clone(), ProbeConfig::new().with_base_url("http://site"));
        let outcome = probe.navigate("/slow").await.unwrap();
        assert_eq!(outcome.elapsed, Duration::from_secs(3));
        assert_eq!(page.current_url().await.unwrap(), "http://site/slow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_stops_waiting() {
        let probe = Probe::new(slow_site(), ProbeConfig::new());
        probe.cancel_token().cancel();
        let err = probe.navigate("/slow").await.unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }

    #[tokio::test]
    async fn test_unknown_route_is_navigation_error() {
        let probe = Probe::new(slow_site(), ProbeConfig::new());
        assert_eq!(probe.navigate("/nope").await.unwrap_err().kind(), "navigation");
    }

    #[test]
    fn test_clipboard_value_requires_clipboard() {
        let probe = Probe::new(Arc::new(MockPage::new()), ProbeConfig::new());
        assert_eq!(probe.clipboard_value().unwrap_err().kind(), "clipboard");
        let probe = probe.with_clipboard(Arc::new(MemoryClipboard::with_value("v")));
        assert_eq!(probe.clipboard_value().unwrap(), "v");
    }

    #[test]
    fn test_locate_rejects_bad_selector() {
        let probe = Probe::new(Arc::new(MockPage::new()), ProbeConfig::new());
        assert_eq!(probe.locate("div >").unwrap_err().kind(), "invalid_selector");
        assert_eq!(probe.locate(" id=x ").unwrap().label(), "id=x");
    }
}
