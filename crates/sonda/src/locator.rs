//! Locator abstraction for element selection and interaction.
//!
//! # Design Philosophy
//!
//! - **Lazy**: a locator is a recipe; every operation re-resolves it against
//!   the live document, so replaced nodes are picked up automatically
//! - **Auto-Waiting**: actions wait for the first match to become actionable
//! - **First Match**: when several elements match, the first in document order
//!   is the one acted on
//! - **Fluent API**: chainable scoping and filtering

use crate::action::{Action, ActionIntent};
use crate::driver::{ElementHandle, NodeState};
use crate::expect::{assert_labeled, Expect, Expectation};
use crate::keyboard::KeyChord;
use crate::probe::Probe;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{resolve, Selector};
use crate::wait::{wait_until, ElementState, SelectorState, WaitOutcome, WaitPolicy};
use std::time::Duration;
use tracing::debug;

/// Per-action options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActOptions {
    /// Skip visibility, enabled and hit-target checks
    pub force: bool,
    /// Override the action timeout
    pub timeout: Option<Duration>,
}

impl ActOptions {
    /// Default options
    #[must_use]
    pub const fn new() -> Self {
        Self {
            force: false,
            timeout: None,
        }
    }

    /// Forced action
    #[must_use]
    pub const fn forced() -> Self {
        Self {
            force: true,
            timeout: None,
        }
    }

    /// Override the action timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A lazily resolved reference to elements on a probed page
#[derive(Debug, Clone)]
pub struct Locator {
    probe: Probe,
    selector: Selector,
    label: String,
}

impl Locator {
    pub(crate) const fn new(probe: Probe, selector: Selector, label: String) -> Self {
        Self {
            probe,
            selector,
            label,
        }
    }

    /// The selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Human-readable name used in errors and logs
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Descendants of this locator's matches that match `child`
    #[must_use]
    pub fn locator(&self, child: &Self) -> Self {
        Self::new(
            self.probe.clone(),
            self.selector.clone().descendant(child.selector.clone()),
            format!("{} >> {}", self.label, child.label),
        )
    }

    /// Only the `index`-th match (zero-based)
    #[must_use]
    pub fn nth(&self, index: usize) -> Self {
        Self::new(
            self.probe.clone(),
            self.selector.clone().nth(index),
            format!("{} >> nth={index}", self.label),
        )
    }

    /// Only the first match
    #[must_use]
    pub fn first(&self) -> Self {
        self.nth(0)
    }

    /// Only matches whose text contains `text` (normalized, ignoring case)
    #[must_use]
    pub fn has_text(&self, text: &str) -> Self {
        Self::new(
            self.probe.clone(),
            self.selector.clone().has_text(text),
            format!("{}:has-text({text:?})", self.label),
        )
    }

    /// Current matches, in document order
    pub async fn resolve(&self) -> ProbeResult<Vec<ElementHandle>> {
        resolve(self.probe.page(), &self.selector, None).await
    }

    /// Current matches inside `scope`.
    ///
    /// A detached scope fails as stale instead of matching nothing.
    pub async fn resolve_in(&self, scope: &ElementHandle) -> ProbeResult<Vec<ElementHandle>> {
        resolve(self.probe.page(), &self.selector, Some(scope)).await
    }

    /// Number of current matches
    pub async fn count(&self) -> ProbeResult<usize> {
        Ok(self.resolve().await?.len())
    }

    /// State of the first match, if any
    pub async fn state(&self) -> ProbeResult<Option<NodeState>> {
        let Some(first) = self.resolve().await?.into_iter().next() else {
            return Ok(None);
        };
        self.probe.page().node_state(first.node).await.map(Some)
    }

    /// Text content of the first match
    pub async fn text_content(&self) -> ProbeResult<Option<String>> {
        Ok(self.state().await?.map(|s| s.text))
    }

    /// Wait for the first match to reach `state`, using the action timeout
    pub async fn wait_for(&self, state: ElementState) -> ProbeResult<WaitOutcome> {
        self.wait_with(state, &self.probe.action_policy()).await
    }

    /// Wait for the first match to reach `state` within `timeout`
    pub async fn wait_for_within(
        &self,
        state: ElementState,
        timeout: Duration,
    ) -> ProbeResult<WaitOutcome> {
        self.wait_with(state, &self.probe.action_policy().with_timeout(timeout))
            .await
    }

    async fn wait_with(&self, state: ElementState, policy: &WaitPolicy) -> ProbeResult<WaitOutcome> {
        let condition = SelectorState::new(self.selector.clone(), state).with_label(&self.label);
        wait_until(self.probe.page(), &condition, policy).await
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Wait until actionable, then perform `intent` on the first match.
    ///
    /// Unforced actions wait for visibility, forced ones only for attachment.
    /// The fresh handle is dispatched once; a target that goes stale or is
    /// obscured fails the action.
    pub async fn act(&self, intent: ActionIntent, options: ActOptions) -> ProbeResult<()> {
        let action = Action::new(intent).with_force(options.force);
        let mut policy = self.probe.action_policy();
        if let Some(timeout) = options.timeout {
            policy.timeout = timeout;
        }
        let ready = if options.force {
            ElementState::Attached
        } else {
            ElementState::Visible
        };

        self.wait_with(ready, &policy).await?;
        let Some(target) = self.resolve().await?.into_iter().next() else {
            return Err(ProbeError::StaleElement {
                selector: self.label.clone(),
                node: 0,
            });
        };
        debug!(locator = %self.label, node = target.node.0, intent = %action.intent, "target resolved");
        self.probe
            .executor()
            .perform(self.probe.page(), &action, &target)
            .await
            .map_err(|e| self.relabel(e))
    }

    fn relabel(&self, error: ProbeError) -> ProbeError {
        match error {
            ProbeError::Obscured {
                intent, obscured_by, ..
            } => ProbeError::Obscured {
                selector: self.label.clone(),
                intent,
                obscured_by,
            },
            ProbeError::NotActionable { intent, reason, .. } => ProbeError::NotActionable {
                selector: self.label.clone(),
                intent,
                reason,
            },
            ProbeError::StaleElement { node, .. } => ProbeError::StaleElement {
                selector: self.label.clone(),
                node,
            },
            other => other,
        }
    }

    /// Click the first match
    pub async fn click(&self) -> ProbeResult<()> {
        self.act(ActionIntent::Click, ActOptions::new()).await
    }

    /// Double-click the first match
    pub async fn dblclick(&self) -> ProbeResult<()> {
        self.act(ActionIntent::DoubleClick, ActOptions::new()).await
    }

    /// Move the pointer over the first match
    pub async fn hover(&self) -> ProbeResult<()> {
        self.act(ActionIntent::Hover, ActOptions::new()).await
    }

    /// Replace the value of the first match
    pub async fn fill(&self, text: impl Into<String>) -> ProbeResult<()> {
        self.act(ActionIntent::Fill(text.into()), ActOptions::new())
            .await
    }

    /// Focus the first match and press a chord such as `Primary+C`
    pub async fn press(&self, chord: &str) -> ProbeResult<()> {
        let chord = KeyChord::parse(chord)?;
        self.act(ActionIntent::KeyPress(chord), ActOptions::new())
            .await
    }

    /// Focus the first match
    pub async fn focus(&self) -> ProbeResult<()> {
        self.act(ActionIntent::Focus, ActOptions::new()).await
    }

    /// Wheel-scroll over the first match
    pub async fn scroll_by(&self, delta_x: f64, delta_y: f64) -> ProbeResult<()> {
        self.act(ActionIntent::Scroll { delta_x, delta_y }, ActOptions::new())
            .await
    }

    // =========================================================================
    // ASSERTIONS
    // =========================================================================

    /// Fluent assertions on this locator
    #[must_use]
    pub fn expect(&self) -> Expect {
        Expect::new(self.clone())
    }

    pub(crate) fn expect_policy(&self) -> WaitPolicy {
        self.probe.expect_policy()
    }

    pub(crate) async fn assert(
        &self,
        expectation: &Expectation,
        policy: &WaitPolicy,
    ) -> ProbeResult<WaitOutcome> {
        assert_labeled(
            self.probe.page(),
            &self.selector,
            &self.label,
            expectation,
            policy,
        )
        .await
    }
}
