//! Condition Poller
//!
//! Every blocking wait in Sonda goes through [`wait_until`]: evaluate, and if
//! the condition does not hold yet, sleep one poll interval and evaluate
//! again, until success, the deadline, or cancellation.
//!
//! ## Rules
//!
//! - **Immediate success**: a condition that already holds returns without sleeping
//! - **Bounded**: failure is reported no later than `timeout + poll_interval`
//! - **Cooperative**: sleeps are tokio timers raced against the cancellation token
//! - **Fresh state**: conditions re-resolve their selectors on every evaluation

use crate::driver::PageContext;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{resolve, Selector};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Smallest sleep between evaluations
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Timeout, poll interval and cancellation signal for one wait
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    /// Total budget, measured from the first evaluation
    pub timeout: Duration,
    /// Sleep between evaluations
    pub poll_interval: Duration,
    /// Cancels the wait when fired
    pub cancel: CancellationToken,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            cancel: CancellationToken::new(),
        }
    }
}

impl WaitPolicy {
    /// Create a policy with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout in milliseconds
    #[must_use]
    pub fn with_timeout_ms(self, timeout_ms: u64) -> Self {
        self.with_timeout(Duration::from_millis(timeout_ms))
    }

    /// Set the poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Use an existing cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Same timing, with a child token: cancelling `self` cancels the child
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            cancel: self.cancel.child_token(),
        }
    }
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// One evaluation of a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Whether the condition holds
    pub satisfied: bool,
    /// What was observed, for diagnostics
    pub observed: String,
}

impl Observation {
    /// Satisfied observation
    #[must_use]
    pub fn satisfied(observed: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            observed: observed.into(),
        }
    }

    /// Unsatisfied observation
    #[must_use]
    pub fn unsatisfied(observed: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            observed: observed.into(),
        }
    }

    /// Observation with a computed verdict
    #[must_use]
    pub fn new(satisfied: bool, observed: impl Into<String>) -> Self {
        Self {
            satisfied,
            observed: observed.into(),
        }
    }
}

/// A side-effect-free predicate over the current page state
#[async_trait]
pub trait Condition: Send + Sync {
    /// Evaluate against the live page
    async fn evaluate(&self, page: &dyn PageContext) -> ProbeResult<Observation>;

    /// Description for logs and error messages
    fn describe(&self) -> String;
}

/// A function-based condition
pub struct FnCondition<F: Fn() -> bool + Send + Sync> {
    func: F,
    description: String,
}

impl<F: Fn() -> bool + Send + Sync> fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F: Fn() -> bool + Send + Sync> FnCondition<F> {
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
        }
    }
}

#[async_trait]
impl<F: Fn() -> bool + Send + Sync> Condition for FnCondition<F> {
    async fn evaluate(&self, _page: &dyn PageContext) -> ProbeResult<Observation> {
        let value = (self.func)();
        Ok(Observation::new(value, value.to_string()))
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Element states for [`SelectorState`] (Playwright `wait_for` parity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementState {
    /// At least one element matches
    Attached,
    /// Nothing matches
    Detached,
    /// The first match is visible
    #[default]
    Visible,
    /// Nothing matches, or the first match is not visible
    Hidden,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Attached => "attached",
            Self::Detached => "detached",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        };
        write!(f, "{name}")
    }
}

/// Condition: the first match of a selector is in an [`ElementState`]
#[derive(Debug, Clone)]
pub struct SelectorState {
    selector: Selector,
    state: ElementState,
    label: Option<String>,
}

impl SelectorState {
    /// Create a new selector-state condition
    #[must_use]
    pub const fn new(selector: Selector, state: ElementState) -> Self {
        Self {
            selector,
            state,
            label: None,
        }
    }

    /// Describe the selector as `label` (usually its source text)
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl Condition for SelectorState {
    async fn evaluate(&self, page: &dyn PageContext) -> ProbeResult<Observation> {
        let Some(first) = resolve(page, &self.selector, None).await?.into_iter().next() else {
            let satisfied = matches!(self.state, ElementState::Detached | ElementState::Hidden);
            return Ok(Observation::new(satisfied, "no matching element"));
        };
        let state = page.node_state(first.node).await?;
        let satisfied = match self.state {
            ElementState::Attached => true,
            ElementState::Detached => false,
            ElementState::Visible => state.visible,
            ElementState::Hidden => !state.visible,
        };
        let shown = if state.visible { "visible" } else { "hidden" };
        Ok(Observation::new(
            satisfied,
            format!("{} ({shown})", state.describe()),
        ))
    }

    fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} to be {}", self.state),
            None => format!("{} to be {}", self.selector, self.state),
        }
    }
}

// =============================================================================
// POLLER
// =============================================================================

/// Successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Time from the first evaluation to success
    pub elapsed: Duration,
    /// Number of evaluations
    pub polls: u32,
    /// Observation that satisfied the condition
    pub observed: String,
}

/// Poll `condition` until it holds, the policy times out, or it is cancelled.
///
/// A stale handle raised while evaluating counts as an unsatisfied
/// observation: nodes are allowed to detach and reattach between polls.
pub async fn wait_until(
    page: &dyn PageContext,
    condition: &dyn Condition,
    policy: &WaitPolicy,
) -> ProbeResult<WaitOutcome> {
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let interval = policy.poll_interval.max(MIN_POLL_INTERVAL);
    let mut polls = 0u32;
    let mut last_observed = String::from("nothing (not evaluated)");

    loop {
        if policy.cancel.is_cancelled() {
            return Err(ProbeError::Cancelled {
                waited_for: condition.describe(),
                last_observed,
            });
        }

        polls += 1;
        let observation = match condition.evaluate(page).await {
            Ok(observation) => observation,
            Err(e) if e.is_stale() => Observation::unsatisfied("detached"),
            Err(e) => return Err(e),
        };
        last_observed = observation.observed;

        if observation.satisfied {
            let elapsed = start.elapsed();
            debug!(
                condition = %condition.describe(),
                polls,
                elapsed_ms = elapsed.as_millis() as u64,
                "condition satisfied"
            );
            return Ok(WaitOutcome {
                elapsed,
                polls,
                observed: last_observed,
            });
        }
        trace!(poll = polls, observed = %last_observed, "condition not yet satisfied");

        let now = Instant::now();
        if now >= deadline {
            return Err(ProbeError::Timeout {
                waited_for: condition.describe(),
                timeout: policy.timeout,
                last_observed,
            });
        }

        let nap = interval.min(deadline - now);
        tokio::select! {
            biased;
            () = policy.cancel.cancelled() => {
                return Err(ProbeError::Cancelled {
                    waited_for: condition.describe(),
                    last_observed,
                });
            }
            () = tokio::time::sleep(nap) => {}
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Only the scenario driver's reveal phase uses fixed delays.
pub async fn settle(duration: Duration, cancel: &CancellationToken) -> ProbeResult<()> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ProbeError::Cancelled {
            waited_for: format!("settle delay of {}ms", duration.as_millis()),
            last_observed: "cancelled during fixed delay".into(),
        }),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}
