//! Scenario Driver
//!
//! A scenario is a per-widget script with three phases:
//!
//! ```text
//! Navigate ──► Reveal ──► ExerciseAndVerify
//!   (page ready)  (widget ready)  (act, then assert)
//! ```
//!
//! Each phase ends on a polled condition. The only fixed delay is
//! [`Scenario::settle`], which is accepted in the Reveal phase for pages that
//! expose no readiness signal. Steps run strictly in order and the first
//! failure ends the scenario.
//!
//! [`ScenarioRunner`] gives every scenario its own page, clipboard and
//! cancellation token, and a watchdog that cancels the token when the
//! scenario budget runs out.

use crate::action::ActionIntent;
use crate::clipboard::MemoryClipboard;
use crate::config::ProbeConfig;
use crate::driver::PageFactory;
use crate::expect::Expectation;
use crate::locator::{ActOptions, Locator};
use crate::probe::Probe;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;
use crate::wait::{settle, ElementState};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

// =============================================================================
// PHASES AND STEPS
// =============================================================================

/// Scenario phase, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Go to a known page
    Navigate,
    /// Open or select the target widget
    Reveal,
    /// Interactions and assertions
    ExerciseAndVerify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigate => "navigate",
            Self::Reveal => "reveal",
            Self::ExerciseAndVerify => "exercise_and_verify",
        };
        write!(f, "{name}")
    }
}

/// One scripted step
#[derive(Debug, Clone)]
pub enum Step {
    /// Navigate and wait for the document to load
    Navigate(String),
    /// Click, then wait for the resulting document to load
    RevealByClick(String),
    /// Wait until an element is visible
    RevealUntilVisible(String),
    /// Bounded fixed delay
    Settle(Duration),
    /// Interaction through a locator
    Act {
        /// Selector source
        selector: String,
        /// What to do
        intent: ActionIntent,
        /// Force and timeout
        options: ActOptions,
    },
    /// Key chord on whatever has focus
    Press(String),
    /// Mouse wheel over the viewport
    Wheel {
        /// Horizontal delta
        delta_x: f64,
        /// Vertical delta
        delta_y: f64,
    },
    /// Wait for an element state
    WaitFor {
        /// Selector source
        selector: String,
        /// Target state
        state: ElementState,
        /// Override of the action timeout
        timeout: Option<Duration>,
    },
    /// Assertion
    Expect {
        /// Selector source
        selector: String,
        /// What must hold
        expectation: Expectation,
        /// Override of the expectation timeout
        timeout: Option<Duration>,
    },
    /// Assert a control's value equals the clipboard value
    ExpectValueMatchesClipboard(String),
}

impl Step {
    /// Phase this step belongs to
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Navigate(_) => Phase::Navigate,
            Self::RevealByClick(_) | Self::RevealUntilVisible(_) | Self::Settle(_) => Phase::Reveal,
            Self::Act { .. }
            | Self::Press(_)
            | Self::Wheel { .. }
            | Self::WaitFor { .. }
            | Self::Expect { .. }
            | Self::ExpectValueMatchesClipboard(_) => Phase::ExerciseAndVerify,
        }
    }

    fn selector(&self) -> Option<&str> {
        match self {
            Self::RevealByClick(s)
            | Self::RevealUntilVisible(s)
            | Self::ExpectValueMatchesClipboard(s)
            | Self::Act { selector: s, .. }
            | Self::WaitFor { selector: s, .. }
            | Self::Expect { selector: s, .. } => Some(s),
            Self::Navigate(_) | Self::Settle(_) | Self::Press(_) | Self::Wheel { .. } => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(target) => write!(f, "navigate to {target}"),
            Self::RevealByClick(s) => write!(f, "reveal by clicking {s}"),
            Self::RevealUntilVisible(s) => write!(f, "reveal until {s} is visible"),
            Self::Settle(d) => write!(f, "settle for {}ms", d.as_millis()),
            Self::Act {
                selector,
                intent,
                options,
            } => {
                let forced = if options.force { " (forced)" } else { "" };
                write!(f, "{intent} {selector}{forced}")
            }
            Self::Press(chord) => write!(f, "press {chord}"),
            Self::Wheel { delta_x, delta_y } => write!(f, "wheel by ({delta_x}, {delta_y})"),
            Self::WaitFor {
                selector, state, ..
            } => write!(f, "wait for {selector} to be {state}"),
            Self::Expect {
                selector,
                expectation,
                ..
            } => write!(f, "expect {selector} {expectation}"),
            Self::ExpectValueMatchesClipboard(s) => {
                write!(f, "expect {s} to have the clipboard value")
            }
        }
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

/// A named, phase-ordered script
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    description: String,
    steps: Vec<Step>,
    expected_failure: Option<String>,
}

impl Scenario {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            expected_failure: None,
        }
    }

    /// Set a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the scenario as failing by design; a pass is then unexpected
    #[must_use]
    pub fn expecting_failure(mut self, reason: impl Into<String>) -> Self {
        self.expected_failure = Some(reason.into());
        self
    }

    /// Name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Steps in order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Why the scenario is expected to fail, if it is
    #[must_use]
    pub fn expected_failure(&self) -> Option<&str> {
        self.expected_failure.as_deref()
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Navigate to `target` (relative targets join the base URL)
    #[must_use]
    pub fn navigate(self, target: impl Into<String>) -> Self {
        self.step(Step::Navigate(target.into()))
    }

    /// Click `selector` and wait for the next document to load
    #[must_use]
    pub fn reveal_by_click(self, selector: impl Into<String>) -> Self {
        self.step(Step::RevealByClick(selector.into()))
    }

    /// Wait until `selector` is visible
    #[must_use]
    pub fn reveal_until_visible(self, selector: impl Into<String>) -> Self {
        self.step(Step::RevealUntilVisible(selector.into()))
    }

    /// Fixed delay, for pages with no observable readiness signal
    #[must_use]
    pub fn settle(self, duration: Duration) -> Self {
        self.step(Step::Settle(duration))
    }

    /// Perform `intent` on `selector`
    #[must_use]
    pub fn act(self, selector: impl Into<String>, intent: ActionIntent) -> Self {
        self.step(Step::Act {
            selector: selector.into(),
            intent,
            options: ActOptions::new(),
        })
    }

    /// Perform `intent` on `selector`, bypassing actionability checks
    #[must_use]
    pub fn act_forced(self, selector: impl Into<String>, intent: ActionIntent) -> Self {
        self.step(Step::Act {
            selector: selector.into(),
            intent,
            options: ActOptions::forced(),
        })
    }

    /// Click `selector`
    #[must_use]
    pub fn click(self, selector: impl Into<String>) -> Self {
        self.act(selector, ActionIntent::Click)
    }

    /// Fill `selector` with `text`
    #[must_use]
    pub fn fill(self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.act(selector, ActionIntent::Fill(text.into()))
    }

    /// Press a chord on whatever has focus
    #[must_use]
    pub fn press(self, chord: impl Into<String>) -> Self {
        self.step(Step::Press(chord.into()))
    }

    /// Mouse wheel over the viewport
    #[must_use]
    pub fn wheel(self, delta_x: f64, delta_y: f64) -> Self {
        self.step(Step::Wheel { delta_x, delta_y })
    }

    /// Wait for `selector` to reach `state`
    #[must_use]
    pub fn wait_for(self, selector: impl Into<String>, state: ElementState) -> Self {
        self.step(Step::WaitFor {
            selector: selector.into(),
            state,
            timeout: None,
        })
    }

    /// Wait for `selector` to reach `state` within `timeout`
    #[must_use]
    pub fn wait_for_within(
        self,
        selector: impl Into<String>,
        state: ElementState,
        timeout: Duration,
    ) -> Self {
        self.step(Step::WaitFor {
            selector: selector.into(),
            state,
            timeout: Some(timeout),
        })
    }

    /// Assert `expectation` for `selector`
    #[must_use]
    pub fn expect(self, selector: impl Into<String>, expectation: Expectation) -> Self {
        self.step(Step::Expect {
            selector: selector.into(),
            expectation,
            timeout: None,
        })
    }

    /// Assert `expectation` for `selector` within `timeout`
    #[must_use]
    pub fn expect_within(
        self,
        selector: impl Into<String>,
        expectation: Expectation,
        timeout: Duration,
    ) -> Self {
        self.step(Step::Expect {
            selector: selector.into(),
            expectation,
            timeout: Some(timeout),
        })
    }

    /// Assert the value of `selector` equals the clipboard value
    #[must_use]
    pub fn expect_value_matches_clipboard(self, selector: impl Into<String>) -> Self {
        self.step(Step::ExpectValueMatchesClipboard(selector.into()))
    }

    /// Check phase ordering and selector syntax without touching a page.
    ///
    /// The first step must navigate, phases never go backwards, and every
    /// selector must parse.
    pub fn validate(&self) -> ProbeResult<()> {
        let invalid = |message: String| {
            ProbeError::config(format!("scenario '{}': {message}", self.name))
        };
        match self.steps.first() {
            Some(Step::Navigate(_)) => {}
            Some(other) => return Err(invalid(format!("must start by navigating, not '{other}'"))),
            None => return Err(invalid("has no steps".into())),
        }
        let mut phase = Phase::Navigate;
        for (index, step) in self.steps.iter().enumerate() {
            if step.phase() < phase {
                return Err(invalid(format!(
                    "step {} '{step}' belongs to {} but the scenario is already in {phase}",
                    index + 1,
                    step.phase()
                )));
            }
            phase = step.phase();
            if let Some(source) = step.selector() {
                Selector::parse(source)?;
            }
        }
        Ok(())
    }

    /// Run every step against `probe`, recording progress as it goes
    pub async fn execute(&self, probe: &Probe, progress: &mut Progress) -> ProbeResult<()> {
        for step in &self.steps {
            let phase = step.phase();
            if progress.phase != Some(phase) {
                info!(scenario = %self.name, %phase, "entering phase");
                progress.phase = Some(phase);
            }
            run_step(probe, step).await?;
            progress.steps_completed += 1;
        }
        Ok(())
    }
}

async fn run_step(probe: &Probe, step: &Step) -> ProbeResult<()> {
    match step {
        Step::Navigate(target) => probe.navigate(target).await.map(drop),
        Step::RevealByClick(selector) => {
            probe.locate(selector)?.click().await?;
            probe.wait_until_ready().await.map(drop)
        }
        Step::RevealUntilVisible(selector) => probe
            .locate(selector)?
            .wait_for(ElementState::Visible)
            .await
            .map(drop),
        Step::Settle(duration) => settle(*duration, probe.cancel_token()).await,
        Step::Act {
            selector,
            intent,
            options,
        } => probe.locate(selector)?.act(intent.clone(), *options).await,
        Step::Press(chord) => probe.press(chord).await,
        Step::Wheel { delta_x, delta_y } => probe.wheel(*delta_x, *delta_y).await,
        Step::WaitFor {
            selector,
            state,
            timeout,
        } => {
            let locator = probe.locate(selector)?;
            match timeout {
                Some(timeout) => locator.wait_for_within(*state, *timeout).await,
                None => locator.wait_for(*state).await,
            }
            .map(drop)
        }
        Step::Expect {
            selector,
            expectation,
            timeout,
        } => expect(&probe.locate(selector)?, expectation.clone(), *timeout).await,
        Step::ExpectValueMatchesClipboard(selector) => {
            let value = probe.clipboard_value()?;
            expect(&probe.locate(selector)?, Expectation::Value(value), None).await
        }
    }
}

async fn expect(
    locator: &Locator,
    expectation: Expectation,
    timeout: Option<Duration>,
) -> ProbeResult<()> {
    let expect = locator.expect();
    let expect = match timeout {
        Some(timeout) => expect.with_timeout(timeout),
        None => expect,
    };
    expect.to_satisfy(expectation).await
}

/// How far a scenario got
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Phase of the most recently started step
    pub phase: Option<Phase>,
    /// Steps that completed successfully
    pub steps_completed: usize,
}

// =============================================================================
// REPORTS
// =============================================================================

/// Scenario outcome, relative to what was expected of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Ran to completion as expected
    Passed,
    /// Failed unexpectedly
    Failed,
    /// Failed, and was expected to
    ExpectedFailure,
    /// Passed although it was expected to fail
    UnexpectedPass,
}

impl Outcome {
    /// Whether the outcome matches expectations
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Passed | Self::ExpectedFailure)
    }

    const fn classify(passed: bool, expected_to_fail: bool) -> Self {
        match (passed, expected_to_fail) {
            (true, false) => Self::Passed,
            (false, false) => Self::Failed,
            (false, true) => Self::ExpectedFailure,
            (true, true) => Self::UnexpectedPass,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Passed => "passed",
            Self::Failed => "FAILED",
            Self::ExpectedFailure => "failed as expected",
            Self::UnexpectedPass => "UNEXPECTEDLY PASSED",
        };
        write!(f, "{label}")
    }
}

/// Result of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Identifier of this run
    pub run_id: Uuid,
    /// Scenario name
    pub name: String,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Phase of the last step started
    pub phase_reached: Option<Phase>,
    /// Steps completed successfully
    pub steps_completed: usize,
    /// Steps in the scenario
    pub steps_total: usize,
    /// Elapsed time in milliseconds
    pub elapsed_ms: u64,
    /// Outcome
    pub outcome: Outcome,
    /// Failure message, if the scenario failed
    pub failure: Option<String>,
    /// Machine-readable failure kind
    pub failure_kind: Option<String>,
    /// Why the scenario was expected to fail
    pub expected_failure: Option<String>,
}

impl ScenarioReport {
    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {} ({}/{} steps, {}ms)",
            self.name, self.outcome, self.steps_completed, self.steps_total, self.elapsed_ms
        );
        if let Some(failure) = &self.failure {
            line.push_str(" - ");
            line.push_str(failure);
        }
        line
    }
}

/// Reports of one runner invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier of the invocation
    pub run_id: Uuid,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Per-scenario reports, in scenario order
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    /// Scenarios whose outcome matched expectations
    #[must_use]
    pub fn ok_count(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_ok()).count()
    }

    /// Scenarios that failed or passed unexpectedly
    #[must_use]
    pub fn not_ok_count(&self) -> usize {
        self.reports.len() - self.ok_count()
    }

    /// Whether every outcome matched expectations
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.not_ok_count() == 0
    }

    /// Reports that did not match expectations
    #[must_use]
    pub fn problems(&self) -> Vec<&ScenarioReport> {
        self.reports.iter().filter(|r| !r.outcome.is_ok()).collect()
    }

    /// Summary line
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}/{} scenarios as expected",
            self.ok_count(),
            self.reports.len()
        )
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Sequential or concurrent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One scenario at a time
    #[default]
    Sequential,
    /// All scenarios at once, each on its own page
    Concurrent,
}

/// What a sequential run does after an unexpected outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Stop at the first unexpected outcome
    AndonCord,
    /// Run everything
    #[default]
    CollectAll,
}

/// Runs scenarios, each on a fresh page
#[derive(Clone)]
pub struct ScenarioRunner {
    factory: Arc<dyn PageFactory>,
    config: ProbeConfig,
    mode: RunMode,
    failure_mode: FailureMode,
}

impl fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("failure_mode", &self.failure_mode)
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Create a runner
    #[must_use]
    pub fn new(factory: Arc<dyn PageFactory>, config: ProbeConfig) -> Self {
        Self {
            factory,
            config,
            mode: RunMode::default(),
            failure_mode: FailureMode::default(),
        }
    }

    /// Set the run mode
    #[must_use]
    pub const fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the failure mode (sequential runs only)
    #[must_use]
    pub const fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run `scenarios` and collect their reports
    pub async fn run_all(&self, scenarios: &[Scenario]) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, count = scenarios.len(), mode = ?self.mode, "starting run");

        let reports = match self.mode {
            RunMode::Concurrent => join_all(scenarios.iter().map(|s| self.run(s))).await,
            RunMode::Sequential => {
                let mut reports = Vec::with_capacity(scenarios.len());
                for scenario in scenarios {
                    let report = self.run(scenario).await;
                    let stop = !report.outcome.is_ok() && self.failure_mode == FailureMode::AndonCord;
                    reports.push(report);
                    if stop {
                        warn!(scenario = %scenario.name, "stopping run after unexpected outcome");
                        break;
                    }
                }
                reports
            }
        };

        RunSummary {
            run_id,
            started_at,
            reports,
        }
    }

    /// Run one scenario on a fresh page under the scenario watchdog
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut progress = Progress::default();

        let result = self.run_guarded(scenario, &mut progress).await;
        let outcome = Outcome::classify(result.is_ok(), scenario.expected_failure.is_some());
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match (&result, outcome) {
            (Err(e), Outcome::Failed) => {
                warn!(scenario = %scenario.name, phase = ?progress.phase, error = %e, "scenario failed");
            }
            (_, Outcome::UnexpectedPass) => {
                warn!(scenario = %scenario.name, "scenario passed but was expected to fail");
            }
            _ => info!(scenario = %scenario.name, %outcome, elapsed_ms, "scenario finished"),
        }

        let (failure, failure_kind) = match &result {
            Err(e) => (Some(e.to_string()), Some(e.kind().to_string())),
            Ok(()) => (None, None),
        };
        ScenarioReport {
            run_id,
            name: scenario.name.clone(),
            started_at,
            phase_reached: progress.phase,
            steps_completed: progress.steps_completed,
            steps_total: scenario.steps.len(),
            elapsed_ms,
            outcome,
            failure,
            failure_kind,
            expected_failure: scenario.expected_failure.clone(),
        }
    }

    async fn run_guarded(&self, scenario: &Scenario, progress: &mut Progress) -> ProbeResult<()> {
        scenario.validate()?;
        let page = self.factory.new_page().await?;
        let cancel = CancellationToken::new();
        let probe = Probe::new(page, self.config.clone())
            .with_clipboard(Arc::new(MemoryClipboard::new()))
            .with_cancel(cancel.clone());

        let budget = self.config.scenario_timeout();
        let finished = CancellationToken::new();
        let body = async {
            let result = scenario.execute(&probe, progress).await;
            finished.cancel();
            result
        };
        let watchdog = async {
            tokio::select! {
                () = finished.cancelled() => false,
                () = tokio::time::sleep(budget) => {
                    warn!(scenario = %scenario.name, budget_ms = budget.as_millis() as u64, "scenario budget exhausted; cancelling");
                    cancel.cancel();
                    true
                }
            }
        };
        let (result, expired) = tokio::join!(body, watchdog);

        match result {
            Err(ProbeError::Cancelled {
                waited_for,
                last_observed,
            }) if expired => Err(ProbeError::Timeout {
                waited_for: format!("scenario '{}' while waiting for {waited_for}", scenario.name),
                timeout: budget,
                last_observed,
            }),
            other => other,
        }
    }
}
