//! Sonda: resolve, wait, act and assert against live web pages
//!
//! Sonda (Spanish: "probe") drives quirky, asynchronous UI widgets through a
//! page handle it does not own: dynamic ids, delayed loads, AJAX content,
//! hidden and overlapped elements, shadow DOM and clipboard round-trips.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SONDA Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │───►│ Locator    │───►│ Executor   │            │
//! │   │ Driver     │    │ Resolver   │    │ (actions)  │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │                           ▼                 ▼                   │
//! │                     ┌────────────┐    ┌────────────┐            │
//! │                     │ Condition  │◄───│ Assertion  │            │
//! │                     │ Poller     │    │ Evaluator  │            │
//! │                     └─────┬──────┘    └────────────┘            │
//! │                           ▼                                     │
//! │              PageContext (Chromium / MockPage)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sonda::prelude::*;
//!
//! let probe = Probe::new(page, ProbeConfig::new().with_base_url("http://uitestingplayground.com"));
//! probe.navigate("/clientdelay").await?;
//! probe.locate("#ajaxButton")?.click().await?;
//! probe
//!     .locate(".bg-success")?
//!     .expect()
//!     .with_timeout(Duration::from_secs(20))
//!     .to_be_visible()
//!     .await?;
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod action;
mod browser;
mod clipboard;
mod config;
mod driver;
mod expect;
mod keyboard;
mod locator;
/// In-memory page for deterministic tests and offline runs
pub mod mock;
mod probe;
mod result;
mod scenario;
mod selector;
mod text;
mod tracing_support;
mod wait;

pub use action::{Action, ActionIntent, Executor};
pub use browser::{launch_page_factory, BrowserConfig};
#[cfg(feature = "browser")]
pub use browser::{Browser, BrowserPageFactory, CdpPage};
pub use clipboard::{Clipboard, MemoryClipboard};
pub use config::{ProbeConfig, DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_SCENARIO_TIMEOUT_MS};
pub use driver::{
    BoundingBox, DomSnapshot, ElementHandle, InputEvent, Modifiers, MouseButton, NodeCommand,
    NodeId, NodeState, PageContext, PageFactory, Point, SnapshotNode,
};
pub use expect::{assert_that, Expect, Expectation, TextComparison};
pub use keyboard::{EditCommand, KeyChord, ModifierKey, Platform, ResolvedChord};
pub use locator::{ActOptions, Locator};
pub use mock::{MockPage, MockPageFactory};
pub use probe::{DocumentReady, Probe};
pub use result::{ProbeError, ProbeResult};
pub use scenario::{
    FailureMode, Outcome, Phase, Progress, RunMode, RunSummary, Scenario, ScenarioReport,
    ScenarioRunner, Step,
};
pub use selector::{resolve, AttrPredicate, Axis, PathStep, Selector};
pub use text::{is_collapsible_whitespace, normalize_whitespace, TextMode, TextPattern};
pub use tracing_support::{init_tracing, LogFormat, TracingConfig};
pub use wait::{
    settle, wait_until, Condition, ElementState, FnCondition, Observation, SelectorState,
    WaitOutcome, WaitPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS, MIN_POLL_INTERVAL,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        ActOptions, ActionIntent, ElementState, Expectation, Locator, MockPage, PageContext,
        PageFactory, Platform, Probe, ProbeConfig, ProbeError, ProbeResult, Scenario,
        ScenarioRunner, Selector, WaitPolicy,
    };
    pub use std::time::Duration;
}
