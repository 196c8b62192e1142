//! Assertion Evaluator
//!
//! Playwright-style expectations that poll until they hold. A failure names
//! the selector, the expectation and the last observed value.
//!
//! Text equality is whitespace-normalized by default; `to_have_exact_text`
//! compares the raw text content and is expected to fail on content with
//! irregular spacing. Non-breaking spaces never match ordinary spaces.

use crate::driver::{NodeState, PageContext};
use crate::locator::Locator;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{resolve, Selector};
use crate::text::TextPattern;
use crate::wait::{wait_until, Condition, Observation, WaitOutcome, WaitPolicy};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// How text equality is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextComparison {
    /// Trim and collapse whitespace runs on both sides
    #[default]
    Normalized,
    /// Compare the raw text content
    Exact,
}

/// A named expectation about the first element a selector matches
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// Element is visible
    Visible,
    /// Nothing matches, or the element is not visible
    Hidden,
    /// Element has keyboard focus
    Focused,
    /// Element text equals the value
    Text {
        /// Expected text
        expected: String,
        /// Comparison mode
        comparison: TextComparison,
    },
    /// Element text contains the value (normalized)
    ContainsText(String),
    /// Attribute equals the value
    Attribute {
        /// Attribute name
        name: String,
        /// Expected value
        value: String,
    },
    /// Attribute parses as a number no smaller than `min`
    AttributeAtLeast {
        /// Attribute name
        name: String,
        /// Lower bound
        min: f64,
    },
    /// Class attribute contains the whole token
    ClassToken(String),
    /// Class attribute equals the value
    Class(String),
    /// Form control value equals the value
    Value(String),
    /// Number of matches
    Count(usize),
    /// Negation
    Not(Box<Expectation>),
}

impl Expectation {
    /// Negate this expectation
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Normalized text equality
    #[must_use]
    pub fn text(expected: impl Into<String>) -> Self {
        Self::Text {
            expected: expected.into(),
            comparison: TextComparison::Normalized,
        }
    }

    /// Raw text equality
    #[must_use]
    pub fn exact_text(expected: impl Into<String>) -> Self {
        Self::Text {
            expected: expected.into(),
            comparison: TextComparison::Exact,
        }
    }

    /// Attribute equality
    #[must_use]
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    fn needs_element(&self) -> bool {
        !matches!(self, Self::Hidden | Self::Count(_) | Self::Not(_))
    }

    fn judge(&self, state: &NodeState) -> Observation {
        match self {
            Self::Visible | Self::Hidden => {
                let shown = if state.visible { "visible" } else { "hidden" };
                let observed = format!("{} ({shown})", state.describe());
                Observation::new(matches!(self, Self::Visible) == state.visible, observed)
            }
            Self::Focused => {
                let observed = if state.focused { "focused" } else { "not focused" };
                Observation::new(state.focused, observed)
            }
            Self::Text {
                expected,
                comparison,
            } => {
                let satisfied = match comparison {
                    TextComparison::Normalized => TextPattern::exact(expected).matches(&state.text),
                    TextComparison::Exact => state.text == *expected,
                };
                Observation::new(satisfied, format!("{:?}", state.text))
            }
            Self::ContainsText(expected) => Observation::new(
                TextPattern::substring(expected).matches(&state.text),
                format!("{:?}", state.text),
            ),
            Self::Attribute { name, value } => {
                let actual = state.attribute(name);
                Observation::new(actual == Some(value.as_str()), describe_attr(name, actual))
            }
            Self::AttributeAtLeast { name, min } => {
                let actual = state.attribute(name);
                let satisfied = actual
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .is_some_and(|v| v >= *min);
                Observation::new(satisfied, describe_attr(name, actual))
            }
            Self::ClassToken(token) => {
                let satisfied = state.class_tokens().any(|t| t == token);
                Observation::new(satisfied, describe_attr("class", state.attribute("class")))
            }
            Self::Class(expected) => {
                let actual = state.attribute("class");
                Observation::new(actual == Some(expected.as_str()), describe_attr("class", actual))
            }
            Self::Value(expected) => {
                let observed = state
                    .value
                    .as_ref()
                    .map_or_else(|| "no value".to_string(), |v| format!("value {v:?}"));
                Observation::new(state.value.as_deref() == Some(expected.as_str()), observed)
            }
            Self::Count(_) | Self::Not(_) => Observation::unsatisfied("not an element expectation"),
        }
    }

    /// Evaluate once against the live page
    pub async fn evaluate(
        &self,
        page: &dyn PageContext,
        selector: &Selector,
    ) -> ProbeResult<Observation> {
        if let Self::Not(inner) = self {
            let inner = Box::pin(inner.evaluate(page, selector)).await?;
            return Ok(Observation::new(!inner.satisfied, inner.observed));
        }
        let matches = resolve(page, selector, None).await?;
        if let Self::Count(expected) = self {
            return Ok(Observation::new(
                matches.len() == *expected,
                format!("{} matching elements", matches.len()),
            ));
        }
        let Some(first) = matches.first() else {
            return Ok(Observation::new(!self.needs_element(), "no matching element"));
        };
        let state = page.node_state(first.node).await?;
        Ok(self.judge(&state))
    }
}

fn describe_attr(name: &str, actual: Option<&str>) -> String {
    actual.map_or_else(
        || format!("no {name} attribute"),
        |v| format!("{name}={v:?}"),
    )
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible => write!(f, "to be visible"),
            Self::Hidden => write!(f, "to be hidden"),
            Self::Focused => write!(f, "to be focused"),
            Self::Text {
                expected,
                comparison: TextComparison::Normalized,
            } => write!(f, "to have text {expected:?}"),
            Self::Text {
                expected,
                comparison: TextComparison::Exact,
            } => write!(f, "to have exact text {expected:?}"),
            Self::ContainsText(t) => write!(f, "to contain text {t:?}"),
            Self::Attribute { name, value } => write!(f, "to have attribute {name}={value:?}"),
            Self::AttributeAtLeast { name, min } => write!(f, "to have attribute {name} >= {min}"),
            Self::ClassToken(t) => write!(f, "to have class token {t:?}"),
            Self::Class(c) => write!(f, "to have class {c:?}"),
            Self::Value(v) => write!(f, "to have value {v:?}"),
            Self::Count(n) => write!(f, "to have count {n}"),
            Self::Not(inner) => write!(f, "not {inner}"),
        }
    }
}

struct ExpectationCondition<'a> {
    selector: &'a Selector,
    label: &'a str,
    expectation: &'a Expectation,
}

#[async_trait]
impl Condition for ExpectationCondition<'_> {
    async fn evaluate(&self, page: &dyn PageContext) -> ProbeResult<Observation> {
        self.expectation.evaluate(page, self.selector).await
    }

    fn describe(&self) -> String {
        format!("{} {}", self.label, self.expectation)
    }
}

/// Poll until `expectation` holds for `selector`.
///
/// A timeout becomes [`ProbeError::Assertion`] carrying the last observation.
pub async fn assert_that(
    page: &dyn PageContext,
    selector: &Selector,
    expectation: &Expectation,
    policy: &WaitPolicy,
) -> ProbeResult<WaitOutcome> {
    assert_labeled(page, selector, &selector.to_string(), expectation, policy).await
}

pub(crate) async fn assert_labeled(
    page: &dyn PageContext,
    selector: &Selector,
    label: &str,
    expectation: &Expectation,
    policy: &WaitPolicy,
) -> ProbeResult<WaitOutcome> {
    let condition = ExpectationCondition {
        selector,
        label,
        expectation,
    };
    match wait_until(page, &condition, policy).await {
        Ok(outcome) => {
            debug!(selector = %label, expectation = %expectation, "assertion passed");
            Ok(outcome)
        }
        Err(ProbeError::Timeout {
            timeout,
            last_observed,
            ..
        }) => Err(ProbeError::Assertion {
            selector: label.to_string(),
            expectation: expectation.to_string(),
            actual: last_observed,
            timeout,
        }),
        Err(e) => Err(e),
    }
}

// =============================================================================
// FLUENT API
// =============================================================================

/// Fluent assertions for a [`Locator`]
#[derive(Debug, Clone)]
pub struct Expect {
    locator: Locator,
    negate: bool,
    timeout: Option<Duration>,
}

impl Expect {
    /// Create a new expectation for a locator
    #[must_use]
    pub const fn new(locator: Locator) -> Self {
        Self {
            locator,
            negate: false,
            timeout: None,
        }
    }

    /// Negate the next assertion
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub const fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Override the assertion timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Evaluate an arbitrary expectation
    pub async fn to_satisfy(&self, expectation: Expectation) -> ProbeResult<()> {
        let expectation = if self.negate {
            expectation.negate()
        } else {
            expectation
        };
        let mut policy = self.locator.expect_policy();
        if let Some(timeout) = self.timeout {
            policy.timeout = timeout;
        }
        self.locator.assert(&expectation, &policy).await.map(|_| ())
    }

    /// Assert the element is visible
    pub async fn to_be_visible(&self) -> ProbeResult<()> {
        self.to_satisfy(Expectation::Visible).await
    }

    /// Assert the element is hidden (or absent)
    pub async fn to_be_hidden(&self) -> ProbeResult<()> {
        self.to_satisfy(Expectation::Hidden).await
    }

    /// Assert the element has keyboard focus
    pub async fn to_be_focused(&self) -> ProbeResult<()> {
        self.to_satisfy(Expectation::Focused).await
    }

    /// Assert whitespace-normalized text equality
    pub async fn to_have_text(&self, expected: impl Into<String>) -> ProbeResult<()> {
        self.to_satisfy(Expectation::text(expected)).await
    }

    /// Assert raw text equality, without normalization
    pub async fn to_have_exact_text(&self, expected: impl Into<String>) -> ProbeResult<()> {
        self.to_satisfy(Expectation::exact_text(expected)).await
    }

    /// Assert the text contains a substring
    pub async fn to_contain_text(&self, expected: impl Into<String>) -> ProbeResult<()> {
        self.to_satisfy(Expectation::ContainsText(expected.into())).await
    }

    /// Assert an attribute value
    pub async fn to_have_attribute(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> ProbeResult<()> {
        self.to_satisfy(Expectation::Attribute {
            name: name.into(),
            value: value.into(),
        })
        .await
    }

    /// Assert the class attribute contains a whole token
    pub async fn to_have_class_token(&self, token: impl Into<String>) -> ProbeResult<()> {
        self.to_satisfy(Expectation::ClassToken(token.into())).await
    }

    /// Assert the whole class attribute
    pub async fn to_have_class(&self, class: impl Into<String>) -> ProbeResult<()> {
        self.to_satisfy(Expectation::Class(class.into())).await
    }

    /// Assert a form control value
    pub async fn to_have_value(&self, value: impl Into<String>) -> ProbeResult<()> {
        self.to_satisfy(Expectation::Value(value.into())).await
    }

    /// Assert the number of matches
    pub async fn to_have_count(&self, count: usize) -> ProbeResult<()> {
        self.to_satisfy(Expectation::Count(count)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    fn site() -> MockPage {
        MockPage::with_site(|dom| {
            dom.route("/", |d| {
                let body = d.body();
                d.element(body, "span", &[("id", "welcome")], "\n  Welcome  UserName!\n");
                d.element(body, "button", &[("id", "nbsp")], "My\u{a0}Button");
                d.element(
                    body,
                    "div",
                    &[("id", "bar"), ("aria-valuenow", "75"), ("class", "progress-bar bg-info")],
                    "75%",
                );
                d.element(body, "input", &[("id", "field"), ("value", "abc")], "");
            });
        })
    }

    async fn ready() -> MockPage {
        let page = site();
        page.navigate("/").await.unwrap();
        page
    }

    fn quick() -> WaitPolicy {
        WaitPolicy::new().with_timeout_ms(200)
    }

    mod text_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_normalized_text_ignores_whitespace_runs() {
            let page = ready().await;
            let text = Expectation::Text {
                expected: "Welcome UserName!".into(),
                comparison: TextComparison::Normalized,
            };
            assert_that(&page, &Selector::id("welcome"), &text, &quick())
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_exact_text_reports_raw_actual() {
            let page = ready().await;
            let text = Expectation::Text {
                expected: "Welcome UserName!".into(),
                comparison: TextComparison::Exact,
            };
            let err = assert_that(&page, &Selector::id("welcome"), &text, &quick())
                .await
                .unwrap_err();
            match err {
                ProbeError::Assertion {
                    selector,
                    expectation,
                    actual,
                    timeout,
                } => {
                    assert_eq!(selector, "#welcome");
                    assert!(expectation.contains("exact text"));
                    assert!(actual.contains("Welcome  UserName!"));
                    assert_eq!(timeout, Duration::from_millis(200));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_nbsp_never_equals_space() {
            let page = ready().await;
            let text = Expectation::Text {
                expected: "My Button".into(),
                comparison: TextComparison::Normalized,
            };
            let err = assert_that(&page, &Selector::id("nbsp"), &text, &quick())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "assertion");
        }
    }

    mod attribute_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_attribute_forms() {
            let page = ready().await;
            let bar = Selector::id("bar");
            for expectation in [
                Expectation::Attribute {
                    name: "aria-valuenow".into(),
                    value: "75".into(),
                },
                Expectation::AttributeAtLeast {
                    name: "aria-valuenow".into(),
                    min: 75.0,
                },
                Expectation::ClassToken("bg-info".into()),
                Expectation::Class("progress-bar bg-info".into()),
                Expectation::ClassToken("bg".into()).negate(),
            ] {
                assert_that(&page, &bar, &expectation, &quick())
                    .await
                    .unwrap_or_else(|e| panic!("{expectation}: {e}"));
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_value_count_and_absence() {
            let page = ready().await;
            assert_that(&page, &Selector::id("field"), &Expectation::Value("abc".into()), &quick())
                .await
                .unwrap();
            assert_that(&page, &Selector::tag("button"), &Expectation::Count(1), &quick())
                .await
                .unwrap();
            assert_that(&page, &Selector::id("missing"), &Expectation::Hidden, &quick())
                .await
                .unwrap();
            assert_that(
                &page,
                &Selector::id("missing"),
                &Expectation::Visible.negate(),
                &quick(),
            )
            .await
            .unwrap();
            let err = assert_that(&page, &Selector::id("missing"), &Expectation::Focused, &quick())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("no matching element"));
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_descriptions() {
            assert_eq!(Expectation::Visible.negate().to_string(), "not to be visible");
            assert_eq!(Expectation::Visible.negate().negate(), Expectation::Visible);
            assert_eq!(
                Expectation::Value("x".into()).to_string(),
                "to have value \"x\""
            );
        }
    }
}
