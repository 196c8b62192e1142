//! End-to-end properties of the probe engine against the in-memory page.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use proptest::prelude::*;
use sonda::mock::{MockDom, MockEvent};
use sonda::prelude::*;
use sonda::{
    assert_that, wait_until, ElementHandle, FnCondition, ProbeError, TextComparison,
};
use std::sync::Arc;
use tokio::time::Instant;

fn playground(dom: &mut MockDom) {
    dom.route("/clientdelay", |d| {
        let body = d.body();
        let button = d.element(body, "button", &[("id", "ajaxButton")], "Trigger");
        d.on(button, MockEvent::Click, |d, _| {
            d.after(Duration::from_secs(15), |d| {
                let body = d.body();
                d.element(body, "p", &[("class", "bg-success")], "Data calculated on the client side.");
            });
        });
    });
    dom.route("/textinput", |d| {
        let body = d.body();
        d.element(body, "input", &[("id", "newButtonName")], "");
        let button = d.element(body, "button", &[("id", "updatingButton")], "Button That Should Change it's Name Based on Input Value");
        d.on(button, MockEvent::Click, |d, target| {
            let name = d
                .by_id("newButtonName")
                .and_then(|input| d.value(input).map(str::to_string))
                .unwrap_or_default();
            d.set_text(target, &name);
        });
    });
    dom.route("/mouseover", |d| {
        let body = d.body();
        let link = d.element(body, "a", &[("title", "Click me")], "Click me");
        d.on(link, MockEvent::Click, |d, _| {
            let count = d.by_id("clickCount").unwrap();
            let n: u32 = d.text_content(count).parse().unwrap_or(0);
            d.set_text(count, &(n + 1).to_string());
        });
        d.element(body, "span", &[("id", "clickCount")], "0");
    });
    dom.route("/overlapped", |d| {
        let body = d.body();
        let name = d.element(body, "input", &[("id", "name")], "");
        let rect = d.rect(name).unwrap();
        let cover = d.element(body, "div", &[("id", "subject"), ("style", "z-index: 2")], "");
        d.set_rect(cover, rect);
    });
    dom.route("/verifytext", |d| {
        let body = d.body();
        let panel = d.element(body, "div", &[("class", "bg-primary")], "");
        d.element(panel, "span", &[("class", "badge-secondary")], "\n  Welcome  UserName!\n  ");
        d.element(body, "button", &[("class", "btn-primary")], "My\u{a0}Button");
    });
}

async fn probe_at(path: &str) -> Probe {
    let probe = Probe::new(Arc::new(MockPage::with_site(playground)), ProbeConfig::new());
    probe.navigate(path).await.unwrap();
    probe
}

// =============================================================================
// POLLER
// =============================================================================

#[tokio::test(start_paused = true)]
async fn condition_already_true_returns_without_sleeping() {
    let page = MockPage::new();
    let start = Instant::now();
    let outcome = wait_until(&page, &FnCondition::new(|| true, "always"), &WaitPolicy::new())
        .await
        .unwrap();
    assert_eq!(outcome.polls, 1);
    assert_eq!(outcome.elapsed, Duration::ZERO);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn never_true_times_out_within_one_interval(timeout_ms in 1u64..5_000, poll_ms in 1u64..500) {
        let runtime = paused_runtime();
        let (err, elapsed) = runtime.block_on(async {
            let page = MockPage::new();
            let policy = WaitPolicy::new()
                .with_timeout_ms(timeout_ms)
                .with_poll_interval(Duration::from_millis(poll_ms));
            let start = Instant::now();
            let err = wait_until(&page, &FnCondition::new(|| false, "never"), &policy)
                .await
                .unwrap_err();
            (err, start.elapsed())
        });
        prop_assert!(
            matches!(err, ProbeError::Timeout { .. }),
            "expected a timeout, got {:?}",
            err
        );
        prop_assert!(elapsed >= Duration::from_millis(timeout_ms));
        prop_assert!(elapsed <= Duration::from_millis(timeout_ms + poll_ms));
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

#[tokio::test]
async fn detached_scope_is_stale_never_empty() {
    let probe = probe_at("/verifytext").await;
    let panel: ElementHandle = probe.locate(".bg-primary").unwrap().resolve().await.unwrap().remove(0);
    let span = probe.locate("span").unwrap();
    assert_eq!(span.resolve_in(&panel).await.unwrap().len(), 1);

    probe.navigate("/verifytext").await.unwrap();
    let err = span.resolve_in(&panel).await.unwrap_err();
    assert!(matches!(err, ProbeError::StaleElement { .. }), "{err}");
}

// =============================================================================
// EXECUTOR
// =============================================================================

#[tokio::test]
async fn obscured_target_needs_force() {
    let probe = probe_at("/overlapped").await;
    let name = probe.locate("#name").unwrap();

    let err = name.fill("Sonda").await.unwrap_err();
    match err {
        ProbeError::Obscured { obscured_by, .. } => assert_eq!(obscured_by, "div#subject"),
        other => panic!("expected obscured, got {other}"),
    }
    name.expect().to_have_value("").await.unwrap();

    name.act(ActionIntent::Fill("Sonda".into()), ActOptions::forced())
        .await
        .unwrap();
    name.expect().to_have_value("Sonda").await.unwrap();
}

#[tokio::test]
async fn double_click_counts_two_per_double_click() {
    let probe = probe_at("/mouseover").await;
    let link = probe.locate("[title=\"Click me\"]").unwrap();
    let count = probe.locate("#clickCount").unwrap();

    link.dblclick().await.unwrap();
    count.expect().to_have_text("2").await.unwrap();
    link.dblclick().await.unwrap();
    count.expect().to_have_text("4").await.unwrap();
}

#[tokio::test]
async fn fill_then_click_renames_button() {
    let probe = probe_at("/textinput").await;
    probe.locate("#newButtonName").unwrap().fill("Sonda Button").await.unwrap();
    let button = probe.locate("#updatingButton").unwrap();
    button.click().await.unwrap();
    button.expect().to_have_text("Sonda Button").await.unwrap();
}

// =============================================================================
// ASSERTIONS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn fifteen_second_widget_needs_twenty_second_budget() {
    let probe = probe_at("/clientdelay").await;
    probe.locate("#ajaxButton").unwrap().click().await.unwrap();
    let result = probe.locate(".bg-success").unwrap();

    let err = result
        .wait_for_within(ElementState::Visible, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Timeout { .. }), "{err}");

    let err = result
        .expect()
        .with_timeout(Duration::from_secs(5))
        .to_be_visible()
        .await
        .unwrap_err();
    match err {
        ProbeError::Assertion {
            selector,
            expectation,
            actual,
            timeout,
        } => {
            assert_eq!(selector, ".bg-success");
            assert_eq!(expectation, "to be visible");
            assert_eq!(actual, "no matching element");
            assert_eq!(timeout, Duration::from_secs(5));
        }
        other => panic!("expected assertion failure, got {other}"),
    }

    // 10s have elapsed; the paragraph appears 5s into this budget
    result
        .expect()
        .with_timeout(Duration::from_secs(20))
        .to_be_visible()
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn fresh_fifteen_second_widget_passes_with_twenty() {
    let probe = probe_at("/clientdelay").await;
    probe.locate("#ajaxButton").unwrap().click().await.unwrap();
    let start = Instant::now();
    assert_that(
        probe.page(),
        &Selector::class_token("bg-success"),
        &Expectation::Visible,
        &WaitPolicy::new().with_timeout(Duration::from_secs(20)),
    )
    .await
    .unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn whitespace_normalization_is_opt_out() {
    let probe = probe_at("/verifytext").await;
    let span = probe.locate(".badge-secondary").unwrap();
    let quick = |e: Expectation| {
        let span = span.clone();
        async move {
            span.expect()
                .with_timeout(Duration::from_millis(200))
                .to_satisfy(e)
                .await
        }
    };

    quick(Expectation::text("Welcome UserName!")).await.unwrap();
    quick(Expectation::text("Welcome  UserName!")).await.unwrap();
    let err = quick(Expectation::Text {
        expected: "Welcome UserName!".into(),
        comparison: TextComparison::Exact,
    })
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Welcome  UserName!"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn non_breaking_space_never_equals_space() {
    let probe = probe_at("/verifytext").await;
    let button = probe.locate(".btn-primary").unwrap().expect().with_timeout(Duration::from_millis(200));

    assert!(button.to_have_text("My Button").await.is_err());
    assert!(button.to_have_exact_text("My Button").await.is_err());
    button.to_have_exact_text("My\u{a0}Button").await.unwrap();

    assert!(probe.locate("text=My Button").unwrap().resolve().await.unwrap().is_empty());
}
