//! Offline emulation of the UI testing playground.
//!
//! Each route rebuilds one widget page on a [`MockDom`] with the quirk the
//! real page is known for: ids that change per load, a fifteen-second AJAX
//! response, a login handler attached after the form renders, a link that
//! re-renders on hover, and so on. Delays run on the tokio clock, so tests
//! with paused time finish instantly.

use sonda::mock::{MockDom, MockEvent, MockPageFactory};
use sonda::{BoundingBox, NodeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Delay before the load-delay page reports ready and shows its button
pub const LOAD_DELAY: Duration = Duration::from_secs(5);
/// AJAX and client-side computation delay
pub const DATA_DELAY: Duration = Duration::from_secs(15);
/// Delay before the sample app wires its login button
pub const LOGIN_WIRING_DELAY: Duration = Duration::from_millis(800);
/// Progress bar tick
pub const PROGRESS_TICK: Duration = Duration::from_millis(500);
/// Progress bar increment per tick
pub const PROGRESS_STEP: u32 = 5;

static LOADS: AtomicU64 = AtomicU64::new(1);

/// Page factory serving the emulated playground
#[must_use]
pub fn page_factory() -> MockPageFactory {
    MockPageFactory::new(install)
}

/// Register every playground route on `dom`
pub fn install(dom: &mut MockDom) {
    dom.route("/", home);
    dom.route("/dynamicid", dynamic_id);
    dom.route("/classattr", class_attribute);
    dom.route("/hiddenlayers", hidden_layers);
    dom.route("/loaddelay", load_delay);
    dom.route("/ajax", ajax_data);
    dom.route("/clientdelay", client_side_delay);
    dom.route("/click", click);
    dom.route("/textinput", text_input);
    dom.route("/scrollbars", scrollbars);
    dom.route("/verifytext", verify_text);
    dom.route("/progressbar", progress_bar);
    dom.route("/visibility", visibility);
    dom.route("/sampleapp", sample_app);
    dom.route("/mouseover", mouse_over);
    dom.route("/nbsp", non_breaking_space);
    dom.route("/overlapped", overlapped_element);
    dom.route("/shadowdom", shadow_dom);
}

/// Link text and path of every widget page, in home page order
pub const WIDGETS: &[(&str, &str)] = &[
    ("Dynamic ID", "/dynamicid"),
    ("Class Attribute", "/classattr"),
    ("Hidden Layers", "/hiddenlayers"),
    ("Load Delay", "/loaddelay"),
    ("AJAX Data", "/ajax"),
    ("Client Side Delay", "/clientdelay"),
    ("Click", "/click"),
    ("Text Input", "/textinput"),
    ("Scrollbars", "/scrollbars"),
    ("Verify Text", "/verifytext"),
    ("Progress Bar", "/progressbar"),
    ("Visibility", "/visibility"),
    ("Sample App", "/sampleapp"),
    ("Mouse Over", "/mouseover"),
    ("Non-Breaking Space", "/nbsp"),
    ("Overlapped Element", "/overlapped"),
    ("Shadow DOM", "/shadowdom"),
];

fn home(d: &mut MockDom) {
    let body = d.body();
    let overview = d.element(body, "section", &[("id", "overview")], "");
    for (title, href) in WIDGETS {
        d.link(overview, title, href);
    }
}

fn next_load() -> u64 {
    LOADS.fetch_add(1, Ordering::Relaxed)
}

fn container(d: &mut MockDom) -> NodeId {
    let body = d.body();
    d.element(body, "section", &[("class", "container")], "")
}

fn dynamic_id(d: &mut MockDom) {
    let root = container(d);
    let id = format!("{:08x}-{:04x}", 0x9e37_79b9_u64.wrapping_mul(next_load()), next_load() & 0xffff);
    d.element(
        root,
        "button",
        &[("id", id.as_str()), ("class", "btn btn-primary")],
        "Button with Dynamic ID",
    );
}

fn class_attribute(d: &mut MockDom) {
    let root = container(d);
    let mut classes = [
        "btn class3 btn-primary-outline btn-test",
        "btn class1 btn-primary btn-test",
        "btn btn-success class2 btn-test",
        "btn btn-warning class3",
    ];
    classes.rotate_left((next_load() % 4) as usize);
    for class in classes {
        let label = if class.split_whitespace().any(|t| t == "btn-primary") {
            "Button"
        } else {
            "Other"
        };
        d.element(root, "button", &[("class", class)], label);
    }
}

fn hidden_layers(d: &mut MockDom) {
    let root = container(d);
    let green = d.element(root, "button", &[("id", "greenButton"), ("class", "btn btn-success")], "Button");
    d.on(green, MockEvent::Click, |d, _| {
        if d.by_id("blueButton").is_some() {
            return;
        }
        let Some(green) = d.by_id("greenButton") else {
            return;
        };
        let Some(rect) = d.rect(green) else { return };
        let body = d.body();
        let blue = d.element(
            body,
            "button",
            &[("id", "blueButton"), ("class", "btn btn-primary"), ("style", "z-index: 2")],
            "Button",
        );
        d.set_rect(blue, rect);
    });
}

fn load_delay(d: &mut MockDom) {
    d.ready_after(LOAD_DELAY);
    d.after(LOAD_DELAY, |d| {
        let root = container(d);
        d.element(root, "button", &[("class", "btn btn-primary")], "Button Appearing After Delay");
    });
}

fn ajax_data(d: &mut MockDom) {
    let root = container(d);
    let button = d.element(
        root,
        "button",
        &[("id", "ajaxButton"), ("class", "btn btn-primary")],
        "Button Triggering AJAX Request",
    );
    d.element(root, "div", &[("id", "content")], "");
    d.on(button, MockEvent::Click, |d, _| {
        d.after(DATA_DELAY, |d| {
            if let Some(content) = d.by_id("content") {
                d.element(content, "p", &[("class", "bg-success")], "Data loaded with AJAX get request.");
            }
        });
    });
}

fn client_side_delay(d: &mut MockDom) {
    let root = container(d);
    let button = d.element(
        root,
        "button",
        &[("id", "ajaxButton"), ("class", "btn btn-primary")],
        "Button Triggering Client Side Logic",
    );
    d.element(root, "div", &[("id", "content")], "");
    d.on(button, MockEvent::Click, |d, _| {
        d.after(DATA_DELAY, |d| {
            if let Some(content) = d.by_id("content") {
                d.element(content, "p", &[("class", "bg-success")], "Data calculated on the client side.");
            }
        });
    });
}

fn click(d: &mut MockDom) {
    let root = container(d);
    let button = d.element(
        root,
        "button",
        &[("id", "badButton"), ("class", "btn btn-primary")],
        "Button That Ignores DOM Click Event",
    );
    d.on(button, MockEvent::Click, |d, target| {
        d.set_attribute(target, "class", "btn btn-success");
    });
}

fn text_input(d: &mut MockDom) {
    let root = container(d);
    d.element(root, "input", &[("id", "newButtonName"), ("type", "text")], "");
    let button = d.element(
        root,
        "button",
        &[("id", "updatingButton"), ("class", "btn btn-primary")],
        "Button That Should Change it's Name Based on Input Value",
    );
    d.on(button, MockEvent::Click, |d, target| {
        let name = d
            .by_id("newButtonName")
            .and_then(|input| d.value(input))
            .unwrap_or("")
            .to_string();
        if !name.is_empty() {
            d.set_text(target, &name);
        }
    });
}

fn scrollbars(d: &mut MockDom) {
    let root = container(d);
    let scroller = d.element(root, "div", &[("style", "overflow-y: scroll;")], "");
    let button = d.element(
        scroller,
        "button",
        &[("id", "hidingButton"), ("class", "btn btn-primary")],
        "Hiding Button",
    );
    d.set_rect(button, BoundingBox::new(1400.0, 1200.0, 140.0, 38.0));
}

fn verify_text(d: &mut MockDom) {
    let root = container(d);
    let panel = d.element(root, "div", &[("class", "bg-primary")], "");
    d.element(
        panel,
        "span",
        &[("class", "badge-secondary")],
        "\n            Welcome UserName!\n        ",
    );
}

fn progress_bar(d: &mut MockDom) {
    let root = container(d);
    let start = d.element(root, "button", &[("id", "startButton"), ("class", "btn btn-primary")], "Start");
    let stop = d.element(root, "button", &[("id", "stopButton"), ("class", "btn btn-info")], "Stop");
    d.element(
        root,
        "div",
        &[
            ("id", "progressBar"),
            ("role", "progressbar"),
            ("aria-valuenow", "25"),
            ("aria-valuemin", "0"),
            ("aria-valuemax", "100"),
        ],
        "25%",
    );
    d.on(start, MockEvent::Click, |d, _| {
        if let Some(bar) = d.by_id("progressBar") {
            if d.attribute(bar, "data-running").is_none() {
                d.set_attribute(bar, "data-running", "true");
                schedule_progress(d);
            }
        }
    });
    d.on(stop, MockEvent::Click, |d, _| {
        if let Some(bar) = d.by_id("progressBar") {
            d.remove_attribute(bar, "data-running");
        }
    });
}

fn schedule_progress(d: &mut MockDom) {
    d.after(PROGRESS_TICK, |d| {
        let Some(bar) = d.by_id("progressBar") else {
            return;
        };
        if d.attribute(bar, "data-running").is_none() {
            return;
        }
        let now: u32 = d
            .attribute(bar, "aria-valuenow")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = (now + PROGRESS_STEP).min(100);
        d.set_attribute(bar, "aria-valuenow", &next.to_string());
        d.set_text(bar, &format!("{next}%"));
        if next < 100 {
            schedule_progress(d);
        } else {
            d.remove_attribute(bar, "data-running");
        }
    });
}

fn visibility(d: &mut MockDom) {
    let root = container(d);
    let hide = d.element(root, "button", &[("id", "hideButton"), ("class", "btn btn-primary")], "Hide");
    for id in [
        "removedButton",
        "zeroWidthButton",
        "overlappedButton",
        "transparentButton",
        "invisibleButton",
        "notdisplayedButton",
        "offscreenButton",
    ] {
        d.element(root, "button", &[("id", id), ("class", "btn btn-info")], id);
    }
    d.on(hide, MockEvent::Click, |d, _| {
        if let Some(n) = d.by_id("removedButton") {
            d.remove(n);
        }
        if let Some(n) = d.by_id("zeroWidthButton") {
            if let Some(rect) = d.rect(n) {
                d.set_rect(n, BoundingBox::new(rect.x, rect.y, 0.0, rect.height));
            }
        }
        if let Some(n) = d.by_id("overlappedButton") {
            if let Some(rect) = d.rect(n) {
                let body = d.body();
                let cover = d.element(body, "div", &[("id", "hidingLayer"), ("style", "z-index: 2")], "");
                d.set_rect(cover, rect);
            }
        }
        for (id, style) in [
            ("transparentButton", "opacity: 0;"),
            ("invisibleButton", "visibility: hidden;"),
            ("notdisplayedButton", "display: none;"),
        ] {
            if let Some(n) = d.by_id(id) {
                d.set_attribute(n, "style", style);
            }
        }
        if let Some(n) = d.by_id("offscreenButton") {
            d.set_rect(n, BoundingBox::new(-9999.0, -9999.0, 140.0, 38.0));
        }
    });
}

fn sample_app(d: &mut MockDom) {
    let root = container(d);
    let status = d.element(root, "label", &[("id", "loginstatus")], "User logged out.");
    d.element(root, "input", &[("name", "UserName"), ("type", "text")], "");
    d.element(root, "input", &[("name", "Password"), ("type", "password")], "");
    let login = d.element(root, "button", &[("id", "login"), ("class", "btn btn-primary")], "Log In");
    d.after(LOGIN_WIRING_DELAY, move |d| {
        d.on(login, MockEvent::Click, move |d, button| {
            if d.text_content(button) == "Log Out" {
                d.set_text(button, "Log In");
                d.set_text(status, "User logged out.");
                return;
            }
            let field = |d: &MockDom, name: &str| {
                d.by_attribute("name", name)
                    .and_then(|n| d.value(n))
                    .unwrap_or("")
                    .to_string()
            };
            let user = field(d, "UserName");
            let password = field(d, "Password");
            if !user.is_empty() && password == "pwd" {
                d.set_text(status, &format!("Welcome, {user}!"));
                d.set_text(button, "Log Out");
            } else {
                d.set_text(status, "Invalid username/password");
            }
        });
    });
}

fn mouse_over(d: &mut MockDom) {
    let root = container(d);
    let area = d.element(root, "div", &[("class", "click-area")], "");
    d.element(area, "a", &[("href", "#"), ("title", "Click me"), ("class", "text-primary")], "Click me");
    let counter = d.element(area, "p", &[], "The link above clicked ");
    d.element(counter, "span", &[("id", "clickCount")], "0");
    d.on(area, MockEvent::MouseOver, |d, target| {
        // the real page re-renders the link on hover
        if d.attribute(target, "title") == Some("Click me") {
            d.replace(target);
        }
    });
    d.on(area, MockEvent::Click, |d, target| {
        if d.attribute(target, "title") != Some("Click me") {
            return;
        }
        if let Some(count) = d.by_id("clickCount") {
            let clicks: u32 = d.text_content(count).trim().parse().unwrap_or(0);
            d.set_text(count, &(clicks + 1).to_string());
        }
    });
}

fn non_breaking_space(d: &mut MockDom) {
    let root = container(d);
    d.element(root, "button", &[("class", "btn btn-primary")], "My\u{a0}Button");
}

fn overlapped_element(d: &mut MockDom) {
    let root = container(d);
    let form = d.element(root, "div", &[("style", "overflow-y: scroll; height: 100px;")], "");
    d.element(form, "input", &[("id", "id"), ("placeholder", "Id")], "");
    let name = d.element(form, "input", &[("id", "name"), ("placeholder", "Name")], "");
    // the cover hides the lower part of the field; its centre stays exposed
    if let Some(rect) = d.rect(name) {
        let cover = d.element(form, "div", &[("id", "subject"), ("style", "z-index: 2")], "");
        let top = rect.y + rect.height * 0.6;
        d.set_rect(cover, BoundingBox::new(rect.x, top, rect.width, rect.height));
    }
}

fn shadow_dom(d: &mut MockDom) {
    let root = container(d);
    let generator = d.element(root, "guid-generator", &[], "");
    d.element(generator, "input", &[("id", "editField"), ("type", "text")], "");
    let generate = d.element(generator, "button", &[("id", "buttonGenerate"), ("class", "button-generate")], "");
    d.element(generator, "button", &[("id", "buttonCopy"), ("class", "button-copy")], "");
    d.on(generate, MockEvent::Click, |d, _| {
        let seed = next_load();
        let guid = format!(
            "{:08x}-{:04x}-4{:03x}-a{:03x}-{:012x}",
            0x5eed_0000_u64.wrapping_add(seed.wrapping_mul(0x9e37)) & 0xffff_ffff,
            seed & 0xffff,
            (seed * 7) & 0xfff,
            (seed * 13) & 0xfff,
            seed.wrapping_mul(0x0001_0000_0001) & 0xffff_ffff_ffff,
        );
        if let Some(field) = d.by_id("editField") {
            d.set_value(field, &guid);
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn loaded(path: &str) -> MockDom {
        let mut dom = MockDom::new();
        install(&mut dom);
        dom.load(path).unwrap();
        dom
    }

    #[test]
    fn test_home_links_every_widget() {
        let dom = loaded("/");
        let text = dom.text_content(dom.body());
        for (title, _) in WIDGETS {
            assert!(text.contains(title), "missing link {title}");
        }
    }

    #[test]
    fn test_every_widget_route_loads() {
        let mut dom = MockDom::new();
        install(&mut dom);
        for (_, path) in WIDGETS {
            dom.load(path).unwrap();
            assert_eq!(dom.url(), *path);
        }
    }

    #[test]
    fn test_dynamic_id_changes_per_load() {
        let first = loaded("/dynamicid");
        let second = loaded("/dynamicid");
        let id = |dom: &MockDom| {
            let button = dom.by_attribute("class", "btn btn-primary").unwrap();
            dom.attribute(button, "id").unwrap().to_string()
        };
        assert_ne!(id(&first), id(&second));
    }

    #[test]
    fn test_visibility_hide_applies_every_trick() {
        let mut dom = loaded("/visibility");
        let hide = dom.by_id("hideButton").unwrap();
        dom.fire(MockEvent::Click, hide);
        assert!(dom.by_id("removedButton").is_none());
        assert!(!dom.is_visible(dom.by_id("zeroWidthButton").unwrap()));
        assert!(dom.is_visible(dom.by_id("overlappedButton").unwrap()));
        assert!(dom.is_visible(dom.by_id("transparentButton").unwrap()));
        assert!(!dom.is_visible(dom.by_id("invisibleButton").unwrap()));
        assert!(!dom.is_visible(dom.by_id("notdisplayedButton").unwrap()));
        assert!(dom.is_visible(dom.by_id("offscreenButton").unwrap()));
    }

    #[test]
    fn test_mouse_over_replaces_link() {
        let mut dom = loaded("/mouseover");
        let link = dom.by_attribute("title", "Click me").unwrap();
        dom.fire(MockEvent::MouseOver, link);
        assert!(!dom.is_attached(link));
        let fresh = dom.by_attribute("title", "Click me").unwrap();
        dom.fire(MockEvent::Click, fresh);
        assert_eq!(dom.text_content(dom.by_id("clickCount").unwrap()), "1");
    }

    #[test]
    fn test_overlapped_field_centre_is_exposed() {
        let dom = loaded("/overlapped");
        let name = dom.by_id("name").unwrap();
        let subject = dom.by_id("subject").unwrap();
        let rect = dom.rect(name).unwrap();
        assert_eq!(dom.hit_test(rect.center()), Some(name));
        let lower = sonda::Point::new(rect.center().x, rect.y + rect.height * 0.9);
        assert_eq!(dom.hit_test(lower), Some(subject));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_bar_ticks_until_stopped() {
        let mut dom = loaded("/progressbar");
        let start = dom.by_id("startButton").unwrap();
        dom.fire(MockEvent::Click, start);
        tokio::time::sleep(PROGRESS_TICK * 3).await;
        dom.settle();
        let bar = dom.by_id("progressBar").unwrap();
        assert_eq!(dom.attribute(bar, "aria-valuenow"), Some("40"));

        let stop = dom.by_id("stopButton").unwrap();
        dom.fire(MockEvent::Click, stop);
        tokio::time::sleep(PROGRESS_TICK * 4).await;
        dom.settle();
        assert_eq!(dom.attribute(bar, "aria-valuenow"), Some("40"));
        assert_eq!(dom.text_content(bar), "40%");
    }
}
