//! Widget scenarios for the UI testing playground.
//!
//! One [`Scenario`] per widget page. Two of them fail by design: they keep
//! the naive comparison next to the working one so the difference stays
//! visible in every run.

use crate::error::{CliError, CliResult};
use sonda::{ActOptions, ActionIntent, ElementState, Expectation, Scenario, Step};
use std::time::Duration;

/// Every scenario, in playground order
#[must_use]
pub fn all() -> Vec<Scenario> {
    vec![
        dynamic_id(),
        class_attribute(),
        hidden_layers(),
        load_delay(),
        ajax_data(),
        client_side_delay(),
        click(),
        text_input(),
        scrollbars(),
        verify_text(),
        verify_text_exact(),
        progress_bar(),
        visibility(),
        sample_app_valid_login(),
        sample_app_invalid_login(),
        mouse_over(),
        non_breaking_space(),
        non_breaking_space_exact(),
        overlapped_element(),
        shadow_dom(),
    ]
}

/// Scenarios by name, in the order requested; all of them when `names` is empty
pub fn select(names: &[String]) -> CliResult<Vec<Scenario>> {
    let mut available = all();
    if names.is_empty() {
        return Ok(available);
    }
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .position(|s| s.name() == name)
                .map(|i| available.swap_remove(i))
                .ok_or_else(|| CliError::unknown_scenario(name))
        })
        .collect()
}

fn from_home(name: &str, description: &str, link: &str) -> Scenario {
    Scenario::new(name)
        .with_description(description)
        .navigate("/")
        .reveal_by_click(format!("text={link}"))
}

/// Identify a button by its text, never by its per-load id
#[must_use]
pub fn dynamic_id() -> Scenario {
    from_home("dynamic_id", "Button whose id changes on every load", "Dynamic ID")
        .click("text=Button with Dynamic ID")
        .expect("text=Button with Dynamic ID", Expectation::Focused)
}

/// Find the primary button by whole class token
#[must_use]
pub fn class_attribute() -> Scenario {
    const PRIMARY: &str =
        "//button[contains(concat(' ', normalize-space(@class), ' '), ' btn-primary ')]";
    from_home("class_attribute", "Primary button among shuffled class lists", "Class Attribute")
        .click(PRIMARY)
        .expect(PRIMARY, Expectation::Focused)
}

/// The green button cannot be hit twice once the blue layer covers it
#[must_use]
pub fn hidden_layers() -> Scenario {
    from_home("hidden_layers", "Second click lands on the layer above", "Hidden Layers")
        .expect("id=blueButton", Expectation::Hidden)
        .click("id=greenButton")
        .click("id=blueButton")
        .expect("id=blueButton", Expectation::Focused)
        .expect("id=greenButton", Expectation::Focused.negate())
}

/// Navigation waits for the slow page to finish loading
#[must_use]
pub fn load_delay() -> Scenario {
    from_home("load_delay", "Page that takes seconds to load", "Load Delay")
        .expect("text=Button Appearing After Delay", Expectation::Visible)
}

/// Label appears fifteen seconds after an AJAX request
#[must_use]
pub fn ajax_data() -> Scenario {
    const LABEL: &str = "text=Data loaded with AJAX get request.";
    Scenario::new("ajax_data")
        .with_description("Label loaded by a slow AJAX request")
        .navigate("/ajax")
        .click("text=Button Triggering AJAX Request")
        .wait_for(LABEL, ElementState::Visible)
        .expect(LABEL, Expectation::Visible)
}

/// Label appears after client-side computation
#[must_use]
pub fn client_side_delay() -> Scenario {
    Scenario::new("client_side_delay")
        .with_description("Label produced by slow client-side logic")
        .navigate("/clientdelay")
        .click(".btn-primary")
        .wait_for_within(".bg-success", ElementState::Visible, Duration::from_secs(25))
        .expect(".bg-success", Expectation::text("Data calculated on the client side."))
}

/// Physical clicks reach a button that ignores DOM click events
#[must_use]
pub fn click() -> Scenario {
    const BUTTON: &str = "text=Button That Ignores DOM Click Event";
    from_home("click", "Button that only reacts to real mouse input", "Click")
        .click(BUTTON)
        .click(BUTTON)
        .expect("#badButton", Expectation::Class("btn btn-success".into()))
        .click(BUTTON)
        .expect("#badButton", Expectation::Focused)
}

/// Typed text renames the button
#[must_use]
pub fn text_input() -> Scenario {
    from_home("text_input", "Button named after the input field", "Text Input")
        .click("id=newButtonName")
        .fill("id=newButtonName", "")
        .fill("id=newButtonName", "My_Sample_Button")
        .click("id=updatingButton")
        .expect("id=updatingButton", Expectation::text("My_Sample_Button"))
}

/// The button is only reachable after scrolling it into view
#[must_use]
pub fn scrollbars() -> Scenario {
    from_home("scrollbars", "Button hidden in a scroll view", "Scrollbars")
        .act("#hidingButton", ActionIntent::Focus)
        .click("#hidingButton")
        .expect("#hidingButton", Expectation::Focused)
}

/// Whitespace-normalized match on text with surrounding whitespace
#[must_use]
pub fn verify_text() -> Scenario {
    from_home("verify_text", "Text with surrounding whitespace, normalized", "Verify Text")
        .expect(
            "//span[normalize-space(.)='Welcome UserName!']",
            Expectation::text("Welcome UserName!"),
        )
}

/// Raw text equality does not see past the surrounding whitespace
#[must_use]
pub fn verify_text_exact() -> Scenario {
    from_home("verify_text_exact", "Text with surrounding whitespace, raw", "Verify Text")
        .expecting_failure("raw text equality does not trim the surrounding whitespace")
        .expect("//span[.='Welcome UserName!']", Expectation::text("Welcome UserName!"))
}

/// Stop the progress bar as close to 75% as possible
#[must_use]
pub fn progress_bar() -> Scenario {
    let at_least = |min: f64| Expectation::AttributeAtLeast {
        name: "aria-valuenow".into(),
        min,
    };
    from_home("progress_bar", "Stop a running progress bar at 75%", "Progress Bar")
        .click("id=startButton")
        .expect_within("id=progressBar", at_least(75.0), Duration::from_secs(30))
        .click("id=stopButton")
        .expect("id=progressBar", at_least(75.0))
        .expect("id=progressBar", at_least(80.0).negate())
}

/// Each hiding trick reads as hidden or visible the way a user would see it
#[must_use]
pub fn visibility() -> Scenario {
    from_home("visibility", "Buttons hidden seven different ways", "Visibility")
        .click("id=hideButton")
        .expect("id=removedButton", Expectation::Hidden)
        .expect("id=zeroWidthButton", Expectation::Hidden)
        .expect("id=overlappedButton", Expectation::Visible)
        .expect("id=transparentButton", Expectation::attribute("style", "opacity: 0;"))
        .expect("id=invisibleButton", Expectation::attribute("style", "visibility: hidden;"))
        .expect("id=notdisplayedButton", Expectation::attribute("style", "display: none;"))
        .expect("id=offscreenButton", Expectation::Visible)
}

fn sample_app(name: &str, description: &str, password: &str) -> Scenario {
    from_home(name, description, "Sample App")
        // the login handler is attached after the form renders
        .settle(Duration::from_secs(1))
        .fill("[name=\"UserName\"]", "NonEmpty")
        .fill("[name=\"Password\"]", password)
        .click("id=login")
}

/// Log in with the right password, then log out
#[must_use]
pub fn sample_app_valid_login() -> Scenario {
    sample_app("sample_app_valid_login", "Login form, correct password", "pwd")
        .expect("id=loginstatus", Expectation::text("Welcome, NonEmpty!"))
        .click("id=login")
        .expect("id=loginstatus", Expectation::text("User logged out."))
}

/// Log in with a wrong password
#[must_use]
pub fn sample_app_invalid_login() -> Scenario {
    sample_app("sample_app_invalid_login", "Login form, wrong password", "wrong_password")
        .expect("id=loginstatus", Expectation::text("Invalid username/password"))
}

/// Two double-clicks on a link that re-renders on hover count four clicks
#[must_use]
pub fn mouse_over() -> Scenario {
    from_home("mouse_over", "Link replaced while the pointer is over it", "Mouse Over")
        .act("text=Click me", ActionIntent::Hover)
        .act("text=Click me", ActionIntent::DoubleClick)
        .expect("id=clickCount", Expectation::text("2"))
        .act("text=Click me", ActionIntent::DoubleClick)
        .expect("id=clickCount", Expectation::text("4"))
}

/// Match text across a non-breaking space with a whitespace class
#[must_use]
pub fn non_breaking_space() -> Scenario {
    const BUTTON: &str = r"button:has-text(/My\sButton/)";
    from_home("non_breaking_space", "Button text with a non-breaking space", "Non-Breaking Space")
        .click(BUTTON)
        .expect(BUTTON, Expectation::Focused)
}

/// A plain space never equals a non-breaking one
#[must_use]
pub fn non_breaking_space_exact() -> Scenario {
    from_home(
        "non_breaking_space_exact",
        "Button text with a non-breaking space, plain-space query",
        "Non-Breaking Space",
    )
    .expecting_failure("a plain space does not match the non-breaking space in the label")
    .step(Step::Act {
        selector: "xpath=//button[text()=\"My Button\"]".into(),
        intent: ActionIntent::Click,
        options: ActOptions::new().with_timeout(Duration::from_secs(5)),
    })
}

/// Fill a field covered by another element
#[must_use]
pub fn overlapped_element() -> Scenario {
    from_home("overlapped_element", "Input partly covered by another element", "Overlapped Element")
        .fill("id=id", "first_text_input")
        .act("id=name", ActionIntent::Hover)
        .wheel(0.0, 150.0)
        .act_forced("id=name", ActionIntent::Fill("second_text_input".into()))
        .expect("id=id", Expectation::Value("first_text_input".into()))
        .expect("id=name", Expectation::Value("second_text_input".into()))
}

/// Copy the generated GUID and compare it with the field
#[must_use]
pub fn shadow_dom() -> Scenario {
    from_home("shadow_dom", "GUID generator inside a shadow root", "Shadow DOM")
        .click("id=buttonGenerate")
        .click("id=buttonCopy")
        .click("id=editField")
        .press("Primary+A")
        .press("Primary+C")
        .expect_value_matches_clipboard("id=editField")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use sonda::Phase;
    use std::collections::HashSet;

    #[test]
    fn test_every_scenario_validates() {
        for scenario in all() {
            scenario
                .validate()
                .unwrap_or_else(|e| panic!("{}: {e}", scenario.name()));
        }
    }

    #[test]
    fn test_names_are_unique() {
        let scenarios = all();
        let names: HashSet<&str> = scenarios.iter().map(Scenario::name).collect();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_fixed_delay_only_in_reveal() {
        for scenario in all() {
            for step in scenario.steps() {
                if matches!(step, Step::Settle(_)) {
                    assert_eq!(step.phase(), Phase::Reveal, "{}", scenario.name());
                }
            }
        }
    }

    #[test]
    fn test_exactly_two_fail_by_design() {
        let failing: Vec<String> = all()
            .into_iter()
            .filter(|s| s.expected_failure().is_some())
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(failing, vec!["verify_text_exact", "non_breaking_space_exact"]);
    }

    #[test]
    fn test_select_keeps_request_order() {
        let names = vec!["shadow_dom".to_string(), "click".to_string()];
        let picked = select(&names).unwrap();
        let picked: Vec<&str> = picked.iter().map(Scenario::name).collect();
        assert_eq!(picked, vec!["shadow_dom", "click"]);
        assert_eq!(select(&[]).unwrap().len(), all().len());
    }

    #[test]
    fn test_overlapped_hover_is_not_forced() {
        let scenario = overlapped_element();
        let forced: Vec<bool> = scenario
            .steps()
            .iter()
            .filter_map(|step| match step {
                Step::Act {
                    selector, options, ..
                } if selector == "id=name" => Some(options.force),
                _ => None,
            })
            .collect();
        assert_eq!(forced, vec![false, true]);
    }

    #[test]
    fn test_select_unknown_name() {
        let err = select(&["dynamic_table".to_string()]).unwrap_err();
        assert!(matches!(err, CliError::UnknownScenario { .. }));
    }
}
