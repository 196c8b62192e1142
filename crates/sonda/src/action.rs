//! Interaction Executor
//!
//! Turns a user intent into input events against one freshly resolved
//! element. Unless the action is forced, the target must be visible,
//! enabled (editable for fills) and actually receive pointer events at its
//! center; a covered target fails with [`ProbeError::Obscured`].
//!
//! Forced actions skip every check except attachment and act on the node
//! itself through [`NodeCommand`]s.

use crate::clipboard::Clipboard;
use crate::driver::{
    ElementHandle, InputEvent, MouseButton, NodeCommand, NodeState, PageContext, Point,
};
use crate::keyboard::{EditCommand, KeyChord, Platform};
use crate::result::{ProbeError, ProbeResult};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What the user wants to do to an element
#[derive(Debug, Clone, PartialEq)]
pub enum ActionIntent {
    /// Single primary click
    Click,
    /// Double click
    DoubleClick,
    /// Move the pointer over the element
    Hover,
    /// Replace the value of an editable element
    Fill(String),
    /// Focus the element and press a chord
    KeyPress(KeyChord),
    /// Wheel-scroll over the element
    Scroll {
        /// Horizontal delta
        delta_x: f64,
        /// Vertical delta
        delta_y: f64,
    },
    /// Move keyboard focus to the element
    Focus,
}

impl ActionIntent {
    const fn needs_enabled(&self) -> bool {
        !matches!(self, Self::Hover | Self::Scroll { .. })
    }

    const fn needs_hit_target(&self) -> bool {
        matches!(
            self,
            Self::Click | Self::DoubleClick | Self::Hover | Self::Fill(_)
        )
    }

    const fn needs_viewport(&self) -> bool {
        !matches!(self, Self::Focus | Self::KeyPress(_))
    }
}

impl fmt::Display for ActionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::DoubleClick => write!(f, "double-click"),
            Self::Hover => write!(f, "hover"),
            Self::Fill(text) => write!(f, "fill {text:?} into"),
            Self::KeyPress(chord) => write!(f, "press {chord} on"),
            Self::Scroll { delta_x, delta_y } => write!(f, "scroll ({delta_x}, {delta_y}) over"),
            Self::Focus => write!(f, "focus"),
        }
    }
}

/// An intent plus the force flag
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Intent
    pub intent: ActionIntent,
    /// Skip actionability checks
    pub force: bool,
}

impl Action {
    /// Non-forced action
    #[must_use]
    pub fn new(intent: ActionIntent) -> Self {
        Self {
            intent,
            force: false,
        }
    }

    /// Set the force flag
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl From<ActionIntent> for Action {
    fn from(intent: ActionIntent) -> Self {
        Self::new(intent)
    }
}

/// Executes actions against a page
#[derive(Debug, Clone, Default)]
pub struct Executor {
    platform: Platform,
    clipboard: Option<Arc<dyn Clipboard>>,
}

impl Executor {
    /// Executor for `platform`, without a clipboard
    #[must_use]
    pub const fn new(platform: Platform) -> Self {
        Self {
            platform,
            clipboard: None,
        }
    }

    /// Attach a clipboard capability
    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Platform used to resolve chords
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Attached clipboard
    #[must_use]
    pub fn clipboard(&self) -> Option<&Arc<dyn Clipboard>> {
        self.clipboard.as_ref()
    }

    /// Perform `action` on `target` once.
    ///
    /// Nothing is retried here; waiting for actionability is the caller's job.
    pub async fn perform(
        &self,
        page: &dyn PageContext,
        action: &Action,
        target: &ElementHandle,
    ) -> ProbeResult<()> {
        let state = page.node_state(target.node).await?;
        debug!(
            intent = %action.intent,
            target = %state.describe(),
            forced = action.force,
            "performing action"
        );
        if action.force {
            return self.perform_forced(page, &action.intent, target, &state).await;
        }

        let state = self.check_actionable(page, &action.intent, target, state).await?;
        let center = state
            .bounding_box
            .map(|b| b.center())
            .unwrap_or(Point::new(0.0, 0.0));

        match &action.intent {
            ActionIntent::Click => self.click(page, center, 1).await,
            ActionIntent::DoubleClick => self.click(page, center, 2).await,
            ActionIntent::Hover => page.dispatch_input(InputEvent::MouseMove { point: center }).await,
            ActionIntent::Fill(text) => {
                page.apply(target.node, NodeCommand::Focus).await?;
                page.apply(target.node, NodeCommand::SetValue(text.clone())).await
            }
            ActionIntent::KeyPress(chord) => {
                page.apply(target.node, NodeCommand::Focus).await?;
                self.press(page, chord).await
            }
            ActionIntent::Scroll { delta_x, delta_y } => {
                self.wheel(page, center, *delta_x, *delta_y).await
            }
            ActionIntent::Focus => page.apply(target.node, NodeCommand::Focus).await,
        }
    }

    async fn check_actionable(
        &self,
        page: &dyn PageContext,
        intent: &ActionIntent,
        target: &ElementHandle,
        mut state: NodeState,
    ) -> ProbeResult<NodeState> {
        let refuse = |state: &NodeState, reason: &str| ProbeError::NotActionable {
            selector: state.describe(),
            intent: intent.to_string(),
            reason: reason.to_string(),
        };
        if !state.visible {
            return Err(refuse(&state, "element is not visible"));
        }
        if intent.needs_enabled() && !state.enabled {
            return Err(refuse(&state, "element is disabled"));
        }
        if matches!(intent, ActionIntent::Fill(_)) && !state.editable {
            return Err(refuse(&state, "element is not editable"));
        }

        if intent.needs_viewport() && !state.in_viewport {
            debug!(target = %state.describe(), "scrolling into view");
            page.apply(target.node, NodeCommand::ScrollIntoView).await?;
            state = page.node_state(target.node).await?;
        }

        if intent.needs_hit_target() {
            let Some(bbox) = state.bounding_box else {
                return Err(refuse(&state, "element has no layout box"));
            };
            let Some(hit) = page.hit_test(bbox.center()).await? else {
                return Err(refuse(&state, "nothing receives pointer events at its center"));
            };
            if !page.contains(target.node, hit).await? {
                let cover = page.node_state(hit).await?;
                return Err(ProbeError::Obscured {
                    selector: state.describe(),
                    intent: intent.to_string(),
                    obscured_by: cover.describe(),
                });
            }
        }
        Ok(state)
    }

    async fn perform_forced(
        &self,
        page: &dyn PageContext,
        intent: &ActionIntent,
        target: &ElementHandle,
        state: &NodeState,
    ) -> ProbeResult<()> {
        let node = target.node;
        match intent {
            ActionIntent::Click => page.apply(node, NodeCommand::Click).await,
            ActionIntent::DoubleClick => page.apply(node, NodeCommand::DoubleClick).await,
            ActionIntent::Hover => page.apply(node, NodeCommand::Hover).await,
            ActionIntent::Fill(text) => {
                page.apply(node, NodeCommand::Focus).await?;
                page.apply(node, NodeCommand::SetValue(text.clone())).await
            }
            ActionIntent::KeyPress(chord) => {
                page.apply(node, NodeCommand::Focus).await?;
                self.press(page, chord).await
            }
            ActionIntent::Scroll { delta_x, delta_y } => {
                let point = state
                    .bounding_box
                    .map(|b| b.center())
                    .unwrap_or(Point::new(0.0, 0.0));
                self.wheel(page, point, *delta_x, *delta_y).await
            }
            ActionIntent::Focus => page.apply(node, NodeCommand::Focus).await,
        }
    }

    async fn click(&self, page: &dyn PageContext, point: Point, clicks: u32) -> ProbeResult<()> {
        page.dispatch_input(InputEvent::MouseMove { point }).await?;
        for click_count in 1..=clicks {
            page.dispatch_input(InputEvent::MouseDown {
                point,
                button: MouseButton::Left,
                click_count,
            })
            .await?;
            page.dispatch_input(InputEvent::MouseUp {
                point,
                button: MouseButton::Left,
                click_count,
            })
            .await?;
        }
        Ok(())
    }

    /// Press a chord on whatever has focus.
    ///
    /// Copy and cut chords hand the current selection to the clipboard;
    /// paste chords type the clipboard value.
    pub async fn press(&self, page: &dyn PageContext, chord: &KeyChord) -> ProbeResult<()> {
        let resolved = chord.resolve(self.platform);
        debug!(chord = %chord, platform = %self.platform, command = ?resolved.command, "pressing chord");

        let selection = match resolved.command {
            Some(EditCommand::Copy | EditCommand::Cut) => Some(page.selected_text().await?),
            _ => None,
        };

        page.dispatch_input(InputEvent::KeyDown {
            key: resolved.key.clone(),
            modifiers: resolved.modifiers,
            command: resolved.command,
        })
        .await?;

        match (resolved.command, &self.clipboard) {
            (Some(EditCommand::Copy | EditCommand::Cut), Some(clipboard)) => {
                clipboard.write_requested_via_key_chord(selection.as_deref().unwrap_or(""))?;
            }
            (Some(EditCommand::Paste), Some(clipboard)) => {
                let text = clipboard.read_current_value()?;
                page.dispatch_input(InputEvent::InsertText { text }).await?;
            }
            (Some(EditCommand::Copy | EditCommand::Cut | EditCommand::Paste), None) => {
                debug!(chord = %chord, "no clipboard attached; chord only reaches the page");
            }
            _ => {}
        }

        page.dispatch_input(InputEvent::KeyUp {
            key: resolved.key,
            modifiers: resolved.modifiers,
        })
        .await
    }

    /// Wheel-scroll with the pointer at `point`
    pub async fn wheel(
        &self,
        page: &dyn PageContext,
        point: Point,
        delta_x: f64,
        delta_y: f64,
    ) -> ProbeResult<()> {
        debug!(delta_x, delta_y, "wheel");
        page.dispatch_input(InputEvent::Wheel {
            point,
            delta_x,
            delta_y,
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::driver::BoundingBox;
    use crate::mock::{MockDom, MockEvent, MockPage};

    fn handle(page: &MockPage, id: &str) -> ElementHandle {
        let node = page.with_dom(|d| d.by_id(id)).unwrap();
        ElementHandle::new(node, "x")
    }

    fn overlapped_site(dom: &mut MockDom) {
        dom.route("/", |d| {
            let body = d.body();
            let input = d.element(body, "input", &[("id", "name")], "");
            let rect = d.rect(input).unwrap();
            let cover = d.element(body, "div", &[("id", "cover"), ("style", "z-index: 5")], "");
            d.set_rect(cover, rect);
            let button = d.element(body, "button", &[("id", "count")], "0");
            d.on(button, MockEvent::Click, |d, target| {
                let n: u32 = d.text_content(target).parse().unwrap_or(0);
                d.set_text(target, &(n + 1).to_string());
            });
            let off = d.element(body, "button", &[("id", "far")], "far");
            d.set_rect(off, BoundingBox::new(10.0, 3000.0, 100.0, 30.0));
            d.element(body, "button", &[("id", "off"), ("disabled", "")], "off");
        });
    }

    async fn page() -> MockPage {
        let page = MockPage::with_site(overlapped_site);
        page.navigate("/").await.unwrap();
        page
    }

    mod pointer_tests {
        use super::*;

        #[tokio::test]
        async fn test_obscured_fails_unless_forced() {
            let page = page().await;
            let exec = Executor::new(Platform::Linux);
            let target = handle(&page, "name");
            let fill = Action::new(ActionIntent::Fill("second".into()));

            let err = exec.perform(&page, &fill, &target).await.unwrap_err();
            match err {
                ProbeError::Obscured { obscured_by, .. } => assert_eq!(obscured_by, "div#cover"),
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(page.with_dom(|d| d.value(target.node).map(str::to_string)), Some(String::new()));

            exec.perform(&page, &fill.with_force(true), &target).await.unwrap();
            assert_eq!(page.with_dom(|d| d.value(target.node).map(str::to_string)), Some("second".into()));
        }

        #[tokio::test]
        async fn test_double_click_fires_two_clicks() {
            let page = page().await;
            let exec = Executor::default();
            let target = handle(&page, "count");
            exec.perform(&page, &ActionIntent::DoubleClick.into(), &target)
                .await
                .unwrap();
            assert_eq!(page.with_dom(|d| d.text_content(target.node)), "2");
        }

        #[tokio::test]
        async fn test_scrolls_out_of_view_target_before_clicking() {
            let page = page().await;
            let exec = Executor::default();
            let target = handle(&page, "far");
            exec.perform(&page, &ActionIntent::Click.into(), &target).await.unwrap();
            assert_eq!(page.with_dom(|d| d.focused()), Some(target.node));
            assert!(page.with_dom(|d| d.scroll_offset().y) > 0.0);
        }

        #[tokio::test]
        async fn test_disabled_is_not_actionable() {
            let page = page().await;
            let err = Executor::default()
                .perform(&page, &ActionIntent::Click.into(), &handle(&page, "off"))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "not_actionable");
        }

        #[tokio::test]
        async fn test_detached_target_is_stale_even_when_forced() {
            let page = page().await;
            let target = handle(&page, "count");
            page.with_dom(|d| d.remove(target.node));
            let err = Executor::default()
                .perform(&page, &Action::new(ActionIntent::Click).with_force(true), &target)
                .await
                .unwrap_err();
            assert!(err.is_stale());
        }
    }

    mod keyboard_tests {
        use super::*;

        #[tokio::test]
        async fn test_select_all_copy_reaches_clipboard() {
            let page = page().await;
            let clipboard = Arc::new(MemoryClipboard::new());
            let exec = Executor::new(Platform::MacOs).with_clipboard(clipboard.clone());
            let target = handle(&page, "name");
            exec.perform(&page, &Action::new(ActionIntent::Fill("guid-1".into())).with_force(true), &target)
                .await
                .unwrap();

            exec.press(&page, &KeyChord::parse("Meta+A").unwrap()).await.unwrap();
            exec.press(&page, &KeyChord::parse("Meta+C").unwrap()).await.unwrap();
            assert_eq!(clipboard.read_current_value().unwrap(), "guid-1");
        }

        #[tokio::test]
        async fn test_meta_a_is_not_select_all_on_linux() {
            let page = page().await;
            let clipboard = Arc::new(MemoryClipboard::with_value("untouched"));
            let exec = Executor::new(Platform::Linux).with_clipboard(clipboard.clone());
            let target = handle(&page, "name");
            exec.perform(&page, &Action::new(ActionIntent::Focus).with_force(true), &target)
                .await
                .unwrap();
            exec.press(&page, &KeyChord::parse("Meta+A").unwrap()).await.unwrap();
            exec.press(&page, &KeyChord::parse("Primary+C").unwrap()).await.unwrap();
            assert_eq!(clipboard.read_current_value().unwrap(), "");
        }

        #[tokio::test]
        async fn test_paste_inserts_clipboard_value() {
            let page = page().await;
            let clipboard = Arc::new(MemoryClipboard::with_value("pasted"));
            let exec = Executor::new(Platform::Windows).with_clipboard(clipboard);
            let target = handle(&page, "name");
            exec.perform(
                &page,
                &Action::new(ActionIntent::KeyPress(KeyChord::parse("Control+V").unwrap()))
                    .with_force(true),
                &target,
            )
            .await
            .unwrap();
            assert_eq!(page.with_dom(|d| d.value(target.node).map(str::to_string)), Some("pasted".into()));
        }
    }
}
