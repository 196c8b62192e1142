//! In-memory document model behind [`super::MockPage`].
//!
//! Nodes live in an arena that is never compacted, so a [`NodeId`] keeps
//! pointing at the same node after it is detached; that is what lets the
//! engine observe staleness the way a live browser exposes it.

use crate::driver::{
    BoundingBox, DomSnapshot, InputEvent, NodeCommand, NodeId, NodeState, Point, SnapshotNode,
};
use crate::keyboard::EditCommand;
use crate::result::{ProbeError, ProbeResult};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Event handler: receives the document and the event target
pub type Handler = Arc<dyn Fn(&mut MockDom, NodeId) + Send + Sync>;

/// Route builder: populates a freshly loaded document
pub type RouteBuilder = Arc<dyn Fn(&mut MockDom) + Send + Sync>;

type Mutation = Box<dyn FnOnce(&mut MockDom) + Send>;

/// Events a mock node can listen for; all of them bubble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockEvent {
    /// Primary button click (also fired twice by a double-click)
    Click,
    /// Double-click
    DoubleClick,
    /// Pointer entered the node
    MouseOver,
    /// Value of a form control changed
    Input,
}

/// Computed style subset that affects visibility and hit testing
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// `display: none`
    pub display_none: bool,
    /// `visibility: hidden`
    pub visibility_hidden: bool,
    /// `opacity`; does not affect visibility
    pub opacity: f64,
    /// `z-index`, when positioned
    pub z_index: Option<i32>,
    /// `pointer-events: none`
    pub pointer_events_none: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            display_none: false,
            visibility_hidden: false,
            opacity: 1.0,
            z_index: None,
            pointer_events_none: false,
        }
    }
}

impl Style {
    /// Parse inline CSS declarations (`display: none; z-index: 3`)
    #[must_use]
    pub fn parse(css: &str) -> Self {
        let mut style = Self::default();
        for decl in css.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match prop.trim() {
                "display" => style.display_none = value == "none",
                "visibility" => style.visibility_hidden = value == "hidden",
                "opacity" => style.opacity = value.parse().unwrap_or(1.0),
                "z-index" => style.z_index = value.parse().ok(),
                "pointer-events" => style.pointer_events_none = value == "none",
                _ => {}
            }
        }
        style
    }
}

#[derive(Debug, Clone)]
struct MockNode {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
    text: String,
    value: Option<String>,
    style: Style,
    rect: Option<BoundingBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    None,
    Control(NodeId),
    Document,
}

struct Scheduled {
    at: Instant,
    seq: u64,
    mutation: Mutation,
}

/// Mutable document state shared by a [`super::MockPage`]
pub struct MockDom {
    nodes: Vec<MockNode>,
    root: NodeId,
    body: NodeId,
    url: String,
    viewport: (f64, f64),
    scroll: Point,
    focus: Option<NodeId>,
    hovered: Option<NodeId>,
    pressed: Option<NodeId>,
    selection: Selection,
    handlers: HashMap<(NodeId, MockEvent), Vec<Handler>>,
    routes: HashMap<String, RouteBuilder>,
    scheduled: Vec<Scheduled>,
    next_seq: u64,
    // due time of the mutation being applied; timers it sets start from here
    clock: Option<Instant>,
    ready_at: Option<Instant>,
    next_auto_y: f64,
    key_log: Vec<String>,
}

impl fmt::Debug for MockDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDom")
            .field("url", &self.url)
            .field("nodes", &self.nodes.len())
            .field("focus", &self.focus)
            .field("scroll", &self.scroll)
            .field("scheduled", &self.scheduled.len())
            .finish_non_exhaustive()
    }
}

impl Default for MockDom {
    fn default() -> Self {
        Self::new()
    }
}

/// Default viewport width in CSS pixels
pub const VIEWPORT_WIDTH: f64 = 1280.0;
/// Default viewport height in CSS pixels
pub const VIEWPORT_HEIGHT: f64 = 720.0;

impl MockDom {
    /// Empty `about:blank` document
    #[must_use]
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            url: "about:blank".into(),
            viewport: (VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
            scroll: Point::new(0.0, 0.0),
            focus: None,
            hovered: None,
            pressed: None,
            selection: Selection::None,
            handlers: HashMap::new(),
            routes: HashMap::new(),
            scheduled: Vec::new(),
            next_seq: 0,
            clock: None,
            ready_at: None,
            next_auto_y: 0.0,
            key_log: Vec::new(),
        };
        dom.reset_document();
        dom
    }

    fn reset_document(&mut self) {
        let root = self.push_node("html", None);
        let body = self.push_node("body", Some(root));
        self.root = root;
        self.body = body;
        self.scroll = Point::new(0.0, 0.0);
        self.focus = None;
        self.hovered = None;
        self.pressed = None;
        self.selection = Selection::None;
        self.scheduled.clear();
        self.handlers.clear();
        self.ready_at = None;
        self.next_auto_y = 8.0;
    }

    fn push_node(&mut self, tag: &str, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(MockNode {
            tag: tag.to_ascii_lowercase(),
            parent,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            value: None,
            style: Style::default(),
            rect: None,
        });
        if let Some(p) = parent.and_then(|p| self.node_mut(p)) {
            p.children.push(id);
        }
        id
    }

    fn node(&self, id: NodeId) -> Option<&MockNode> {
        usize::try_from(id.0).ok().and_then(|i| self.nodes.get(i))
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut MockNode> {
        usize::try_from(id.0).ok().and_then(|i| self.nodes.get_mut(i))
    }

    fn stale(&self, id: NodeId) -> ProbeError {
        let tag = self.node(id).map_or("?", |n| n.tag.as_str());
        ProbeError::StaleElement {
            selector: format!("<{tag}>"),
            node: id.0,
        }
    }

    // =========================================================================
    // ROUTES AND LOADING
    // =========================================================================

    /// Register a route; `path` is matched against the URL path
    pub fn route(&mut self, path: &str, builder: impl Fn(&mut Self) + Send + Sync + 'static) {
        self.routes.insert(route_key(path), Arc::new(builder));
    }

    /// Replace the document with the one built by the route for `url`.
    ///
    /// Every node of the previous document becomes detached.
    pub fn load(&mut self, url: &str) -> ProbeResult<()> {
        let builder = self
            .routes
            .get(&route_key(url))
            .cloned()
            .ok_or_else(|| ProbeError::Navigation {
                url: url.to_string(),
                message: "no route registered".into(),
            })?;
        self.reset_document();
        self.url = url.to_string();
        builder(self);
        Ok(())
    }

    /// Current URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Report the document as loading until `delay` has passed
    pub fn ready_after(&mut self, delay: Duration) {
        self.ready_at = Some(self.now() + delay);
    }

    /// True once the document has finished loading
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready_at.map_or(true, |at| Instant::now() >= at)
    }

    /// Schedule a mutation on the tokio clock.
    ///
    /// Timers set while a due mutation runs count from its due time.
    pub fn after(&mut self, delay: Duration, mutation: impl FnOnce(&mut Self) + Send + 'static) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.scheduled.push(Scheduled {
            at: self.now() + delay,
            seq,
            mutation: Box::new(mutation),
        });
    }

    /// Apply every scheduled mutation that is due, oldest first
    pub fn settle(&mut self) {
        let now = Instant::now();
        loop {
            let due = self
                .scheduled
                .iter()
                .enumerate()
                .filter(|(_, s)| s.at <= now)
                .min_by_key(|(_, s)| (s.at, s.seq))
                .map(|(i, _)| i);
            let Some(i) = due else { break };
            let scheduled = self.scheduled.swap_remove(i);
            self.clock = Some(scheduled.at);
            (scheduled.mutation)(self);
        }
        self.clock = None;
    }

    fn now(&self) -> Instant {
        self.clock.unwrap_or_else(Instant::now)
    }

    // =========================================================================
    // BUILDING
    // =========================================================================

    /// Document element
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Body element
    #[must_use]
    pub const fn body(&self) -> NodeId {
        self.body
    }

    /// Append an element; it gets its own layout row unless a rect is set later
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.push_node(tag, Some(parent));
        let y = self.next_auto_y;
        self.next_auto_y += 40.0;
        if let Some(n) = self.node_mut(id) {
            n.rect = Some(BoundingBox::new(8.0, y, 200.0, 30.0));
        }
        id
    }

    /// Append an element with attributes and own text
    pub fn element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> NodeId {
        let id = self.append(parent, tag);
        for (name, value) in attributes {
            self.set_attribute(id, name, value);
        }
        self.set_text(id, text);
        if matches!(tag, "input" | "textarea") {
            let initial = attributes
                .iter()
                .find(|(name, _)| *name == "value")
                .map_or("", |(_, v)| *v);
            if let Some(n) = self.node_mut(id) {
                n.value = Some(initial.to_string());
            }
        }
        id
    }

    /// Append a link that loads `href` when clicked
    pub fn link(&mut self, parent: NodeId, text: &str, href: &str) -> NodeId {
        let id = self.element(parent, "a", &[("href", href)], text);
        let target = href.to_string();
        self.on(id, MockEvent::Click, move |dom, _| {
            if let Err(e) = dom.load(&target) {
                tracing::warn!(error = %e, "mock link target missing");
            }
        });
        id
    }

    /// Replace `old` with a fresh copy (same tag, attributes, text and box).
    ///
    /// The copy has a new [`NodeId`] and no handlers; `old` is detached.
    pub fn replace(&mut self, old: NodeId) -> Option<NodeId> {
        let original = self.node(old)?.clone();
        let parent = original.parent?;
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(MockNode {
            parent: Some(parent),
            children: Vec::new(),
            ..original
        });
        if let Some(p) = self.node_mut(parent) {
            if let Some(slot) = p.children.iter_mut().find(|c| **c == old) {
                *slot = id;
            }
        }
        if let Some(n) = self.node_mut(old) {
            n.parent = None;
        }
        self.forget(old);
        Some(id)
    }

    /// Detach a node and its subtree
    pub fn remove(&mut self, node: NodeId) {
        let parent = self.node(node).and_then(|n| n.parent);
        if let Some(p) = parent.and_then(|p| self.node_mut(p)) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
        self.forget(node);
    }

    fn forget(&mut self, node: NodeId) {
        if self.focus.is_some_and(|f| !self.is_attached(f)) {
            self.focus = None;
        }
        if self.hovered == Some(node) {
            self.hovered = None;
        }
        if self.selection == Selection::Control(node) {
            self.selection = Selection::None;
        }
    }

    /// First attached element with `id`
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.document_order(self.root)
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id))
    }

    /// First attached element whose attribute `name` equals `value`
    #[must_use]
    pub fn by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.document_order(self.root)
            .into_iter()
            .find(|n| self.attribute(*n, name) == Some(value))
    }

    /// Set an attribute; `style` also updates the computed style
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.node_mut(node) {
            if name == "style" {
                n.style = Style::parse(value);
            }
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// Remove an attribute
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.node_mut(node) {
            if name == "style" {
                n.style = Style::default();
            }
            n.attributes.remove(name);
        }
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    /// Replace the node's own text
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.node_mut(node) {
            n.text = text.to_string();
        }
    }

    /// Own text followed by the text of every descendant
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(n) = self.node(node) {
            out.push_str(&n.text);
            for child in &n.children {
                self.collect_text(*child, out);
            }
        }
    }

    /// Set a form control value (fires `Input`)
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(n) = self.node_mut(node) {
            n.value = Some(value.to_string());
        }
        if self.selection == Selection::Control(node) {
            self.selection = Selection::None;
        }
        self.fire(MockEvent::Input, node);
    }

    /// Form control value
    #[must_use]
    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.node(node).and_then(|n| n.value.as_deref())
    }

    /// Override the layout box
    pub fn set_rect(&mut self, node: NodeId, rect: BoundingBox) {
        if let Some(n) = self.node_mut(node) {
            n.rect = Some(rect);
        }
    }

    /// Layout box
    #[must_use]
    pub fn rect(&self, node: NodeId) -> Option<BoundingBox> {
        self.node(node).and_then(|n| n.rect)
    }

    /// Mutable computed style
    pub fn style_mut(&mut self, node: NodeId) -> Option<&mut Style> {
        self.node_mut(node).map(|n| &mut n.style)
    }

    /// Listen for an event on `node` (and, by bubbling, its descendants)
    pub fn on(
        &mut self,
        node: NodeId,
        event: MockEvent,
        handler: impl Fn(&mut Self, NodeId) + Send + Sync + 'static,
    ) {
        self.handlers
            .entry((node, event))
            .or_default()
            .push(Arc::new(handler));
    }

    /// Fire an event at `target`, bubbling up through attached ancestors
    pub fn fire(&mut self, event: MockEvent, target: NodeId) {
        let mut chain = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            if let Some(handlers) = self.handlers.get(&(node, event)) {
                chain.extend(handlers.iter().cloned());
            }
            cursor = self.node(node).and_then(|n| n.parent);
        }
        for handler in chain {
            handler(self, target);
        }
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    /// Focused element
    #[must_use]
    pub const fn focused(&self) -> Option<NodeId> {
        self.focus
    }

    /// Viewport scroll offset
    #[must_use]
    pub const fn scroll_offset(&self) -> Point {
        self.scroll
    }

    /// Viewport rectangle in document coordinates
    #[must_use]
    pub fn viewport(&self) -> BoundingBox {
        BoundingBox::new(self.scroll.x, self.scroll.y, self.viewport.0, self.viewport.1)
    }

    /// Keys pressed so far, as `Modifier+Key` strings
    #[must_use]
    pub fn pressed_keys(&self) -> &[String] {
        &self.key_log
    }

    /// True when the node is reachable from the current document element
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            if n == self.root {
                return true;
            }
            cursor = self.node(n).and_then(|m| m.parent);
        }
        false
    }

    fn ancestors_or_self(&self, node: NodeId) -> impl Iterator<Item = &MockNode> {
        let mut cursor = self.node(node);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = current.parent.and_then(|p| self.node(p));
            Some(current)
        })
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        self.is_attached(node) && !self.ancestors_or_self(node).any(|n| n.style.display_none)
    }

    /// Attached, rendered, not `visibility: hidden`, with a non-empty box
    #[must_use]
    pub fn is_visible(&self, node: NodeId) -> bool {
        self.is_rendered(node)
            && !self.ancestors_or_self(node).any(|n| n.style.visibility_hidden)
            && self.rect(node).is_some_and(|r| !r.is_empty())
    }

    fn is_enabled(&self, node: NodeId) -> bool {
        self.attribute(node, "disabled").is_none()
    }

    fn is_editable(&self, node: NodeId) -> bool {
        self.node(node)
            .is_some_and(|n| matches!(n.tag.as_str(), "input" | "textarea"))
            && self.is_enabled(node)
            && self.attribute(node, "readonly").is_none()
    }

    fn is_focusable(&self, node: NodeId) -> bool {
        let Some(n) = self.node(node) else {
            return false;
        };
        let focusable_tag = match n.tag.as_str() {
            "input" | "textarea" | "button" | "select" => true,
            "a" => n.attributes.contains_key("href"),
            _ => false,
        };
        (focusable_tag || n.attributes.contains_key("tabindex")) && self.is_enabled(node)
    }

    fn document_order(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(n) = self.node(id) {
                stack.extend(n.children.iter().rev());
            }
        }
        out
    }

    /// Observable state of a node
    pub fn state(&self, node: NodeId) -> ProbeResult<NodeState> {
        if !self.is_attached(node) {
            return Err(self.stale(node));
        }
        let n = self.node(node).ok_or_else(|| self.stale(node))?;
        let bounding_box = if self.is_rendered(node) { n.rect } else { None };
        let viewport = self.viewport();
        Ok(NodeState {
            tag: n.tag.clone(),
            attached: true,
            visible: self.is_visible(node),
            enabled: self.is_enabled(node),
            editable: self.is_editable(node),
            focused: self.focus == Some(node),
            text: self.text_content(node),
            value: n.value.clone(),
            attributes: n.attributes.clone(),
            bounding_box,
            in_viewport: bounding_box.is_some_and(|r| viewport.encloses(&r)),
        })
    }

    /// Flattened, document-ordered descendants of `scope` (or the document)
    pub fn snapshot(&self, scope: Option<NodeId>) -> ProbeResult<DomSnapshot> {
        let (start, include_start) = match scope {
            Some(s) if !self.is_attached(s) => return Err(self.stale(s)),
            Some(s) => (s, false),
            None => (self.root, true),
        };
        let order = self.document_order(start);
        // descendants precede their ancestors in reverse document order
        let mut texts: HashMap<NodeId, String> = HashMap::with_capacity(order.len());
        for &id in order.iter().rev() {
            let Some(n) = self.node(id) else { continue };
            let mut text = n.text.clone();
            for child in &n.children {
                if let Some(child_text) = texts.get(child) {
                    text.push_str(child_text);
                }
            }
            texts.insert(id, text);
        }
        let mut index_of: HashMap<NodeId, usize> = HashMap::new();
        let mut nodes = Vec::with_capacity(order.len());
        for id in order {
            if id == start && !include_start {
                continue;
            }
            let Some(n) = self.node(id) else { continue };
            index_of.insert(id, nodes.len());
            nodes.push(SnapshotNode {
                node: id,
                parent: n.parent.and_then(|p| index_of.get(&p).copied()),
                tag: n.tag.clone(),
                attributes: n.attributes.clone(),
                text: texts.remove(&id).unwrap_or_default(),
            });
        }
        Ok(DomSnapshot { nodes })
    }

    fn effective_z(&self, node: NodeId) -> i32 {
        self.ancestors_or_self(node)
            .find_map(|n| n.style.z_index)
            .unwrap_or(0)
    }

    /// Topmost visible node receiving pointer events at `point`
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        if !self.viewport().contains(&point) {
            return None;
        }
        self.document_order(self.root)
            .into_iter()
            .enumerate()
            .filter(|(_, id)| {
                self.is_visible(*id)
                    && !self.ancestors_or_self(*id).any(|n| n.style.pointer_events_none)
                    && self.rect(*id).is_some_and(|r| r.contains(&point))
            })
            .max_by_key(|(order, id)| (self.effective_z(*id), *order))
            .map(|(_, id)| id)
    }

    /// True when `node` is `ancestor` or below it
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            if n == ancestor {
                return true;
            }
            cursor = self.node(n).and_then(|m| m.parent);
        }
        false
    }

    /// Current selection text
    #[must_use]
    pub fn selected_text(&self) -> String {
        match self.selection {
            Selection::None => String::new(),
            Selection::Control(node) => self.value(node).unwrap_or("").to_string(),
            Selection::Document => self.text_content(self.body),
        }
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    fn focus_from(&mut self, node: Option<NodeId>) {
        self.focus = node.and_then(|n| {
            let mut cursor = Some(n);
            while let Some(c) = cursor {
                if self.is_focusable(c) {
                    return Some(c);
                }
                cursor = self.node(c).and_then(|m| m.parent);
            }
            None
        });
        if let Selection::Control(n) = self.selection {
            if self.focus != Some(n) {
                self.selection = Selection::None;
            }
        }
    }

    fn hover(&mut self, node: Option<NodeId>) {
        if self.hovered != node {
            self.hovered = node;
            if let Some(n) = node {
                self.fire(MockEvent::MouseOver, n);
            }
        }
    }

    fn insert_text(&mut self, text: &str) {
        let Some(target) = self.focus.filter(|f| self.is_editable(*f)) else {
            return;
        };
        let replace = self.selection == Selection::Control(target);
        let current = self.value(target).unwrap_or("").to_string();
        let next = if replace {
            text.to_string()
        } else {
            current + text
        };
        self.set_value(target, &next);
    }

    /// Deliver raw input
    pub fn dispatch(&mut self, event: InputEvent) {
        match event {
            InputEvent::MouseMove { point } => {
                let hit = self.hit_test(point);
                self.hover(hit);
            }
            InputEvent::MouseDown { point, .. } => {
                let hit = self.hit_test(point);
                self.pressed = hit;
                self.focus_from(hit);
            }
            InputEvent::MouseUp {
                point, click_count, ..
            } => {
                let hit = self.hit_test(point);
                if let (Some(up), Some(down)) = (hit, self.pressed.take()) {
                    if self.contains(down, up) || self.contains(up, down) {
                        self.fire(MockEvent::Click, up);
                        if click_count == 2 {
                            self.fire(MockEvent::DoubleClick, up);
                        }
                    }
                }
            }
            InputEvent::Wheel {
                delta_x, delta_y, ..
            } => {
                self.scroll.x = (self.scroll.x + delta_x).max(0.0);
                self.scroll.y = (self.scroll.y + delta_y).max(0.0);
            }
            InputEvent::KeyDown {
                key,
                modifiers,
                command,
            } => {
                let mut name = String::new();
                for (held, label) in [
                    (modifiers.control, "Control+"),
                    (modifiers.alt, "Alt+"),
                    (modifiers.meta, "Meta+"),
                    (modifiers.shift, "Shift+"),
                ] {
                    if held {
                        name.push_str(label);
                    }
                }
                name.push_str(&key);
                self.key_log.push(name);
                self.key_down(&key, modifiers.control || modifiers.meta || modifiers.alt, command);
            }
            InputEvent::KeyUp { .. } => {}
            InputEvent::InsertText { text } => self.insert_text(&text),
        }
    }

    fn key_down(&mut self, key: &str, chorded: bool, command: Option<EditCommand>) {
        match command {
            Some(EditCommand::SelectAll) => {
                self.selection = match self.focus.filter(|f| self.value(*f).is_some()) {
                    Some(control) => Selection::Control(control),
                    None => Selection::Document,
                };
            }
            Some(EditCommand::Cut) => {
                if let Selection::Control(control) = self.selection {
                    self.set_value(control, "");
                }
            }
            Some(EditCommand::Copy | EditCommand::Paste) => {}
            None if !chorded => match key {
                "Backspace" => {
                    if let Some(target) = self.focus.filter(|f| self.is_editable(*f)) {
                        let mut value = self.value(target).unwrap_or("").to_string();
                        if self.selection == Selection::Control(target) {
                            value.clear();
                        } else {
                            value.pop();
                        }
                        self.set_value(target, &value);
                    }
                }
                k if k.chars().count() == 1 => self.insert_text(k),
                _ => {}
            },
            None => {}
        }
    }

    /// Apply a command to the node itself, bypassing hit testing
    pub fn apply(&mut self, node: NodeId, command: NodeCommand) -> ProbeResult<()> {
        if !self.is_attached(node) {
            return Err(self.stale(node));
        }
        match command {
            NodeCommand::Focus => {
                if self.is_focusable(node) {
                    self.focus_from(Some(node));
                }
            }
            NodeCommand::ScrollIntoView => {
                if let Some(rect) = self.rect(node) {
                    let viewport = self.viewport();
                    if !viewport.encloses(&rect) {
                        self.scroll.x = (rect.x - (viewport.width - rect.width) / 2.0).max(0.0);
                        self.scroll.y = (rect.y - (viewport.height - rect.height) / 2.0).max(0.0);
                    }
                }
            }
            NodeCommand::SetValue(value) => {
                if self.value(node).is_none() {
                    return Err(ProbeError::page(format!(
                        "node {node} is not a form control"
                    )));
                }
                self.set_value(node, &value);
            }
            NodeCommand::Click => {
                self.focus_from(Some(node));
                self.fire(MockEvent::Click, node);
            }
            NodeCommand::DoubleClick => {
                self.focus_from(Some(node));
                self.fire(MockEvent::Click, node);
                self.fire(MockEvent::Click, node);
                self.fire(MockEvent::DoubleClick, node);
            }
            NodeCommand::Hover => self.hover(Some(node)),
        }
        Ok(())
    }
}

/// Path part of a URL, without trailing slash (`/` for the root)
fn route_key(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| {
        rest.find('/').map_or("/", |i| &rest[i..])
    });
    let path = without_scheme.split(['?', '#']).next().unwrap_or("/");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::MouseButton;

    fn click_at(dom: &mut MockDom, point: Point) {
        for event in [
            InputEvent::MouseDown {
                point,
                button: MouseButton::Left,
                click_count: 1,
            },
            InputEvent::MouseUp {
                point,
                button: MouseButton::Left,
                click_count: 1,
            },
        ] {
            dom.dispatch(event);
        }
    }

    mod route_tests {
        use super::*;

        #[test]
        fn test_route_key() {
            assert_eq!(route_key("http://example.test"), "/");
            assert_eq!(route_key("http://example.test/ajax/?x=1"), "/ajax");
            assert_eq!(route_key("ajax"), "/ajax");
            assert_eq!(route_key("/"), "/");
        }

        #[test]
        fn test_load_detaches_previous_document() {
            let mut dom = MockDom::new();
            dom.route("/", |d| {
                let body = d.body();
                d.element(body, "button", &[("id", "b")], "Go");
            });
            dom.load("http://example.test/").unwrap();
            let old = dom.by_id("b").unwrap();
            dom.load("/").unwrap();
            assert!(!dom.is_attached(old));
            assert!(dom.by_id("b").is_some_and(|n| n != old));
            assert!(matches!(
                dom.load("/missing"),
                Err(ProbeError::Navigation { .. })
            ));
        }
    }

    mod visibility_tests {
        use super::*;

        #[test]
        fn test_style_rules() {
            let mut dom = MockDom::new();
            let body = dom.body();
            let hidden = dom.element(body, "div", &[("style", "display: none;")], "");
            let child = dom.element(hidden, "span", &[], "x");
            let invisible = dom.element(body, "b", &[("style", "visibility: hidden;")], "");
            let transparent = dom.element(body, "i", &[("style", "opacity: 0;")], "");
            let zero = dom.element(body, "p", &[], "");
            dom.set_rect(zero, BoundingBox::new(0.0, 0.0, 0.0, 30.0));

            assert!(!dom.is_visible(hidden));
            assert!(!dom.is_visible(child));
            assert!(!dom.is_visible(invisible));
            assert!(dom.is_visible(transparent));
            assert!(!dom.is_visible(zero));
            assert!(dom.state(child).unwrap().bounding_box.is_none());
        }

        #[test]
        fn test_detached_state_is_stale() {
            let mut dom = MockDom::new();
            let body = dom.body();
            let node = dom.element(body, "div", &[], "gone");
            dom.remove(node);
            assert!(dom.state(node).unwrap_err().is_stale());
            assert!(dom.snapshot(Some(node)).unwrap_err().is_stale());
        }
    }

    mod input_tests {
        use super::*;

        #[test]
        fn test_hit_test_prefers_higher_z() {
            let mut dom = MockDom::new();
            let body = dom.body();
            let below = dom.element(body, "input", &[("id", "name")], "");
            let rect = dom.rect(below).unwrap();
            let cover = dom.element(body, "div", &[("style", "z-index: 2")], "");
            dom.set_rect(cover, rect);
            assert_eq!(dom.hit_test(rect.center()), Some(cover));
            dom.style_mut(cover).unwrap().pointer_events_none = true;
            assert_eq!(dom.hit_test(rect.center()), Some(below));
        }

        #[test]
        fn test_click_fires_bubbling_handlers_and_focuses() {
            let mut dom = MockDom::new();
            let body = dom.body();
            let button = dom.element(body, "button", &[("id", "b")], "Go");
            dom.on(body, MockEvent::Click, |d, target| {
                d.set_attribute(target, "data-clicked", "yes");
            });
            let center = dom.rect(button).unwrap().center();
            click_at(&mut dom, center);
            assert_eq!(dom.attribute(button, "data-clicked"), Some("yes"));
            assert_eq!(dom.focused(), Some(button));
        }

        #[test]
        fn test_select_all_then_insert_replaces() {
            let mut dom = MockDom::new();
            let body = dom.body();
            let input = dom.element(body, "input", &[("value", "old")], "");
            dom.apply(input, NodeCommand::Focus).unwrap();
            dom.dispatch(InputEvent::KeyDown {
                key: "a".into(),
                modifiers: crate::driver::Modifiers::CONTROL,
                command: Some(EditCommand::SelectAll),
            });
            assert_eq!(dom.selected_text(), "old");
            dom.dispatch(InputEvent::InsertText { text: "new".into() });
            assert_eq!(dom.value(input), Some("new"));
            assert_eq!(dom.pressed_keys(), ["Control+a"]);
        }

        #[test]
        fn test_scroll_into_view() {
            let mut dom = MockDom::new();
            let body = dom.body();
            let far = dom.element(body, "button", &[], "far");
            dom.set_rect(far, BoundingBox::new(100.0, 2000.0, 80.0, 30.0));
            assert!(!dom.state(far).unwrap().in_viewport);
            dom.apply(far, NodeCommand::ScrollIntoView).unwrap();
            assert!(dom.state(far).unwrap().in_viewport);
        }
    }

    mod schedule_tests {
        use super::*;

        fn tick(dom: &mut MockDom) {
            dom.after(Duration::from_millis(500), |d| {
                let body = d.body();
                let n: u32 = d.attribute(body, "data-ticks").and_then(|v| v.parse().ok()).unwrap_or(0);
                d.set_attribute(body, "data-ticks", &(n + 1).to_string());
                tick(d);
            });
        }

        #[tokio::test(start_paused = true)]
        async fn test_chained_timers_do_not_drift() {
            let mut dom = MockDom::new();
            tick(&mut dom);
            tokio::time::sleep(Duration::from_millis(1_600)).await;
            dom.settle();
            let body = dom.body();
            assert_eq!(dom.attribute(body, "data-ticks"), Some("3"));
        }

        #[test]
        fn test_by_attribute_first_in_document_order() {
            let mut dom = MockDom::new();
            let body = dom.body();
            let first = dom.element(body, "input", &[("name", "UserName")], "");
            dom.element(body, "input", &[("name", "UserName")], "");
            assert_eq!(dom.by_attribute("name", "UserName"), Some(first));
            assert_eq!(dom.by_attribute("name", "Password"), None);
        }
    }

    mod navigation_tests {
        use super::*;

        fn site(dom: &mut MockDom) {
            dom.route("/", |d| {
                let body = d.body();
                let panel = d.element(body, "div", &[("id", "panel")], "Hello ");
                let button = d.element(panel, "button", &[], "World");
                d.element(button, "span", &[], "!");
                d.on(button, MockEvent::Click, |d, target| d.set_text(target, "Clicked"));
            });
        }

        #[test]
        fn test_reload_drops_old_handlers() {
            let mut dom = MockDom::new();
            site(&mut dom);
            for _ in 0..5 {
                dom.load("/").unwrap();
            }
            assert_eq!(dom.handlers.len(), 1);
        }

        #[test]
        fn test_snapshot_text_matches_text_content() {
            let mut dom = MockDom::new();
            site(&mut dom);
            dom.load("/").unwrap();
            let snapshot = dom.snapshot(None).unwrap();
            for node in &snapshot.nodes {
                assert_eq!(node.text, dom.text_content(node.node), "{}", node.tag);
            }
            let panel = dom.by_id("panel").unwrap();
            let scoped = dom.snapshot(Some(panel)).unwrap();
            let texts: Vec<&str> = scoped.nodes.iter().map(|n| n.text.as_str()).collect();
            assert_eq!(texts, vec!["World!", "!"]);
        }
    }
}
