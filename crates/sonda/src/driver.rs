//! PageContext - Abstract Page Trait
//!
//! Sonda never owns a browser. A page (or document) context is supplied by
//! whatever manages the browser session, and the engine talks to it through
//! [`PageContext`]. That keeps the engine testable against [`crate::MockPage`]
//! and lets the Chromium adapter (`browser` feature) be swapped out.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  PageContext (Abstract Trait)                                  │
//! ├────────────────────────────────────────────────────────────────┤
//! │   ┌──────────────────┐   ┌──────────────────┐                  │
//! │   │  CdpPage         │   │  MockPage        │                  │
//! │   │  (chromiumoxide) │   │  (unit tests)    │                  │
//! │   └──────────────────┘   └──────────────────┘                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use crate::keyboard::EditCommand;
use crate::result::ProbeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of a concrete node, unique for the lifetime of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in CSS pixels, relative to the document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box for an element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the center point
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if a point is inside this bounding box
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// True when the box has no area
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when `inner` lies entirely inside this box
    #[must_use]
    pub fn encloses(&self, inner: &Self) -> bool {
        inner.x >= self.x
            && inner.y >= self.y
            && inner.x + inner.width <= self.x + self.width
            && inner.y + inner.height <= self.y + self.height
    }
}

/// Transient reference to a concrete node.
///
/// Valid only for the poll iteration or interaction that resolved it. Callers
/// keep the [`crate::Selector`], never the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Node identifier
    pub node: NodeId,
    /// Element tag name (lowercase)
    pub tag: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(node: NodeId, tag: impl Into<String>) -> Self {
        Self {
            node,
            tag: tag.into(),
        }
    }
}

/// Observable state of a node at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// Element tag name (lowercase)
    pub tag: String,
    /// Still part of the document
    pub attached: bool,
    /// Non-empty box and not hidden by display/visibility
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Accepts text input
    pub editable: bool,
    /// Has keyboard focus
    pub focused: bool,
    /// Text content
    pub text: String,
    /// Form control value, if the element has one
    pub value: Option<String>,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// Layout box, when rendered
    pub bounding_box: Option<BoundingBox>,
    /// Box lies entirely inside the viewport
    pub in_viewport: bool,
}

impl NodeState {
    /// Attribute value by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whitespace-separated class tokens
    pub fn class_tokens(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_whitespace()
    }

    /// Short description for diagnostics, e.g. `button#blueButton`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.tag.clone();
        if let Some(id) = self.attribute("id") {
            out.push('#');
            out.push_str(id);
        }
        for token in self.class_tokens() {
            out.push('.');
            out.push_str(token);
        }
        out
    }
}

/// One node of a [`DomSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Node identifier
    pub node: NodeId,
    /// Index of the parent within the snapshot (None for top-level nodes)
    pub parent: Option<usize>,
    /// Element tag name (lowercase)
    pub tag: String,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// Full text content of the subtree
    pub text: String,
}

impl SnapshotNode {
    /// Attribute value by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Document-ordered view of a subtree, taken at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    /// Nodes in document order; parents always precede their children
    pub nodes: Vec<SnapshotNode>,
}

impl DomSnapshot {
    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the snapshot has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handle for the node at `index`
    #[must_use]
    pub fn handle(&self, index: usize) -> Option<ElementHandle> {
        self.nodes
            .get(index)
            .map(|n| ElementHandle::new(n.node, n.tag.clone()))
    }
}

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseButton {
    /// Primary button
    #[default]
    Left,
    /// Secondary button
    Right,
    /// Middle button
    Middle,
}

/// Keyboard modifier set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    /// Alt / Option
    pub alt: bool,
    /// Control
    pub control: bool,
    /// Meta / Command
    pub meta: bool,
    /// Shift
    pub shift: bool,
}

impl Modifiers {
    /// No modifiers
    pub const NONE: Self = Self {
        alt: false,
        control: false,
        meta: false,
        shift: false,
    };

    /// Only control
    pub const CONTROL: Self = Self {
        control: true,
        ..Self::NONE
    };

    /// Only meta
    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };

    /// True when no modifier is held
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.alt || self.control || self.meta || self.shift)
    }

    /// CDP `Input.dispatchKeyEvent` modifier bit field
    #[must_use]
    pub const fn bits(&self) -> i64 {
        (self.alt as i64)
            | ((self.control as i64) << 1)
            | ((self.meta as i64) << 2)
            | ((self.shift as i64) << 3)
    }
}

/// Raw input delivered to the page at coordinates or to the focused element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Pointer moved
    MouseMove {
        /// Target point
        point: Point,
    },
    /// Button pressed
    MouseDown {
        /// Target point
        point: Point,
        /// Button
        button: MouseButton,
        /// 1 for a click, 2 for the second press of a double-click
        click_count: u32,
    },
    /// Button released
    MouseUp {
        /// Target point
        point: Point,
        /// Button
        button: MouseButton,
        /// 1 for a click, 2 for the second release of a double-click
        click_count: u32,
    },
    /// Mouse wheel
    Wheel {
        /// Pointer location
        point: Point,
        /// Horizontal delta
        delta_x: f64,
        /// Vertical delta
        delta_y: f64,
    },
    /// Key pressed
    KeyDown {
        /// Key name (`a`, `Enter`, ...)
        key: String,
        /// Held modifiers
        modifiers: Modifiers,
        /// Logical editing request resolved from the chord
        command: Option<EditCommand>,
    },
    /// Key released
    KeyUp {
        /// Key name
        key: String,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// Text typed into the focused element
    InsertText {
        /// Text
        text: String,
    },
}

/// Command applied directly to a node, without hit testing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCommand {
    /// Move keyboard focus to the node
    Focus,
    /// Scroll the viewport until the node is in view
    ScrollIntoView,
    /// Replace the value of a form control
    SetValue(String),
    /// Dispatch a click on the node itself
    Click,
    /// Dispatch a double-click on the node itself
    DoubleClick,
    /// Dispatch hover events on the node itself
    Hover,
}

/// Abstract page trait for UI probing
///
/// # Implementations
///
/// - `CdpPage` - Chromium via chromiumoxide (`browser` feature)
/// - `MockPage` - In-memory document for unit testing
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Navigate to URL
    async fn navigate(&self, url: &str) -> ProbeResult<()>;

    /// True once the document has finished loading
    async fn is_ready(&self) -> ProbeResult<bool>;

    /// Current URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Snapshot of the descendants of `scope`, or of the whole document.
    ///
    /// A detached scope fails with [`crate::ProbeError::StaleElement`].
    async fn snapshot(&self, scope: Option<NodeId>) -> ProbeResult<DomSnapshot>;

    /// Current state of a node; detached nodes fail as stale
    async fn node_state(&self, node: NodeId) -> ProbeResult<NodeState>;

    /// Topmost node receiving pointer events at `point`
    async fn hit_test(&self, point: Point) -> ProbeResult<Option<NodeId>>;

    /// True when `node` is `ancestor` or one of its descendants
    async fn contains(&self, ancestor: NodeId, node: NodeId) -> ProbeResult<bool>;

    /// Dispatch raw input
    async fn dispatch_input(&self, event: InputEvent) -> ProbeResult<()>;

    /// Apply a command directly to a node
    async fn apply(&self, node: NodeId, command: NodeCommand) -> ProbeResult<()>;

    /// Currently selected text (document selection or focused control)
    async fn selected_text(&self) -> ProbeResult<String>;
}

/// Produces independent pages, one per concurrently running scenario
#[async_trait]
pub trait PageFactory: Send + Sync {
    /// Open a fresh page
    async fn new_page(&self) -> ProbeResult<Arc<dyn PageContext>>;
}
