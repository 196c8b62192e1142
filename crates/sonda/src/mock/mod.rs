//! In-memory page for deterministic tests.
//!
//! `MockPage` implements [`PageContext`] over a [`MockDom`]. Delays are
//! scheduled on the tokio clock, so a test running with paused time can
//! simulate a fifteen-second AJAX response without waiting for it.
//!
//! ```ignore
//! let page = MockPage::with_site(|dom| {
//!     dom.route("/", |d| {
//!         let body = d.body();
//!         d.element(body, "button", &[("id", "go")], "Go");
//!     });
//! });
//! page.navigate("/").await?;
//! ```

mod dom;

pub use dom::{Handler, MockDom, MockEvent, RouteBuilder, Style, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};

use crate::driver::{
    DomSnapshot, InputEvent, NodeCommand, NodeId, NodeState, PageContext, PageFactory, Point,
};
use crate::result::ProbeResult;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock page for unit testing
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    dom: Arc<Mutex<MockDom>>,
}

impl MockPage {
    /// Empty page with no routes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Page whose routes are installed by `install`
    #[must_use]
    pub fn with_site(install: impl FnOnce(&mut MockDom)) -> Self {
        let page = Self::new();
        install(&mut page.lock());
        page
    }

    fn lock(&self) -> MutexGuard<'_, MockDom> {
        self.dom.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the document after applying due mutations
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut MockDom) -> R) -> R {
        let mut dom = self.lock();
        dom.settle();
        f(&mut dom)
    }
}

#[async_trait]
impl PageContext for MockPage {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        self.with_dom(|dom| dom.load(url))
    }

    async fn is_ready(&self) -> ProbeResult<bool> {
        Ok(self.with_dom(|dom| dom.is_ready()))
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.with_dom(|dom| dom.url().to_string()))
    }

    async fn snapshot(&self, scope: Option<NodeId>) -> ProbeResult<DomSnapshot> {
        self.with_dom(|dom| dom.snapshot(scope))
    }

    async fn node_state(&self, node: NodeId) -> ProbeResult<NodeState> {
        self.with_dom(|dom| dom.state(node))
    }

    async fn hit_test(&self, point: Point) -> ProbeResult<Option<NodeId>> {
        Ok(self.with_dom(|dom| dom.hit_test(point)))
    }

    async fn contains(&self, ancestor: NodeId, node: NodeId) -> ProbeResult<bool> {
        Ok(self.with_dom(|dom| dom.contains(ancestor, node)))
    }

    async fn dispatch_input(&self, event: InputEvent) -> ProbeResult<()> {
        self.with_dom(|dom| dom.dispatch(event));
        Ok(())
    }

    async fn apply(&self, node: NodeId, command: NodeCommand) -> ProbeResult<()> {
        self.with_dom(|dom| dom.apply(node, command))
    }

    async fn selected_text(&self) -> ProbeResult<String> {
        Ok(self.with_dom(|dom| dom.selected_text()))
    }
}

/// Produces independent mock pages sharing one site definition
#[derive(Clone)]
pub struct MockPageFactory {
    install: Arc<dyn Fn(&mut MockDom) + Send + Sync>,
}

impl std::fmt::Debug for MockPageFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPageFactory").finish_non_exhaustive()
    }
}

impl MockPageFactory {
    /// Create a factory that installs the same routes on every page
    #[must_use]
    pub fn new(install: impl Fn(&mut MockDom) + Send + Sync + 'static) -> Self {
        Self {
            install: Arc::new(install),
        }
    }
}

#[async_trait]
impl PageFactory for MockPageFactory {
    async fn new_page(&self) -> ProbeResult<Arc<dyn PageContext>> {
        let install = Arc::clone(&self.install);
        Ok(Arc::new(MockPage::with_site(|dom| install(dom))))
    }
}
