//! Chromium page context over the Chrome `DevTools` Protocol.
//!
//! With the `browser` feature this module launches Chromium through
//! chromiumoxide and adapts each tab to [`PageContext`]. Without the feature
//! only [`BrowserConfig`] is available and [`launch_page_factory`] reports
//! that browser support was not compiled in.

use crate::driver::PageFactory;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a window
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation)]
mod cdp {
    use super::*;
    use crate::driver::{
        DomSnapshot, InputEvent, MouseButton, NodeCommand, NodeId, NodeState, PageContext, Point,
        SnapshotNode,
    };
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
        DispatchMouseEventType, InsertTextParams, MouseButton as CdpMouseButton,
    };
    use chromiumoxide::handler::viewport::Viewport;
    use chromiumoxide::page::Page;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;
    use tracing::{debug, warn};

    /// Node registry installed once per document.
    ///
    /// Ids start from a time-derived base so an id minted in a previous
    /// document never names a node of the current one.
    const REGISTRY: &str = r"
if (!window.__sonda) {
  window.__sonda = {
    next: Date.now() * 1000 + Math.floor(Math.random() * 1000),
    ids: new WeakMap(),
    nodes: new Map(),
    id(el) {
      let id = this.ids.get(el);
      if (id === undefined) {
        id = this.next++;
        this.ids.set(el, id);
        this.nodes.set(id, new WeakRef(el));
      }
      return id;
    },
    get(id) {
      const ref = this.nodes.get(id);
      const el = ref && ref.deref();
      return el && el.isConnected ? el : null;
    },
    kids(el) {
      return el.shadowRoot ? [...el.shadowRoot.children, ...el.children] : [...el.children];
    },
    host(el) {
      return el.parentElement || (el.parentNode && el.parentNode.host) || null;
    },
    deepActive() {
      let el = document.activeElement;
      while (el && el.shadowRoot && el.shadowRoot.activeElement) el = el.shadowRoot.activeElement;
      return el;
    },
    attrs(el) {
      const out = {};
      for (const a of el.attributes) out[a.name] = a.value;
      return out;
    },
  };
}
const s = window.__sonda;
";

    const SNAPSHOT: &str = r"
let roots;
if (args.scope === null) {
  roots = [document.documentElement];
} else {
  const scope = s.get(args.scope);
  if (!scope) return null;
  roots = s.kids(scope);
}
const out = [];
const walk = (el, parent) => {
  const index = out.length;
  out.push({ node: s.id(el), parent, tag: el.tagName.toLowerCase(), attributes: s.attrs(el), text: el.textContent || '' });
  for (const child of s.kids(el)) walk(child, index);
};
for (const root of roots) walk(root, null);
return out;
";

    const NODE_STATE: &str = r"
const el = s.get(args.node);
if (!el) return null;
const style = getComputedStyle(el);
const r = el.getBoundingClientRect();
const rendered = style.display !== 'none' && r.width > 0 && r.height > 0;
const tag = el.tagName.toLowerCase();
const control = tag === 'input' || tag === 'textarea' || tag === 'select';
const box = rendered ? { x: r.x, y: r.y, width: r.width, height: r.height } : null;
return {
  tag,
  attached: true,
  visible: rendered && style.visibility !== 'hidden',
  enabled: !el.disabled,
  editable: el.isContentEditable || ((tag === 'input' || tag === 'textarea') && !el.readOnly && !el.disabled),
  focused: s.deepActive() === el,
  text: el.textContent || '',
  value: control ? el.value : null,
  attributes: s.attrs(el),
  bounding_box: box,
  in_viewport: !!box && r.x >= 0 && r.y >= 0 && r.right <= innerWidth && r.bottom <= innerHeight,
};
";

    const HIT_TEST: &str = r"
let el = document.elementFromPoint(args.x, args.y);
while (el && el.shadowRoot) {
  const inner = el.shadowRoot.elementFromPoint(args.x, args.y);
  if (!inner || inner === el) break;
  el = inner;
}
return el ? s.id(el) : null;
";

    const CONTAINS: &str = r"
const ancestor = s.get(args.ancestor);
let el = s.get(args.node);
if (!ancestor || !el) return false;
while (el) {
  if (el === ancestor) return true;
  el = s.host(el);
}
return false;
";

    const APPLY: &str = r"
const el = s.get(args.node);
if (!el) return false;
const cmd = args.command;
if (cmd === 'Focus') el.focus();
else if (cmd === 'ScrollIntoView') el.scrollIntoView({ block: 'center', inline: 'center' });
else if (cmd === 'Click') el.click();
else if (cmd === 'DoubleClick') {
  el.click();
  el.click();
  el.dispatchEvent(new MouseEvent('dblclick', { bubbles: true, cancelable: true, detail: 2 }));
} else if (cmd === 'Hover') {
  el.dispatchEvent(new MouseEvent('mouseover', { bubbles: true }));
  el.dispatchEvent(new MouseEvent('mouseenter', { bubbles: false }));
} else if (cmd.SetValue !== undefined) {
  el.value = cmd.SetValue;
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
}
return true;
";

    const SELECTED_TEXT: &str = r"
const el = s.deepActive();
if (el && typeof el.selectionStart === 'number' && el.value !== undefined) {
  return el.value.substring(el.selectionStart, el.selectionEnd);
}
return String(getSelection());
";

    fn page_error(e: impl std::fmt::Display) -> ProbeError {
        ProbeError::page(e.to_string())
    }

    /// Running Chromium instance
    #[derive(Debug)]
    pub struct Browser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Browser {
        /// Launch Chromium
        pub async fn launch(config: BrowserConfig) -> ProbeResult<Self> {
            let mut builder = CdpConfig::builder().viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                ..Viewport::default()
            });
            if !config.headless {
                builder = builder.with_head();
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }
            let cdp_config = builder
                .build()
                .map_err(|message| ProbeError::BrowserLaunch { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| ProbeError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        warn!(error = %e, "CDP handler stopped");
                        break;
                    }
                }
            });
            debug!(headless = config.headless, "browser launched");

            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Open a new tab
        pub async fn new_page(&self) -> ProbeResult<CdpPage> {
            let browser = self.inner.lock().await;
            let page = browser.new_page("about:blank").await.map_err(page_error)?;
            Ok(CdpPage { page })
        }

        /// Configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser and stop the handler task
        pub async fn close(self) -> ProbeResult<()> {
            let mut browser = self.inner.lock().await;
            browser.close().await.map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;
            self.handle.abort();
            Ok(())
        }
    }

    /// One Chromium tab.
    ///
    /// Coordinates are CSS pixels relative to the viewport, which is what
    /// both `elementFromPoint` and `Input.dispatchMouseEvent` expect.
    #[derive(Debug)]
    pub struct CdpPage {
        page: Page,
    }

    impl CdpPage {
        /// Wrap an existing chromiumoxide page
        #[must_use]
        pub const fn new(page: Page) -> Self {
            Self { page }
        }

        async fn call<T: DeserializeOwned>(&self, body: &str, args: Value) -> ProbeResult<T> {
            let script = format!(
                "(() => {{ {REGISTRY} const args = {args}; return JSON.stringify((() => {{ {body} }})()); }})()"
            );
            let raw: String = self
                .page
                .evaluate(script)
                .await
                .map_err(page_error)?
                .into_value()
                .map_err(page_error)?;
            Ok(serde_json::from_str(&raw)?)
        }

        async fn mouse(
            &self,
            kind: DispatchMouseEventType,
            point: Point,
            button: Option<MouseButton>,
            click_count: u32,
        ) -> ProbeResult<()> {
            let mut params = DispatchMouseEventParams::builder()
                .r#type(kind)
                .x(point.x)
                .y(point.y);
            if let Some(button) = button {
                params = params
                    .button(match button {
                        MouseButton::Left => CdpMouseButton::Left,
                        MouseButton::Right => CdpMouseButton::Right,
                        MouseButton::Middle => CdpMouseButton::Middle,
                    })
                    .click_count(i64::from(click_count));
            }
            let params = params.build().map_err(page_error)?;
            self.page.execute(params).await.map_err(page_error)?;
            Ok(())
        }
    }

    #[async_trait]
    impl PageContext for CdpPage {
        async fn navigate(&self, url: &str) -> ProbeResult<()> {
            self.page
                .goto(url)
                .await
                .map_err(|e| ProbeError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn is_ready(&self) -> ProbeResult<bool> {
            self.call("return document.readyState === 'complete';", Value::Null)
                .await
        }

        async fn current_url(&self) -> ProbeResult<String> {
            Ok(self
                .page
                .url()
                .await
                .map_err(page_error)?
                .unwrap_or_default())
        }

        async fn snapshot(&self, scope: Option<NodeId>) -> ProbeResult<DomSnapshot> {
            let nodes: Option<Vec<SnapshotNode>> = self
                .call(SNAPSHOT, json!({ "scope": scope.map(|n| n.0) }))
                .await?;
            match (nodes, scope) {
                (Some(nodes), _) => Ok(DomSnapshot { nodes }),
                (None, Some(scope)) => Err(ProbeError::StaleElement {
                    selector: "scope".into(),
                    node: scope.0,
                }),
                (None, None) => Err(ProbeError::page("document has no root element")),
            }
        }

        async fn node_state(&self, node: NodeId) -> ProbeResult<NodeState> {
            let state: Option<NodeState> = self.call(NODE_STATE, json!({ "node": node.0 })).await?;
            state.ok_or_else(|| ProbeError::StaleElement {
                selector: format!("node {node}"),
                node: node.0,
            })
        }

        async fn hit_test(&self, point: Point) -> ProbeResult<Option<NodeId>> {
            let id: Option<u64> = self
                .call(HIT_TEST, json!({ "x": point.x, "y": point.y }))
                .await?;
            Ok(id.map(NodeId))
        }

        async fn contains(&self, ancestor: NodeId, node: NodeId) -> ProbeResult<bool> {
            self.call(CONTAINS, json!({ "ancestor": ancestor.0, "node": node.0 }))
                .await
        }

        async fn dispatch_input(&self, event: InputEvent) -> ProbeResult<()> {
            match event {
                InputEvent::MouseMove { point } => {
                    self.mouse(DispatchMouseEventType::MouseMoved, point, None, 0)
                        .await
                }
                InputEvent::MouseDown {
                    point,
                    button,
                    click_count,
                } => {
                    self.mouse(
                        DispatchMouseEventType::MousePressed,
                        point,
                        Some(button),
                        click_count,
                    )
                    .await
                }
                InputEvent::MouseUp {
                    point,
                    button,
                    click_count,
                } => {
                    self.mouse(
                        DispatchMouseEventType::MouseReleased,
                        point,
                        Some(button),
                        click_count,
                    )
                    .await
                }
                InputEvent::Wheel {
                    point,
                    delta_x,
                    delta_y,
                } => {
                    let params = DispatchMouseEventParams::builder()
                        .r#type(DispatchMouseEventType::MouseWheel)
                        .x(point.x)
                        .y(point.y)
                        .delta_x(delta_x)
                        .delta_y(delta_y)
                        .build()
                        .map_err(page_error)?;
                    self.page.execute(params).await.map_err(page_error)?;
                    Ok(())
                }
                InputEvent::KeyDown {
                    key,
                    modifiers,
                    command,
                } => {
                    let mut params = DispatchKeyEventParams::builder()
                        .r#type(DispatchKeyEventType::KeyDown)
                        .key(key.clone())
                        .modifiers(modifiers.bits());
                    if let Some(command) = command {
                        params = params.commands(vec![command.cdp_name().to_string()]);
                    } else if key.chars().count() == 1 && !(modifiers.control || modifiers.meta) {
                        params = params.text(key);
                    }
                    let params = params.build().map_err(page_error)?;
                    self.page.execute(params).await.map_err(page_error)?;
                    Ok(())
                }
                InputEvent::KeyUp { key, modifiers } => {
                    let params = DispatchKeyEventParams::builder()
                        .r#type(DispatchKeyEventType::KeyUp)
                        .key(key)
                        .modifiers(modifiers.bits())
                        .build()
                        .map_err(page_error)?;
                    self.page.execute(params).await.map_err(page_error)?;
                    Ok(())
                }
                InputEvent::InsertText { text } => {
                    let params = InsertTextParams::builder()
                        .text(text)
                        .build()
                        .map_err(page_error)?;
                    self.page.execute(params).await.map_err(page_error)?;
                    Ok(())
                }
            }
        }

        async fn apply(&self, node: NodeId, command: NodeCommand) -> ProbeResult<()> {
            let applied: bool = self
                .call(APPLY, json!({ "node": node.0, "command": command }))
                .await?;
            if applied {
                Ok(())
            } else {
                Err(ProbeError::StaleElement {
                    selector: format!("node {node}"),
                    node: node.0,
                })
            }
        }

        async fn selected_text(&self) -> ProbeResult<String> {
            self.call(SELECTED_TEXT, Value::Null).await
        }
    }

    /// Opens one tab per scenario on a shared browser
    #[derive(Debug, Clone)]
    pub struct BrowserPageFactory {
        browser: Arc<Browser>,
    }

    impl BrowserPageFactory {
        /// Factory over a launched browser
        #[must_use]
        pub const fn new(browser: Arc<Browser>) -> Self {
            Self { browser }
        }
    }

    #[async_trait]
    impl PageFactory for BrowserPageFactory {
        async fn new_page(&self) -> ProbeResult<Arc<dyn PageContext>> {
            Ok(Arc::new(self.browser.new_page().await?))
        }
    }

    /// Launch Chromium and return a factory producing one tab per scenario
    pub async fn launch_page_factory(config: BrowserConfig) -> ProbeResult<Arc<dyn PageFactory>> {
        let browser = Browser::launch(config).await?;
        Ok(Arc::new(BrowserPageFactory::new(Arc::new(browser))))
    }
}

#[cfg(feature = "browser")]
pub use cdp::{launch_page_factory, Browser, BrowserPageFactory, CdpPage};

/// Browser support was not compiled in; always fails
#[cfg(not(feature = "browser"))]
pub async fn launch_page_factory(config: BrowserConfig) -> ProbeResult<Arc<dyn PageFactory>> {
    let _ = config;
    Err(ProbeError::BrowserLaunch {
        message: "sonda was built without the `browser` feature".into(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = BrowserConfig::default()
            .with_viewport(800, 600)
            .with_headless(false)
            .with_chromium_path("/usr/bin/chromium")
            .with_no_sandbox();
        assert_eq!((config.viewport_width, config.viewport_height), (800, 600));
        assert!(!config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
    }

    #[test]
    fn test_node_command_wire_shape() {
        use crate::driver::NodeCommand;
        assert_eq!(serde_json::to_value(NodeCommand::Focus).unwrap(), "Focus");
        assert_eq!(
            serde_json::to_value(NodeCommand::SetValue("x".into())).unwrap(),
            serde_json::json!({ "SetValue": "x" })
        );
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_launch_without_feature_is_clear_error() {
        let Err(err) = launch_page_factory(BrowserConfig::default()).await else {
            panic!("launch succeeded without the browser feature");
        };
        assert_eq!(err.kind(), "browser_launch");
        assert!(err.to_string().contains("`browser` feature"));
    }
}
