//! In-memory [`Session`] over a world of windows, frames and shadow roots.
//!
//! Probes are interpreted natively (see `probes.rs`); page behaviour is
//! supplied by a [`MockBehavior`] that reacts to activations, events, scrolls
//! and the passage of time.

use super::dom::{Document, Node, NodeId};
use super::probes::{interpret, Interpretation};
use crate::clock::{FakeClock, SharedClock};
use crate::locator::{Locator, Selector};
use crate::probe::{Probe, ScrollReport};
use crate::result::{ProbeError, ProbeResult};
use crate::session::{DomEvent, ElementHandle, ElementState, Session, WindowHandle};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Address of a node: window, frame path, node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    /// Window index
    pub window: usize,
    /// `iframe` elements entered from the top-level document
    pub frames: Vec<NodeId>,
    /// Node within the innermost document
    pub node: NodeId,
}

/// A browser window
#[derive(Debug, Clone)]
pub struct MockWindow {
    /// Window handle
    pub handle: WindowHandle,
    /// Current URL
    pub url: String,
    /// Top-level document
    pub document: Document,
    /// Whether the window is open
    pub open: bool,
}

/// Every window the mock browser knows about
#[derive(Debug, Clone, Default)]
pub struct World {
    windows: Vec<MockWindow>,
}

impl World {
    /// Empty world
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an open window and return its index
    pub fn add_window(&mut self, url: impl Into<String>, document: Document) -> usize {
        self.push_window(url.into(), document, true)
    }

    /// Add a window that opens later
    pub fn add_closed_window(&mut self, url: impl Into<String>, document: Document) -> usize {
        self.push_window(url.into(), document, false)
    }

    fn push_window(&mut self, url: String, document: Document, open: bool) -> usize {
        let index = self.windows.len();
        self.windows.push(MockWindow {
            handle: WindowHandle::new(format!("window-{index}")),
            url,
            document,
            open,
        });
        index
    }

    /// Open a window added with [`World::add_closed_window`]
    pub fn open_window(&mut self, index: usize) {
        if let Some(window) = self.windows.get_mut(index) {
            window.open = true;
        }
    }

    /// Window by index
    #[must_use]
    pub fn window(&self, index: usize) -> Option<&MockWindow> {
        self.windows.get(index)
    }

    /// Mutable window by index
    pub fn window_mut(&mut self, index: usize) -> Option<&mut MockWindow> {
        self.windows.get_mut(index)
    }

    /// Every window, open or not
    #[must_use]
    pub fn windows(&self) -> &[MockWindow] {
        &self.windows
    }

    /// Top-level document of a window
    #[must_use]
    pub fn window_document(&self, index: usize) -> Option<&Document> {
        self.windows.get(index).map(|w| &w.document)
    }

    /// Mutable top-level document of a window
    pub fn window_document_mut(&mut self, index: usize) -> Option<&mut Document> {
        self.windows.get_mut(index).map(|w| &mut w.document)
    }

    /// Document reached by following `frames` from a window's top level
    #[must_use]
    pub fn document(&self, window: usize, frames: &[NodeId]) -> Option<&Document> {
        let mut doc = self.window_document(window)?;
        for frame in frames {
            if doc.get(*frame)?.detached {
                return None;
            }
            doc = doc.frame(*frame)?;
        }
        Some(doc)
    }

    /// Mutable document reached by following `frames`
    pub fn document_mut(&mut self, window: usize, frames: &[NodeId]) -> Option<&mut Document> {
        let mut doc = self.window_document_mut(window)?;
        for frame in frames {
            doc = doc.frame_mut(*frame)?;
        }
        Some(doc)
    }

    /// Node at an address
    #[must_use]
    pub fn node(&self, addr: &NodeAddr) -> Option<&Node> {
        self.document(addr.window, &addr.frames)?.get(addr.node)
    }
}

/// Page behaviour driven by the session
pub trait MockBehavior: fmt::Debug {
    /// Called at the start of every session command
    fn on_tick(&mut self, _world: &mut World, _now: Duration) {}

    /// A node was clicked (natively or by script)
    fn on_activate(&mut self, _world: &mut World, _target: &NodeAddr, _now: Duration) {}

    /// An event was dispatched on a node
    fn on_event(&mut self, _world: &mut World, _target: &NodeAddr, _event: &str, _now: Duration) {}

    /// Regions of a window were scrolled
    fn on_scroll(&mut self, _world: &mut World, _window: usize, _now: Duration) {}

    /// A window navigated to `url`
    fn on_navigate(&mut self, _world: &mut World, _window: usize, _url: &str, _now: Duration) {}
}

/// A page that never reacts
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPage;

impl MockBehavior for StaticPage {}

/// In-memory browser session
#[derive(Debug)]
pub struct MockSession {
    world: World,
    behavior: Box<dyn MockBehavior>,
    clock: SharedClock,
    window: usize,
    frames: Vec<NodeId>,
    handles: HashMap<String, NodeAddr>,
    issued: HashMap<NodeAddr, String>,
    next_handle: u64,
    intercept_clicks: bool,
    history: Vec<String>,
    activations: Vec<NodeAddr>,
    quits: Arc<AtomicU32>,
    closed: bool,
}

impl MockSession {
    /// Session over `world`, starting in window 0
    #[must_use]
    pub fn new(world: World, behavior: impl MockBehavior + 'static, clock: SharedClock) -> Self {
        Self {
            world,
            behavior: Box::new(behavior),
            clock,
            window: 0,
            frames: Vec::new(),
            handles: HashMap::new(),
            issued: HashMap::new(),
            next_handle: 0,
            intercept_clicks: false,
            history: Vec::new(),
            activations: Vec::new(),
            quits: Arc::new(AtomicU32::new(0)),
            closed: false,
        }
    }

    /// Single static window showing `document`, on a fresh fake clock
    #[must_use]
    pub fn with_document(document: Document) -> Self {
        let mut world = World::new();
        world.add_window("about:blank", document);
        Self::new(world, StaticPage, FakeClock::shared())
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Make every native click fail as intercepted
    #[must_use]
    pub fn with_intercepted_clicks(mut self, intercept: bool) -> Self {
        self.intercept_clicks = intercept;
        self
    }

    /// The world
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Commands issued so far, as `op:argument`
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Number of commands named `op`
    #[must_use]
    pub fn history_count(&self, op: &str) -> usize {
        self.history
            .iter()
            .filter(|entry| entry.split(':').next() == Some(op))
            .count()
    }

    /// Nodes activated by clicks, in order
    #[must_use]
    pub fn activations(&self) -> &[NodeAddr] {
        &self.activations
    }

    /// Times the session was actually closed
    #[must_use]
    pub fn quit_count(&self) -> u32 {
        self.quits.load(Ordering::SeqCst)
    }

    /// Shared quit counter, observable after the session is dropped
    #[must_use]
    pub fn quit_tracker(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.quits)
    }

    /// Index of the current window
    #[must_use]
    pub const fn current_window(&self) -> usize {
        self.window
    }

    fn begin(&mut self, op: &str, arg: impl fmt::Display) -> ProbeResult<()> {
        if self.closed {
            return Err(ProbeError::session("session is closed"));
        }
        self.history.push(format!("{op}:{arg}"));
        let now = self.clock.now();
        self.behavior.on_tick(&mut self.world, now);
        Ok(())
    }

    fn document(&self) -> ProbeResult<&Document> {
        let window = self
            .world
            .window(self.window)
            .filter(|w| w.open)
            .ok_or_else(|| ProbeError::NoSuchWindow {
                handle: format!("window-{}", self.window),
            })?;
        if self.frames.is_empty() {
            return Ok(&window.document);
        }
        self.world
            .document(self.window, &self.frames)
            .ok_or_else(|| ProbeError::NoSuchFrame {
                message: "current frame is no longer attached".to_string(),
            })
    }

    fn addr(&self, node: NodeId) -> NodeAddr {
        NodeAddr {
            window: self.window,
            frames: self.frames.clone(),
            node,
        }
    }

    fn issue(&mut self, node: NodeId) -> ElementHandle {
        let addr = self.addr(node);
        if let Some(id) = self.issued.get(&addr) {
            return ElementHandle::new(id.clone());
        }
        self.next_handle += 1;
        let id = format!("e{}", self.next_handle);
        self.handles.insert(id.clone(), addr.clone());
        self.issued.insert(addr, id.clone());
        ElementHandle::new(id)
    }

    fn resolve(&self, element: &ElementHandle) -> ProbeResult<NodeAddr> {
        let stale = || ProbeError::StaleElement {
            handle: element.to_string(),
        };
        let addr = self.handles.get(element.id()).ok_or_else(stale)?;
        if addr.window != self.window || addr.frames != self.frames {
            return Err(stale());
        }
        if !self.document()?.is_attached(addr.node) {
            return Err(stale());
        }
        Ok(addr.clone())
    }

    fn interactable(&self, addr: &NodeAddr, element: &ElementHandle) -> ProbeResult<()> {
        let doc = self.document()?;
        if !doc.is_displayed(addr.node) {
            return Err(ProbeError::not_interactable(format!(
                "element {element} is not displayed"
            )));
        }
        Ok(())
    }

    fn activate(&mut self, addr: NodeAddr) {
        let Some(doc) = self.world.document_mut(addr.window, &addr.frames) else {
            return;
        };
        let node = doc.node(addr.node);
        if node.disabled {
            return;
        }
        if node.is_radio() {
            doc.check_radio(addr.node);
        } else if node.tag == "label" {
            if let Some(control) = doc.label_control(addr.node) {
                doc.check_radio(control);
            }
        }
        self.activations.push(addr.clone());
        let now = self.clock.now();
        self.behavior.on_activate(&mut self.world, &addr, now);
    }

    fn emit(&mut self, addr: &NodeAddr, event: &str) {
        if let Some(doc) = self.world.document_mut(addr.window, &addr.frames) {
            doc.node_mut(addr.node).events.push(event.to_string());
        }
        let now = self.clock.now();
        self.behavior.on_event(&mut self.world, addr, event, now);
    }

    fn scroll_all(&mut self) -> ProbeResult<ScrollReport> {
        let (window, frames) = (self.window, self.frames.clone());
        let doc = self
            .world
            .document_mut(window, &frames)
            .ok_or_else(|| ProbeError::NoSuchFrame {
                message: "current frame is no longer attached".to_string(),
            })?;
        let regions = doc.scroll_regions();
        let mut moved = 0;
        let mut height = 0;
        for region in &regions {
            let scroll = &mut doc.node_mut(*region).scroll;
            if scroll.scroll_to_bottom() {
                moved += 1;
            }
            height += u64::from(scroll.scroll_height);
        }
        if doc.viewport_mut().scroll_to_bottom() {
            moved += 1;
        }
        height += u64::from(doc.viewport().scroll_height);
        let now = self.clock.now();
        self.behavior.on_scroll(&mut self.world, window, now);
        Ok(ScrollReport {
            regions: u32::try_from(regions.len()).unwrap_or(u32::MAX),
            moved,
            height,
        })
    }

    fn matches(&self, locator: &Locator) -> ProbeResult<Vec<NodeId>> {
        let doc = self.document()?;
        let root = Document::ROOT;
        let found = match locator.selector() {
            Selector::Css { css } => doc.query_all(root, css)?,
            Selector::Id { id } => doc.element_by_id(id).into_iter().collect(),
            Selector::LinkText { text } => doc
                .by_tag(root, "a")
                .into_iter()
                .filter(|a| doc.text_content(*a).trim() == text)
                .collect(),
            Selector::XPath { xpath } => {
                return Err(ProbeError::invalid_selector(
                    xpath.clone(),
                    "xpath is only evaluated by live sessions",
                ))
            }
            Selector::TextContains { text } => doc
                .descendants(root)
                .into_iter()
                .filter(|id| doc.node(*id).text.contains(text.as_str()))
                .collect(),
            Selector::TagName { tag } => doc.by_tag(root, tag),
            Selector::CssWithText { css, text } => doc
                .query_all(root, css)?
                .into_iter()
                .filter(|id| doc.text_content(*id).contains(text.as_str()))
                .collect(),
        };
        Ok(found)
    }
}

impl Session for MockSession {
    fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.begin("navigate", url)?;
        let window = self
            .world
            .window_mut(self.window)
            .ok_or_else(|| ProbeError::Navigation {
                url: url.to_string(),
                message: "no current window".to_string(),
            })?;
        window.url = url.to_string();
        self.frames.clear();
        let now = self.clock.now();
        self.behavior.on_navigate(&mut self.world, self.window, url, now);
        Ok(())
    }

    fn current_url(&mut self) -> ProbeResult<String> {
        self.begin("current_url", "")?;
        self.world
            .window(self.window)
            .map(|w| w.url.clone())
            .ok_or_else(|| ProbeError::NoSuchWindow {
                handle: format!("window-{}", self.window),
            })
    }

    fn find_elements(&mut self, locator: &Locator) -> ProbeResult<Vec<ElementHandle>> {
        self.begin("find", locator)?;
        let nodes = self.matches(locator)?;
        Ok(nodes.into_iter().map(|node| self.issue(node)).collect())
    }

    fn element_state(&mut self, element: &ElementHandle) -> ProbeResult<ElementState> {
        self.begin("state", element)?;
        let addr = self.resolve(element)?;
        let doc = self.document()?;
        let node = doc.node(addr.node);
        Ok(ElementState {
            displayed: doc.is_displayed(addr.node),
            enabled: !node.disabled,
            selected: node.checked,
            text: doc.inner_text(addr.node),
        })
    }

    fn attribute(&mut self, element: &ElementHandle, name: &str) -> ProbeResult<Option<String>> {
        self.begin("attribute", name)?;
        let addr = self.resolve(element)?;
        let node = self.document()?.node(addr.node);
        Ok(node.attr(name).map(str::to_string))
    }

    fn value(&mut self, element: &ElementHandle) -> ProbeResult<String> {
        self.begin("value", element)?;
        let addr = self.resolve(element)?;
        Ok(self.document()?.node(addr.node).value.clone())
    }

    fn click(&mut self, element: &ElementHandle) -> ProbeResult<()> {
        self.begin("click", element)?;
        let addr = self.resolve(element)?;
        self.interactable(&addr, element)?;
        if self.intercept_clicks {
            return Err(ProbeError::not_interactable(format!(
                "element click intercepted: {element}"
            )));
        }
        self.activate(addr);
        Ok(())
    }

    fn script_click(&mut self, element: &ElementHandle) -> ProbeResult<()> {
        self.begin("script_click", element)?;
        let addr = self.resolve(element)?;
        self.activate(addr);
        Ok(())
    }

    fn clear(&mut self, element: &ElementHandle) -> ProbeResult<()> {
        self.begin("clear", element)?;
        let addr = self.resolve(element)?;
        self.interactable(&addr, element)?;
        if let Some(doc) = self.world.document_mut(addr.window, &addr.frames) {
            doc.node_mut(addr.node).value.clear();
        }
        Ok(())
    }

    fn send_keys(&mut self, element: &ElementHandle, text: &str) -> ProbeResult<()> {
        self.begin("send_keys", element)?;
        let addr = self.resolve(element)?;
        self.interactable(&addr, element)?;
        if let Some(doc) = self.world.document_mut(addr.window, &addr.frames) {
            doc.node_mut(addr.node).value.push_str(text);
        }
        for event in ["keydown", "input", "keyup"] {
            self.emit(&addr, event);
        }
        Ok(())
    }

    fn script_set_value(&mut self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        self.begin("script_set_value", element)?;
        let addr = self.resolve(element)?;
        if let Some(doc) = self.world.document_mut(addr.window, &addr.frames) {
            doc.node_mut(addr.node).value = value.to_string();
        }
        for event in [DomEvent::Input, DomEvent::Change] {
            self.emit(&addr, event.as_str());
        }
        Ok(())
    }

    fn dispatch_events(&mut self, element: &ElementHandle, events: &[DomEvent]) -> ProbeResult<()> {
        self.begin("dispatch", element)?;
        let addr = self.resolve(element)?;
        for event in events {
            self.emit(&addr, event.as_str());
        }
        Ok(())
    }

    fn evaluate(&mut self, probe: &Probe) -> ProbeResult<serde_json::Value> {
        self.begin("evaluate", probe.name())?;
        let interpretation = interpret(self.document()?, probe)?;
        match interpretation {
            Interpretation::Value(value) => Ok(value),
            Interpretation::Click { node, value } => {
                let addr = self.addr(node);
                self.activate(addr);
                Ok(value)
            }
            Interpretation::Element(found) => Ok(serde_json::Value::Bool(found.is_some())),
            Interpretation::ScrollAll => Ok(serde_json::to_value(self.scroll_all()?)?),
        }
    }

    fn locate(&mut self, probe: &Probe) -> ProbeResult<Option<ElementHandle>> {
        self.begin("locate", probe.name())?;
        let interpretation = interpret(self.document()?, probe)?;
        match interpretation {
            Interpretation::Element(found) => Ok(found.map(|node| self.issue(node))),
            _ => Err(ProbeError::script(
                probe.name(),
                "probe does not return an element",
            )),
        }
    }

    fn switch_to_default_content(&mut self) -> ProbeResult<()> {
        self.begin("default_content", "")?;
        self.frames.clear();
        Ok(())
    }

    fn switch_to_frame(&mut self, frame: &ElementHandle) -> ProbeResult<()> {
        self.begin("frame", frame)?;
        let addr = self.resolve(frame)?;
        if self.document()?.frame(addr.node).is_none() {
            return Err(ProbeError::NoSuchFrame {
                message: format!("element {frame} is not a frame"),
            });
        }
        self.frames.push(addr.node);
        Ok(())
    }

    fn window_handle(&mut self) -> ProbeResult<WindowHandle> {
        self.begin("window_handle", "")?;
        self.world
            .window(self.window)
            .filter(|w| w.open)
            .map(|w| w.handle.clone())
            .ok_or_else(|| ProbeError::NoSuchWindow {
                handle: format!("window-{}", self.window),
            })
    }

    fn window_handles(&mut self) -> ProbeResult<Vec<WindowHandle>> {
        self.begin("window_handles", "")?;
        Ok(self
            .world
            .windows()
            .iter()
            .filter(|w| w.open)
            .map(|w| w.handle.clone())
            .collect())
    }

    fn switch_to_window(&mut self, handle: &WindowHandle) -> ProbeResult<()> {
        self.begin("switch_window", handle)?;
        let index = self
            .world
            .windows()
            .iter()
            .position(|w| w.open && w.handle == *handle)
            .ok_or_else(|| ProbeError::NoSuchWindow {
                handle: handle.to_string(),
            })?;
        self.window = index;
        self.frames.clear();
        Ok(())
    }

    fn quit(&mut self) -> ProbeResult<()> {
        self.history.push("quit:".to_string());
        if !self.closed {
            self.closed = true;
            self.quits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
