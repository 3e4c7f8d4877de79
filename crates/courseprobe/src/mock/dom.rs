//! Arena-backed DOM for the mock session.
//!
//! Nodes live in one `Vec` per document and refer to each other by
//! [`NodeId`]. A host's shadow root is a separate node in the same arena,
//! referenced by index from the host (`shadow_root`) and back (`host`), so
//! shadow traversal never needs owning cycles. An `iframe` node owns the
//! [`Document`] it displays.

use super::css::SelectorList;
use crate::result::ProbeResult;

/// Index of a node within its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Computed `overflow-y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    /// `visible`
    #[default]
    Visible,
    /// `hidden`
    Hidden,
    /// `auto`
    Auto,
    /// `scroll`
    Scroll,
}

impl Overflow {
    /// Whether content can be scrolled by script
    #[must_use]
    pub const fn is_scrollable(&self) -> bool {
        matches!(self, Self::Auto | Self::Scroll)
    }
}

/// Vertical scroll geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollBox {
    /// Computed `overflow-y`
    pub overflow_y: Overflow,
    /// `scrollTop`
    pub top: u32,
    /// `clientHeight`
    pub client_height: u32,
    /// `scrollHeight`
    pub scroll_height: u32,
}

impl ScrollBox {
    /// Create a scroll box at offset zero
    #[must_use]
    pub const fn new(overflow_y: Overflow, client_height: u32, scroll_height: u32) -> Self {
        Self {
            overflow_y,
            top: 0,
            client_height,
            scroll_height,
        }
    }

    /// Largest reachable `scrollTop`
    #[must_use]
    pub const fn max_top(&self) -> u32 {
        self.scroll_height.saturating_sub(self.client_height)
    }

    /// Scroll to the bottom; returns whether the offset changed
    pub fn scroll_to_bottom(&mut self) -> bool {
        let before = self.top;
        self.top = self.max_top();
        self.top != before
    }

    /// Whether the offset is at its maximum
    #[must_use]
    pub const fn at_bottom(&self) -> bool {
        self.top >= self.max_top()
    }
}

/// A DOM node
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Lowercase tag name; `#document` and `#shadow-root` for roots
    pub tag: String,
    /// Attributes in insertion order
    pub attrs: Vec<(String, String)>,
    /// Text of the node's own text children
    pub text: String,
    /// Light-DOM children
    pub children: Vec<NodeId>,
    /// Light-DOM parent
    pub parent: Option<NodeId>,
    /// Attached shadow root
    pub shadow_root: Option<NodeId>,
    /// Host element, for shadow roots
    pub host: Option<NodeId>,
    /// Document shown by an `iframe`
    pub content: Option<Box<Document>>,
    /// Not rendered (`display: none`)
    pub hidden: bool,
    /// `disabled`
    pub disabled: bool,
    /// `checked`
    pub checked: bool,
    /// Form control value
    pub value: String,
    /// Scroll geometry
    pub scroll: ScrollBox,
    /// Removed from the document
    pub detached: bool,
    /// Events dispatched on this node, in order
    pub events: Vec<String>,
}

impl Node {
    /// Attribute value
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Whether this is an `<input type="radio">`
    #[must_use]
    pub fn is_radio(&self) -> bool {
        self.tag == "input" && self.attr("type") == Some("radio")
    }
}

/// Builder for appended nodes
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    node: Node,
}

impl NodeSpec {
    /// Element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            node: Node {
                tag: tag.into().to_ascii_lowercase(),
                ..Node::default()
            },
        }
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Add classes (space separated)
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        let merged = match self.node.attr("class") {
            Some(existing) => format!("{existing} {class}"),
            None => class,
        };
        self.node.set_attr("class", merged);
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.node.set_attr(name, value);
        self
    }

    /// Set own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.node.text = text.into();
        self
    }

    /// Set the form value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.node.value = value.into();
        self
    }

    /// Start hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.node.hidden = true;
        self
    }

    /// Start disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.node.disabled = true;
        self
    }

    /// Start checked
    #[must_use]
    pub fn checked(mut self) -> Self {
        self.node.checked = true;
        self
    }

    /// Scroll geometry
    #[must_use]
    pub fn scroll(mut self, scroll: ScrollBox) -> Self {
        self.node.scroll = scroll;
        self
    }
}

/// A document: arena of nodes plus the viewport
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    viewport: ScrollBox,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Root node id
    pub const ROOT: NodeId = NodeId(0);

    /// Empty document with a `body`
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                tag: "#document".to_string(),
                ..Node::default()
            }],
            body: Self::ROOT,
            viewport: ScrollBox::new(Overflow::Auto, 1_080, 1_080),
        };
        doc.body = doc.append(Self::ROOT, NodeSpec::new("body"));
        doc
    }

    /// The `body` element
    #[must_use]
    pub const fn body(&self) -> NodeId {
        self.body
    }

    /// Node by id
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutable node by id
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Node by id, `None` for foreign ids
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Append a child and return its id
    pub fn append(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = spec.node;
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach (or return the existing) shadow root of `host`
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(root) = self.nodes[host.0].shadow_root {
            return root;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: "#shadow-root".to_string(),
            host: Some(host),
            ..Node::default()
        });
        self.nodes[host.0].shadow_root = Some(id);
        id
    }

    /// Give an `iframe` element a content document
    pub fn attach_frame(&mut self, iframe: NodeId, content: Self) {
        self.nodes[iframe.0].content = Some(Box::new(content));
    }

    /// Content document of a frame element
    #[must_use]
    pub fn frame(&self, iframe: NodeId) -> Option<&Self> {
        self.get(iframe)?.content.as_deref()
    }

    /// Mutable content document of a frame element
    pub fn frame_mut(&mut self, iframe: NodeId) -> Option<&mut Self> {
        self.nodes.get_mut(iframe.0)?.content.as_deref_mut()
    }

    /// Document viewport scroll
    #[must_use]
    pub const fn viewport(&self) -> &ScrollBox {
        &self.viewport
    }

    /// Mutable document viewport scroll
    pub fn viewport_mut(&mut self) -> &mut ScrollBox {
        &mut self.viewport
    }

    /// Replace the viewport geometry
    pub fn set_viewport(&mut self, viewport: ScrollBox) {
        self.viewport = viewport;
    }

    /// Show or hide a node
    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        self.nodes[id.0].hidden = hidden;
    }

    /// Replace a node's own text
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.0].text = text.into();
    }

    /// Remove a node (and its subtree) from the document
    pub fn detach(&mut self, id: NodeId) {
        self.nodes[id.0].detached = true;
    }

    /// Light-DOM descendants of `scope` in document order, excluding `scope`.
    ///
    /// Does not enter shadow roots or frame documents; skips detached subtrees.
    #[must_use]
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[scope.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.detached {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Descendants of `scope` matching a parsed selector list
    #[must_use]
    pub fn select(&self, scope: NodeId, selector: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    /// Descendants of `scope` matching CSS text
    pub fn query_all(&self, scope: NodeId, css: &str) -> ProbeResult<Vec<NodeId>> {
        Ok(self.select(scope, &SelectorList::parse(css)?))
    }

    /// First descendant of `scope` matching CSS text
    pub fn query(&self, scope: NodeId, css: &str) -> ProbeResult<Option<NodeId>> {
        Ok(self.query_all(scope, css)?.into_iter().next())
    }

    /// Descendants with the given tag
    #[must_use]
    pub fn by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.nodes[id.0].tag == tag)
            .collect()
    }

    /// Element whose `id` attribute equals `value`
    #[must_use]
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(Self::ROOT)
            .into_iter()
            .find(|id| self.nodes[id.0].attr("id") == Some(value))
    }

    /// `textContent`: own text and light descendants, hidden or not
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = self.nodes[id.0].text.clone();
        for child in self.descendants(id) {
            out.push_str(&self.nodes[child.0].text);
        }
        out
    }

    /// `innerText`: rendered light-DOM text, one line per non-empty element
    #[must_use]
    pub fn inner_text(&self, id: NodeId) -> String {
        if !self.is_displayed(id) {
            return String::new();
        }
        let mut lines = Vec::new();
        self.collect_rendered(id, &mut lines);
        lines.join("\n")
    }

    fn collect_rendered(&self, id: NodeId, lines: &mut Vec<String>) {
        let node = &self.nodes[id.0];
        if node.hidden || node.detached {
            return;
        }
        let own = node.text.trim();
        if !own.is_empty() {
            lines.push(own.to_string());
        }
        for child in &node.children {
            self.collect_rendered(*child, lines);
        }
    }

    /// Whether the node is attached to the document
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            if node.detached {
                return false;
            }
            if current == Self::ROOT {
                return true;
            }
            cursor = node.parent.or(node.host);
        }
        false
    }

    /// Whether the node and all of its ancestors (across shadow hosts) render
    #[must_use]
    pub fn is_displayed(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            if node.hidden || node.detached {
                return false;
            }
            if current == Self::ROOT {
                return true;
            }
            cursor = node.parent.or(node.host);
        }
        false
    }

    /// Every scrollable element in the light DOM
    #[must_use]
    pub fn scroll_regions(&self) -> Vec<NodeId> {
        self.descendants(Self::ROOT)
            .into_iter()
            .filter(|id| self.nodes[id.0].scroll.overflow_y.is_scrollable())
            .collect()
    }

    /// Check the radio `id`, unchecking radios of the same name in its tree
    pub fn check_radio(&mut self, id: NodeId) {
        let name = self.nodes[id.0].attr("name").map(str::to_string);
        if let Some(name) = name {
            let scope = self.tree_root(id);
            for other in self.descendants(scope) {
                let node = &mut self.nodes[other.0];
                if node.is_radio() && node.attr("name") == Some(name.as_str()) {
                    node.checked = false;
                }
            }
        }
        self.nodes[id.0].checked = true;
    }

    /// Document root or shadow root containing `id`
    #[must_use]
    pub fn tree_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current
    }

    /// Radio associated with a label: `for` target or first descendant radio
    #[must_use]
    pub fn label_control(&self, label: NodeId) -> Option<NodeId> {
        if let Some(target) = self.nodes[label.0].attr("for") {
            if let Some(id) = self.element_by_id(target) {
                return Some(id);
            }
        }
        self.descendants(label)
            .into_iter()
            .find(|id| self.nodes[id.0].is_radio())
    }
}
