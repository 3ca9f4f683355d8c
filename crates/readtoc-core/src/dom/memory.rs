//! In-memory document
//!
//! Pages are described as a JSON tree of [`NodeSpec`]s whose rects are in
//! page coordinates at zero scroll. Viewport rects are derived from the page
//! scroll offset and the offsets of scrollable ancestors; fixed subtrees keep
//! their rects as viewport coordinates.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{
    ComputedStyle, Document, DomEvent, EventKind, EventTarget, HeadingNode, Listener, ListenerId,
    NodeId, NodeIdentity, PageLocation, Position, Rect, Viewport,
};
use crate::{Error, Result};

/// A whole page: location, viewport and the `body` tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSpec {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub viewport: Viewport,
    /// Hosts without mutation observation reject `observe_mutations`
    #[serde(default = "default_true")]
    pub mutation_observer: bool,
    pub body: NodeSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub z_index: Option<i32>,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn rect(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(left, top, width, height);
        self
    }

    pub fn fixed(mut self, z_index: Option<i32>) -> Self {
        self.position = Position::Fixed;
        self.z_index = z_index;
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

fn default_url() -> String {
    "https://example.com/".to_string()
}

fn default_true() -> bool {
    true
}

struct Node {
    tag: String,
    id: String,
    class: String,
    text: String,
    rect: Rect,
    position: Position,
    z_index: Option<i32>,
    scrollable: bool,
    scroll_top: f64,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct State {
    location: PageLocation,
    viewport: Viewport,
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    listeners: Vec<(ListenerId, EventTarget, EventKind, Listener)>,
    observers: Vec<(ListenerId, Rc<dyn Fn()>)>,
    next_listener: u64,
    mutation_observer: bool,
}

/// A [`Document`] backed by plain data
pub struct MemoryDocument {
    state: RefCell<State>,
}

impl MemoryDocument {
    pub fn new(page: PageSpec) -> Result<Self> {
        let location = PageLocation::parse(&page.url)?;
        let mut nodes = Vec::new();
        let root = insert(
            &mut nodes,
            None,
            NodeSpec::new("html").rect(0.0, 0.0, page.viewport.width, page.body.rect.height),
        );
        let body = insert(&mut nodes, Some(root), page.body);

        Ok(Self {
            state: RefCell::new(State {
                location,
                viewport: page.viewport,
                nodes,
                root,
                body,
                listeners: Vec::new(),
                observers: Vec::new(),
                next_listener: 0,
                mutation_observer: page.mutation_observer,
            }),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let page: PageSpec = serde_json::from_str(json)?;
        Self::new(page)
    }

    /// Node with the given HTML `id`
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.query_selector(&format!("#{}", id))
    }

    /// Detach `node` (and its subtree) from the document
    pub fn remove(&self, node: NodeId) {
        {
            let mut state = self.state.borrow_mut();
            let Some(parent) = state.node(node).and_then(|n| n.parent) else {
                return;
            };
            state.nodes[parent.0 as usize].children.retain(|c| *c != node);
            state.nodes[node.0 as usize].parent = None;
        }
        self.notify_mutation();
    }

    /// Insert a new subtree as the last child of `parent`
    pub fn append(&self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = insert(&mut state.nodes, Some(parent), spec);
            state.nodes[parent.0 as usize].children.push(id);
            id
        };
        self.notify_mutation();
        id
    }

    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        if let Some(n) = self.state.borrow_mut().node_mut(node) {
            n.rect = rect;
        }
        self.notify_mutation();
    }

    pub fn set_class(&self, node: NodeId, class: impl Into<String>) {
        if let Some(n) = self.state.borrow_mut().node_mut(node) {
            n.class = class.into();
        }
        self.notify_mutation();
    }

    pub fn set_location(&self, url: &str) -> Result<()> {
        self.state.borrow_mut().location = PageLocation::parse(url)?;
        Ok(())
    }

    /// Resize the window and dispatch a resize event
    pub fn set_viewport(&self, width: f64, height: f64) {
        self.state.borrow_mut().viewport = Viewport { width, height };
        self.dispatch(EventTarget::Window, EventKind::Resize);
    }

    pub fn dispatch(&self, target: EventTarget, kind: EventKind) {
        let listeners: Vec<Listener> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|(_, t, k, _)| *t == target && *k == kind)
            .map(|(_, _, _, listener)| listener.clone())
            .collect();
        let event = DomEvent { target, kind };
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn notify_mutation(&self) {
        let observers: Vec<Rc<dyn Fn()>> = self
            .state
            .borrow()
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }
}

fn insert(nodes: &mut Vec<Node>, parent: Option<NodeId>, spec: NodeSpec) -> NodeId {
    let NodeSpec {
        tag,
        id: html_id,
        class,
        text,
        rect,
        position,
        z_index,
        scrollable,
        children,
    } = spec;

    let id = NodeId(nodes.len() as u32);
    nodes.push(Node {
        tag: tag.to_ascii_lowercase(),
        id: html_id,
        class,
        text,
        rect,
        position,
        z_index,
        scrollable,
        scroll_top: 0.0,
        parent,
        children: Vec::new(),
    });
    for child in children {
        let child_id = insert(nodes, Some(id), child);
        nodes[id.0 as usize].children.push(child_id);
    }
    id
}

impl State {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn is_page(&self, id: NodeId) -> bool {
        id == self.root || id == self.body
    }

    /// Strict ancestors, nearest first
    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.node(id).and_then(|n| n.parent);
        while let Some(node) = current {
            out.push(node);
            current = self.node(node).and_then(|n| n.parent);
        }
        out
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if self.node(node).is_none() {
            return false;
        }
        ancestor == node || self.ancestors(node).contains(&ancestor)
    }

    fn is_attached(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// z-index of the nearest fixed ancestor-or-self
    fn fixed_layer(&self, id: NodeId) -> Option<i32> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|n| self.node(n))
            .find(|n| n.position == Position::Fixed)
            .map(|n| n.z_index.unwrap_or(0))
    }

    fn viewport_rect(&self, id: NodeId) -> Rect {
        if !self.is_attached(id) {
            return Rect::default();
        }
        let Some(node) = self.node(id) else {
            return Rect::default();
        };
        if self.fixed_layer(id).is_some() {
            return node.rect;
        }
        let inner_scroll: f64 = self
            .ancestors(id)
            .into_iter()
            .filter(|a| !self.is_page(*a))
            .filter_map(|a| self.node(a))
            .filter(|a| a.scrollable)
            .map(|a| a.scroll_top)
            .sum();
        node.rect.offset_y(-self.page_scroll() - inner_scroll)
    }

    fn page_scroll(&self) -> f64 {
        self.nodes[self.root.0 as usize].scroll_top
    }

    /// Attached nodes in document order
    fn document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(self.root, &mut out);
        out
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let Some(node) = self.node(id) {
            for child in &node.children {
                self.walk(*child, out);
            }
        }
    }

    fn matches(&self, id: NodeId, selector: &str) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if let Some(html_id) = selector.strip_prefix('#') {
            node.id == html_id
        } else if let Some(class) = selector.strip_prefix('.') {
            node.class.split_whitespace().any(|c| c == class)
        } else {
            node.tag.eq_ignore_ascii_case(selector)
        }
    }

    fn heading_level(&self, id: NodeId) -> Option<u8> {
        let tag = &self.node(id)?.tag;
        let level = tag.strip_prefix('h')?.parse::<u8>().ok()?;
        (1..=6).contains(&level).then_some(level)
    }
}

impl Document for MemoryDocument {
    fn location(&self) -> PageLocation {
        self.state.borrow().location.clone()
    }

    fn root(&self) -> NodeId {
        self.state.borrow().root
    }

    fn body(&self) -> NodeId {
        self.state.borrow().body
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.borrow().node(node).and_then(|n| n.parent)
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.state.borrow().contains(ancestor, node)
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.state.borrow().viewport_rect(node)
    }

    fn offset_height(&self, node: NodeId) -> f64 {
        self.state
            .borrow()
            .node(node)
            .map(|n| n.rect.height)
            .unwrap_or_default()
    }

    fn scroll_top(&self, node: NodeId) -> f64 {
        let state = self.state.borrow();
        if state.is_page(node) {
            state.page_scroll()
        } else {
            state.node(node).map(|n| n.scroll_top).unwrap_or_default()
        }
    }

    fn set_scroll_top(&self, node: NodeId, top: f64) {
        let top = top.max(0.0);
        let target = {
            let mut state = self.state.borrow_mut();
            let (holder, target) = if state.is_page(node) {
                (state.root, EventTarget::Window)
            } else {
                (node, EventTarget::Node(node))
            };
            let Some(holder) = state.node_mut(holder) else {
                return;
            };
            if holder.scroll_top == top {
                return;
            }
            holder.scroll_top = top;
            target
        };
        self.dispatch(target, EventKind::Scroll);
    }

    fn viewport(&self) -> Viewport {
        self.state.borrow().viewport
    }

    fn element_from_point(&self, x: f64, y: f64) -> Option<NodeId> {
        let state = self.state.borrow();
        if !state.viewport.rect().contains(x, y) {
            return None;
        }
        state
            .document_order()
            .into_iter()
            .enumerate()
            .filter(|(_, id)| state.is_page(*id) || state.viewport_rect(*id).contains(x, y))
            .filter(|(_, id)| {
                // Clipped by a scrolling ancestor
                state
                    .ancestors(*id)
                    .into_iter()
                    .filter(|a| !state.is_page(*a))
                    .filter(|a| state.node(*a).is_some_and(|n| n.scrollable))
                    .all(|a| state.viewport_rect(a).contains(x, y))
            })
            .max_by_key(|(order, id)| {
                let layer = state.fixed_layer(*id);
                (layer.is_some(), layer.unwrap_or(0), state.ancestors(*id).len(), *order)
            })
            .map(|(_, id)| id)
    }

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        self.state
            .borrow()
            .node(node)
            .map(|n| ComputedStyle {
                position: n.position,
                z_index: n.z_index,
            })
            .unwrap_or_default()
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let state = self.state.borrow();
        state
            .document_order()
            .into_iter()
            .find(|id| state.matches(*id, selector))
    }

    fn identity(&self, node: NodeId) -> NodeIdentity {
        self.state
            .borrow()
            .node(node)
            .map(|n| NodeIdentity {
                id: n.id.clone(),
                class: n.class.clone(),
            })
            .unwrap_or_default()
    }

    fn text_content(&self, node: NodeId) -> String {
        self.state
            .borrow()
            .node(node)
            .map(|n| n.text.clone())
            .unwrap_or_default()
    }

    fn find_article(&self, preferred: &[String]) -> Option<NodeId> {
        preferred
            .iter()
            .filter(|s| !s.is_empty())
            .find_map(|selector| self.query_selector(selector))
            .or_else(|| self.query_selector("article"))
            .or_else(|| {
                let body = self.body();
                (!self.extract_headings(body).is_empty()).then_some(body)
            })
    }

    fn extract_headings(&self, article: NodeId) -> Vec<HeadingNode> {
        let state = self.state.borrow();
        if !state.is_attached(article) {
            return Vec::new();
        }
        let mut subtree = Vec::new();
        state.walk(article, &mut subtree);
        subtree
            .into_iter()
            .skip(1)
            .filter_map(|node| {
                state
                    .heading_level(node)
                    .map(|level| HeadingNode { node, level })
            })
            .collect()
    }

    fn scroll_container(&self, article: NodeId) -> NodeId {
        let state = self.state.borrow();
        std::iter::once(article)
            .chain(state.ancestors(article))
            .filter(|n| !state.is_page(*n))
            .find(|n| state.node(*n).is_some_and(|node| node.scrollable))
            .unwrap_or(state.root)
    }

    fn add_event_listener(
        &self,
        target: EventTarget,
        kind: EventKind,
        listener: Listener,
    ) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, target, kind, listener));
        id
    }

    fn remove_event_listener(&self, id: ListenerId) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|(lid, _, _, _)| *lid != id);
    }

    fn observe_mutations(&self, observer: Rc<dyn Fn()>) -> Result<ListenerId> {
        let mut state = self.state.borrow_mut();
        if !state.mutation_observer {
            return Err(Error::Unsupported("mutation observation".to_string()));
        }
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.observers.push((id, observer));
        Ok(id)
    }

    fn disconnect_observer(&self, id: ListenerId) {
        self.state
            .borrow_mut()
            .observers
            .retain(|(oid, _)| *oid != id);
    }
}
