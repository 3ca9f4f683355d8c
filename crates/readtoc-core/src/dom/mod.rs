//! Host document collaborator
//!
//! The engine never touches a browser directly. Everything it needs from the
//! page (geometry reads, hit testing, listeners, mutation observation) goes
//! through the [`Document`] trait, so a real host binding and the in-memory
//! [`MemoryDocument`] are interchangeable.

mod memory;

pub use memory::{MemoryDocument, NodeSpec, PageSpec};

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Opaque handle to a node; never keeps the node alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Axis-aligned box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Half-open containment: the right and bottom edges are outside
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }

    pub fn offset_y(&self, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Viewport {
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// CSS `position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputedStyle {
    pub position: Position,
    /// `None` is `z-index: auto`
    pub z_index: Option<i32>,
}

/// The attributes used to tell whether an article element was swapped
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeIdentity {
    pub id: String,
    pub class: String,
}

/// Where the page lives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageLocation {
    pub domain: String,
    pub path: String,
}

impl PageLocation {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url::Url::parse(url)?;
        Ok(Self {
            domain: url.host_str().unwrap_or_default().to_string(),
            path: url.path().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Scroll,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomEvent {
    pub target: EventTarget,
    pub kind: EventKind,
}

/// Registration handle for listeners and mutation observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A heading element found inside an article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingNode {
    pub node: NodeId,
    /// 1 for `h1` through 6 for `h6`
    pub level: u8,
}

pub type Listener = Rc<dyn Fn(&DomEvent)>;

/// The page as seen by the engine
pub trait Document {
    fn location(&self) -> PageLocation;

    /// The document element
    fn root(&self) -> NodeId;

    fn body(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Inclusive: a node contains itself
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root(), node)
    }

    /// Whether `node` scrolls with the window rather than on its own
    fn is_page_scroller(&self, node: NodeId) -> bool {
        node == self.root() || node == self.body()
    }

    /// Border box in viewport coordinates; zero-sized when detached
    fn bounding_rect(&self, node: NodeId) -> Rect;

    fn offset_height(&self, node: NodeId) -> f64;

    fn scroll_top(&self, node: NodeId) -> f64;

    /// Setting a different offset dispatches a scroll event
    fn set_scroll_top(&self, node: NodeId, top: f64);

    fn viewport(&self) -> Viewport;

    /// Topmost element painted at a viewport point
    fn element_from_point(&self, x: f64, y: f64) -> Option<NodeId>;

    fn computed_style(&self, node: NodeId) -> ComputedStyle;

    /// First match for `tag`, `#id` or `.class`
    fn query_selector(&self, selector: &str) -> Option<NodeId>;

    fn identity(&self, node: NodeId) -> NodeIdentity;

    fn text_content(&self, node: NodeId) -> String;

    /// Locate the main article, trying `preferred` selectors first
    fn find_article(&self, preferred: &[String]) -> Option<NodeId>;

    /// Heading elements inside `article`, in document order
    fn extract_headings(&self, article: NodeId) -> Vec<HeadingNode>;

    /// Nearest scrollable ancestor-or-self of `article`, or the root
    fn scroll_container(&self, article: NodeId) -> NodeId;

    fn add_event_listener(&self, target: EventTarget, kind: EventKind, listener: Listener)
        -> ListenerId;

    fn remove_event_listener(&self, id: ListenerId);

    /// Fails with [`crate::Error::Unsupported`] when the host cannot observe
    /// mutations
    fn observe_mutations(&self, observer: Rc<dyn Fn()>) -> Result<ListenerId>;

    fn disconnect_observer(&self, id: ListenerId);
}

pub type SharedDocument = Rc<dyn Document>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(rect.right(), 110.0);
        assert_eq!(rect.bottom(), 70.0);
        assert!(rect.contains(10.0, 20.0));
        assert!(!rect.contains(110.0, 20.0));
        assert_eq!(rect.offset_y(-20.0).top, 0.0);
    }

    #[test]
    fn test_location_parse() {
        let location = PageLocation::parse("https://medium.com/@someone/a-post-0123456789ab").unwrap();
        assert_eq!(location.domain, "medium.com");
        assert_eq!(location.path, "/@someone/a-post-0123456789ab");
        assert!(PageLocation::parse("not a url").is_err());
    }
}
