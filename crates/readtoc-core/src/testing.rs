//! Shared test fixtures

use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::{MemoryDocument, NodeSpec, PageSpec, SharedDocument, Viewport};
use crate::toc::{Renderer, TocProps};

/// A 4000px page whose `#post` article holds headings at page offsets 150,
/// 900 and 1700
pub fn three_heading_page() -> PageSpec {
    page("https://blog.example/posts/reactive-toc", three_heading_body())
}

pub fn three_heading_body() -> NodeSpec {
    NodeSpec::new("body").rect(0.0, 0.0, 1280.0, 4000.0).child(
        NodeSpec::new("article")
            .id("post")
            .class("entry")
            .rect(100.0, 100.0, 800.0, 3000.0)
            .child(NodeSpec::new("h1").text("Overview").rect(100.0, 150.0, 800.0, 40.0))
            .child(NodeSpec::new("p").rect(100.0, 190.0, 800.0, 700.0))
            .child(NodeSpec::new("h2").text("Streams").rect(100.0, 900.0, 800.0, 30.0))
            .child(NodeSpec::new("p").rect(100.0, 930.0, 800.0, 760.0))
            .child(NodeSpec::new("h2").text("Teardown").rect(100.0, 1700.0, 800.0, 30.0))
            .child(NodeSpec::new("p").rect(100.0, 1730.0, 800.0, 1300.0)),
    )
}

pub fn page(url: &str, body: NodeSpec) -> PageSpec {
    PageSpec {
        url: url.to_string(),
        viewport: Viewport::default(),
        mutation_observer: true,
        body,
    }
}

pub fn load(page: PageSpec) -> (Rc<MemoryDocument>, SharedDocument) {
    let memory = Rc::new(MemoryDocument::new(page).unwrap());
    let shared: SharedDocument = memory.clone();
    (memory, shared)
}

/// Keeps the last props and every toast
#[derive(Default, Clone)]
pub struct RecordingRenderer {
    props: Rc<RefCell<Option<TocProps>>>,
    renders: Rc<RefCell<usize>>,
    toasts: Rc<RefCell<Vec<String>>>,
}

impl RecordingRenderer {
    pub fn props(&self) -> Option<TocProps> {
        self.props.borrow().clone()
    }

    pub fn renders(&self) -> usize {
        *self.renders.borrow()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.toasts.borrow().clone()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, props: TocProps) {
        *self.props.borrow_mut() = Some(props);
        *self.renders.borrow_mut() += 1;
    }

    fn toast(&self, message: &str) {
        self.toasts.borrow_mut().push(message.to_string());
    }
}
