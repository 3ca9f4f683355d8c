use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dom::ListenerId;
use crate::stream::isolate;

/// Events raised by a [`crate::Toc`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocEvent {
    /// The measured article no longer matches the document
    Error { reason: String },
}

impl TocEvent {
    pub const ARTICLE_CHANGED: &'static str = "Article Changed";

    pub fn article_changed() -> Self {
        TocEvent::Error {
            reason: Self::ARTICLE_CHANGED.to_string(),
        }
    }
}

type Handler<E> = Rc<dyn Fn(&E)>;

/// Listener list with per-listener panic isolation
pub struct EventEmitter<E> {
    listeners: RefCell<Vec<(ListenerId, Handler<E>)>>,
    next_id: Cell<u64>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn off(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
    }

    pub fn emit(&self, event: &E) {
        let listeners: Vec<Handler<E>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            isolate("event listener", || listener(event));
        }
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}
