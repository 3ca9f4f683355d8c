//! Push-based observable cells
//!
//! A [`Stream`] caches its last value (`get` pulls it) and pushes every new
//! value synchronously to its subscribers (`emit`). Operators build derived
//! streams that are owned by their sources: a source keeps its downstream
//! chain alive through its subscriber list, while a derived stream only keeps
//! `Weak` links upstream. Disposing a source disposes everything derived from
//! it.
//!
//! Streams are single-threaded (`Rc`/`RefCell`). Timer-driven operators
//! (`throttle`, `from_interval`) spawn onto the current `tokio::task::LocalSet`.

mod disposers;
mod operators;
mod sources;

pub use disposers::Disposers;
pub use operators::{combine2, combine3, combine4};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::error;

type Callback<T> = Rc<dyn Fn(&T)>;

struct Inner<T> {
    value: RefCell<Option<T>>,
    subscribers: RefCell<Vec<(u64, Callback<T>)>>,
    next_id: Cell<u64>,
    disposed: Cell<bool>,
    /// Subscriptions this stream holds on its sources
    upstream: RefCell<Vec<Subscription>>,
    /// Teardown run once on dispose (dependent streams, pending timers)
    on_dispose: RefCell<Vec<(u64, Box<dyn FnOnce()>)>>,
}

/// A reactive value cell
pub struct Stream<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("value", &self.inner.value.borrow())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

/// Non-owning handle to a stream, used to read sibling streams from inside
/// operator closures without creating reference cycles
pub struct WeakStream<T> {
    inner: Weak<Inner<T>>,
}

impl<T> Clone for WeakStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> WeakStream<T> {
    /// Current value, or `None` if the stream is gone or has no value yet
    pub fn get(&self) -> Option<T> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.value.borrow().clone())
    }

    pub fn upgrade(&self) -> Option<Stream<T>> {
        self.inner.upgrade().map(|inner| Stream { inner })
    }
}

impl<T: Clone + 'static> Default for Stream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Create a stream with no value
    pub fn new() -> Self {
        Self::with_value(None)
    }

    /// Create a stream holding `value`; nothing is pushed
    pub fn of(value: T) -> Self {
        Self::with_value(Some(value))
    }

    fn with_value(value: Option<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                disposed: Cell::new(false),
                upstream: RefCell::new(Vec::new()),
                on_dispose: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Last emitted value
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Store `value` and push it to every current subscriber, in
    /// subscription order, before returning. No-op once disposed.
    pub fn emit(&self, value: T) {
        if self.inner.disposed.get() {
            return;
        }
        *self.inner.value.borrow_mut() = Some(value.clone());

        // Snapshot so callbacks may subscribe, unsubscribe or re-emit
        let subscribers: Vec<Callback<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in subscribers {
            if self.inner.disposed.get() {
                break;
            }
            isolate("stream subscriber", || callback(&value));
        }
    }

    /// Register a callback for future emissions
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        if self.inner.disposed.get() {
            return Subscription::noop();
        }
        let id = self.next_id();
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub fn downgrade(&self) -> WeakStream<T> {
        WeakStream {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Stop delivering, release upstream subscriptions and dispose every
    /// derived stream. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.subscribers.borrow_mut().clear();

        let upstream = std::mem::take(&mut *self.inner.upstream.borrow_mut());
        for subscription in upstream {
            subscription.unsubscribe();
        }

        let hooks = std::mem::take(&mut *self.inner.on_dispose.borrow_mut());
        for (_, hook) in hooks {
            isolate("stream dispose hook", hook);
        }
    }

    fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    /// Run `hook` when this stream is disposed (immediately if it already is)
    pub(crate) fn on_dispose(&self, hook: impl FnOnce() + 'static) {
        self.on_dispose_scoped(hook).forget();
    }

    /// Like [`Stream::on_dispose`], but unsubscribing the returned handle
    /// removes the hook before it has run
    pub(crate) fn on_dispose_scoped(&self, hook: impl FnOnce() + 'static) -> Subscription {
        if self.inner.disposed.get() {
            hook();
            return Subscription::noop();
        }
        let id = self.next_id();
        self.inner
            .on_dispose
            .borrow_mut()
            .push((id, Box::new(hook)));

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_dispose.borrow_mut().retain(|(hid, _)| *hid != id);
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn dispose_hook_count(&self) -> usize {
        self.inner.on_dispose.borrow().len()
    }

    pub(crate) fn hold_upstream(&self, subscription: Subscription) {
        if self.inner.disposed.get() {
            subscription.unsubscribe();
        } else {
            self.inner.upstream.borrow_mut().push(subscription);
        }
    }
}

/// Type-erased view of a stream used by multi-input operators
pub(crate) trait Upstream {
    fn watch(&self, on_change: Box<dyn Fn()>) -> Subscription;
    fn when_disposed(&self, hook: Box<dyn FnOnce()>) -> Subscription;
}

impl<T: Clone + 'static> Upstream for Stream<T> {
    fn watch(&self, on_change: Box<dyn Fn()>) -> Subscription {
        self.subscribe(move |_| on_change())
    }

    fn when_disposed(&self, hook: Box<dyn FnOnce()>) -> Subscription {
        self.on_dispose_scoped(hook)
    }
}

/// Handle returned by [`Stream::subscribe`]
///
/// Dropping it leaves the callback attached; call [`Subscription::unsubscribe`]
/// or hand it to a [`Disposers`] registry.
#[must_use = "dropping a Subscription keeps the callback attached"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Drop the handle without releasing; the registration lives as long
    /// as its owner
    pub(crate) fn forget(mut self) {
        self.release.take();
    }

    pub fn into_disposer(self) -> impl FnOnce() {
        move || self.unsubscribe()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Run a callback, logging a panic instead of unwinding into the caller
pub(crate) fn isolate(what: &str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        error!(
            target: "readtoc::stream",
            panic = %panic_message(&panic),
            "{} panicked",
            what
        );
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
