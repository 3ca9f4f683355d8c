//! Stream operators
//!
//! Derived streams are seeded from their sources' current values where that is
//! meaningful (`map`, `filter`, `unique`, `scan`, `log`, `combine*`), so a
//! chain built over a stream that already holds a value is immediately
//! readable. Seeding never pushes, since a fresh stream has no subscribers.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use super::{Stream, Upstream};

/// Wire `source` into `target`: forward every emission through `forward`, and
/// dispose `target` together with `source`. Disposing `target` first detaches
/// it from `source` completely.
fn link<S, U>(source: &Stream<S>, target: &Stream<U>, forward: impl Fn(&S, &Stream<U>) + 'static)
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    let downstream = target.clone();
    let subscription = source.subscribe(move |value| forward(value, &downstream));
    target.hold_upstream(subscription);

    let dependent = target.clone();
    let hook = source.on_dispose_scoped(move || dependent.dispose());
    target.hold_upstream(hook);
}

/// Shared body of the `combine*` family: re-read every input on any change
/// and emit once all of them hold a value
fn combine_from<U: Clone + 'static>(
    sources: &[&dyn Upstream],
    read: impl Fn() -> Option<U> + 'static,
) -> Stream<U> {
    let target = match read() {
        Some(value) => Stream::of(value),
        None => Stream::new(),
    };
    let read = Rc::new(read);

    for source in sources {
        let downstream = target.clone();
        let read = read.clone();
        let subscription = source.watch(Box::new(move || {
            if let Some(value) = read() {
                downstream.emit(value);
            }
        }));
        target.hold_upstream(subscription);

        let dependent = target.clone();
        let hook = source.when_disposed(Box::new(move || dependent.dispose()));
        target.hold_upstream(hook);
    }
    target
}

impl<T: Clone + 'static> Stream<T> {
    /// Emit `f(v)` for every `v` the source emits
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Stream<U> {
        let target = match self.get() {
            Some(value) => Stream::of(f(&value)),
            None => Stream::new(),
        };
        link(self, &target, move |value, downstream| downstream.emit(f(value)));
        target
    }

    /// Re-emit only values matching `predicate`; others are suppressed
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Stream<T> {
        let target = match self.get().filter(|value| predicate(value)) {
            Some(value) => Stream::of(value),
            None => Stream::new(),
        };
        link(self, &target, move |value, downstream| {
            if predicate(value) {
                downstream.emit(value.clone());
            }
        });
        target
    }

    /// Fold emissions into an accumulator and emit each new accumulator
    pub fn scan<A: Clone + 'static>(
        &self,
        reducer: impl Fn(&A, &T) -> A + 'static,
        seed: A,
    ) -> Stream<A> {
        let initial = match self.get() {
            Some(value) => reducer(&seed, &value),
            None => seed,
        };
        let target = Stream::of(initial);
        link(self, &target, move |value, downstream| {
            let acc = downstream.get();
            if let Some(acc) = acc {
                downstream.emit(reducer(&acc, value));
            }
        });
        target
    }

    /// Hold `value` from construction, then follow the source
    pub fn starts_with(&self, value: T) -> Stream<T> {
        let target = Stream::of(value);
        link(self, &target, |value, downstream| downstream.emit(value.clone()));
        target
    }

    /// Map every emission to `()`, for streams used only as triggers
    pub fn signal(&self) -> Stream<()> {
        self.map(|_| ())
    }

    /// At most one emission per `period`
    ///
    /// The first value passes straight through and opens a window. Values
    /// arriving inside the window are held back; the latest one fires at the
    /// window boundary and opens the next window. Must be used inside a
    /// `tokio::task::LocalSet`.
    pub fn throttle(&self, period: Duration) -> Stream<T> {
        let target = Stream::new();
        let state = Rc::new(ThrottleState {
            last: Cell::new(None),
            pending: RefCell::new(None),
            timer: RefCell::new(None),
        });

        let forward_state = state.clone();
        link(self, &target, move |value, downstream| {
            forward_state.push(value.clone(), period, downstream);
        });

        target.on_dispose(move || {
            if let Some(timer) = state.timer.borrow_mut().take() {
                timer.abort();
            }
            state.pending.borrow_mut().take();
        });
        target
    }
}

struct ThrottleState<T> {
    last: Cell<Option<Instant>>,
    pending: RefCell<Option<T>>,
    timer: RefCell<Option<JoinHandle<()>>>,
}

impl<T: Clone + 'static> ThrottleState<T> {
    fn push(self: &Rc<Self>, value: T, period: Duration, target: &Stream<T>) {
        let now = Instant::now();
        match self.last.get() {
            Some(last) if now < last + period => {
                *self.pending.borrow_mut() = Some(value);
                if self.timer.borrow().is_none() {
                    let deadline = last + period;
                    let handle = tokio::task::spawn_local(Self::flush_at(
                        Rc::downgrade(self),
                        target.downgrade(),
                        deadline,
                    ));
                    *self.timer.borrow_mut() = Some(handle);
                }
            }
            _ => {
                self.last.set(Some(now));
                target.emit(value);
            }
        }
    }

    async fn flush_at(state: Weak<Self>, target: super::WeakStream<T>, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
        let Some(state) = state.upgrade() else {
            return;
        };
        state.timer.borrow_mut().take();
        let pending = state.pending.borrow_mut().take();
        if let (Some(value), Some(target)) = (pending, target.upgrade()) {
            state.last.set(Some(Instant::now()));
            target.emit(value);
        }
    }
}

impl<T: Clone + PartialEq + 'static> Stream<T> {
    /// Suppress a value equal to the last delivered one
    pub fn unique(&self) -> Stream<T> {
        let target = match self.get() {
            Some(value) => Stream::of(value),
            None => Stream::new(),
        };
        link(self, &target, |value, downstream| {
            let changed = downstream
                .inner
                .value
                .borrow()
                .as_ref()
                .map_or(true, |last| last != value);
            if changed {
                downstream.emit(value.clone());
            }
        });
        target
    }
}

impl<T: Clone + Debug + 'static> Stream<T> {
    /// Trace every emission under `tag` without altering it
    pub fn log(&self, tag: &'static str) -> Stream<T> {
        let target = match self.get() {
            Some(value) => Stream::of(value),
            None => Stream::new(),
        };
        link(self, &target, move |value, downstream| {
            trace!(target: "readtoc::stream", tag, value = ?value, "emit");
            downstream.emit(value.clone());
        });
        target
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Re-emit whatever any input emits
    pub fn merge(sources: &[Stream<T>]) -> Stream<T> {
        let target = Stream::new();
        for source in sources {
            link(source, &target, |value, downstream| downstream.emit(value.clone()));
        }
        target
    }

    /// Latest value of every input, once all have emitted
    pub fn combine_all(sources: Vec<Stream<T>>) -> Stream<Vec<T>> {
        let weak: Vec<_> = sources.iter().map(Stream::downgrade).collect();
        let erased: Vec<&dyn Upstream> = sources.iter().map(|s| s as &dyn Upstream).collect();
        combine_from(&erased, move || weak.iter().map(|s| s.get()).collect())
    }
}

/// Latest values of two streams, once both have emitted
pub fn combine2<A, B>(a: &Stream<A>, b: &Stream<B>) -> Stream<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let (wa, wb) = (a.downgrade(), b.downgrade());
    combine_from(&[a as &dyn Upstream, b], move || Some((wa.get()?, wb.get()?)))
}

/// Latest values of three streams, once all have emitted
pub fn combine3<A, B, C>(a: &Stream<A>, b: &Stream<B>, c: &Stream<C>) -> Stream<(A, B, C)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
{
    let (wa, wb, wc) = (a.downgrade(), b.downgrade(), c.downgrade());
    combine_from(&[a as &dyn Upstream, b, c], move || Some((wa.get()?, wb.get()?, wc.get()?)))
}

/// Latest values of four streams, once all have emitted
pub fn combine4<A, B, C, D>(
    a: &Stream<A>,
    b: &Stream<B>,
    c: &Stream<C>,
    d: &Stream<D>,
) -> Stream<(A, B, C, D)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    D: Clone + 'static,
{
    let (wa, wb, wc, wd) = (a.downgrade(), b.downgrade(), c.downgrade(), d.downgrade());
    combine_from(&[a as &dyn Upstream, b, c, d], move || {
        Some((wa.get()?, wb.get()?, wc.get()?, wd.get()?))
    })
}
