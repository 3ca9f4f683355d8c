//! Root streams fed by the host: DOM events and timers

use std::rc::Rc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::{Disposers, Stream};
use crate::dom::{DomEvent, EventKind, EventTarget, SharedDocument};

impl Stream<DomEvent> {
    /// Emit every `kind` event dispatched on `target`
    ///
    /// The listener is removed, and the stream disposed, by `disposers`.
    pub fn from_event(
        doc: &SharedDocument,
        target: EventTarget,
        kind: EventKind,
        disposers: &Disposers,
    ) -> Self {
        let stream = Stream::new();
        let weak = stream.downgrade();
        let listener = doc.add_event_listener(
            target,
            kind,
            Rc::new(move |event: &DomEvent| {
                if let Some(stream) = weak.upgrade() {
                    stream.emit(*event);
                }
            }),
        );

        let doc = Rc::downgrade(doc);
        let owned = stream.clone();
        disposers.add(move || {
            if let Some(doc) = doc.upgrade() {
                doc.remove_event_listener(listener);
            }
            owned.dispose();
        });
        stream
    }
}

impl Stream<u64> {
    /// Emit a tick count (starting at 1) every `period`
    ///
    /// The first tick fires one period after creation. Must be called inside
    /// a `tokio::task::LocalSet`.
    pub fn from_interval(period: Duration, disposers: &Disposers) -> Self {
        let stream = Stream::new();
        let weak = stream.downgrade();
        let task = tokio::task::spawn_local(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut count = 0u64;
            loop {
                ticker.tick().await;
                let Some(stream) = weak.upgrade() else {
                    break;
                };
                if stream.is_disposed() {
                    break;
                }
                count += 1;
                stream.emit(count);
            }
            debug!(target: "readtoc::stream", "interval stopped");
        });

        let owned = stream.clone();
        disposers.add(move || {
            task.abort();
            owned.dispose();
        });
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, MemoryDocument, NodeSpec, PageSpec, Viewport};
    use std::cell::RefCell;
    use tokio::task::LocalSet;

    fn doc() -> Rc<MemoryDocument> {
        Rc::new(
            MemoryDocument::new(PageSpec {
                url: "https://example.com/".to_string(),
                viewport: Viewport::default(),
                mutation_observer: true,
                body: NodeSpec::new("body").rect(0.0, 0.0, 1280.0, 5000.0),
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_from_event_forwards_and_tears_down() {
        let memory = doc();
        let shared: SharedDocument = memory.clone();
        let disposers = Disposers::new();
        let scrolls = Stream::from_event(&shared, EventTarget::Window, EventKind::Scroll, &disposers);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = scrolls.subscribe(move |e: &DomEvent| sink.borrow_mut().push(e.kind));

        memory.set_scroll_top(memory.root(), 100.0);
        memory.set_viewport(800.0, 600.0);
        assert_eq!(*seen.borrow(), vec![EventKind::Scroll]);
        assert_eq!(memory.listener_count(), 1);

        disposers.dispose_all();
        assert_eq!(memory.listener_count(), 0);
        assert!(scrolls.is_disposed());
        memory.set_scroll_top(memory.root(), 200.0);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_interval_ticks_until_disposed() {
        LocalSet::new()
            .run_until(async {
                let disposers = Disposers::new();
                let ticks = Stream::from_interval(Duration::from_millis(300), &disposers);
                let seen = Rc::new(RefCell::new(Vec::new()));
                let sink = seen.clone();
                let _sub = ticks.subscribe(move |n: &u64| sink.borrow_mut().push(*n));

                tokio::time::sleep(Duration::from_millis(100)).await;
                assert!(seen.borrow().is_empty());

                tokio::time::sleep(Duration::from_millis(850)).await;
                assert_eq!(*seen.borrow(), vec![1, 2, 3]);

                disposers.dispose_all();
                tokio::time::sleep(Duration::from_millis(1000)).await;
                assert_eq!(*seen.borrow(), vec![1, 2, 3]);
                assert!(ticks.is_disposed());
            })
            .await;
    }
}
