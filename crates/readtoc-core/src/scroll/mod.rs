//! Smooth scrolling of a scroll container to an element
//!
//! - `easing`: easing curves
//! - `timing`: animation clock helpers
//! - `animation`: interpolation state
//!
//! [`smooth_scroll`] drives an animation frame by frame on the local task set
//! and reports completion through a oneshot channel.

mod animation;
mod easing;
mod timing;

pub use animation::ScrollAnimator;
pub use timing::{is_complete, lerp, progress};

use std::rc::Rc;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::config::ScrollConfig;
use crate::dom::{NodeId, SharedDocument};

/// Scroll offset that puts `target` `margin` pixels below the top of
/// `scroller`, or `None` when `target` is no longer in the document
pub fn scroll_target(
    doc: &SharedDocument,
    scroller: NodeId,
    target: NodeId,
    margin: f64,
) -> Option<f64> {
    if !doc.is_connected(target) {
        return None;
    }
    let scroller_top = if doc.is_page_scroller(scroller) {
        0.0
    } else {
        doc.bounding_rect(scroller).top
    };
    let offset = doc.bounding_rect(target).top - scroller_top;
    Some((doc.scroll_top(scroller) + offset - margin).max(0.0))
}

/// A started scroll
///
/// `finished` resolves when the animation ends, is aborted, or had nothing
/// to do.
#[derive(Debug)]
pub struct ScrollTask {
    abort: Option<AbortHandle>,
    done: oneshot::Receiver<()>,
}

impl ScrollTask {
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.abort.clone()
    }

    /// `true` if the animation ran to completion
    pub async fn finished(self) -> bool {
        self.done.await.is_ok()
    }
}

/// Scroll `scroller` so that `target` sits `margin` pixels below its top
///
/// Animated scrolls spawn onto the current `tokio::task::LocalSet`; instant
/// ones complete before returning.
pub fn smooth_scroll(
    doc: &SharedDocument,
    scroller: NodeId,
    target: NodeId,
    margin: f64,
    config: &ScrollConfig,
) -> ScrollTask {
    let (tx, done) = oneshot::channel();
    let Some(to) = scroll_target(doc, scroller, target, margin) else {
        debug!(target: "readtoc::scroll", ?target, "scroll target detached");
        let _ = tx.send(());
        return ScrollTask { abort: None, done };
    };

    let mut animator = ScrollAnimator::new(config.clone());
    animator.set_scroll(doc.scroll_top(scroller));
    animator.scroll_to(to);

    if !animator.is_animating() {
        doc.set_scroll_top(scroller, animator.current_scroll());
        let _ = tx.send(());
        return ScrollTask { abort: None, done };
    }

    let weak = Rc::downgrade(doc);
    let frame = config.frame_duration();
    let handle = tokio::task::spawn_local(async move {
        let mut frames = interval(frame);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            frames.tick().await;
            let Some(doc) = weak.upgrade() else {
                return;
            };
            doc.set_scroll_top(scroller, animator.update());
            if !animator.is_animating() {
                break;
            }
        }
        let _ = tx.send(());
    });

    ScrollTask {
        abort: Some(handle.abort_handle()),
        done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, MemoryDocument, NodeSpec, PageSpec, Viewport};
    use std::time::Duration;
    use tokio::task::LocalSet;

    fn page() -> (Rc<MemoryDocument>, SharedDocument) {
        let body = NodeSpec::new("body")
            .rect(0.0, 0.0, 1280.0, 5000.0)
            .child(NodeSpec::new("h2").id("target").rect(0.0, 1200.0, 800.0, 30.0));
        let memory = Rc::new(
            MemoryDocument::new(PageSpec {
                url: "https://example.com/".to_string(),
                viewport: Viewport::default(),
                mutation_observer: true,
                body,
            })
            .unwrap(),
        );
        let shared: SharedDocument = memory.clone();
        (memory, shared)
    }

    #[test]
    fn test_scroll_target_accounts_for_margin_and_offset() {
        let (memory, doc) = page();
        let target = memory.by_id("target").unwrap();
        let root = memory.root();
        assert_eq!(scroll_target(&doc, root, target, 70.0), Some(1130.0));

        memory.set_scroll_top(root, 1000.0);
        assert_eq!(scroll_target(&doc, root, target, 70.0), Some(1130.0));

        memory.remove(target);
        assert_eq!(scroll_target(&doc, root, target, 70.0), None);
    }

    #[test]
    fn test_instant_scroll_completes_synchronously() {
        let (memory, doc) = page();
        let target = memory.by_id("target").unwrap();
        let config = ScrollConfig {
            smooth_enabled: false,
            ..Default::default()
        };
        let task = smooth_scroll(&doc, memory.root(), target, 10.0, &config);
        assert!(task.abort_handle().is_none());
        assert_eq!(memory.scroll_top(memory.root()), 1190.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_animated_scroll_resolves_at_target() {
        LocalSet::new()
            .run_until(async {
                let (memory, doc) = page();
                let target = memory.by_id("target").unwrap();
                let task = smooth_scroll(&doc, memory.root(), target, 10.0, &ScrollConfig::default());
                assert!(task.finished().await);
                assert_eq!(memory.scroll_top(memory.root()), 1190.0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_scroll_still_resolves() {
        LocalSet::new()
            .run_until(async {
                let (memory, doc) = page();
                let target = memory.by_id("target").unwrap();
                let task = smooth_scroll(&doc, memory.root(), target, 10.0, &ScrollConfig::default());
                tokio::time::sleep(Duration::from_millis(40)).await;
                if let Some(handle) = task.abort_handle() {
                    handle.abort();
                }
                assert!(!task.finished().await);
                let stopped = memory.scroll_top(memory.root());
                assert!(stopped > 0.0 && stopped < 1190.0);
            })
            .await;
    }
}
