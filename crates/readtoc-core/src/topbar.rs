//! Sticky header detection
//!
//! A topbar is a fixed element with an explicit z-index painted over both top
//! corners of a target element. The effective height only ever grows within
//! a session, since collapsing headers would otherwise let content slide
//! underneath.

use std::time::Duration;

use tracing::debug;

use crate::dom::{NodeId, Position, SharedDocument};
use crate::stream::Stream;

/// Nearest fixed, z-indexed ancestor-or-self of `elem`
///
/// The walk stops at the body or at the scroll container, neither of which
/// counts as a topbar.
pub fn find_fixed_parent(doc: &SharedDocument, elem: NodeId, scroller: NodeId) -> Option<NodeId> {
    let body = doc.body();
    let mut current = Some(elem);
    while let Some(node) = current {
        if node == body || node == scroller {
            return None;
        }
        let style = doc.computed_style(node);
        if style.position == Position::Fixed && style.z_index.is_some() {
            return Some(node);
        }
        current = doc.parent(node);
    }
    None
}

/// Height of the fixed element covering both top corners of `target`, or 0
pub fn topbar_height(doc: &SharedDocument, target: NodeId, scroller: NodeId) -> f64 {
    let rect = doc.bounding_rect(target);
    let covering_at = |x: f64| {
        doc.element_from_point(x, rect.top + 1.0)
            .and_then(|hit| find_fixed_parent(doc, hit, scroller))
    };

    match (covering_at(rect.left + 1.0), covering_at(rect.right() - 1.0)) {
        (Some(left), Some(right)) if left == right => doc.offset_height(left),
        _ => 0.0,
    }
}

/// Topbar height measured against each element pushed into `trigger`,
/// folded with a running maximum (starts at 0)
pub fn topbar_stream(
    doc: SharedDocument,
    trigger: &Stream<NodeId>,
    scroller: NodeId,
    throttle: Duration,
) -> Stream<f64> {
    trigger
        .throttle(throttle)
        .map(move |target| {
            let height = topbar_height(&doc, *target, scroller);
            debug!(target: "readtoc::topbar", ?target, height, "measured");
            height
        })
        .unique()
        .log("topbarHeightMeasured")
        .scan(keep_max, 0.0)
}

/// A collapsing header must not shrink the reserved space
fn keep_max(height: &f64, measured: &f64) -> f64 {
    height.max(*measured)
}
