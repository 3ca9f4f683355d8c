//! Geometry snapshots of the article, its scroll container and its headings

use tracing::debug;

use crate::dom::{NodeId, Rect, SharedDocument};
use crate::stream::Stream;

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub node: NodeId,
    /// Distance from the scroll container's content top
    pub from_scroller_top: f64,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scroller {
    pub node: NodeId,
    /// The viewport when the container is the page itself
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    /// Lookup handle only; the heading may have left the document since
    pub node: NodeId,
    pub level: u8,
    /// Distance from the article's content top at measurement time
    pub from_article_top: f64,
}

/// One measurement of the article; never mutated after creation
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub article: Article,
    pub scroller: Scroller,
    /// Document order
    pub headings: Vec<Heading>,
}

/// Read the current geometry of `article` inside `scroller`
///
/// A detached article yields a snapshot without headings.
pub fn measure(doc: &SharedDocument, article: NodeId, scroller: NodeId) -> Content {
    let article_rect = doc.bounding_rect(article);
    let scroller_rect = if doc.is_page_scroller(scroller) {
        doc.viewport().rect()
    } else {
        doc.bounding_rect(scroller)
    };
    let scroll_y = doc.scroll_top(scroller);

    // The page scroll is already part of the article rect
    let article_scroll = if doc.is_page_scroller(article) {
        0.0
    } else {
        doc.scroll_top(article)
    };
    let article_content_top = article_rect.top - article_scroll;

    let headings = doc
        .extract_headings(article)
        .into_iter()
        .map(|h| Heading {
            node: h.node,
            level: h.level,
            from_article_top: doc.bounding_rect(h.node).top - article_content_top,
        })
        .collect::<Vec<_>>();

    let from_scroller_top = if article == scroller {
        0.0
    } else {
        article_rect.top - scroller_rect.top + scroll_y
    };

    debug!(
        target: "readtoc::content",
        headings = headings.len(),
        from_scroller_top,
        "measured"
    );

    Content {
        article: Article {
            node: article,
            from_scroller_top,
            rect: article_rect,
        },
        scroller: Scroller {
            node: scroller,
            rect: scroller_rect,
        },
        headings,
    }
}

/// Re-measure on every `trigger` while the TOC is shown
///
/// `trigger` is the merge of every recomputation request (manual change,
/// visibility, resize, periodic check). Hidden ticks are dropped before any
/// geometry is read.
pub fn content_stream(
    doc: SharedDocument,
    article: NodeId,
    scroller: NodeId,
    trigger: &Stream<()>,
    is_shown: &Stream<bool>,
) -> Stream<Content> {
    let shown = is_shown.downgrade();
    trigger
        .filter(move |_| shown.get().unwrap_or(false))
        .map(move |_| measure(&doc, article, scroller))
}

/// Whether `content` still describes the live document
///
/// Fails when the scroller left the document, no longer contains the
/// article, the article lost its headings, or the first or last heading moved
/// out of the article.
pub fn validate(doc: &SharedDocument, content: &Content) -> bool {
    let scroller = content.scroller.node;
    let article = content.article.node;

    let scroller_valid = doc.is_connected(scroller);
    let article_valid = doc.contains(scroller, article);
    let headings_valid = match (content.headings.first(), content.headings.last()) {
        (Some(first), Some(last)) => {
            doc.contains(article, first.node) && doc.contains(article, last.node)
        }
        _ => false,
    };
    scroller_valid && article_valid && headings_valid
}
