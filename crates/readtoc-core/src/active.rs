//! Active heading resolution

use crate::content::Content;
use crate::dom::SharedDocument;
use crate::stream::{combine4, Stream};

/// Index of the heading being read
///
/// The boundary is the first heading whose top sits at least `margin` pixels
/// below the visible area's top; the active heading is the one just before
/// it, or the last heading if none crosses. 0 when there are no headings.
pub fn active_heading_index(
    content: &Content,
    topbar_height: f64,
    scroll_top: f64,
    margin: f64,
) -> usize {
    let scroller_top = content.scroller.rect.top;
    let visible_area_top = topbar_height.max(scroller_top);

    let boundary = content
        .headings
        .iter()
        .position(|heading| {
            let top = scroller_top - scroll_top
                + content.article.from_scroller_top
                + heading.from_article_top;
            top >= visible_area_top + margin
        })
        .unwrap_or(content.headings.len());

    boundary.saturating_sub(1)
}

/// Active index recomputed on content, topbar or scroll changes while shown
///
/// `scroll` must already hold a value (use `starts_with`). Nothing is read
/// from the document while hidden.
pub fn active_heading_stream(
    doc: SharedDocument,
    content: &Stream<Content>,
    topbar_height: &Stream<f64>,
    scroll: &Stream<()>,
    is_shown: &Stream<bool>,
    margin: f64,
) -> Stream<usize> {
    combine4(content, topbar_height, scroll, is_shown)
        .filter(|(_, _, _, shown)| *shown)
        .map(move |(content, topbar, _, _)| {
            if content.headings.is_empty() {
                return 0;
            }
            let scroll_top = doc.scroll_top(content.scroller.node);
            active_heading_index(content, *topbar, scroll_top, margin)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Article, Heading, Scroller};
    use crate::dom::{NodeId, Rect};

    fn content(tops: &[f64], scroller_top: f64) -> Content {
        Content {
            article: Article {
                node: NodeId(1),
                from_scroller_top: 0.0,
                rect: Rect::default(),
            },
            scroller: Scroller {
                node: NodeId(0),
                rect: Rect::new(0.0, scroller_top, 1280.0, 800.0),
            },
            headings: tops
                .iter()
                .enumerate()
                .map(|(i, top)| Heading {
                    node: NodeId(10 + i as u32),
                    level: 2,
                    from_article_top: *top - scroller_top,
                })
                .collect(),
        }
    }

    #[test]
    fn test_boundary_example() {
        // Screen tops [50, 200, 400] with the visible area starting at 100
        let c = content(&[50.0, 200.0, 400.0], 0.0);
        assert_eq!(active_heading_index(&c, 100.0, 0.0, 15.0), 0);
    }

    #[test]
    fn test_margin_tie_break() {
        let c = content(&[0.0, 110.0, 400.0], 0.0);
        // 110 is inside the 15px band below 100, so it already counts as passed
        assert_eq!(active_heading_index(&c, 100.0, 0.0, 15.0), 1);
        assert_eq!(active_heading_index(&c, 100.0, 0.0, 5.0), 0);
    }

    #[test]
    fn test_all_passed_selects_last() {
        let c = content(&[0.0, 100.0, 200.0], 0.0);
        assert_eq!(active_heading_index(&c, 0.0, 1000.0, 15.0), 2);
    }

    #[test]
    fn test_no_headings() {
        let c = content(&[], 0.0);
        assert_eq!(active_heading_index(&c, 60.0, 500.0, 15.0), 0);
    }

    #[test]
    fn test_scroller_top_bounds_visible_area() {
        // Inner scroller starting at 120 with no topbar
        let c = content(&[130.0, 300.0], 120.0);
        assert_eq!(active_heading_index(&c, 0.0, 0.0, 15.0), 0);
        assert_eq!(active_heading_index(&c, 0.0, 200.0, 15.0), 1);
    }
}
