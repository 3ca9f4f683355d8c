//! Plain-text TOC renderer

use std::cell::{Cell, RefCell};

use readtoc_core::{Renderer, SharedDocument, TocProps};

pub struct ConsoleRenderer {
    doc: SharedDocument,
    props: RefCell<Option<TocProps>>,
    /// Print every active-heading change as it happens
    watch: Cell<bool>,
}

impl ConsoleRenderer {
    pub fn new(doc: SharedDocument) -> Self {
        Self {
            doc,
            props: RefCell::new(None),
            watch: Cell::new(false),
        }
    }

    pub fn watching(self) -> Self {
        self.watch.set(true);
        self
    }

    /// Print the current TOC with the active heading marked
    pub fn print(&self) {
        let props = self.props.borrow().clone();
        let Some(props) = props else {
            println!("(no toc)");
            return;
        };
        print!("{}", format_toc(&self.doc, &props));
    }
}

impl Renderer for ConsoleRenderer {
    fn render(&self, props: TocProps) {
        if self.watch.get() {
            let doc = self.doc.clone();
            let headings = props.headings.downgrade();
            let _ = props.active_heading.subscribe(move |index| {
                let title = headings
                    .get()
                    .and_then(|h| h.get(*index).map(|h| doc.text_content(h.node)))
                    .unwrap_or_default();
                println!("active: {}. {}", index + 1, title);
            });
        }
        *self.props.borrow_mut() = Some(props);
    }

    fn toast(&self, message: &str) {
        println!("[readtoc] {}", message);
    }
}

fn format_toc(doc: &SharedDocument, props: &TocProps) -> String {
    let shown = props.is_shown.get().unwrap_or(false);
    let Some(headings) = props.headings.get() else {
        return format!("toc ({})\n", if shown { "shown" } else { "hidden" });
    };
    let active = props.active_heading.get().unwrap_or(0);
    let topbar = props.topbar_height.get().unwrap_or(0.0);
    let top_level = headings.iter().map(|h| h.level).min().unwrap_or(1);

    let mut out = format!(
        "toc ({}, {} headings, topbar {}px)\n",
        if shown { "shown" } else { "hidden" },
        headings.len(),
        topbar
    );
    for (i, heading) in headings.iter().enumerate() {
        let marker = if i == active { ">" } else { " " };
        let indent = "  ".repeat(usize::from(heading.level - top_level));
        out.push_str(&format!(
            "{} {}{}. {}\n",
            marker,
            indent,
            i + 1,
            doc.text_content(heading.node)
        ));
    }
    out
}
