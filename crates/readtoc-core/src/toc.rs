//! TOC controller
//!
//! A [`Toc`] wires the measurement pipeline, the topbar detector and the
//! active-heading resolver for one article, hands the resulting streams to a
//! [`Renderer`], and exposes the imperative commands. Every listener, timer
//! and stream it creates is registered with its [`Disposers`] and released by
//! [`Toc::dispose`].

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::{Rc, Weak};

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::active::active_heading_stream;
use crate::config::{AppConfig, ScrollConfig, TimingConfig};
use crate::content::{content_stream, validate, Article, Content, Heading, Scroller};
use crate::dom::{EventKind, EventTarget, ListenerId, NodeId, SharedDocument};
use crate::events::{EventEmitter, TocEvent};
use crate::preferences::{Offset, PreferencePatch, PreferenceValues, Preferences};
use crate::scroll::smooth_scroll;
use crate::stream::{Disposers, Stream};
use crate::topbar::topbar_stream;

/// Completion of a scroll-to-heading effect
pub type ScrollFuture = Pin<Box<dyn Future<Output = ()>>>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TocPreference {
    pub offset: Offset,
}

/// Everything a renderer needs to draw one TOC panel
#[derive(Clone)]
pub struct TocProps {
    pub is_shown: Stream<bool>,
    pub article: Stream<Article>,
    pub scroller: Stream<Scroller>,
    pub headings: Stream<Vec<Heading>>,
    pub offset: Stream<Offset>,
    pub active_heading: Stream<usize>,
    pub topbar_height: Stream<f64>,
    /// The panel was dragged to a new offset
    pub on_drag: Rc<dyn Fn(Offset)>,
    /// A heading entry was clicked
    pub on_scroll_to_heading: Rc<dyn Fn(usize) -> ScrollFuture>,
}

/// Draws the TOC panel; the visual side is entirely up to the host
pub trait Renderer {
    fn render(&self, props: TocProps);

    /// Show a one-off advisory message
    fn toast(&self, message: &str);
}

#[derive(Debug, Clone)]
pub struct TocOptions {
    pub article: NodeId,
    pub preference: TocPreference,
    /// Gap kept between the topbar and a heading scrolled into view
    pub scroll_margin: f64,
    pub visibility_margin: f64,
    pub timing: TimingConfig,
    pub scroll: ScrollConfig,
}

impl TocOptions {
    pub fn new(article: NodeId, config: &AppConfig) -> Self {
        Self {
            article,
            preference: TocPreference::default(),
            scroll_margin: config.scroll.top_margin,
            visibility_margin: config.resolver.visibility_margin,
            timing: config.timing.clone(),
            scroll: config.scroll.clone(),
        }
    }

    pub fn with_preference(mut self, preference: TocPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_scroll_margin(mut self, margin: f64) -> Self {
        self.scroll_margin = margin;
        self
    }
}

struct TocInner {
    doc: SharedDocument,
    preferences: Rc<dyn Preferences>,
    scroll_config: ScrollConfig,
    scroll_margin: f64,
    scroller: NodeId,

    disposers: Disposers,
    emitter: EventEmitter<TocEvent>,
    disposed: Cell<bool>,
    is_remember_pos: Cell<bool>,
    scrolls: RefCell<Vec<AbortHandle>>,

    trigger_topbar: Stream<NodeId>,
    trigger_content: Stream<()>,
    trigger_shown: Stream<bool>,

    is_shown: Stream<bool>,
    content: Stream<Content>,
    topbar_height: Stream<f64>,
    active_heading: Stream<usize>,
    offset: Stream<Offset>,
}

/// One TOC session over one article
///
/// Must be created and driven inside a `tokio::task::LocalSet`.
#[derive(Clone)]
pub struct Toc {
    inner: Rc<TocInner>,
}

impl Toc {
    pub fn new(
        doc: SharedDocument,
        renderer: &dyn Renderer,
        preferences: Rc<dyn Preferences>,
        options: TocOptions,
    ) -> Self {
        let article = options.article;
        let scroller = doc.scroll_container(article);
        let timing = &options.timing;
        let disposers = Disposers::new();

        // Triggers
        let trigger_topbar: Stream<NodeId> = Stream::new();
        let trigger_content = Stream::of(());
        let trigger_shown: Stream<bool> = Stream::new();
        let periodic = Stream::from_interval(timing.periodic_check(), &disposers)
            .signal()
            .log("check");

        // Observables
        let is_shown = trigger_shown.unique().log("isShown");
        let topbar_height = topbar_stream(
            doc.clone(),
            &trigger_topbar,
            scroller,
            timing.topbar_throttle(),
        )
        .log("topbarHeight");

        let resize = Stream::from_event(&doc, EventTarget::Window, EventKind::Resize, &disposers)
            .throttle(timing.resize_throttle())
            .signal()
            .log("resize");
        let measure_trigger =
            Stream::merge(&[trigger_content.clone(), is_shown.signal(), resize, periodic]);
        let content = content_stream(doc.clone(), article, scroller, &measure_trigger, &is_shown)
            .log("content");

        let scroll_target = if doc.is_page_scroller(scroller) {
            EventTarget::Window
        } else {
            EventTarget::Node(scroller)
        };
        let scroll = Stream::from_event(&doc, scroll_target, EventKind::Scroll, &disposers)
            .signal()
            .starts_with(())
            .log("scroll");
        let active_heading = active_heading_stream(
            doc.clone(),
            &content,
            &topbar_height,
            &scroll,
            &is_shown,
            options.visibility_margin,
        )
        .unique()
        .log("activeHeading");

        let offset = Stream::of(options.preference.offset);

        // Disposing the roots tears down every derived stream
        {
            let roots = (
                trigger_shown.clone(),
                trigger_content.clone(),
                trigger_topbar.clone(),
                offset.clone(),
            );
            disposers.add(move || {
                roots.0.dispose();
                roots.1.dispose();
                roots.2.dispose();
                roots.3.dispose();
            });
        }

        let inner = Rc::new(TocInner {
            doc,
            preferences,
            scroll_config: options.scroll.clone(),
            scroll_margin: options.scroll_margin,
            scroller,
            disposers,
            emitter: EventEmitter::new(),
            disposed: Cell::new(false),
            is_remember_pos: Cell::new(true),
            scrolls: RefCell::new(Vec::new()),
            trigger_topbar,
            trigger_content,
            trigger_shown,
            is_shown,
            content,
            topbar_height,
            active_heading,
            offset,
        });

        TocInner::watch_validity(&inner);
        TocInner::read_remember_pos(&inner);

        let props = TocInner::props(&inner);
        let toc = Self { inner };
        // A failed render must not strand the listeners registered above
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| renderer.render(props))) {
            warn!("renderer failed, releasing toc");
            toc.dispose();
            resume_unwind(panic);
        }

        info!(?article, ?scroller, "toc created");
        toc
    }

    pub fn show(&self) {
        if !self.inner.disposed.get() {
            self.inner.trigger_shown.emit(true);
        }
    }

    pub fn hide(&self) {
        if !self.inner.disposed.get() {
            self.inner.trigger_shown.emit(false);
        }
    }

    pub fn toggle(&self) {
        if self.is_shown() {
            self.hide();
        } else {
            self.show();
        }
    }

    /// Scroll to the heading after the active one
    pub fn next(&self) -> ScrollFuture {
        let count = self.heading_count();
        if count == 0 {
            return Box::pin(async {});
        }
        let index = (self.active_heading() + 1).min(count - 1);
        self.scroll_to_heading(index)
    }

    /// Scroll to the heading before the active one
    pub fn prev(&self) -> ScrollFuture {
        if self.heading_count() == 0 {
            return Box::pin(async {});
        }
        self.scroll_to_heading(self.active_heading().saturating_sub(1))
    }

    /// Smooth-scroll to heading `index`
    ///
    /// Resolves when the scroll finishes, immediately if there is no such
    /// heading. A new call does not cancel one in flight.
    pub fn scroll_to_heading(&self, index: usize) -> ScrollFuture {
        TocInner::scroll_to_heading(&self.inner, index)
    }

    /// Hide, release every registered resource and drop all error listeners.
    /// Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.get() {
            return;
        }
        inner.trigger_shown.emit(false);
        inner.disposed.set(true);

        inner.disposers.dispose_all();
        inner.emitter.remove_all_listeners();
        for handle in inner.scrolls.borrow_mut().drain(..) {
            handle.abort();
        }
        info!("toc disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub fn preference(&self) -> TocPreference {
        TocPreference {
            offset: self.inner.offset.get().unwrap_or_default(),
        }
    }

    /// Request a re-measurement after the article changed
    pub fn notify_content_changed(&self) {
        self.inner.trigger_content.emit(());
    }

    pub fn on_error(&self, listener: impl Fn(&TocEvent) + 'static) -> ListenerId {
        self.inner.emitter.on(listener)
    }

    pub fn off(&self, id: ListenerId) {
        self.inner.emitter.off(id);
    }

    pub fn is_shown(&self) -> bool {
        self.inner.is_shown.get().unwrap_or(false)
    }

    pub fn content(&self) -> Option<Content> {
        self.inner.content.get()
    }

    pub fn active_heading(&self) -> usize {
        self.inner.active_heading.get().unwrap_or(0)
    }

    pub fn topbar_height(&self) -> f64 {
        self.inner.topbar_height.get().unwrap_or(0.0)
    }

    pub fn scroller(&self) -> NodeId {
        self.inner.scroller
    }

    /// Teardown actions still pending
    pub fn pending_disposers(&self) -> usize {
        self.inner.disposers.len()
    }

    fn heading_count(&self) -> usize {
        self.inner
            .content
            .get()
            .map(|c| c.headings.len())
            .unwrap_or(0)
    }
}

impl TocInner {
    fn watch_validity(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let doc = Rc::downgrade(&this.doc);
        let subscription = this.content.subscribe(move |content| {
            let (Some(inner), Some(doc)) = (weak.upgrade(), doc.upgrade()) else {
                return;
            };
            if !validate(&doc, content) {
                warn!(article = ?content.article.node, "article changed");
                inner.emitter.emit(&TocEvent::article_changed());
            }
        });
        this.disposers.add_subscription(subscription);
    }

    /// Remember-position is read once per session
    fn read_remember_pos(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let preferences = this.preferences.clone();
        let task = tokio::task::spawn_local(async move {
            match preferences.get(&PreferenceValues::default()).await {
                Ok(values) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.is_remember_pos.set(values.is_remember_pos);
                    }
                }
                Err(e) => warn!(error = %e, "failed to read preferences"),
            }
        });
        this.disposers.add(move || task.abort());
    }

    fn props(this: &Rc<Self>) -> TocProps {
        let drag_target = Rc::downgrade(this);
        let scroll_target = Rc::downgrade(this);
        TocProps {
            is_shown: this.is_shown.clone(),
            article: this.content.map(|c| c.article.clone()),
            scroller: this.content.map(|c| c.scroller.clone()),
            headings: this.content.map(|c| c.headings.clone()),
            offset: this.offset.clone(),
            active_heading: this.active_heading.clone(),
            topbar_height: this.topbar_height.clone(),
            on_drag: Rc::new(move |offset| {
                if let Some(inner) = drag_target.upgrade() {
                    inner.drag(offset);
                }
            }),
            on_scroll_to_heading: Rc::new(move |index| match scroll_target.upgrade() {
                Some(inner) => TocInner::scroll_to_heading(&inner, index),
                None => Box::pin(async {}),
            }),
        }
    }

    fn drag(&self, offset: Offset) {
        if self.disposed.get() {
            return;
        }
        self.offset.emit(offset);
        if !self.is_remember_pos.get() {
            return;
        }
        let preferences = self.preferences.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = preferences.set(PreferencePatch::offset(offset)).await {
                warn!(error = %e, "failed to persist offset");
            }
        });
    }

    fn scroll_to_heading(this: &Rc<Self>, index: usize) -> ScrollFuture {
        if this.disposed.get() {
            return Box::pin(async {});
        }
        let target = this
            .content
            .get()
            .and_then(|c| c.headings.get(index).map(|h| (c.scroller.node, h.node)));
        let Some((scroller, heading)) = target else {
            debug!(index, "no heading to scroll to");
            return Box::pin(async {});
        };

        let margin = this.topbar_height.get().unwrap_or(0.0) + this.scroll_margin;
        let task = smooth_scroll(&this.doc, scroller, heading, margin, &this.scroll_config);
        if let Some(handle) = task.abort_handle() {
            let mut scrolls = this.scrolls.borrow_mut();
            scrolls.retain(|h| !h.is_finished());
            scrolls.push(handle);
        }

        let weak: Weak<Self> = Rc::downgrade(this);
        Box::pin(async move {
            task.finished().await;
            // Sticky headers may have changed height on the way
            if let Some(inner) = weak.upgrade() {
                inner.trigger_topbar.emit(heading);
            }
        })
    }
}
