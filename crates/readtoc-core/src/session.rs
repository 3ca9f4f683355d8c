//! Page session runtime
//!
//! A [`TocSession`] owns at most one [`Toc`] for a page. It answers the
//! command protocol, reloads the TOC when the article is swapped in place
//! (feed readers, single-page blogs) and decides from the host and the user's
//! preferences whether a TOC is shown at all.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::dom::{ListenerId, NodeId, NodeIdentity, SharedDocument};
use crate::events::TocEvent;
use crate::host::HostProfile;
use crate::preferences::{Offset, PreferenceValues, Preferences};
use crate::toc::{Renderer, Toc, TocOptions, TocPreference};
use crate::{Error, Result};

/// Shown once per article when nothing could be detected
pub const NO_ARTICLE_TIP: &str = "No article/headings are detected.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Toggle,
    Prev,
    Next,
    Refresh,
    /// Notification that a page loaded its TOC
    Load,
    /// Notification that a page unloaded its TOC
    Unload,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Toggle,
        Command::Prev,
        Command::Next,
        Command::Refresh,
        Command::Load,
        Command::Unload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Toggle => "toggle",
            Command::Prev => "prev",
            Command::Next => "next",
            Command::Refresh => "refresh",
            Command::Load => "load",
            Command::Unload => "unload",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidCommand(s.to_string()))
    }
}

struct SessionInner {
    doc: SharedDocument,
    renderer: Rc<dyn Renderer>,
    preferences: Rc<dyn Preferences>,
    config: AppConfig,
    host: HostProfile,
    /// Medium-powered page detected at startup
    medium_article: bool,

    loaded: Cell<bool>,
    toc: RefCell<Option<Toc>>,
    observer: Cell<Option<ListenerId>>,
    preference: Cell<TocPreference>,
    values: RefCell<PreferenceValues>,

    new_article_detected: Cell<bool>,
    tip_shown: Cell<bool>,
    article: RefCell<NodeIdentity>,
    /// Selector of a swapped article still waiting to appear
    awaiting_article: RefCell<Option<String>>,

    ticker: RefCell<Option<AbortHandle>>,
    retry: RefCell<Option<AbortHandle>>,
}

/// The TOC runtime of one page
///
/// Must be driven inside a `tokio::task::LocalSet`.
#[derive(Clone)]
pub struct TocSession {
    inner: Rc<SessionInner>,
}

impl TocSession {
    pub fn new(
        doc: SharedDocument,
        renderer: Rc<dyn Renderer>,
        preferences: Rc<dyn Preferences>,
        config: AppConfig,
    ) -> Result<Self> {
        let host = HostProfile::new(doc.location(), &config.hosts)?;
        let values = PreferenceValues::default();
        let medium_article = doc.query_selector("#root").is_some()
            && doc.query_selector(&values.selector_medium).is_some();

        debug!(
            domain = %host.location().domain,
            feed_reader = host.is_feed_reader(),
            medium = host.is_medium(),
            medium_article,
            "session created"
        );

        Ok(Self {
            inner: Rc::new(SessionInner {
                doc,
                renderer,
                preferences,
                config,
                host,
                medium_article,
                loaded: Cell::new(false),
                toc: RefCell::new(None),
                observer: Cell::new(None),
                preference: Cell::new(TocPreference::default()),
                values: RefCell::new(values),
                new_article_detected: Cell::new(true),
                tip_shown: Cell::new(false),
                article: RefCell::new(NodeIdentity::default()),
                awaiting_article: RefCell::new(None),
                ticker: RefCell::new(None),
                retry: RefCell::new(None),
            }),
        })
    }

    /// Load automatically when the auto-load preference allows it for this
    /// host. Returns whether the session loaded.
    pub async fn init(&self) -> Result<bool> {
        let values = self
            .inner
            .preferences
            .get(&PreferenceValues::default())
            .await?;
        let auto = self.inner.host.auto_load(values.auto_type, self.inner.medium_article);
        *self.inner.values.borrow_mut() = values;

        if auto {
            SessionInner::load(&self.inner).await?;
        }
        Ok(auto)
    }

    /// Run one command and report whether it succeeded
    ///
    /// The command runs in its own local task; a failure or panic there is
    /// logged and answered with `false`.
    pub async fn handle(&self, command: Command) -> bool {
        if matches!(command, Command::Load | Command::Unload) {
            return true;
        }

        let inner = self.inner.clone();
        let task = tokio::task::spawn_local(async move {
            SessionInner::dispatch(&inner, command).await
        });
        match task.await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(%command, error = %e, "command failed");
                false
            }
            Err(e) => {
                error!(%command, error = %e, "command aborted");
                false
            }
        }
    }

    pub async fn load(&self) -> Result<()> {
        SessionInner::load(&self.inner).await
    }

    pub fn unload(&self) {
        self.inner.unload();
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.get()
    }

    /// The live TOC, if one is rendered
    pub fn toc(&self) -> Option<Toc> {
        self.inner.toc.borrow().clone()
    }

    pub fn host(&self) -> &HostProfile {
        &self.inner.host
    }
}

impl SessionInner {
    async fn dispatch(this: &Rc<Self>, command: Command) -> Result<()> {
        if !this.loaded.get() || command == Command::Refresh {
            return Self::load(this).await;
        }

        let toc = this.toc.borrow().clone();
        if let Some(toc) = toc {
            match command {
                Command::Toggle => toc.toggle(),
                Command::Prev => {
                    tokio::task::spawn_local(toc.prev());
                }
                Command::Next => {
                    tokio::task::spawn_local(toc.next());
                }
                _ => {}
            }
        }
        if command == Command::Toggle {
            this.unload();
        }
        Ok(())
    }

    async fn load(this: &Rc<Self>) -> Result<()> {
        info!(domain = %this.host.location().domain, "loading toc");
        this.loaded.set(true);
        this.refresh_preferences().await?;
        // Without mutation tracking a rendered toc could outlive its article
        if !Self::listen_mutations(this) {
            return Ok(());
        }
        Self::start(this);
        Ok(())
    }

    fn unload(&self) {
        info!("unloading toc");
        self.loaded.set(false);

        let toc = self.toc.borrow_mut().take();
        if let Some(toc) = toc {
            toc.dispose();
        }
        if let Some(id) = self.observer.take() {
            self.doc.disconnect_observer(id);
        }
        for handle in [self.ticker.take(), self.retry.take()].into_iter().flatten() {
            handle.abort();
        }
        self.awaiting_article.replace(None);
    }

    /// The stored offset only counts while remember-position is on
    async fn refresh_preferences(&self) -> Result<()> {
        let values = self.preferences.get(&PreferenceValues::default()).await?;
        let offset = if values.is_remember_pos {
            values.offset
        } else {
            Offset::default()
        };
        self.preference.set(TocPreference { offset });
        *self.values.borrow_mut() = values;
        Ok(())
    }

    fn preferred_selectors(&self) -> Vec<String> {
        let values = self.values.borrow();
        if self.medium_article || self.host.is_medium() {
            vec![values.selector_medium.clone()]
        } else if self.host.is_feed_reader() {
            vec![values.selector_inoreader.clone()]
        } else {
            Vec::new()
        }
    }

    /// An article that has at least one heading
    fn detect(&self) -> Option<NodeId> {
        self.doc
            .find_article(&self.preferred_selectors())
            .filter(|article| !self.doc.extract_headings(*article).is_empty())
    }

    fn start(this: &Rc<Self>) {
        let article = this.detect();
        Self::render_toc(this, article);
    }

    fn render_toc(this: &Rc<Self>, article: Option<NodeId>) {
        let previous = this.toc.borrow_mut().take();
        if let Some(toc) = previous {
            toc.dispose();
        }
        if !this.host.allows_render(this.medium_article) {
            debug!(path = %this.host.location().path, "host page without toc");
            return;
        }
        let Some(article) = article else {
            Self::schedule_retry(this);
            return;
        };

        this.tip_shown.set(false);
        this.new_article_detected.set(true);

        let options = TocOptions::new(article, &this.config)
            .with_preference(this.preference.get())
            .with_scroll_margin(this.host.scroll_margin(&this.config.scroll));
        let toc = Toc::new(
            this.doc.clone(),
            this.renderer.as_ref(),
            this.preferences.clone(),
            options,
        );

        let weak = Rc::downgrade(this);
        toc.on_error(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.drop_toc(event);
            }
        });
        *this.toc.borrow_mut() = Some(toc.clone());
        toc.show();
    }

    /// No automatic restart; the mutation ticker picks up a new article
    fn drop_toc(&self, event: &TocEvent) {
        let toc = self.toc.borrow_mut().take();
        if let Some(toc) = toc {
            warn!(?event, "toc invalidated");
            toc.dispose();
        }
    }

    fn schedule_retry(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let delay = this.config.timing.detection_retry();
        debug!(?delay, "no article detected, retrying");

        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match inner.detect() {
                Some(article) => Self::render_toc(&inner, Some(article)),
                None => inner.show_tip().await,
            }
        });
        if let Some(previous) = this.retry.replace(Some(task.abort_handle())) {
            previous.abort();
        }
    }

    async fn show_tip(&self) {
        let show = match self.preferences.get(&PreferenceValues::default()).await {
            Ok(values) => values.is_show_tip,
            Err(e) => {
                warn!(error = %e, "failed to read preferences");
                self.values.borrow().is_show_tip
            }
        };
        if show && !self.tip_shown.get() {
            self.renderer.toast(NO_ARTICLE_TIP);
            self.tip_shown.set(true);
        }
    }

    fn listen_mutations(this: &Rc<Self>) -> bool {
        if let Some(id) = this.observer.take() {
            this.doc.disconnect_observer(id);
        }

        let weak = Rc::downgrade(this);
        let observer = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                SessionInner::on_mutation(&inner);
            }
        });
        match this.doc.observe_mutations(observer) {
            Ok(id) => {
                this.observer.set(Some(id));
                true
            }
            Err(e) => {
                error!(error = %e, "mutation observation unavailable, toc disabled");
                false
            }
        }
    }

    /// Restart the ticker; tick 1 tracks the article, later ticks re-detect
    /// until a swapped article is rendered
    fn on_mutation(this: &Rc<Self>) {
        let awaiting = this.awaiting_article.borrow().clone();
        if let Some(selector) = awaiting {
            if this.doc.query_selector(&selector).is_some() {
                this.awaiting_article.replace(None);
                Self::start(this);
            }
        }

        let weak = Rc::downgrade(this);
        let period = this.config.timing.mutation_tick();
        let ticks = this.config.timing.mutation_ticks;
        let task = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            for tick in 1..=ticks {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                debug!(tick, new_article_detected = inner.new_article_detected.get(), "mutation tick");

                if tick == 1 {
                    if let Err(e) = inner.refresh_preferences().await {
                        warn!(error = %e, "failed to read preferences");
                    }
                    Self::track_article(&inner);
                } else if !inner.new_article_detected.get() && Self::detect_toc(&inner).await {
                    break;
                }
            }
        });
        if let Some(previous) = this.ticker.replace(Some(task.abort_handle())) {
            previous.abort();
        }
    }

    fn track_article(this: &Rc<Self>) {
        let selector = {
            let values = this.values.borrow();
            if this.medium_article {
                values.selector_medium.clone()
            } else {
                values.selector_inoreader.clone()
            }
        };

        let toc = this.toc.borrow().clone();
        if let Some(toc) = toc {
            toc.notify_content_changed();
        }

        let found = this.doc.query_selector(&selector);
        let identity = found.map(|n| this.doc.identity(n)).unwrap_or_default();
        let changed = found.is_none() || identity != *this.article.borrow();
        if !changed {
            return;
        }

        info!(id = %identity.id, class = %identity.class, "article changed");
        this.new_article_detected.set(false);
        this.tip_shown.set(false);
        *this.article.borrow_mut() = identity;
        *this.awaiting_article.borrow_mut() = Some(selector);

        // App domains swap articles without further mutations to wait for
        if this.host.is_app_domain() {
            Self::start(this);
        }
    }

    async fn detect_toc(this: &Rc<Self>) -> bool {
        let Some(article) = this.detect() else {
            return false;
        };
        if let Err(e) = this.refresh_preferences().await {
            warn!(error = %e, "failed to read preferences");
        }
        Self::render_toc(this, Some(article));
        true
    }
}
