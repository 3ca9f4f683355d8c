use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::task::LocalSet;

use readtoc_core::{
    AppConfig, Command, Document, MemoryPreferences, SharedDocument, TocSession,
};

use crate::console::ConsoleRenderer;

pub async fn run(
    config: AppConfig,
    page: &Path,
    scrolls: Vec<f64>,
    commands: Vec<Command>,
) -> Result<()> {
    let memory = super::load_page(page)?;
    let doc: SharedDocument = memory;
    // Long enough for a smooth scroll and the topbar re-measure behind it
    let settle = config.scroll.animation_duration()
        + config.timing.topbar_throttle()
        + Duration::from_millis(50);
    let retry = config.timing.detection_retry() + Duration::from_millis(50);

    let local = LocalSet::new();
    local
        .run_until(async move {
            let renderer = Rc::new(ConsoleRenderer::new(doc.clone()));
            let session = TocSession::new(
                doc.clone(),
                renderer.clone(),
                Rc::new(MemoryPreferences::new()),
                config,
            )?;

            if !session.handle(Command::Toggle).await {
                bail!("Failed to load the TOC");
            }
            if session.toc().is_none() {
                // Give the single re-detection its chance before giving up
                tokio::time::sleep(retry).await;
            }
            let Some(toc) = session.toc() else {
                println!("No TOC for this page.");
                return Ok(());
            };

            println!("== loaded");
            renderer.print();

            let scroller = toc.scroller();
            for top in scrolls {
                doc.set_scroll_top(scroller, top);
                println!("== scroll {}", top);
                renderer.print();
            }

            for command in commands {
                let ack = session.handle(command).await;
                tokio::time::sleep(settle).await;
                println!("== {} ({})", command, if ack { "ok" } else { "failed" });
                renderer.print();
            }

            session.unload();
            Ok::<_, anyhow::Error>(())
        })
        .await
}
