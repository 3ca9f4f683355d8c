use std::path::Path;
use std::rc::Rc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::LocalSet;
use tracing::info;

use readtoc_core::{AppConfig, CommandServer, FilePreferences, SharedDocument, TocSession};

use crate::console::ConsoleRenderer;

pub async fn run(config: AppConfig, page: &Path) -> Result<()> {
    let memory = super::load_page(page)?;
    let doc: SharedDocument = memory;

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Setup signal handler for graceful shutdown
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let local = LocalSet::new();
    local
        .run_until(async move {
            let renderer = Rc::new(ConsoleRenderer::new(doc.clone()).watching());
            let preferences = Rc::new(FilePreferences::new(config.preferences_path()));
            let session = TocSession::new(doc, renderer, preferences, config.clone())?;

            if session.init().await? {
                println!("TOC loaded automatically for this host.");
            }

            let server = CommandServer::new(session.clone(), &config);
            println!(
                "Serving commands on {}. Press Ctrl+C to stop.",
                server.socket_path().display()
            );
            server.run(shutdown_rx).await?;

            session.unload();
            println!("Session stopped.");
            Ok::<_, anyhow::Error>(())
        })
        .await
}
