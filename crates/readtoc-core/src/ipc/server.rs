//! Command server for a page session
//!
//! Listens on a Unix socket and forwards page commands to the session. The
//! session is single-threaded, so the server and every connection run as
//! local tasks on the caller's `LocalSet`.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::*;
use crate::config::AppConfig;
use crate::session::{Command, TocSession};
use crate::Result;

/// Serves one [`TocSession`] over a Unix socket
pub struct CommandServer {
    session: TocSession,
    socket_path: PathBuf,
}

impl CommandServer {
    pub fn new(session: TocSession, config: &AppConfig) -> Self {
        Self::with_socket(session, config.socket_path())
    }

    pub fn with_socket(session: TocSession, socket_path: PathBuf) -> Self {
        Self {
            session,
            socket_path,
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Run until `shutdown_rx` turns true
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        // Remove old socket file if exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        // Ensure parent directory exists
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("Command server listening on: {}", self.socket_path.display());

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let session = self.session.clone();
                            tokio::task::spawn_local(async move {
                                if let Err(e) = handle_connection(stream, session).await {
                                    warn!("Error handling connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Command server shutting down");
                        break;
                    }
                }
            }
        }

        // Cleanup socket file
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection(stream: UnixStream, session: TocSession) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!("Received request: {} (id: {})", request.method, request.id);
                handle_request(request, &session).await
            }
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Response::error(Uuid::nil(), ERR_PARSE, format!("Parse error: {}", e))
            }
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn handle_request(request: Request, session: &TocSession) -> Response {
    let id = request.id;

    if request.method == methods::PING {
        return Response::success(id, serde_json::json!({"ok": true}));
    }

    match request.method.parse::<Command>() {
        Ok(_) if !request.params.is_null() => {
            Response::error(id, ERR_INVALID_PARAMS, "Commands take no parameters")
        }
        Ok(command) => Response::ack(id, session.handle(command).await),
        Err(_) => Response::error(id, ERR_METHOD_NOT_FOUND, "Method not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::CommandClient;
    use crate::preferences::MemoryPreferences;
    use crate::testing::{load, three_heading_page, RecordingRenderer};
    use std::rc::Rc;
    use tokio::task::LocalSet;

    fn session() -> TocSession {
        let (_memory, doc) = load(three_heading_page());
        TocSession::new(
            doc,
            Rc::new(RecordingRenderer::default()),
            Rc::new(MemoryPreferences::new()),
            AppConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_handle_request_dispatch() {
        LocalSet::new()
            .run_until(async {
                let session = session();

                let resp = handle_request(Request::new(methods::PING), &session).await;
                assert_eq!(resp.result, Some(serde_json::json!({"ok": true})));

                let resp = handle_request(Request::new(methods::TOGGLE), &session).await;
                assert_eq!(resp.result, Some(serde_json::json!({"ack": true})));
                assert!(session.is_loaded());

                let resp = handle_request(Request::new("scroll"), &session).await;
                assert_eq!(resp.error.unwrap().code, ERR_METHOD_NOT_FOUND);

                let request = Request::new(methods::NEXT).with_params(serde_json::json!({"step": 2}));
                let resp = handle_request(request, &session).await;
                assert_eq!(resp.error.unwrap().code, ERR_INVALID_PARAMS);
                session.unload();
            })
            .await;
    }

    #[tokio::test]
    async fn test_socket_round_trip() {
        LocalSet::new()
            .run_until(async {
                let dir = std::env::temp_dir().join(format!("readtoc-ipc-{}", Uuid::new_v4()));
                let socket = dir.join("readtoc.sock");
                let session = session();
                let server = CommandServer::with_socket(session.clone(), socket.clone());
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let running = tokio::task::spawn_local(async move { server.run(shutdown_rx).await });

                let client = CommandClient::new(socket.clone());
                let mut attempts = 0;
                while !client.ping().await.unwrap() && attempts < 50 {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    attempts += 1;
                }

                assert!(client.send(Command::Refresh).await.unwrap());
                assert!(session.toc().unwrap().is_shown());
                assert!(client.send(Command::Toggle).await.unwrap());
                assert!(!session.is_loaded());

                shutdown_tx.send(true).unwrap();
                running.await.unwrap().unwrap();
                assert!(!socket.exists());
                std::fs::remove_dir_all(&dir).unwrap();
            })
            .await;
    }
}
