//! Client for a running command server

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::protocol::*;
use crate::session::Command;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct CommandClient {
    socket_path: PathBuf,
}

impl CommandClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Check if the server is running by sending a ping
    pub async fn ping(&self) -> Result<bool> {
        match self.call(methods::PING).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Send one page command; the answer is the session's acknowledgement
    pub async fn send(&self, command: Command) -> Result<bool> {
        let result = self.call(command.as_str()).await?;
        let response: AckResponse = serde_json::from_value(result)?;
        Ok(response.ack)
    }

    /// Send a request and receive a response
    async fn call(&self, method: &str) -> Result<serde_json::Value> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Other(format!(
                "Failed to connect to session at {}: {}. Is `readtoc serve` running?",
                self.socket_path.display(),
                e
            ))
        })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request = Request::new(method);
        let request_json = serde_json::to_string(&request)?;

        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut response_line = String::new();
        reader.read_line(&mut response_line).await?;

        let response: Response = serde_json::from_str(&response_line)?;

        if let Some(error) = response.error {
            return Err(Error::Other(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        response.result.ok_or_else(|| Error::Other("Empty response".to_string()))
    }
}

/// Check if a command server is reachable
pub async fn is_server_running(socket_path: &std::path::Path) -> bool {
    let client = CommandClient::new(socket_path.to_path_buf());
    client.ping().await.unwrap_or(false)
}
