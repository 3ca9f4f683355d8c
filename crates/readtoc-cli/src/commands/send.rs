use anyhow::Result;

use readtoc_core::{ipc::is_server_running, AppConfig, Command, CommandClient};

pub async fn run(config: &AppConfig, command: Command) -> Result<()> {
    let socket_path = config.socket_path();
    if !is_server_running(&socket_path).await {
        println!("No session is running. Start one with 'readtoc serve --page <fixture>'.");
        return Ok(());
    }

    let client = CommandClient::new(socket_path);
    let ack = client.send(command).await?;
    println!("{}: {}", command, if ack { "ok" } else { "failed" });
    Ok(())
}
