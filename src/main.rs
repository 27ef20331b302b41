//! `ackframe` binary: an echo server and a one-shot client.

mod cli;

use std::{net::SocketAddr, process::ExitCode, time::Duration};

use ackframe::{
    Connection,
    ConnectionHooks,
    Meta,
    Replies,
    Value,
    server::{Server, ServerConfig},
};
use clap::Parser;
use cli::{Cli, Command};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Enable structured logging for the binary.
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve {
            host,
            port,
            idle_timeout_secs,
            max_frame_size,
        } => {
            let config = ServerConfig {
                host,
                port,
                max_frame_size,
                connect_idle_timeout: Some(Duration::from_secs(idle_timeout_secs)),
                ..ServerConfig::default()
            };
            serve(config).await
        }
        Command::Send {
            host,
            port,
            timeout_ms,
            message,
        } => send(SocketAddr::new(host, port), Duration::from_millis(timeout_ms), message).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "ackframe failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::new(|| {
        ConnectionHooks::new()
            .on_data(|value: Value, meta: &Meta, replies: &mut Replies| {
                info!(sequence = meta.sequence, ?value, "request");
                replies.reply(value);
                Ok(())
            })
            .on_close(|had_error| info!(had_error, "connection closed"))
    })
    .config(config)
    .bind_configured()?;
    info!(addr = ?server.local_addr(), "listening");
    server.run().await?;
    Ok(())
}

async fn send(
    addr: SocketAddr,
    timeout: Duration,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let connection = Connection::builder()
        .send_timeout(Some(timeout))
        .connect(addr)
        .await?;
    let response = connection.send(message).await?;
    match response.value.to_json() {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{:?}", response.value),
    }
    connection.close();
    connection.closed().await;
    Ok(())
}
