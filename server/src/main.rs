use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
    sync::broadcast,
    task::JoinSet,
};
use tracing_subscriber::EnvFilter;

use server::{room_manager::RoomManager, session};

#[derive(Debug, Parser)]
#[command(about = "Real-time collaborative code room server")]
struct Args {
    /// Host to bind the TCP listener to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind the TCP listener to
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut join_set: JoinSet<anyhow::Result<()>> = JoinSet::new();
    let room_manager = Arc::new(RoomManager::new());

    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to create interrupt signal stream");
    let server = TcpListener::bind(format!("{}:{}", args.host, args.port))
        .await
        .expect("could not bind to the port");
    let (quit_tx, quit_rx) = broadcast::channel::<()>(1);

    tracing::info!(host = %args.host, port = args.port, "listening for connections");
    loop {
        tokio::select! {
            _ = interrupt.recv() => {
                tracing::info!("server interrupted, gracefully shutting down");
                quit_tx.send(()).context("failed to send quit signal").unwrap();
                break;
            }
            Ok((socket, addr)) = server.accept() => {
                tracing::debug!(peer = %addr, "accepted connection");
                join_set.spawn(session::handle_session(
                    Arc::clone(&room_manager),
                    quit_rx.resubscribe(),
                    socket,
                ));
            }
        }
    }

    while join_set.join_next().await.is_some() {}
    tracing::info!("server shut down");
}
