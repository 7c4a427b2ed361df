// src/server/mod.rs

use crate::config::Config;
use anyhow::{Context, Result};
use std::future::Future;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

mod connection_loop;
mod context;
mod initialization;
mod listener;

pub use context::ServerContext;
pub use initialization::setup;
pub use listener::{bind_socket, remove_socket_file};

/// The main server entry point: sets up, serves until SIGINT or SIGTERM,
/// then shuts down gracefully.
pub async fn run(config: Config) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    // 1. Bind the socket and open the instance.
    let server_context = initialization::setup(config).await?;

    // 2. Accept sessions until a signal arrives, then drain and close.
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    };
    connection_loop::run(server_context, shutdown).await
}

/// Serves an already set-up context until `shutdown` completes.
pub async fn serve<F>(ctx: ServerContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    connection_loop::run(ctx, shutdown).await
}
