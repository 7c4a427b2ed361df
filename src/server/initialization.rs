// src/server/initialization.rs

//! Handles server initialization: binding the socket and opening the
//! instance.

use super::context::ServerContext;
use super::listener::{bind_socket, remove_socket_file};
use crate::config::Config;
use crate::core::instance::Instance;
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
///
/// The socket is bound before the instance is opened, so a second server
/// pointed at a busy socket never touches the log.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);

    let listener = bind_socket(&config.socket_path).await?;
    info!(
        "SigmaDB server listening on {}",
        config.socket_path.display()
    );

    let instance = match Instance::open_optional(config.log_file.as_deref(), config.log_fsync).await
    {
        Ok(instance) => instance,
        Err(e) => {
            drop(listener);
            remove_socket_file(&config.socket_path);
            return Err(e).context("Failed to open the instance");
        }
    };

    let (shutdown_tx, _) = broadcast::channel(1);
    let socket_path = config.socket_path.clone();
    let state = Arc::new(ServerState::new(config, instance));
    info!("Server state initialized.");

    Ok(ServerContext {
        state,
        listener,
        socket_path,
        shutdown_tx,
    })
}

fn log_startup_info(config: &Config) {
    info!(
        "SigmaDB {} starting (pid {}).",
        env!("SIGMADB_BUILD_VERSION"),
        std::process::id()
    );
    match &config.log_file {
        Some(path) => info!(
            "Instance is backed by '{}' (fsync: {:?}).",
            path.display(),
            config.log_fsync
        ),
        None => warn!("No log file configured. The instance lives in memory only."),
    }
    match config.limits.idle_timeout {
        Some(idle) => info!("Idle sessions are closed after {:?}.", idle),
        None => info!("Idle session timeout is disabled."),
    }
}
