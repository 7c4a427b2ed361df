// src/server/context.rs

use crate::core::state::ServerState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::broadcast;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub listener: UnixListener,
    /// Removed again when the server stops accepting.
    pub socket_path: PathBuf,
    pub shutdown_tx: broadcast::Sender<()>,
}
