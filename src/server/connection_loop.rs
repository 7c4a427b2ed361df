// src/server/connection_loop.rs

//! Contains the main server loop for accepting sessions and handling graceful
//! shutdown.

use super::context::ServerContext;
use super::listener::remove_socket_file;
use crate::connection::{SessionHandler, is_normal_disconnect};
use crate::core::state::ServerState;
use anyhow::{Result, anyhow};
use std::future::Future;
use tokio::task::JoinSet;
use tokio::time::timeout;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Pause after a failed `accept` before trying again.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts sessions until `shutdown` completes, then drains them and closes
/// the instance.
pub async fn run<F>(ctx: ServerContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let ServerContext {
        state,
        listener,
        socket_path,
        shutdown_tx,
    } = ctx;
    let mut session_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            res = listener.accept() => match res {
                Ok((stream, _addr)) => {
                    let session_id = state.next_session_id();
                    state.stats.increment_total_connections();
                    info!("Accepted session {}.", session_id);

                    let handler = SessionHandler::new(
                        stream,
                        state.clone(),
                        session_id,
                        shutdown_tx.subscribe(),
                    );
                    session_tasks.spawn(
                        async move {
                            if let Err(e) = handler.run().await {
                                if is_normal_disconnect(&e) {
                                    debug!("Session ended by peer: {}", e);
                                } else {
                                    warn!("Session terminated unexpectedly: {}", e);
                                }
                            }
                        }
                        .instrument(info_span!("session", id = session_id)),
                    );
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    // Errors such as EMFILE persist until a descriptor frees
                    // up; retrying at once would spin.
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },

            Some(res) = session_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A session handler panicked: {e:?}");
                }
            },
        }
    }

    // Stop accepting before anything else.
    drop(listener);
    remove_socket_file(&socket_path);

    info!(
        "Shutting down. Sending signal to {} sessions.",
        state.session_count()
    );
    let _ = shutdown_tx.send(());

    let grace_period = state.config.shutdown.grace_period;
    let drained = timeout(grace_period, async {
        while session_tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "{} sessions still running after {:?}, aborting them.",
            session_tasks.len(),
            grace_period
        );
        session_tasks.shutdown().await;
    }
    info!("All sessions closed.");

    close_instance(&state).await
}

/// Waits for any in-flight evaluation to release the gate, then closes the
/// instance.
async fn close_instance(state: &ServerState) -> Result<()> {
    let close_timeout = state.config.shutdown.close_timeout;
    let closed = timeout(close_timeout, async {
        let mut instance = state.gate.acquire().await;
        instance.close().await
    })
    .await;

    match closed {
        Ok(Ok(())) => {
            info!("Server shutdown complete.");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("CRITICAL: Failed to close the instance: {}", e);
            Err(e.into())
        }
        Err(_) => {
            error!("CRITICAL: Timed out closing the instance.");
            Err(anyhow!(
                "timed out after {close_timeout:?} waiting to close the instance"
            ))
        }
    }
}
