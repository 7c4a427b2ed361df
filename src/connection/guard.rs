// src/connection/guard.rs

//! Defines `SessionGuard`, an RAII guard for session resource management.

use crate::core::state::ServerState;
use std::sync::Arc;
use tracing::debug;

/// Removes a session from the live-session registry when the handler's
/// scope is exited, however it exits.
pub struct SessionGuard {
    pub(crate) state: Arc<ServerState>,
    pub(crate) session_id: u64,
}

impl SessionGuard {
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64) -> Self {
        Self { state, session_id }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        match self.state.sessions.remove(&self.session_id) {
            Some((_, (info, _))) => {
                let info = info.lock();
                debug!(
                    "Session {} closed after {:?} and {} statements.",
                    info.session_id,
                    info.created.elapsed(),
                    info.statements
                );
            }
            None => debug!(
                "Session {} was not in the registry upon cleanup.",
                self.session_id
            ),
        }
    }
}
