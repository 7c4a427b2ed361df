// src/core/state/client.rs

//! Contains state definitions related to client sessions.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

pub type ShutdownSender = broadcast::Sender<()>;
pub type SessionStateTuple = (Arc<Mutex<SessionInfo>>, ShutdownSender);
pub type SessionMap = Arc<DashMap<u64, SessionStateTuple>>;

/// Liveness and bookkeeping for one connected session.
#[derive(Debug)]
pub struct SessionInfo {
    pub session_id: u64,
    pub created: Instant,
    pub last_activity: Instant,
    pub statements: u64,
}

impl SessionInfo {
    pub fn new(session_id: u64) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            created: now,
            last_activity: now,
            statements: 0,
        }
    }

    /// Records that a statement was received.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.statements += 1;
    }
}
