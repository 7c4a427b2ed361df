// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::client::{SessionInfo, SessionMap};
use super::stats::StatsState;
use crate::config::Config;
use crate::core::gate::SerializationGate;
use crate::core::instance::Instance;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// The state shared by the acceptor, every session and the lifecycle
/// coordinator. Wrapped in an `Arc`.
#[derive(Debug)]
pub struct ServerState {
    pub config: Arc<Config>,
    /// The only path to the instance.
    pub gate: SerializationGate<Instance>,
    /// Live sessions keyed by session id, each with a sender that ends it.
    pub sessions: SessionMap,
    pub stats: StatsState,
    next_session_id: AtomicU64,
}

impl ServerState {
    pub fn new(config: Config, instance: Instance) -> Self {
        Self {
            config: Arc::new(config),
            gate: SerializationGate::new(instance),
            sessions: Arc::new(DashMap::new()),
            stats: StatsState::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Adds a session to the registry and returns the receiver that is
    /// signalled when the session should end.
    pub fn register_session(
        &self,
        session_id: u64,
    ) -> (Arc<Mutex<SessionInfo>>, broadcast::Receiver<()>) {
        let (tx, rx) = broadcast::channel(1);
        let info = Arc::new(Mutex::new(SessionInfo::new(session_id)));
        self.sessions.insert(session_id, (info.clone(), tx));
        (info, rx)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Asks one session to end. Returns false if it is not registered.
    pub fn kill_session(&self, session_id: u64) -> bool {
        match self.sessions.get(&session_id) {
            Some(entry) => {
                debug!("Killing session {session_id}.");
                let _ = entry.value().1.send(());
                true
            }
            None => false,
        }
    }
}
