// src/core/state/stats.rs

//! Contains state definitions and logic for server statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Server-wide counters.
#[derive(Debug, Default)]
pub struct StatsState {
    /// Sessions accepted since startup.
    total_connections: AtomicU64,
    /// Statements evaluated, successfully or not.
    total_statements: AtomicU64,
    /// Statements that failed to parse.
    parse_errors: AtomicU64,
    /// Sessions closed for exceeding a resource limit.
    rejected_sessions: AtomicU64,
}

impl StatsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn increment_total_statements(&self) {
        self.total_statements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_statements(&self) -> u64 {
        self.total_statements.load(Ordering::Relaxed)
    }

    pub fn increment_parse_errors(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn increment_rejected_sessions(&self) {
        self.rejected_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_rejected_sessions(&self) -> u64 {
        self.rejected_sessions.load(Ordering::Relaxed)
    }
}
