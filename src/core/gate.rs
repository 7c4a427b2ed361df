// src/core/gate.rs

//! The serialization gate: the single point through which every evaluation
//! reaches the shared instance.
//!
//! The gate wraps the resource in a `tokio::sync::Mutex`, whose waiters are
//! woken in the order they started waiting, so no session waits longer than
//! the evaluations queued ahead of it. Permits are owned so an evaluation can
//! be moved into its own task and finish even if the session that started it
//! goes away.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

#[derive(Debug, Default)]
struct GateCounters {
    waiting: AtomicUsize,
    granted: AtomicU64,
}

/// Guarantees at most one holder of the wrapped resource at any instant.
#[derive(Debug)]
pub struct SerializationGate<R> {
    resource: Arc<Mutex<R>>,
    counters: Arc<GateCounters>,
}

impl<R> SerializationGate<R> {
    pub fn new(resource: R) -> Self {
        Self {
            resource: Arc::new(Mutex::new(resource)),
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Waits until no other permit is held and returns one.
    ///
    /// Dropping the returned future before it completes leaves the queue
    /// without ever holding the gate.
    pub async fn acquire(&self) -> GatePermit<R> {
        let waiting = WaitingGuard::enter(&self.counters);
        let guard = self.resource.clone().lock_owned().await;
        drop(waiting);
        self.counters.granted.fetch_add(1, Ordering::Relaxed);
        GatePermit {
            guard,
            acquired_at: Instant::now(),
        }
    }

    /// Returns a permit only if the gate is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit<R>> {
        let guard = self.resource.clone().try_lock_owned().ok()?;
        self.counters.granted.fetch_add(1, Ordering::Relaxed);
        Some(GatePermit {
            guard,
            acquired_at: Instant::now(),
        })
    }

    /// Number of callers currently suspended in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.counters.waiting.load(Ordering::Relaxed)
    }

    /// Total number of permits handed out since the gate was created.
    pub fn granted(&self) -> u64 {
        self.counters.granted.load(Ordering::Relaxed)
    }
}

/// Exclusive access to the resource behind a [`SerializationGate`].
/// The gate is released when the permit is dropped.
pub struct GatePermit<R> {
    guard: OwnedMutexGuard<R>,
    acquired_at: Instant,
}

impl<R> GatePermit<R> {
    /// Releases the gate explicitly.
    pub fn release(self) {
        drop(self);
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl<R> Deref for GatePermit<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.guard
    }
}

impl<R> DerefMut for GatePermit<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.guard
    }
}

impl<R> Drop for GatePermit<R> {
    fn drop(&mut self) {
        trace!("Gate released after {:?}.", self.acquired_at.elapsed());
    }
}

/// Keeps the waiter count right even if `acquire` is cancelled.
struct WaitingGuard<'a>(&'a GateCounters);

impl<'a> WaitingGuard<'a> {
    fn enter(counters: &'a GateCounters) -> Self {
        counters.waiting.fetch_add(1, Ordering::Relaxed);
        Self(counters)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.waiting.fetch_sub(1, Ordering::Relaxed);
    }
}
