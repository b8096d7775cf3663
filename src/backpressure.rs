//! Queue-level backpressure policies.
//!
//! After every command a session checks the shared queue. When it is full
//! the configured [`BackpressurePolicy`] decides what happens; when it is
//! empty the policy only gets an observability hook.
//!
//! # Policies
//!
//! - [`DisposeOnFull`] (default): the first session to observe a full queue
//!   disposes it, which fails every blocked and future operation on it, for
//!   all connections.
//! - [`LogOnFull`]: logs and leaves the queue alone, so producers keep
//!   spinning in `put` until a consumer frees a slot.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::queue::RingBuffer;

/// Reaction to a full or empty shared queue.
///
/// Implementations must not block: they run inline on the session task.
pub trait BackpressurePolicy: Send + Sync + fmt::Debug {
    /// Called when a session observes `queue.is_full()`.
    fn on_full(&self, queue: &RingBuffer<Bytes>);

    /// Called when a session observes `queue.is_empty()`.
    fn on_empty(&self, queue: &RingBuffer<Bytes>) {
        tracing::debug!(capacity = queue.capacity(), "queue is empty");
    }
}

/// Dispose the whole shared queue once it fills up.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisposeOnFull;

impl BackpressurePolicy for DisposeOnFull {
    fn on_full(&self, queue: &RingBuffer<Bytes>) {
        if queue.dispose() {
            tracing::warn!(capacity = queue.capacity(), "queue is full, disposing");
        }
    }
}

/// Only log when the queue fills up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnFull;

impl BackpressurePolicy for LogOnFull {
    fn on_full(&self, queue: &RingBuffer<Bytes>) {
        tracing::warn!(capacity = queue.capacity(), "queue is full");
    }
}

/// Serializable policy selector used by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressureMode {
    /// [`DisposeOnFull`]
    #[default]
    Dispose,
    /// [`LogOnFull`]
    Log,
}

impl BackpressureMode {
    /// Build the policy this mode names.
    pub fn build(self) -> Arc<dyn BackpressurePolicy> {
        match self {
            BackpressureMode::Dispose => Arc::new(DisposeOnFull),
            BackpressureMode::Log => Arc::new(LogOnFull),
        }
    }
}

/// Apply `policy` to the current state of `queue`.
pub fn apply(policy: &dyn BackpressurePolicy, queue: &RingBuffer<Bytes>) {
    if queue.is_full() {
        policy.on_full(queue);
    }
    if queue.is_empty() {
        policy.on_empty(queue);
    }
}
