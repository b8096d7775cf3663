//! Queue module - the shared lock-free ring buffer.
//!
//! - [`RingBuffer`]: bounded MPMC queue coordinated by per-slot sequence numbers
//! - [`SpinWait`]: spin-then-yield helper used while a slot is unavailable

mod backoff;
mod ring;

pub use backoff::{SpinWait, DEFAULT_SPIN_LIMIT};
pub use ring::{round_up_capacity, RingBuffer, MIN_CAPACITY};
