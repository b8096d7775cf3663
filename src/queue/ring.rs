//! Lock-free bounded MPMC ring buffer.
//!
//! Fixed array of slots, each carrying a sequence number that records which
//! generation (logical position) currently owns it:
//!
//! ```text
//! slot.sequence == pos              free, producer of `pos` may claim it
//! slot.sequence == pos + 1          holds the item of `pos`, consumer may claim it
//! slot.sequence == pos + capacity   consumed, free for the next lap
//! ```
//!
//! Producers race on `head` with compare-and-swap, consumers on `tail`. Only
//! the winner of generation `pos` writes the slot payload, and only the
//! winner of the matching retrieval reads it, so no lock is needed.
//!
//! Blocking operations spin while the slot is unavailable and yield every
//! `spin_limit` failed attempts (see [`SpinWait`]). Every retry checks the
//! disposed flag first, which makes [`RingBuffer::dispose`] the single
//! cancellation primitive.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::backoff::{SpinWait, DEFAULT_SPIN_LIMIT};
use crate::error::QueueError;

/// Smallest realized capacity.
///
/// With a single slot a published item and a free slot share the same
/// sequence value, so two slots is the floor.
pub const MIN_CAPACITY: u64 = 2;

/// Largest realized capacity (keeps signed sequence differences exact).
const MAX_CAPACITY: u64 = 1 << 62;

/// Round a requested capacity up to the next power of two.
///
/// ```
/// use ringwire::queue::round_up_capacity;
///
/// assert_eq!(round_up_capacity(127), 128);
/// assert_eq!(round_up_capacity(128), 128);
/// assert_eq!(round_up_capacity(0), 2);
/// ```
pub fn round_up_capacity(requested: u64) -> u64 {
    requested
        .clamp(MIN_CAPACITY, MAX_CAPACITY)
        .next_power_of_two()
}

/// Keeps hot counters on separate cache lines.
#[repr(C, align(64))]
struct CachePadded<T>(T);

struct Slot<T> {
    sequence: AtomicU64,
    value: UnsafeCell<Option<T>>,
}

// SAFETY: `value` is only touched by the party that won the generation
// encoded in `sequence` (see module docs).
unsafe impl<T: Send> Sync for Slot<T> {}

/// Where a slot stands relative to the position we hold.
enum SlotState {
    /// Slot belongs to our generation.
    Ready,
    /// Slot still belongs to the previous lap (full for put, empty for get).
    Occupied,
    /// Another party already took this generation; reload the counter.
    Moved,
}

/// Outcome of one admission attempt.
enum Admission {
    Claimed(u64),
    Contended,
    Unavailable,
}

/// Bounded lock-free multi-producer/multi-consumer queue.
///
/// # Example
///
/// ```
/// use ringwire::queue::RingBuffer;
///
/// let queue = RingBuffer::new(127);
/// assert_eq!(queue.capacity(), 128);
///
/// queue.put("shikanon").unwrap();
/// assert_eq!(queue.get().unwrap(), "shikanon");
/// assert!(queue.is_empty());
/// ```
pub struct RingBuffer<T> {
    /// Next position to write.
    head: CachePadded<AtomicU64>,
    /// Next position to read.
    tail: CachePadded<AtomicU64>,
    disposed: CachePadded<AtomicBool>,
    capacity: u64,
    mask: u64,
    spin_limit: u32,
    slots: Box<[Slot<T>]>,
}

impl<T> RingBuffer<T> {
    /// Create a queue holding at least `capacity` items.
    ///
    /// The realized capacity is the smallest power of two `>= capacity`
    /// (and never below [`MIN_CAPACITY`]).
    pub fn new(capacity: u64) -> Self {
        Self::with_spin_limit(capacity, DEFAULT_SPIN_LIMIT)
    }

    /// Create a queue that yields after `spin_limit` failed attempts.
    pub fn with_spin_limit(capacity: u64, spin_limit: u32) -> Self {
        let capacity = round_up_capacity(capacity);
        let slots = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicU64::new(i),
                value: UnsafeCell::new(None),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            head: CachePadded(AtomicU64::new(0)),
            tail: CachePadded(AtomicU64::new(0)),
            disposed: CachePadded(AtomicBool::new(false)),
            capacity,
            mask: capacity - 1,
            spin_limit,
            slots,
        }
    }

    /// Enqueue an item, spinning while the queue is full.
    ///
    /// Returns `Err(QueueError::Disposed)` as soon as disposal is observed;
    /// the item is dropped in that case.
    pub fn put(&self, item: T) -> Result<(), QueueError> {
        let mut pos = self.head.0.load(Ordering::Relaxed);
        let mut spin = SpinWait::new(self.spin_limit);

        loop {
            match self.claim_put(&mut pos)? {
                Admission::Claimed(pos) => {
                    self.publish(pos, item);
                    return Ok(());
                }
                Admission::Contended | Admission::Unavailable => spin.spin(),
            }
        }
    }

    /// Enqueue an item without waiting for a free slot.
    ///
    /// Returns `Ok(false)` if the queue is full. Losing a race against
    /// another producer is retried, since a slot may still be free.
    pub fn offer(&self, item: T) -> Result<bool, QueueError> {
        let mut pos = self.head.0.load(Ordering::Relaxed);

        loop {
            match self.claim_put(&mut pos)? {
                Admission::Claimed(pos) => {
                    self.publish(pos, item);
                    return Ok(true);
                }
                Admission::Unavailable => return Ok(false),
                Admission::Contended => std::hint::spin_loop(),
            }
        }
    }

    /// Dequeue an item, spinning while the queue is empty.
    pub fn get(&self) -> Result<T, QueueError> {
        let mut pos = self.tail.0.load(Ordering::Relaxed);
        let mut spin = SpinWait::new(self.spin_limit);

        loop {
            match self.claim_get(&mut pos)? {
                Admission::Claimed(pos) => return Ok(self.take(pos)),
                Admission::Contended | Admission::Unavailable => spin.spin(),
            }
        }
    }

    /// Number of items currently admitted, always within `[0, capacity]`.
    ///
    /// The two counters are read separately, not as one atomic snapshot.
    /// Under concurrent gets the result can overstate the length, so a busy
    /// queue may briefly report [`is_full`](Self::is_full) when it is not.
    pub fn length(&self) -> u64 {
        // tail first: head read afterwards can only be larger
        let tail = self.tail.0.load(Ordering::Acquire);
        let head = self.head.0.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.capacity)
    }

    /// Realized capacity (a power of two).
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.length() == self.capacity
    }

    /// Permanently shut the queue down.
    ///
    /// Every in-flight and future `put`/`get` fails with
    /// [`QueueError::Disposed`]. Returns `true` only for the call that
    /// performed the transition.
    pub fn dispose(&self) -> bool {
        self.disposed
            .0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed.0.load(Ordering::Acquire)
    }

    #[inline]
    fn slot(&self, pos: u64) -> &Slot<T> {
        &self.slots[(pos & self.mask) as usize]
    }

    /// Compare a slot sequence with the one our generation expects.
    #[inline]
    fn slot_state(&self, sequence: u64, expected: u64, op: &'static str) -> SlotState {
        let dif = sequence.wrapping_sub(expected) as i64;
        if dif == 0 {
            SlotState::Ready
        } else if dif < 0 {
            // A slot is at most one full lap behind the position we hold.
            if dif < -(self.capacity as i64) {
                corrupted(op, sequence, expected);
            }
            SlotState::Occupied
        } else {
            SlotState::Moved
        }
    }

    fn claim_put(&self, pos: &mut u64) -> Result<Admission, QueueError> {
        if self.is_disposed() {
            return Err(QueueError::Disposed);
        }

        let sequence = self.slot(*pos).sequence.load(Ordering::Acquire);
        match self.slot_state(sequence, *pos, "put") {
            SlotState::Ready => match self.head.0.compare_exchange_weak(
                *pos,
                pos.wrapping_add(1),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => Ok(Admission::Claimed(*pos)),
                Err(current) => {
                    *pos = current;
                    Ok(Admission::Contended)
                }
            },
            SlotState::Occupied => {
                *pos = self.head.0.load(Ordering::Relaxed);
                Ok(Admission::Unavailable)
            }
            SlotState::Moved => {
                *pos = self.head.0.load(Ordering::Relaxed);
                Ok(Admission::Contended)
            }
        }
    }

    fn claim_get(&self, pos: &mut u64) -> Result<Admission, QueueError> {
        if self.is_disposed() {
            return Err(QueueError::Disposed);
        }

        let sequence = self.slot(*pos).sequence.load(Ordering::Acquire);
        match self.slot_state(sequence, pos.wrapping_add(1), "get") {
            SlotState::Ready => match self.tail.0.compare_exchange_weak(
                *pos,
                pos.wrapping_add(1),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => Ok(Admission::Claimed(*pos)),
                Err(current) => {
                    *pos = current;
                    Ok(Admission::Contended)
                }
            },
            SlotState::Occupied => {
                *pos = self.tail.0.load(Ordering::Relaxed);
                Ok(Admission::Unavailable)
            }
            SlotState::Moved => {
                *pos = self.tail.0.load(Ordering::Relaxed);
                Ok(Admission::Contended)
            }
        }
    }

    /// Store the item of generation `pos` and hand the slot to its consumer.
    fn publish(&self, pos: u64, item: T) {
        let slot = self.slot(pos);
        // SAFETY: winning the CAS on `head` for `pos` makes us the only
        // writer until the sequence below is stored.
        unsafe {
            *slot.value.get() = Some(item);
        }
        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
    }

    /// Take the item of generation `pos` and free the slot for the next lap.
    fn take(&self, pos: u64) -> T {
        let slot = self.slot(pos);
        // SAFETY: winning the CAS on `tail` for `pos` makes us the only
        // reader, and the Acquire load of `sequence` saw the producer's write.
        let value = unsafe { (*slot.value.get()).take() };
        let Some(value) = value else {
            corrupted("get", slot.sequence.load(Ordering::Acquire), pos.wrapping_add(1));
        };
        slot.sequence
            .store(pos.wrapping_add(self.capacity), Ordering::Release);
        value
    }

    #[cfg(test)]
    pub(crate) fn force_sequence(&self, index: u64, sequence: u64) {
        self.slot(index).sequence.store(sequence, Ordering::SeqCst);
    }
}

impl<T: Send> RingBuffer<T> {
    /// Async form of [`put`](Self::put): yields to the tokio scheduler
    /// instead of the OS thread between spin rounds.
    pub async fn put_async(&self, item: T) -> Result<(), QueueError> {
        let mut pos = self.head.0.load(Ordering::Relaxed);
        let mut spin = SpinWait::new(self.spin_limit);

        loop {
            match self.claim_put(&mut pos)? {
                Admission::Claimed(pos) => {
                    self.publish(pos, item);
                    return Ok(());
                }
                Admission::Contended | Admission::Unavailable => spin.spin_async().await,
            }
        }
    }

    /// Async form of [`get`](Self::get).
    pub async fn get_async(&self) -> Result<T, QueueError> {
        let mut pos = self.tail.0.load(Ordering::Relaxed);
        let mut spin = SpinWait::new(self.spin_limit);

        loop {
            match self.claim_get(&mut pos)? {
                Admission::Claimed(pos) => return Ok(self.take(pos)),
                Admission::Contended | Admission::Unavailable => spin.spin_async().await,
            }
        }
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("length", &self.length())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// RingBufferCorrupted: a sequence invariant no longer holds.
#[cold]
#[inline(never)]
fn corrupted(op: &str, sequence: u64, expected: u64) -> ! {
    panic!(
        "ring buffer corrupted during {op}: slot sequence {sequence} is behind expected {expected}"
    )
}
