//! Spin-then-yield waiting.
//!
//! Blocking queue operations busy-wait while no slot is available. After
//! `limit` failed attempts the caller yields once and starts counting again.
//! There is no parking and no condition variable: a waiting caller keeps
//! burning CPU until the operation succeeds or the queue is disposed.

/// Default number of failed attempts between two yields.
pub const DEFAULT_SPIN_LIMIT: u32 = 10_000;

/// Counts failed attempts and decides when to yield.
#[derive(Debug, Clone)]
pub struct SpinWait {
    attempts: u32,
    limit: u32,
}

impl SpinWait {
    /// Create a spinner that yields after `limit` failed attempts.
    pub fn new(limit: u32) -> Self {
        Self { attempts: 0, limit }
    }

    /// Record a failed attempt, yielding the OS thread when the limit is hit.
    #[inline]
    pub fn spin(&mut self) {
        if self.tick() {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
    }

    /// Record a failed attempt, yielding to the tokio scheduler when the limit is hit.
    #[inline]
    pub async fn spin_async(&mut self) {
        if self.tick() {
            tokio::task::yield_now().await;
        } else {
            std::hint::spin_loop();
        }
    }

    /// Number of failed attempts since the last yield.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true when the caller should yield; resets the counter if so.
    #[inline]
    fn tick(&mut self) -> bool {
        if self.attempts >= self.limit {
            self.attempts = 0;
            true
        } else {
            self.attempts += 1;
            false
        }
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new(DEFAULT_SPIN_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_until_limit_then_resets() {
        let mut spin = SpinWait::new(3);
        for expected in 1..=3 {
            spin.spin();
            assert_eq!(spin.attempts(), expected);
        }

        // Fourth failure yields and starts over
        spin.spin();
        assert_eq!(spin.attempts(), 0);
    }

    #[test]
    fn test_zero_limit_yields_every_time() {
        let mut spin = SpinWait::new(0);
        for _ in 0..5 {
            spin.spin();
            assert_eq!(spin.attempts(), 0);
        }
    }

    #[test]
    fn test_default_limit() {
        let mut spin = SpinWait::default();
        for _ in 0..DEFAULT_SPIN_LIMIT {
            spin.spin();
        }
        assert_eq!(spin.attempts(), DEFAULT_SPIN_LIMIT);
    }

    #[tokio::test]
    async fn test_async_flavour_shares_counter() {
        let mut spin = SpinWait::new(2);
        spin.spin_async().await;
        spin.spin_async().await;
        assert_eq!(spin.attempts(), 2);

        spin.spin_async().await;
        assert_eq!(spin.attempts(), 0);
    }
}
