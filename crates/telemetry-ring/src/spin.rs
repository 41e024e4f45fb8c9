//! Spin lock guarding the ring buffer's cursor bookkeeping.
//!
//! The protected sections only read and bump two sequence numbers and swap a
//! single slot, so a lock that never parks is cheaper than a futex-backed
//! mutex under the producer fan-in this buffer sees.

use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Wait strategy for a contended lock: exponentially longer PAUSE spins,
/// then a scheduler yield on every round once spinning stops paying off.
struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding

    #[inline]
    fn new() -> Self {
        Self { step: 0 }
    }

    #[inline]
    fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..1u32 << self.step {
                hint::spin_loop();
            }
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }
}

pub(crate) struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub(crate) const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, spinning (then yielding) until it is free.
    #[inline]
    pub(crate) fn lock(&self) -> SpinGuard<'_> {
        let mut backoff = Backoff::new();
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinGuard { lock: self };
            }
            // Test-and-test-and-set: wait on a plain load to keep the cache
            // line shared until the holder releases it.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }
}

/// RAII guard; the lock is released when this is dropped.
pub(crate) struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_backoff_stops_growing_once_yielding() {
        let mut backoff = Backoff::new();
        for _ in 0..=Backoff::SPIN_LIMIT {
            backoff.snooze();
        }
        assert_eq!(backoff.step, Backoff::SPIN_LIMIT + 1);

        for _ in 0..100 {
            backoff.snooze();
        }
        assert_eq!(backoff.step, Backoff::SPIN_LIMIT + 1);
    }

    #[test]
    fn test_spin_lock_mutual_exclusion() {
        struct Counter {
            lock: SpinLock,
            // Two non-atomic-in-spirit halves updated together under the lock
            a: std::sync::atomic::AtomicU64,
            b: std::sync::atomic::AtomicU64,
        }

        let counter = Arc::new(Counter {
            lock: SpinLock::new(),
            a: Default::default(),
            b: Default::default(),
        });

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        let _guard = c.lock.lock();
                        let a = c.a.load(Ordering::Relaxed);
                        let b = c.b.load(Ordering::Relaxed);
                        assert_eq!(a, b, "halves diverged inside the critical section");
                        c.a.store(a + 1, Ordering::Relaxed);
                        c.b.store(b + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.a.load(Ordering::SeqCst), 40_000);
        assert_eq!(counter.b.load(Ordering::SeqCst), 40_000);
    }
}
