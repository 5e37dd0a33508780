//! Binary spinlock guarding one work queue.
//!
//! The lock is a single `AtomicU32` holding `UNLOCKED` or `LOCKED`. It has no
//! owner tracking and no reentrancy; critical sections are a handful of
//! field reads and writes. Releasing a lock that is not in the `LOCKED` state
//! is a [`Violation::LockProtocol`] and never returns.
//!
//! A failed release leaves the lock `POISONED`. Any thread that later finds
//! a state other than `UNLOCKED` or `LOCKED` while acquiring raises the
//! violation too, instead of spinning on a lock nobody will release.

use crate::config::LockStrategy;
use crate::violation::{self, Violation, ViolationPolicy};
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicU32, Ordering};

pub const UNLOCKED: u32 = 0;
pub const LOCKED: u32 = 1;
pub const POISONED: u32 = u32::MAX;

pub struct SpinLock {
    state: AtomicU32,
    strategy: LockStrategy,
    on_violation: ViolationPolicy,
}

impl SpinLock {
    pub fn new(strategy: LockStrategy, on_violation: ViolationPolicy) -> Self {
        SpinLock {
            state: AtomicU32::new(UNLOCKED),
            strategy,
            on_violation,
        }
    }

    /// Spins until the lock moves from `UNLOCKED` to `LOCKED` under this call.
    ///
    /// Raises [`Violation::LockProtocol`] if the lock is poisoned or holds a
    /// state outside the protocol.
    pub fn acquire(&self) {
        let backoff = Backoff::new();
        loop {
            match self.state.compare_exchange_weak(
                UNLOCKED,
                LOCKED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(UNLOCKED | LOCKED) => match self.strategy {
                    LockStrategy::Spin => std::hint::spin_loop(),
                    LockStrategy::Backoff => backoff.snooze(),
                },
                Err(observed) => self.fail(observed),
            }
        }
    }

    /// Moves the lock from `LOCKED` back to `UNLOCKED`.
    ///
    /// Any other observed state is raised as a fatal violation.
    pub fn release(&self) {
        if let Err(observed) =
            self.state
                .compare_exchange(LOCKED, UNLOCKED, Ordering::Release, Ordering::Relaxed)
        {
            self.fail(observed);
        }
    }

    #[cold]
    fn fail(&self, observed: u32) -> ! {
        self.state.store(POISONED, Ordering::Release);
        violation::raise(Violation::LockProtocol { observed }, self.on_violation)
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    pub fn lock(&self) -> SpinGuard<'_> {
        self.acquire();
        SpinGuard { lock: self }
    }

    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.load(Ordering::Relaxed) == POISONED
    }

    /// Overwrites the raw state. Only for exercising the violation path.
    #[cfg(test)]
    pub(crate) fn force_state(&self, state: u32) {
        self.state.store(state, Ordering::Relaxed);
    }
}

/// Releases the lock when dropped.
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::panic;
    use std::sync::Arc;
    use std::thread;

    struct Guarded {
        lock: SpinLock,
        value: UnsafeCell<usize>,
    }

    // Only touched while `lock` is held.
    unsafe impl Sync for Guarded {}

    fn hammer(strategy: LockStrategy) {
        let threads = 8;
        let per_thread = 20_000;
        let shared = Arc::new(Guarded {
            lock: SpinLock::new(strategy, ViolationPolicy::Panic),
            value: UnsafeCell::new(0),
        });

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        let _guard = shared.lock.lock();
                        // Non-atomic read-modify-write; lost updates would show up
                        // as a short total.
                        unsafe {
                            let v = *shared.value.get();
                            *shared.value.get() = v + 1;
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("hammer thread panicked");
        }

        assert_eq!(unsafe { *shared.value.get() }, threads * per_thread);
        assert!(!shared.lock.is_locked());
    }

    #[test]
    fn test_mutual_exclusion_spin() {
        hammer(LockStrategy::Spin);
    }

    #[test]
    fn test_mutual_exclusion_backoff() {
        hammer(LockStrategy::Backoff);
    }

    #[test]
    fn test_acquire_release_cycle() {
        let lock = SpinLock::new(LockStrategy::Spin, ViolationPolicy::Panic);
        assert!(!lock.is_locked());
        lock.acquire();
        assert!(lock.is_locked());
        lock.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_double_release_is_violation() {
        let lock = SpinLock::new(LockStrategy::Spin, ViolationPolicy::Panic);
        lock.acquire();
        lock.release();

        let payload = panic::catch_unwind(panic::AssertUnwindSafe(|| lock.release()))
            .expect_err("second release must not return");
        assert_eq!(
            payload.downcast_ref::<Violation>(),
            Some(&Violation::LockProtocol { observed: UNLOCKED })
        );
    }

    #[test]
    fn test_failed_release_poisons_later_acquire() {
        let lock = Arc::new(SpinLock::new(LockStrategy::Spin, ViolationPolicy::Panic));
        lock.acquire();
        lock.force_state(7);
        let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| lock.release()));
        assert!(lock.is_poisoned());

        for strategy in [LockStrategy::Spin, LockStrategy::Backoff] {
            let contender = SpinLock::new(strategy, ViolationPolicy::Panic);
            contender.force_state(POISONED);
            let payload = panic::catch_unwind(panic::AssertUnwindSafe(|| contender.acquire()))
                .expect_err("acquire of a poisoned lock must not return");
            assert_eq!(
                payload.downcast_ref::<Violation>(),
                Some(&Violation::LockProtocol { observed: POISONED })
            );
        }

        let peer = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.acquire())
        };
        let payload = peer.join().expect_err("peer must fail instead of spinning");
        assert_eq!(
            payload.downcast_ref::<Violation>(),
            Some(&Violation::LockProtocol { observed: POISONED })
        );
    }

    #[test]
    fn test_corrupted_state_is_violation() {
        let lock = SpinLock::new(LockStrategy::Spin, ViolationPolicy::Panic);
        lock.acquire();
        lock.force_state(7);

        let payload = panic::catch_unwind(panic::AssertUnwindSafe(|| lock.release()))
            .expect_err("release of corrupted lock must not return");
        assert_eq!(
            payload.downcast_ref::<Violation>(),
            Some(&Violation::LockProtocol { observed: 7 })
        );
    }
}
