//! Per-worker range queue.
//!
//! A [`WorkQueue`] owns the half-open range `[next, last)` of indices nobody
//! has claimed yet. The owning worker claims from the front, thieves claim
//! from the back, and both go through the same [`SpinLock`], so an index is
//! handed out at most once.

use crate::config::LockStrategy;
use crate::spinlock::SpinLock;
use crate::violation::ViolationPolicy;
use std::cell::UnsafeCell;
use std::ops::Range;

#[derive(Debug, Clone, Copy)]
struct Bounds {
    next: usize,
    last: usize,
}

pub struct WorkQueue {
    lock: SpinLock,
    bounds: UnsafeCell<Bounds>,
}

// `bounds` is only read or written between `lock.acquire()` and
// `lock.release()`.
unsafe impl Sync for WorkQueue {}

impl WorkQueue {
    pub fn new(range: Range<usize>, strategy: LockStrategy, on_violation: ViolationPolicy) -> Self {
        debug_assert!(range.start <= range.end);
        WorkQueue {
            lock: SpinLock::new(strategy, on_violation),
            bounds: UnsafeCell::new(Bounds {
                next: range.start,
                last: range.end,
            }),
        }
    }

    /// Claims the front index for the owning worker.
    ///
    /// `next` only advances while it is below `last`, so an exhausted queue
    /// stays at `next == last`.
    pub fn claim_front(&self) -> Option<usize> {
        let _guard = self.lock.lock();
        // SAFETY: lock held for the lifetime of `_guard`.
        let bounds = unsafe { &mut *self.bounds.get() };
        let item = bounds.next;
        if item < bounds.last {
            bounds.next += 1;
            Some(item)
        } else {
            None
        }
    }

    /// Claims the back index on behalf of another worker.
    pub fn steal_back(&self) -> Option<usize> {
        let _guard = self.lock.lock();
        // SAFETY: lock held for the lifetime of `_guard`.
        let bounds = unsafe { &mut *self.bounds.get() };
        if bounds.next < bounds.last {
            bounds.last -= 1;
            Some(bounds.last)
        } else {
            None
        }
    }

    /// Unclaimed indices at the time of the call.
    pub fn remaining(&self) -> Range<usize> {
        let _guard = self.lock.lock();
        // SAFETY: lock held for the lifetime of `_guard`.
        let bounds = unsafe { *self.bounds.get() };
        bounds.next..bounds.last
    }

    pub fn lock(&self) -> &SpinLock {
        &self.lock
    }
}
