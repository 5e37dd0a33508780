//! Per-call statistics returned by a successful dispatch.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters of one worker after it was joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub id: usize,
    /// Elements this worker invoked the kernel on, local and stolen.
    pub completed: usize,
    /// Elements taken from the tail of another worker's queue.
    pub stolen: usize,
}

/// Outcome of one dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// `N`, the size of the index range.
    pub elements: usize,
    /// Initial chunk handed to each queue (the last one also takes the
    /// remainder).
    pub chunk: usize,
    pub requested_workers: usize,
    /// Workers actually started. Smaller than the effective worker count only
    /// after a degraded launch.
    pub spawned_workers: usize,
    /// One entry per queue, including queues whose worker never started.
    pub workers: Vec<WorkerStats>,
    pub elapsed: Duration,
}

impl DispatchReport {
    pub(crate) fn empty(requested_workers: usize) -> Self {
        DispatchReport {
            elements: 0,
            chunk: 1,
            requested_workers,
            spawned_workers: 0,
            workers: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Sum of every worker's completed counter.
    pub fn completed(&self) -> usize {
        self.workers.iter().map(|w| w.completed).sum()
    }

    pub fn stolen(&self) -> usize {
        self.workers.iter().map(|w| w.stolen).sum()
    }

    /// Number of queues the range was split into.
    pub fn effective_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn elements_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.elements as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> DispatchReport {
        DispatchReport {
            elements: 10,
            chunk: 3,
            requested_workers: 3,
            spawned_workers: 3,
            workers: vec![
                WorkerStats { id: 0, completed: 5, stolen: 2 },
                WorkerStats { id: 1, completed: 3, stolen: 0 },
                WorkerStats { id: 2, completed: 2, stolen: 0 },
            ],
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_totals() {
        let r = report();
        assert_eq!(r.completed(), 10);
        assert_eq!(r.stolen(), 2);
        assert_eq!(r.effective_workers(), 3);
        assert!(r.elements_per_second() > 0.0);
    }

    #[test]
    fn test_empty_report() {
        let r = DispatchReport::empty(8);
        assert_eq!(r.completed(), 0);
        assert_eq!(r.elements_per_second(), 0.0);
    }
}
