//! Top-level dispatch: chunk planning, launch, join and verification.
//!
//! A [`Dispatcher`] owns no threads between calls. Every
//! [`dispatch`](Dispatcher::dispatch) builds fresh queues and contexts, has the
//! backend run one worker per queue, and tears everything down after join.

use crate::backend::{self, Launch, ThreadBackend};
use crate::config::DispatchConfig;
use crate::context::{JobContext, StartGate, WorkerContext};
use crate::error::{ConfigError, DispatchError};
use crate::invoker::KernelInvoker;
use crate::kernel::ElementKernel;
use crate::operand::RawOperands;
use crate::queue::WorkQueue;
use crate::report::{DispatchReport, WorkerStats};
use crate::violation::{self, Violation};
use crate::worker::{self, WorkerEntry};
use std::ops::Range;
use std::time::Instant;

/// How `[0, N)` is split across workers before any stealing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub elements: usize,
    pub chunk: usize,
    /// Effective worker count. Equal to the requested count unless there are
    /// fewer elements than workers.
    pub workers: usize,
}

impl ChunkPlan {
    /// Plans `elements` indices over `requested` workers.
    ///
    /// With fewer elements than workers every worker gets one element and the
    /// surplus workers are dropped, which for `elements == 0` leaves none.
    ///
    /// # Panics
    ///
    /// Panics if `requested` is zero.
    pub fn new(elements: usize, requested: usize) -> Self {
        assert!(requested > 0, "cannot plan for zero workers");
        let chunk = elements / requested;
        if chunk == 0 {
            ChunkPlan {
                elements,
                chunk: 1,
                workers: elements,
            }
        } else {
            ChunkPlan {
                elements,
                chunk,
                workers: requested,
            }
        }
    }

    /// Initial range of queue `id`. The last queue ends at `elements`.
    pub fn range(&self, id: usize) -> Range<usize> {
        debug_assert!(id < self.workers);
        let start = id * self.chunk;
        let end = if id + 1 == self.workers {
            self.elements
        } else {
            start + self.chunk
        };
        start..end
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.workers).map(|id| self.range(id))
    }
}

/// Runs elementwise kernels over index ranges with work stealing.
pub struct Dispatcher {
    config: DispatchConfig,
    backend: Box<dyn ThreadBackend>,
}

impl Dispatcher {
    /// Creates a dispatcher with the backend named in `config`.
    ///
    /// Fails with [`DispatchError::UnsupportedPlatform`] when the host has no
    /// thread-launch backend, before anything else is allocated.
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        let backend = backend::from_config(&config)?;
        if config.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers.into());
        }
        tracing::debug!(backend = backend.name(), ?config, "dispatcher created");
        Ok(Dispatcher { config, backend })
    }

    /// Creates a dispatcher with a caller-supplied backend.
    pub fn with_backend(
        config: DispatchConfig,
        backend: Box<dyn ThreadBackend>,
    ) -> Result<Self, DispatchError> {
        if config.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers.into());
        }
        Ok(Dispatcher { config, backend })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn plan(&self, elements: usize) -> ChunkPlan {
        ChunkPlan::new(elements, self.config.requested_workers())
    }

    /// Applies `kernel` to every index in `[0, n)`.
    ///
    /// Returns after every worker has been joined. A kernel panic is re-raised
    /// on the calling thread once all workers have stopped. Scheduler
    /// violations are raised per [`DispatchConfig::on_violation`] and never
    /// produce an `Ok`.
    ///
    /// # Safety
    ///
    /// For every `i < n` and input `k`, `base[k] + i * stride[k]` must be a
    /// readable element of the kernel's `k`-th input type, and
    /// `out_base + i * out_stride` a writable element of its output type.
    /// Output addresses must be distinct for distinct `i`, must not overlap
    /// any input element, and nothing else may access the buffers during the
    /// call.
    pub unsafe fn dispatch(
        &self,
        kernel: &dyn ElementKernel,
        operands: &RawOperands,
        n: usize,
    ) -> Result<DispatchReport, DispatchError> {
        // SAFETY: forwarded from the caller's contract.
        unsafe { self.dispatch_with_entry(kernel, operands, n, worker::run) }
    }

    /// [`dispatch`](Self::dispatch) with the worker entry point supplied by
    /// the caller.
    ///
    /// # Safety
    ///
    /// As for [`dispatch`](Self::dispatch).
    pub(crate) unsafe fn dispatch_with_entry(
        &self,
        kernel: &dyn ElementKernel,
        operands: &RawOperands,
        n: usize,
        entry: WorkerEntry,
    ) -> Result<DispatchReport, DispatchError> {
        let invoker = KernelInvoker::new(kernel, operands)?;
        let requested = self.config.requested_workers();
        let plan = ChunkPlan::new(n, requested);

        if plan.workers == 0 {
            tracing::debug!(requested, "empty range, no workers started");
            return Ok(DispatchReport::empty(requested));
        }

        let started = Instant::now();
        let queues = plan
            .ranges()
            .map(|range| WorkQueue::new(range, self.config.lock, self.config.on_violation))
            .collect();
        let gate = StartGate::new(plan.workers, self.config.on_spawn_failure);
        let job = JobContext::new(invoker, queues, gate);
        let mut workers: Vec<WorkerContext<'_>> =
            (0..plan.workers).map(|id| WorkerContext::new(&job, id)).collect();

        tracing::debug!(
            elements = n,
            requested,
            workers = plan.workers,
            chunk = plan.chunk,
            backend = self.backend.name(),
            "launching workers"
        );

        let Launch {
            spawned,
            spawn_failure,
            panics,
        } = self.backend.launch(&mut workers, entry, job.gate());

        if let Some(panic) = panics.into_iter().next() {
            tracing::error!(worker = panic.worker, "worker panicked, propagating");
            std::panic::resume_unwind(panic.payload);
        }

        if let Some(failure) = spawn_failure {
            if !job.gate().is_open() {
                tracing::error!(
                    worker = failure.worker,
                    spawned,
                    error = %failure.source,
                    "worker spawn failed, call abandoned"
                );
                return Err(DispatchError::ThreadSpawn {
                    worker: failure.worker,
                    requested: plan.workers,
                    source: failure.source,
                });
            }
            tracing::warn!(
                worker = failure.worker,
                spawned,
                error = %failure.source,
                "worker spawn failed, continuing with fewer workers"
            );
        }

        let stats: Vec<WorkerStats> = workers
            .iter()
            .map(|w| WorkerStats {
                id: w.id(),
                completed: w.completed(),
                stolen: w.stolen(),
            })
            .collect();

        if self.config.verify_completion {
            verify_completion(n, &stats, self.config.on_violation);
        }

        let report = DispatchReport {
            elements: n,
            chunk: plan.chunk,
            requested_workers: requested,
            spawned_workers: spawned,
            workers: stats,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            elements = n,
            stolen = report.stolen(),
            elapsed_us = report.elapsed.as_micros() as u64,
            "dispatch complete"
        );
        Ok(report)
    }
}

/// Raises [`Violation::Consistency`] unless the workers completed exactly
/// `expected` elements.
fn verify_completion(expected: usize, stats: &[WorkerStats], policy: violation::ViolationPolicy) {
    let completed: usize = stats.iter().map(|w| w.completed).sum();
    if completed != expected {
        violation::raise(
            Violation::Consistency {
                expected,
                completed,
            },
            policy,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::kernel;
    use crate::violation::ViolationPolicy;
    use std::panic;

    #[test]
    fn test_plan_remainder_goes_to_last() {
        let plan = ChunkPlan::new(10, 3);
        assert_eq!(plan.chunk, 3);
        assert_eq!(plan.ranges().collect::<Vec<_>>(), vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn test_plan_fewer_elements_than_workers() {
        let plan = ChunkPlan::new(2, 4);
        assert_eq!(plan.workers, 2);
        assert_eq!(plan.ranges().collect::<Vec<_>>(), vec![0..1, 1..2]);

        let plan = ChunkPlan::new(1, 8);
        assert_eq!(plan.workers, 1);
        assert_eq!(plan.ranges().collect::<Vec<_>>(), vec![0..1]);
    }

    #[test]
    fn test_plan_empty_range() {
        let plan = ChunkPlan::new(0, 4);
        assert_eq!(plan.workers, 0);
        assert_eq!(plan.ranges().count(), 0);
    }

    #[test]
    fn test_plan_covers_range() {
        for n in 0..60 {
            for t in 1..9 {
                let plan = ChunkPlan::new(n, t);
                let mut expected_start = 0;
                for range in plan.ranges() {
                    assert_eq!(range.start, expected_start);
                    assert!(range.start < range.end, "empty initial range for n={n} t={t}");
                    expected_start = range.end;
                }
                assert_eq!(expected_start, n);
            }
        }
    }

    #[test]
    fn test_verify_completion_mismatch() {
        let stats = [
            WorkerStats { id: 0, completed: 4, stolen: 0 },
            WorkerStats { id: 1, completed: 5, stolen: 1 },
        ];
        verify_completion(9, &stats, ViolationPolicy::Panic);

        let payload = panic::catch_unwind(|| verify_completion(10, &stats, ViolationPolicy::Panic))
            .expect_err("mismatch must not return");
        assert_eq!(
            payload.downcast_ref::<Violation>(),
            Some(&Violation::Consistency {
                expected: 10,
                completed: 9
            })
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Dispatcher::new(DispatchConfig::default().with_workers(0)).err();
        assert!(matches!(
            err,
            Some(DispatchError::Configuration(ConfigError::ZeroWorkers))
        ));
    }

    #[test]
    fn test_arity_checked_before_launch() {
        let dispatcher = Dispatcher::new(DispatchConfig::default().with_workers(2)).unwrap();
        let k = kernel(|a: f64, b: f64| a + b);
        let mut x = vec![0f64; 4];
        let mut out = vec![0f64; 4];
        let ops = RawOperands::new(vec![x.as_mut_ptr().cast(), out.as_mut_ptr().cast()], vec![8, 8])
            .unwrap();
        let err = unsafe { dispatcher.dispatch(&*k, &ops, 4) }.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Configuration(ConfigError::OperandCount { expected: 3, found: 2 })
        ));
    }
}
