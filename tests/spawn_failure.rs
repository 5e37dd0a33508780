use parvec::backend::{Launch, SpawnFailure, ThreadBackend, WorkerPanic};
use parvec::context::{StartGate, WorkerContext};
use parvec::worker::WorkerEntry;
use parvec::{
    DispatchConfig, DispatchError, Dispatcher, RawOperands, SpawnFailurePolicy, ViolationPolicy,
    kernel,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Spawns real threads but refuses to create worker `fail_at` or any after it.
struct FlakyThreads {
    fail_at: usize,
}

impl ThreadBackend for FlakyThreads {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn launch<'j>(
        &self,
        workers: &mut [WorkerContext<'j>],
        entry: WorkerEntry,
        gate: &StartGate,
    ) -> Launch {
        thread::scope(|scope| {
            let mut handles = Vec::new();
            let mut spawn_failure = None;
            for worker in workers.iter_mut() {
                let id = worker.id();
                if id == self.fail_at {
                    spawn_failure = Some(SpawnFailure {
                        worker: id,
                        source: io::Error::new(io::ErrorKind::OutOfMemory, "simulated"),
                    });
                    break;
                }
                handles.push((id, scope.spawn(move || entry(worker))));
            }

            let spawned = handles.len();
            gate.settle(spawned);
            let panics = handles
                .into_iter()
                .filter_map(|(worker, h)| h.join().err().map(|payload| WorkerPanic { worker, payload }))
                .collect();
            Launch {
                spawned,
                spawn_failure,
                panics,
            }
        })
    }
}

fn run(policy: SpawnFailurePolicy, fail_at: usize) -> (Result<parvec::DispatchReport, DispatchError>, usize, Vec<i64>) {
    let d = Dispatcher::with_backend(
        DispatchConfig::default()
            .with_workers(4)
            .with_spawn_failure_policy(policy)
            .with_violation_policy(ViolationPolicy::Panic),
        Box::new(FlakyThreads { fail_at }),
    )
    .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let k = kernel(move |x: i64| {
        counted.fetch_add(1, Ordering::SeqCst);
        x * 3
    });

    let n = 1_000;
    let mut input: Vec<i64> = (0..n as i64).collect();
    let mut output = vec![0i64; n];
    let ops = RawOperands::new(
        vec![input.as_mut_ptr().cast(), output.as_mut_ptr().cast()],
        vec![8, 8],
    )
    .unwrap();
    let result = unsafe { d.dispatch(&*k, &ops, n) };
    (result, calls.load(Ordering::SeqCst), output)
}

#[test]
fn test_spawn_failure_aborts_call_without_work() {
    let (result, calls, output) = run(SpawnFailurePolicy::Abort, 2);

    match result {
        Err(DispatchError::ThreadSpawn {
            worker,
            requested,
            source,
        }) => {
            assert_eq!(worker, 2);
            assert_eq!(requested, 4);
            assert_eq!(source.kind(), io::ErrorKind::OutOfMemory);
        }
        other => panic!("expected ThreadSpawn, got {other:?}"),
    }
    assert_eq!(calls, 0, "started workers must not claim work");
    assert!(output.iter().all(|&v| v == 0));
}

#[test]
fn test_spawn_failure_degrades_to_fewer_workers() {
    let (result, calls, output) = run(SpawnFailurePolicy::Degrade, 1);

    let report = result.expect("degraded launch completes");
    assert_eq!(report.spawned_workers, 1);
    assert_eq!(report.effective_workers(), 4);
    assert_eq!(report.completed(), 1_000);
    assert_eq!(report.workers[0].completed, 1_000);
    assert_eq!(calls, 1_000);
    assert!(output.iter().enumerate().all(|(i, &v)| v == 3 * i as i64));
}

#[test]
fn test_degrade_with_no_threads_still_fails() {
    let (result, calls, _) = run(SpawnFailurePolicy::Degrade, 0);
    assert!(matches!(result, Err(DispatchError::ThreadSpawn { worker: 0, .. })));
    assert_eq!(calls, 0);
}
