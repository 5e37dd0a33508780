//! Thread-launch backends.
//!
//! The scheduler only needs "run this entry on one thread per worker, then
//! join them all". A [`ThreadBackend`] provides exactly that for one dispatch
//! call; threads never outlive the call.

use crate::config::{BackendKind, DispatchConfig};
use crate::context::{StartGate, WorkerContext};
use crate::error::DispatchError;
use crate::worker::WorkerEntry;
use std::any::Any;
use std::io;
use std::thread;

/// A panic that escaped a worker thread.
pub struct WorkerPanic {
    pub worker: usize,
    pub payload: Box<dyn Any + Send + 'static>,
}

impl std::fmt::Debug for WorkerPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPanic")
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

/// A thread that could not be created.
#[derive(Debug)]
pub struct SpawnFailure {
    pub worker: usize,
    pub source: io::Error,
}

/// What happened to the threads of one launch.
#[derive(Debug, Default)]
pub struct Launch {
    /// Number of threads that were created.
    pub spawned: usize,
    /// The first spawn error; no further spawns are attempted after it.
    pub spawn_failure: Option<SpawnFailure>,
    /// Panics collected while joining, in worker id order.
    pub panics: Vec<WorkerPanic>,
}

/// Spawn/join capability used by [`crate::Dispatcher`].
///
/// `launch` must, in order:
/// 1. spawn one thread per entry of `workers`, in id order, each running
///    `entry` on its own context, stopping at the first spawn error;
/// 2. call [`StartGate::settle`] with the number of threads spawned;
/// 3. join every spawned thread in id order and collect panics.
pub trait ThreadBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn launch<'j>(
        &self,
        workers: &mut [WorkerContext<'j>],
        entry: WorkerEntry,
        gate: &StartGate,
    ) -> Launch;
}

/// Backend on `std::thread::scope`.
#[derive(Debug, Clone)]
pub struct StdThreads {
    name_prefix: String,
    stack_size: Option<usize>,
}

impl StdThreads {
    pub fn new(name_prefix: impl Into<String>, stack_size: Option<usize>) -> Self {
        StdThreads {
            name_prefix: name_prefix.into(),
            stack_size,
        }
    }

    fn builder(&self, id: usize) -> thread::Builder {
        let builder = thread::Builder::new().name(format!("{}-{}", self.name_prefix, id));
        match self.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}

impl Default for StdThreads {
    fn default() -> Self {
        StdThreads::new("parvec-worker", None)
    }
}

impl ThreadBackend for StdThreads {
    fn name(&self) -> &'static str {
        "std"
    }

    fn launch<'j>(
        &self,
        workers: &mut [WorkerContext<'j>],
        entry: WorkerEntry,
        gate: &StartGate,
    ) -> Launch {
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers.len());
            let mut spawn_failure = None;

            for worker in workers.iter_mut() {
                let id = worker.id();
                match self.builder(id).spawn_scoped(scope, move || entry(worker)) {
                    Ok(handle) => handles.push((id, handle)),
                    Err(source) => {
                        spawn_failure = Some(SpawnFailure { worker: id, source });
                        break;
                    }
                }
            }

            let spawned = handles.len();
            gate.settle(spawned);

            let panics = handles
                .into_iter()
                .filter_map(|(worker, handle)| {
                    handle.join().err().map(|payload| WorkerPanic { worker, payload })
                })
                .collect();

            Launch {
                spawned,
                spawn_failure,
                panics,
            }
        })
    }
}

/// Backend on `crossbeam::thread::scope`.
#[derive(Debug, Clone)]
pub struct CrossbeamThreads {
    name_prefix: String,
    stack_size: Option<usize>,
}

impl CrossbeamThreads {
    pub fn new(name_prefix: impl Into<String>, stack_size: Option<usize>) -> Self {
        CrossbeamThreads {
            name_prefix: name_prefix.into(),
            stack_size,
        }
    }
}

impl ThreadBackend for CrossbeamThreads {
    fn name(&self) -> &'static str {
        "crossbeam"
    }

    fn launch<'j>(
        &self,
        workers: &mut [WorkerContext<'j>],
        entry: WorkerEntry,
        gate: &StartGate,
    ) -> Launch {
        let scoped = crossbeam::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers.len());
            let mut spawn_failure = None;

            for worker in workers.iter_mut() {
                let id = worker.id();
                let mut builder = scope
                    .builder()
                    .name(format!("{}-{}", self.name_prefix, id));
                if let Some(size) = self.stack_size {
                    builder = builder.stack_size(size);
                }
                match builder.spawn(move |_| entry(worker)) {
                    Ok(handle) => handles.push((id, handle)),
                    Err(source) => {
                        spawn_failure = Some(SpawnFailure { worker: id, source });
                        break;
                    }
                }
            }

            let spawned = handles.len();
            gate.settle(spawned);

            let panics = handles
                .into_iter()
                .filter_map(|(worker, handle)| {
                    handle.join().err().map(|payload| WorkerPanic { worker, payload })
                })
                .collect();

            Launch {
                spawned,
                spawn_failure,
                panics,
            }
        });

        // Every handle is joined inside the scope, so the scope itself only
        // fails if that invariant is broken.
        scoped.unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    }
}

/// The default backend for the host platform.
#[cfg(not(all(target_family = "wasm", not(target_feature = "atomics"))))]
pub fn native(config: &DispatchConfig) -> Result<Box<dyn ThreadBackend>, DispatchError> {
    Ok(Box::new(StdThreads::new(
        config.thread_name_prefix.clone(),
        config.stack_size,
    )))
}

/// The default backend for the host platform.
#[cfg(all(target_family = "wasm", not(target_feature = "atomics")))]
pub fn native(_config: &DispatchConfig) -> Result<Box<dyn ThreadBackend>, DispatchError> {
    Err(DispatchError::UnsupportedPlatform {
        target: std::env::consts::ARCH,
    })
}

/// Resolves the backend named in `config`.
pub fn from_config(config: &DispatchConfig) -> Result<Box<dyn ThreadBackend>, DispatchError> {
    match config.backend {
        BackendKind::Native => native(config),
        BackendKind::Std => {
            native(config)?;
            Ok(Box::new(StdThreads::new(
                config.thread_name_prefix.clone(),
                config.stack_size,
            )))
        }
        BackendKind::Crossbeam => {
            native(config)?;
            Ok(Box::new(CrossbeamThreads::new(
                config.thread_name_prefix.clone(),
                config.stack_size,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_backend_available() {
        let backend = native(&DispatchConfig::default()).expect("host has threads");
        assert_eq!(backend.name(), "std");
    }

    #[test]
    fn test_from_config_selects_backend() {
        let config = DispatchConfig::default().with_backend(BackendKind::Crossbeam);
        assert_eq!(from_config(&config).unwrap().name(), "crossbeam");

        let config = DispatchConfig::default().with_backend(BackendKind::Std);
        assert_eq!(from_config(&config).unwrap().name(), "std");
    }
}
