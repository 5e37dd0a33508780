//! Shared and per-worker state of one dispatch call.

use crate::config::SpawnFailurePolicy;
use crate::invoker::KernelInvoker;
use crate::queue::WorkQueue;
use crossbeam::utils::{Backoff, CachePadded};
use std::sync::atomic::{AtomicU8, Ordering};

const GATE_PENDING: u8 = 0;
const GATE_OPEN: u8 = 1;
const GATE_ABANDONED: u8 = 2;

/// Holds workers back until the backend has finished spawning.
///
/// A backend calls [`settle`](Self::settle) exactly once, after its last
/// spawn attempt. Workers that see the gate abandoned exit without claiming
/// an index, which lets a failed launch be joined without having touched the
/// output.
pub struct StartGate {
    state: AtomicU8,
    required: usize,
    on_spawn_failure: SpawnFailurePolicy,
}

impl StartGate {
    pub fn new(required: usize, on_spawn_failure: SpawnFailurePolicy) -> Self {
        StartGate {
            state: AtomicU8::new(GATE_PENDING),
            required,
            on_spawn_failure,
        }
    }

    /// Records how many workers were spawned and releases them.
    ///
    /// Returns `true` if the workers were let through.
    pub fn settle(&self, spawned: usize) -> bool {
        let open = spawned == self.required
            || (spawned > 0 && self.on_spawn_failure == SpawnFailurePolicy::Degrade);
        let state = if open { GATE_OPEN } else { GATE_ABANDONED };
        self.state.store(state, Ordering::Release);
        open
    }

    /// Blocks until the gate is settled. Returns `true` if work may start.
    pub fn wait(&self) -> bool {
        let backoff = Backoff::new();
        loop {
            match self.state.load(Ordering::Acquire) {
                GATE_PENDING => backoff.snooze(),
                state => return state == GATE_OPEN,
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == GATE_OPEN
    }
}

/// Everything the workers of one call share. Immutable once built.
pub struct JobContext<'k> {
    invoker: KernelInvoker<'k>,
    queues: Box<[CachePadded<WorkQueue>]>,
    gate: StartGate,
}

impl<'k> JobContext<'k> {
    pub fn new(invoker: KernelInvoker<'k>, queues: Vec<WorkQueue>, gate: StartGate) -> Self {
        JobContext {
            invoker,
            queues: queues.into_iter().map(CachePadded::new).collect(),
            gate,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.queues.len()
    }

    pub fn queue(&self, id: usize) -> &WorkQueue {
        &self.queues[id]
    }

    pub fn invoker(&self) -> &KernelInvoker<'k> {
        &self.invoker
    }

    pub fn gate(&self) -> &StartGate {
        &self.gate
    }
}

/// One worker's identity and private counters.
///
/// Counters are written only by the thread running this worker and read by
/// the dispatcher after that thread has been joined.
pub struct WorkerContext<'j> {
    job: &'j JobContext<'j>,
    id: usize,
    completed: usize,
    stolen: usize,
}

impl<'j> WorkerContext<'j> {
    pub fn new(job: &'j JobContext<'j>, id: usize) -> Self {
        WorkerContext {
            job,
            id,
            completed: 0,
            stolen: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn job(&self) -> &'j JobContext<'j> {
        self.job
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn stolen(&self) -> usize {
        self.stolen
    }

    pub(crate) fn record_local(&mut self) {
        self.completed += 1;
    }

    pub(crate) fn record_stolen(&mut self) {
        self.completed += 1;
        self.stolen += 1;
    }
}
