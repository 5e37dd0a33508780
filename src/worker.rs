//! Worker thread entry point.
//!
//! Each worker runs the same three-state machine: it drains its own queue from
//! the front, then sweeps every other queue taking one index at a time from
//! the back, and stops after a full sweep in which no peer had anything left.
//! There is no coordinator once the workers are running; the empty sweep is
//! the termination condition.

use crate::context::WorkerContext;

/// Signature every [`crate::backend::ThreadBackend`] runs on its threads.
pub type WorkerEntry = for<'a, 'j> fn(&'a mut WorkerContext<'j>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    DrainLocal,
    Steal,
    Done,
}

/// Runs one worker to completion.
pub fn run(ctx: &mut WorkerContext<'_>) {
    let _span = tracing::trace_span!("worker", id = ctx.id()).entered();

    if !ctx.job().gate().wait() {
        tracing::trace!(id = ctx.id(), "launch abandoned, exiting without work");
        return;
    }

    let mut state = WorkerState::DrainLocal;
    while state != WorkerState::Done {
        state = match state {
            WorkerState::DrainLocal => drain_local(ctx),
            WorkerState::Steal => steal_sweep(ctx),
            WorkerState::Done => WorkerState::Done,
        };
    }

    tracing::trace!(
        id = ctx.id(),
        completed = ctx.completed(),
        stolen = ctx.stolen(),
        "worker done"
    );
}

fn drain_local(ctx: &mut WorkerContext<'_>) -> WorkerState {
    let job = ctx.job();
    let queue = job.queue(ctx.id());
    while let Some(item) = queue.claim_front() {
        // SAFETY: `item` was claimed exclusively from this call's partition of
        // [0, N); the dispatcher's contract covers the addresses it maps to.
        unsafe { job.invoker().invoke(item) };
        ctx.record_local();
    }
    WorkerState::Steal
}

/// One pass over all peers in ascending id order.
fn steal_sweep(ctx: &mut WorkerContext<'_>) -> WorkerState {
    let job = ctx.job();
    let me = ctx.id();
    let mut progress = false;

    for peer in (0..job.worker_count()).filter(|&peer| peer != me) {
        if let Some(item) = job.queue(peer).steal_back() {
            // SAFETY: as in `drain_local`.
            unsafe { job.invoker().invoke(item) };
            ctx.record_stolen();
            progress = true;
        }
    }

    if progress {
        WorkerState::Steal
    } else {
        WorkerState::Done
    }
}
