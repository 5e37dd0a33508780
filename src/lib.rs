//! # parvec - Parallel Elementwise Dispatch with Work Stealing
//!
//! Applies one elementwise kernel to every index of `[0, N)` using a set of
//! worker threads created for the call. The range is split into one
//! contiguous chunk per worker; each chunk lives in a small spinlock-guarded
//! queue. Workers drain their own queue from the front and, once it is empty,
//! steal single indices from the back of their peers' queues until a full
//! sweep finds nothing left.
//!
//! ## Architecture
//!
//! - **SpinLock / WorkQueue**: the lock protocol and the shrinking range
//! - **JobContext / WorkerContext**: shared call description and per-worker counters
//! - **KernelInvoker**: strided addressing and the per-index kernel call
//! - **Worker**: the drain-then-steal state machine
//! - **ThreadBackend**: spawn/join of the worker threads
//! - **Dispatcher**: chunk planning, launch, join and the completion check
//! - **ParallelUFunc**: typed kernel variants behind one safe call
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use parvec::{DispatchConfig, Dispatcher, Operand, OutputOperand, Vectorize};
//!
//! let dispatcher = Arc::new(Dispatcher::new(DispatchConfig::default()).unwrap());
//! let square = Vectorize::new()
//!     .add(|x: f64| x * x)
//!     .build(dispatcher)
//!     .unwrap();
//!
//! let input: Vec<f64> = (0..1000).map(f64::from).collect();
//! let mut output = vec![0.0; input.len()];
//! square
//!     .call(&[Operand::from(&input)], OutputOperand::from(&mut output))
//!     .unwrap();
//! assert_eq!(output[12], 144.0);
//! ```

pub mod backend;
pub mod c_api;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod element;
pub mod error;
pub mod invoker;
pub mod kernel;
pub mod operand;
pub mod queue;
pub mod report;
pub mod spinlock;
pub mod ufunc;
pub mod violation;
pub mod worker;

pub use backend::{CrossbeamThreads, StdThreads, ThreadBackend};
pub use config::{BackendKind, DispatchConfig, LockStrategy, SpawnFailurePolicy};
pub use dispatcher::{ChunkPlan, Dispatcher};
pub use element::{ElementType, Scalar, Signature};
pub use error::{ConfigError, DispatchError};
pub use kernel::{ElementKernel, IntoKernel, RawKernel, kernel};
pub use operand::{Operand, OutputOperand, RawOperands};
pub use report::{DispatchReport, WorkerStats};
pub use ufunc::{ParallelUFunc, Vectorize};
pub use violation::{Violation, ViolationPolicy};
