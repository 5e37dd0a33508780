//! Recoverable errors surfaced to callers of a dispatch.
//!
//! Everything here is detected before parallel work begins, or (for spawn
//! failures) after every already-started worker has been released and
//! joined. Scheduler corruption is not an error value; see
//! [`crate::violation`].

use crate::element::{ElementType, Signature};
use std::io;

/// Error returned by [`crate::Dispatcher`] and [`crate::ParallelUFunc`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No thread-launch backend exists for the host platform.
    #[error("no thread-launch backend available for target `{target}`")]
    UnsupportedPlatform { target: &'static str },

    /// The call was rejected before any worker was started.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Creating a worker thread failed.
    #[error("failed to spawn worker {worker} of {requested}")]
    ThreadSpawn {
        worker: usize,
        requested: usize,
        #[source]
        source: io::Error,
    },
}

/// Validation failures for kernels, operands and configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("a kernel must take at least one input")]
    NoInputs,

    #[error("a kernel family needs at least one variant")]
    EmptyFamily,

    #[error("variant {variant} takes {found} arguments, but the family takes {expected}")]
    ArityMismatch {
        variant: usize,
        expected: usize,
        found: usize,
    },

    #[error("signature {signature} is registered more than once")]
    DuplicateSignature { signature: Signature },

    #[error("no variant accepts inputs {inputs:?} producing {output}")]
    NoMatchingSignature {
        inputs: Vec<ElementType>,
        output: ElementType,
    },

    #[error("expected {expected} operands, got {found}")]
    OperandCount { expected: usize, found: usize },

    #[error("operand {operand} has length {found}, expected {expected} or 1")]
    LengthMismatch {
        operand: usize,
        expected: usize,
        found: usize,
    },

    #[error("pointer count {pointers} does not match stride count {strides}")]
    StrideCount { pointers: usize, strides: usize },

    #[error("invalid value `{value}` for {key}")]
    InvalidEnv { key: &'static str, value: String },
}
