//! Fatal scheduler violations.
//!
//! A violation means the queue protocol itself is broken: a lock was released
//! by someone who did not hold it, or the workers together claimed a
//! different number of indices than the call covers. Neither can be recovered
//! from, so they never become a [`crate::DispatchError`]. They are raised
//! through [`raise`], which either aborts the process or panics with the
//! [`Violation`] as payload.

use serde::{Deserialize, Serialize};

/// A broken scheduler invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// Release observed a lock state other than "locked".
    #[error("lock protocol violation: release observed state {observed}, expected 1")]
    LockProtocol { observed: u32 },

    /// Workers completed a different number of elements than dispatched.
    #[error("consistency violation: dispatched {expected} elements, workers completed {completed}")]
    Consistency { expected: usize, completed: usize },
}

/// What to do when a [`Violation`] is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViolationPolicy {
    /// Log and abort the process.
    #[default]
    Abort,
    /// Panic with the violation as payload. The panic unwinds through the
    /// dispatch call, so no result is ever returned.
    Panic,
}

/// Reports `violation` according to `policy`. Never returns.
#[cold]
#[inline(never)]
pub fn raise(violation: Violation, policy: ViolationPolicy) -> ! {
    tracing::error!(%violation, ?policy, "fatal scheduler violation");
    match policy {
        ViolationPolicy::Abort => {
            eprintln!("parvec: {violation}; aborting");
            std::process::abort()
        }
        ViolationPolicy::Panic => std::panic::panic_any(violation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_panic_policy_carries_payload() {
        let result = panic::catch_unwind(|| {
            raise(
                Violation::Consistency {
                    expected: 10,
                    completed: 9,
                },
                ViolationPolicy::Panic,
            )
        });
        let payload = result.expect_err("raise must not return");
        let violation = payload
            .downcast_ref::<Violation>()
            .expect("payload is a Violation");
        assert_eq!(
            *violation,
            Violation::Consistency {
                expected: 10,
                completed: 9
            }
        );
    }

    #[test]
    fn test_default_policy_aborts() {
        assert_eq!(ViolationPolicy::default(), ViolationPolicy::Abort);
    }
}
