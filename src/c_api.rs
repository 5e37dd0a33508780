//! C ABI entry point.
//!
//! `parvec_dispatch` takes its arguments in the layout of an array-library
//! inner loop: `args` holds one pointer per input followed by the output,
//! `dimensions[0]` is `N`, and `steps` holds the byte strides.

use crate::config::DispatchConfig;
use crate::dispatcher::Dispatcher;
use crate::element::Signature;
use crate::error::DispatchError;
use crate::kernel::{RawKernel, RawKernelFn};
use crate::operand::RawOperands;
use crate::violation::ViolationPolicy;
use std::ffi::c_void;

pub const PARVEC_OK: i32 = 0;
pub const PARVEC_ERR_NULL: i32 = -1;
pub const PARVEC_ERR_CONFIG: i32 = -2;
pub const PARVEC_ERR_SPAWN: i32 = -3;
pub const PARVEC_ERR_PLATFORM: i32 = -4;

fn status(err: &DispatchError) -> i32 {
    match err {
        DispatchError::Configuration(_) => PARVEC_ERR_CONFIG,
        DispatchError::ThreadSpawn { .. } => PARVEC_ERR_SPAWN,
        DispatchError::UnsupportedPlatform { .. } => PARVEC_ERR_PLATFORM,
    }
}

#[unsafe(no_mangle)]
/// Runs `kernel` over `[0, dimensions[0])` with work stealing.
///
/// `types` holds `nargs` element type codes (inputs then output, see
/// [`crate::ElementType::code`]); any number of inputs is accepted.
/// `num_threads == 0` uses the host core count.
/// Scheduler violations abort the process.
///
/// # Safety
///
/// `args`, `steps` and `types` must point to `nargs` valid entries and
/// `dimensions` to at least one. The buffers must satisfy the contract of
/// [`Dispatcher::dispatch`] for the declared types, and `kernel` must be safe
/// to call concurrently with `data`.
pub unsafe extern "C" fn parvec_dispatch(
    kernel: Option<RawKernelFn>,
    args: *const *mut u8,
    dimensions: *const isize,
    steps: *const isize,
    types: *const u8,
    nargs: usize,
    data: *mut c_void,
    num_threads: usize,
) -> i32 {
    let Some(kernel) = kernel else {
        return PARVEC_ERR_NULL;
    };
    if args.is_null() || dimensions.is_null() || steps.is_null() || types.is_null() {
        return PARVEC_ERR_NULL;
    }

    // SAFETY: non-null and sized per the caller's contract.
    let (pointers, strides, codes, n) = unsafe {
        (
            std::slice::from_raw_parts(args, nargs).to_vec(),
            std::slice::from_raw_parts(steps, nargs).to_vec(),
            std::slice::from_raw_parts(types, nargs),
            *dimensions,
        )
    };
    let Ok(n) = usize::try_from(n) else {
        return PARVEC_ERR_CONFIG;
    };
    let Some(signature) = Signature::from_codes(codes) else {
        return PARVEC_ERR_CONFIG;
    };

    let mut config = DispatchConfig::default().with_violation_policy(ViolationPolicy::Abort);
    if num_threads > 0 {
        config = config.with_workers(num_threads);
    }

    let result = Dispatcher::new(config).and_then(|dispatcher| {
        let operands = RawOperands::new(pointers, strides)?;
        // SAFETY: forwarded from the caller's contract.
        let kernel = unsafe { RawKernel::new(kernel, data, signature) };
        unsafe { dispatcher.dispatch(&kernel, &operands, n) }
    });

    match result {
        Ok(_) => PARVEC_OK,
        Err(err) => {
            tracing::error!(error = %err, "parvec_dispatch failed");
            status(&err)
        }
    }
}
