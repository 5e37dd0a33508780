//! Strided addressing and per-index kernel calls.

use crate::error::ConfigError;
use crate::kernel::ElementKernel;
use crate::operand::RawOperands;

/// Argument pointers up to this count are gathered on the stack.
const INLINE_ARGS: usize = 4;

/// Resolves a global index to element addresses and calls the kernel.
///
/// Strides are byte offsets and are used as given: zero broadcasts, negative
/// walks backwards. Validating them is the job of whoever built the
/// [`RawOperands`].
pub struct KernelInvoker<'k> {
    kernel: &'k dyn ElementKernel,
    inputs: Box<[(*const u8, isize)]>,
    output: (*mut u8, isize),
}

// Immutable after construction; the pointers are only dereferenced in
// `invoke`, whose contract makes concurrent calls on distinct indices sound.
unsafe impl Send for KernelInvoker<'_> {}
unsafe impl Sync for KernelInvoker<'_> {}

impl<'k> KernelInvoker<'k> {
    pub fn new(kernel: &'k dyn ElementKernel, operands: &RawOperands) -> Result<Self, ConfigError> {
        let arity = kernel.arity();
        if arity == 0 {
            return Err(ConfigError::NoInputs);
        }
        if operands.inputs() != arity {
            return Err(ConfigError::OperandCount {
                expected: arity + 1,
                found: operands.inputs() + 1,
            });
        }

        Ok(KernelInvoker {
            kernel,
            inputs: (0..arity).map(|k| operands.input(k)).collect(),
            output: operands.output(),
        })
    }

    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// Applies the kernel to element `index`.
    ///
    /// # Safety
    ///
    /// For every input `k`, `base[k] + index * stride[k]` must address a
    /// readable element of the kernel's input type, and
    /// `out_base + index * out_stride` a writable element of its output type
    /// that no other thread touches during the call.
    #[inline]
    pub unsafe fn invoke(&self, index: usize) {
        let (out_base, out_stride) = self.output;
        let out = element_address(out_base, out_stride, index) as *mut u8;
        let arity = self.inputs.len();

        if arity <= INLINE_ARGS {
            let mut args = [std::ptr::null::<u8>(); INLINE_ARGS];
            for (arg, &(base, stride)) in args.iter_mut().zip(self.inputs.iter()) {
                *arg = element_address(base, stride, index);
            }
            // SAFETY: forwarded from the caller's contract.
            unsafe { self.kernel.invoke(&args[..arity], out) };
        } else {
            let args: Vec<*const u8> = self
                .inputs
                .iter()
                .map(|&(base, stride)| element_address(base, stride, index))
                .collect();
            // SAFETY: forwarded from the caller's contract.
            unsafe { self.kernel.invoke(&args, out) };
        }
    }
}

#[inline(always)]
fn element_address(base: *const u8, stride: isize, index: usize) -> *const u8 {
    base.wrapping_offset((index as isize).wrapping_mul(stride))
}
