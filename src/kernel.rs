//! Kernel invocation convention.
//!
//! A kernel is called once per index with its scalar inputs in argument order
//! and produces one scalar. The scheduler only sees the type-erased
//! [`ElementKernel`], which reads the inputs from raw element pointers and
//! writes the result through a raw output pointer. Rust closures become
//! kernels through [`IntoKernel`]; foreign function pointers through
//! [`RawKernel`].

use crate::element::{Scalar, Signature};
use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::Arc;

/// Largest number of inputs a Rust closure kernel can take. Foreign kernels
/// built with [`RawKernel`] have no such limit.
pub const MAX_ARITY: usize = 4;

/// A type-erased elementwise kernel.
///
/// Implementations must be callable concurrently from many threads on
/// disjoint elements.
pub trait ElementKernel: Send + Sync {
    fn signature(&self) -> Signature;

    /// Number of inputs.
    fn arity(&self) -> usize {
        self.signature().arity()
    }

    /// Reads one element from each pointer in `inputs`, applies the kernel and
    /// stores the result at `output`.
    ///
    /// # Safety
    ///
    /// `inputs` has exactly `arity()` entries, each pointing to a readable
    /// element of the matching input type; `output` points to a writable
    /// element of the output type that no other thread accesses concurrently.
    /// Pointers need not be aligned.
    unsafe fn invoke(&self, inputs: &[*const u8], output: *mut u8);
}

/// A Rust function or closure wrapped as an [`ElementKernel`].
///
/// `M` is the function pointer type `fn(A0, ..) -> R` naming the signature.
pub struct FnKernel<F, M> {
    func: F,
    _signature: PhantomData<M>,
}

/// Conversion of a Rust callable into a shared kernel.
///
/// Implemented for every `Fn(A0, ..) -> R` of arity 1 to [`MAX_ARITY`] whose
/// arguments and result are [`Scalar`]s. `M` is inferred from the callable.
pub trait IntoKernel<M> {
    fn into_kernel(self) -> Arc<dyn ElementKernel>;
}

macro_rules! impl_fn_kernel {
    ($($arg:ident $idx:tt),+) => {
        impl<F, R, $($arg),+> ElementKernel for FnKernel<F, fn($($arg),+) -> R>
        where
            F: Fn($($arg),+) -> R + Send + Sync,
            R: Scalar,
            $($arg: Scalar,)+
        {
            fn signature(&self) -> Signature {
                Signature::new(vec![$($arg::ELEMENT_TYPE),+], R::ELEMENT_TYPE)
            }

            unsafe fn invoke(&self, inputs: &[*const u8], output: *mut u8) {
                // SAFETY: forwarded from the caller's contract.
                let result = unsafe {
                    (self.func)($(inputs[$idx].cast::<$arg>().read_unaligned()),+)
                };
                unsafe { output.cast::<R>().write_unaligned(result) };
            }
        }

        impl<F, R, $($arg),+> IntoKernel<fn($($arg),+) -> R> for F
        where
            F: Fn($($arg),+) -> R + Send + Sync + 'static,
            R: Scalar,
            $($arg: Scalar,)+
        {
            fn into_kernel(self) -> Arc<dyn ElementKernel> {
                Arc::new(FnKernel {
                    func: self,
                    _signature: PhantomData::<fn($($arg),+) -> R>,
                })
            }
        }
    };
}

impl_fn_kernel!(A0 0);
impl_fn_kernel!(A0 0, A1 1);
impl_fn_kernel!(A0 0, A1 1, A2 2);
impl_fn_kernel!(A0 0, A1 1, A2 2, A3 3);

/// Wraps a callable as a kernel. Shorthand for [`IntoKernel::into_kernel`].
pub fn kernel<M, K: IntoKernel<M>>(callable: K) -> Arc<dyn ElementKernel> {
    callable.into_kernel()
}

/// C ABI kernel: `inputs` points to `arity` element pointers, the result is
/// written to `output`, `data` is the caller's opaque pointer.
pub type RawKernelFn =
    unsafe extern "C" fn(inputs: *const *const u8, output: *mut u8, data: *mut c_void);

/// A foreign kernel with a declared signature and opaque user data.
pub struct RawKernel {
    func: RawKernelFn,
    data: *mut c_void,
    signature: Signature,
}

// The foreign side is required to accept concurrent calls on disjoint
// elements with the same `data` pointer.
unsafe impl Send for RawKernel {}
unsafe impl Sync for RawKernel {}

impl RawKernel {
    /// # Safety
    ///
    /// `func` must honour `signature` and be safe to call concurrently from
    /// several threads with `data`, which must stay valid while the kernel is
    /// in use.
    pub unsafe fn new(func: RawKernelFn, data: *mut c_void, signature: Signature) -> Self {
        RawKernel {
            func,
            data,
            signature,
        }
    }
}

impl ElementKernel for RawKernel {
    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    fn arity(&self) -> usize {
        self.signature.arity()
    }

    unsafe fn invoke(&self, inputs: &[*const u8], output: *mut u8) {
        unsafe { (self.func)(inputs.as_ptr(), output, self.data) }
    }
}
