//! Buffer descriptions handed to a dispatch.
//!
//! [`RawOperands`] is the unchecked form: one base pointer per input followed
//! by one for the output, and a byte stride for each. [`Operand`] and
//! [`OutputOperand`] are borrow-checked views over slices that lower to it.

use crate::element::{ElementType, Scalar};
use crate::error::ConfigError;
use std::marker::PhantomData;

/// Base pointers and byte strides, inputs first and the output last.
#[derive(Debug, Clone)]
pub struct RawOperands {
    pointers: Vec<*mut u8>,
    strides: Vec<isize>,
}

// Only addresses are stored here; every dereference happens in the kernel
// invoker under the dispatch's safety contract.
unsafe impl Send for RawOperands {}
unsafe impl Sync for RawOperands {}

impl RawOperands {
    /// Checks only that there is a stride per pointer and at least one input
    /// besides the output. Stride values are passed through unchecked.
    pub fn new(pointers: Vec<*mut u8>, strides: Vec<isize>) -> Result<Self, ConfigError> {
        if pointers.len() != strides.len() {
            return Err(ConfigError::StrideCount {
                pointers: pointers.len(),
                strides: strides.len(),
            });
        }
        if pointers.len() < 2 {
            return Err(ConfigError::OperandCount {
                expected: 2,
                found: pointers.len(),
            });
        }
        Ok(RawOperands { pointers, strides })
    }

    /// Number of input arguments.
    pub fn inputs(&self) -> usize {
        self.pointers.len() - 1
    }

    pub fn input(&self, k: usize) -> (*const u8, isize) {
        (self.pointers[k] as *const u8, self.strides[k])
    }

    pub fn output(&self) -> (*mut u8, isize) {
        let last = self.pointers.len() - 1;
        (self.pointers[last], self.strides[last])
    }
}

/// A read-only input view.
#[derive(Debug, Clone, Copy)]
pub struct Operand<'a> {
    base: *const u8,
    stride: isize,
    len: usize,
    element: ElementType,
    _borrow: PhantomData<&'a [u8]>,
}

unsafe impl Send for Operand<'_> {}
unsafe impl Sync for Operand<'_> {}

impl<'a> Operand<'a> {
    /// Every element of `slice`, in order.
    pub fn contiguous<T: Scalar>(slice: &'a [T]) -> Self {
        Operand {
            base: slice.as_ptr() as *const u8,
            stride: std::mem::size_of::<T>() as isize,
            len: slice.len(),
            element: T::ELEMENT_TYPE,
            _borrow: PhantomData,
        }
    }

    /// Every `step`-th element of `slice`, starting at the first.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero.
    pub fn strided<T: Scalar>(slice: &'a [T], step: usize) -> Self {
        assert!(step > 0, "operand step must be non-zero");
        Operand {
            base: slice.as_ptr() as *const u8,
            stride: (std::mem::size_of::<T>() * step) as isize,
            len: slice.len().div_ceil(step),
            element: T::ELEMENT_TYPE,
            _borrow: PhantomData,
        }
    }

    /// One value broadcast to every index.
    pub fn scalar<T: Scalar>(value: &'a T) -> Self {
        Operand {
            base: value as *const T as *const u8,
            stride: 0,
            len: 1,
            element: T::ELEMENT_TYPE,
            _borrow: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    /// Base pointer and stride for a call over `n` indices. A single
    /// element is broadcast with stride 0.
    pub(crate) fn lower(&self, n: usize) -> (*mut u8, isize) {
        let stride = if self.len == 1 && n != 1 { 0 } else { self.stride };
        (self.base as *mut u8, stride)
    }
}

impl<'a, T: Scalar> From<&'a [T]> for Operand<'a> {
    fn from(slice: &'a [T]) -> Self {
        Operand::contiguous(slice)
    }
}

impl<'a, T: Scalar> From<&'a Vec<T>> for Operand<'a> {
    fn from(vec: &'a Vec<T>) -> Self {
        Operand::contiguous(vec.as_slice())
    }
}

/// The mutable output view. Its length is the call's `N`.
#[derive(Debug)]
pub struct OutputOperand<'a> {
    base: *mut u8,
    stride: isize,
    len: usize,
    element: ElementType,
    _borrow: PhantomData<&'a mut [u8]>,
}

unsafe impl Send for OutputOperand<'_> {}

impl<'a> OutputOperand<'a> {
    pub fn contiguous<T: Scalar>(slice: &'a mut [T]) -> Self {
        OutputOperand {
            base: slice.as_mut_ptr() as *mut u8,
            stride: std::mem::size_of::<T>() as isize,
            len: slice.len(),
            element: T::ELEMENT_TYPE,
            _borrow: PhantomData,
        }
    }

    /// Every `step`-th element of `slice`. The skipped elements are untouched.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero.
    pub fn strided<T: Scalar>(slice: &'a mut [T], step: usize) -> Self {
        assert!(step > 0, "operand step must be non-zero");
        OutputOperand {
            base: slice.as_mut_ptr() as *mut u8,
            stride: (std::mem::size_of::<T>() * step) as isize,
            len: slice.len().div_ceil(step),
            element: T::ELEMENT_TYPE,
            _borrow: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    pub(crate) fn lower(&self) -> (*mut u8, isize) {
        (self.base, self.stride)
    }
}

impl<'a, T: Scalar> From<&'a mut [T]> for OutputOperand<'a> {
    fn from(slice: &'a mut [T]) -> Self {
        OutputOperand::contiguous(slice)
    }
}

impl<'a, T: Scalar> From<&'a mut Vec<T>> for OutputOperand<'a> {
    fn from(vec: &'a mut Vec<T>) -> Self {
        OutputOperand::contiguous(vec.as_mut_slice())
    }
}
