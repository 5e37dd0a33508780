//! Families of typed kernel variants behind one callable.
//!
//! A [`ParallelUFunc`] holds several kernels of the same arity that differ in
//! element types, for instance an `f32` and an `f64` version of one formula.
//! A call picks the variant matching its operands, broadcasts single-element
//! inputs and hands the lowered buffers to a [`Dispatcher`].

use crate::dispatcher::Dispatcher;
use crate::element::{ElementType, Signature};
use crate::error::{ConfigError, DispatchError};
use crate::kernel::{ElementKernel, IntoKernel};
use crate::operand::{Operand, OutputOperand, RawOperands};
use crate::report::DispatchReport;
use std::collections::HashSet;
use std::sync::Arc;

/// Collects kernel variants for a [`ParallelUFunc`].
#[derive(Default)]
pub struct Vectorize {
    variants: Vec<Arc<dyn ElementKernel>>,
}

impl Vectorize {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Rust callable as a variant.
    pub fn add<M, K: IntoKernel<M>>(mut self, callable: K) -> Self {
        self.variants.push(callable.into_kernel());
        self
    }

    /// Adds an already type-erased kernel as a variant.
    pub fn add_kernel(mut self, kernel: Arc<dyn ElementKernel>) -> Self {
        self.variants.push(kernel);
        self
    }

    /// Validates the variants and binds them to `dispatcher`.
    ///
    /// All variants must share the first variant's arity, and no two may
    /// accept the same input types.
    pub fn build(self, dispatcher: Arc<Dispatcher>) -> Result<ParallelUFunc, DispatchError> {
        let first = self.variants.first().ok_or(ConfigError::EmptyFamily)?;
        let arity = first.arity();
        if arity == 0 {
            return Err(ConfigError::NoInputs.into());
        }

        let mut seen = HashSet::new();
        let mut signatures = Vec::with_capacity(self.variants.len());
        for (variant, kernel) in self.variants.iter().enumerate() {
            let signature = kernel.signature();
            if signature.arity() != arity {
                return Err(ConfigError::ArityMismatch {
                    variant,
                    expected: arity,
                    found: signature.arity(),
                }
                .into());
            }
            if !seen.insert(signature.inputs().to_vec()) {
                return Err(ConfigError::DuplicateSignature { signature }.into());
            }
            signatures.push(signature);
        }

        tracing::debug!(
            arity,
            variants = signatures.len(),
            backend = dispatcher.backend_name(),
            "parallel ufunc built"
        );

        Ok(ParallelUFunc {
            dispatcher,
            arity,
            variants: self.variants,
            signatures,
        })
    }
}

/// A validated kernel family bound to a dispatcher.
pub struct ParallelUFunc {
    dispatcher: Arc<Dispatcher>,
    arity: usize,
    variants: Vec<Arc<dyn ElementKernel>>,
    signatures: Vec<Signature>,
}

impl ParallelUFunc {
    /// Number of inputs every variant takes.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// The variant accepting `inputs` and producing `output`, if any.
    pub fn resolve(&self, inputs: &[ElementType], output: ElementType) -> Option<usize> {
        self.signatures
            .iter()
            .position(|sig| sig.inputs() == inputs && sig.output() == output)
    }

    /// Evaluates the matching variant for every index of `output`.
    ///
    /// Inputs must have the output's length or length 1; length-1 inputs are
    /// broadcast.
    pub fn call(
        &self,
        inputs: &[Operand<'_>],
        output: OutputOperand<'_>,
    ) -> Result<DispatchReport, DispatchError> {
        if inputs.len() != self.arity {
            return Err(ConfigError::OperandCount {
                expected: self.arity + 1,
                found: inputs.len() + 1,
            }
            .into());
        }

        let types: Vec<ElementType> = inputs.iter().map(Operand::element_type).collect();
        let variant = self
            .resolve(&types, output.element_type())
            .ok_or_else(|| ConfigError::NoMatchingSignature {
                inputs: types.clone(),
                output: output.element_type(),
            })?;

        let n = output.len();
        for (operand, input) in inputs.iter().enumerate() {
            if input.len() != n && input.len() != 1 {
                return Err(ConfigError::LengthMismatch {
                    operand,
                    expected: n,
                    found: input.len(),
                }
                .into());
            }
        }
        let mut pointers = Vec::with_capacity(self.arity + 1);
        let mut strides = Vec::with_capacity(self.arity + 1);
        for input in inputs {
            let (base, stride) = input.lower(n);
            pointers.push(base);
            strides.push(stride);
        }
        let (out_base, out_stride) = output.lower();
        pointers.push(out_base);
        strides.push(out_stride);
        let operands = RawOperands::new(pointers, strides)?;

        // SAFETY: every operand borrows a live slice whose element type matches
        // the selected variant's signature; inputs are either length `n` or
        // broadcast with stride 0; the output is mutably borrowed, so it is
        // disjoint from the inputs and has a distinct element per index.
        unsafe {
            self.dispatcher
                .dispatch(&*self.variants[variant], &operands, n)
        }
    }
}
