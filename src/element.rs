//! Scalar element types understood by the kernel invocation convention.
//!
//! Every kernel argument and result is one of a small set of fixed-width
//! scalars. The numeric codes are stable and are what foreign callers pass
//! through the C ABI to describe a kernel's signature.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of one kernel argument or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementType {
    I8 = 0,
    I16 = 1,
    I32 = 2,
    I64 = 3,
    F32 = 4,
    F64 = 5,
}

impl ElementType {
    /// Size in bytes of one element.
    pub const fn size(self) -> usize {
        match self {
            ElementType::I8 => 1,
            ElementType::I16 => 2,
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::F64 => 8,
        }
    }

    /// Stable numeric code used across the C ABI.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a numeric code, returning `None` for unknown codes.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ElementType::I8),
            1 => Some(ElementType::I16),
            2 => Some(ElementType::I32),
            3 => Some(ElementType::I64),
            4 => Some(ElementType::F32),
            5 => Some(ElementType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A Rust scalar that can flow through a kernel by value.
pub trait Scalar: Copy + Send + Sync + 'static {
    const ELEMENT_TYPE: ElementType;
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$variant;
            }
        )*
    };
}

impl_scalar! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

/// Ordered input element types plus the output element type of a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    inputs: Vec<ElementType>,
    output: ElementType,
}

impl Signature {
    pub fn new(inputs: Vec<ElementType>, output: ElementType) -> Self {
        Signature { inputs, output }
    }

    /// Builds a signature from C ABI codes laid out as `inputs..., output`.
    ///
    /// Returns `None` if the slice is shorter than two codes or contains an
    /// unknown code.
    pub fn from_codes(codes: &[u8]) -> Option<Self> {
        let (output, inputs) = codes.split_last()?;
        if inputs.is_empty() {
            return None;
        }
        let inputs = inputs
            .iter()
            .map(|&code| ElementType::from_code(code))
            .collect::<Option<Vec<_>>>()?;
        Some(Signature::new(inputs, ElementType::from_code(*output)?))
    }

    pub fn inputs(&self) -> &[ElementType] {
        &self.inputs
    }

    pub fn output(&self) -> ElementType {
        self.output
    }

    /// Number of input arguments.
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, ty) in self.inputs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ") -> {}", self.output)
    }
}
