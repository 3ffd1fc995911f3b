//! Runtime values as the decoder sees them.
//!
//! Native entry points hand back a single machine word.
//! [`RawValue::read`](raw::RawValue::read) turns that word into a
//! [`RuntimeValue`], a closed two-shape tree with no pointers left in it, so
//! everything downstream of the loader is safe code.

pub mod raw;

use crate::error::ValueShape;
use raw::DOUBLE_TAG;

/// A value produced by generated code.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeValue {
    /// An unboxed scalar: a constant constructor's ordinal or a machine
    /// integer.
    Immediate(i64),
    /// A heap record: constructor tag plus fields.
    Block { tag: u8, fields: Vec<RuntimeValue> },
}

impl RuntimeValue {
    pub fn block(tag: u8, fields: Vec<RuntimeValue>) -> Self {
        RuntimeValue::Block { tag, fields }
    }

    /// A boxed float holding `value`.
    pub fn float(value: f64) -> Self {
        Self::float_bits(i64::from_ne_bytes(value.to_bits().to_ne_bytes()))
    }

    /// A boxed float holding the IEEE-754 bit pattern `bits`.
    pub fn float_bits(bits: i64) -> Self {
        RuntimeValue::Block {
            tag: DOUBLE_TAG,
            fields: vec![RuntimeValue::Immediate(bits)],
        }
    }

    /// The bit pattern of a boxed float, or `None` for any other value.
    pub fn as_float_bits(&self) -> Option<i64> {
        match self {
            RuntimeValue::Block {
                tag: DOUBLE_TAG,
                fields,
            } => match fields.as_slice() {
                [RuntimeValue::Immediate(bits)] => Some(*bits),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn shape(&self) -> ValueShape {
        match self {
            RuntimeValue::Immediate(_) => ValueShape::Immediate,
            RuntimeValue::Block { .. } => ValueShape::Block,
        }
    }
}
