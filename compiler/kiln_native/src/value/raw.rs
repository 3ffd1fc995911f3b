//! Reading the runtime's word layout.
//!
//! A value is one machine word. If its low bit is set it is an immediate
//! holding `word >> 1` (arithmetic shift). Otherwise it points at the first
//! field of a block; the word before the first field is the header, with the
//! tag in bits `0..8` and the field count from bit 10 up.
//!
//! Blocks tagged [`DOUBLE_TAG`] are boxed floats. Their payload is not a
//! value, so they read as a block with a single immediate holding the
//! float's unshifted bits. Other tags at or above [`NO_SCAN_TAG`] hold
//! runtime-private data; they read as blocks without fields.

#![allow(
    unsafe_code,
    reason = "values are raw words pointing into the runtime heap"
)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "header and immediate decoding reinterpret machine words"
)]

use kiln_ir::ensure_sufficient_stack;

use super::RuntimeValue;
use crate::error::IllFormedValue;

/// First tag whose fields are not values.
pub const NO_SCAN_TAG: u8 = 251;

/// Tag of a boxed double.
pub const DOUBLE_TAG: u8 = 253;

const TAG_MASK: usize = 0xff;
const SIZE_SHIFT: u32 = 10;

/// A word returned by generated code, not yet interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawValue {
    word: usize,
}

impl RawValue {
    /// Wrap a word produced by the runtime.
    ///
    /// # Safety
    ///
    /// `word` must be an immediate or a pointer to a well-formed block, and
    /// every block reachable from it must stay allocated and unmodified for
    /// as long as this value (or a copy of it) may be read.
    pub unsafe fn from_word(word: usize) -> Self {
        RawValue { word }
    }

    pub fn word(self) -> usize {
        self.word
    }

    pub fn is_immediate(self) -> bool {
        self.word & 1 == 1
    }

    /// Copy the value, and everything reachable from it, out of the heap.
    pub fn read(self) -> Result<RuntimeValue, IllFormedValue> {
        ensure_sufficient_stack(|| {
            if self.is_immediate() {
                return Ok(RuntimeValue::Immediate((self.word as isize >> 1) as i64));
            }
            if self.word == 0 {
                return Err(IllFormedValue::NullBlock);
            }

            let first = self.word as *const usize;
            // SAFETY: `from_word` guarantees a live block, and a block is
            // preceded by its header word.
            let header = unsafe { first.sub(1).read() };
            let tag = (header & TAG_MASK) as u8;
            let size = header >> SIZE_SHIFT;

            if tag == DOUBLE_TAG {
                // SAFETY: a double block has one word of payload.
                let bits = unsafe { first.read() };
                return Ok(RuntimeValue::float_bits(bits as i64));
            }
            if tag >= NO_SCAN_TAG {
                return Ok(RuntimeValue::block(tag, Vec::new()));
            }

            let mut fields = Vec::with_capacity(size);
            for i in 0..size {
                // SAFETY: the header says the block has `size` fields.
                let word = unsafe { first.add(i).read() };
                fields.push(RawValue { word }.read()?);
            }
            Ok(RuntimeValue::block(tag, fields))
        })
    }
}
