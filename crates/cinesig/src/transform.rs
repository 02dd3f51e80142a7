//! Post-match transforms.
//!
//! Only two instruction shapes are decoded: a 5-byte `E8`/`E9` rel32 branch
//! and a pointer-sized little-endian value. Every read goes through the
//! bounds-checked image and every produced address is checked against the
//! known modules before it is handed out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::ModuleImage;
use crate::module::ModuleRegistry;
use crate::signature::{PointerWidth, Transform};

/// Length of a rel32 call/jump: opcode + 4 byte displacement
pub const REL32_INSTRUCTION_LEN: u64 = 5;

const OPCODE_CALL_REL32: u8 = 0xE8;
const OPCODE_JMP_REL32: u8 = 0xE9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformError {
    #[error("address 0x{address:X} is outside every known module")]
    OutOfRange { address: u64 },

    #[error("bytes at 0x{address:X} were not captured")]
    UnreadableInput { address: u64 },

    #[error("expected a rel32 call/jump at 0x{address:X}, found opcode {opcode:02X}")]
    UnexpectedOpcode { address: u64, opcode: u8 },
}

/// Target of the rel32 call or jump at `address`: `address + 5 + rel32`
pub fn follow_code_flow(image: &ModuleImage, address: u64) -> Result<u64, TransformError> {
    let bytes = image
        .read(address, REL32_INSTRUCTION_LEN as usize)
        .ok_or(TransformError::UnreadableInput { address })?;

    let opcode = bytes[0];
    if opcode != OPCODE_CALL_REL32 && opcode != OPCODE_JMP_REL32 {
        return Err(TransformError::UnexpectedOpcode { address, opcode });
    }

    let displacement = i32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    (address + REL32_INSTRUCTION_LEN)
        .checked_add_signed(displacement as i64)
        .ok_or(TransformError::OutOfRange { address })
}

/// Pointer stored at `address`
pub fn dereference(
    image: &ModuleImage,
    address: u64,
    width: PointerWidth,
) -> Result<u64, TransformError> {
    image
        .read_pointer(address, width)
        .ok_or(TransformError::UnreadableInput { address })
}

/// Applies offsets and transforms against one registry
#[derive(Debug, Clone, Copy)]
pub struct TransformEngine<'a> {
    modules: &'a ModuleRegistry,
    width: PointerWidth,
}

impl<'a> TransformEngine<'a> {
    pub fn new(modules: &'a ModuleRegistry, width: PointerWidth) -> Self {
        Self { modules, width }
    }

    /// `match_address + offset`, which must stay inside the scanned module
    pub fn offset(
        &self,
        image: &ModuleImage,
        match_address: u64,
        offset: i64,
    ) -> Result<u64, TransformError> {
        match match_address.checked_add_signed(offset) {
            Some(raw) if image.contains(raw) => Ok(raw),
            Some(raw) => Err(TransformError::OutOfRange { address: raw }),
            None => Err(TransformError::OutOfRange {
                address: match_address,
            }),
        }
    }

    /// Apply `transform` to `raw` and range-check the result
    pub fn apply(
        &self,
        transform: Transform,
        image: &ModuleImage,
        raw: u64,
    ) -> Result<u64, TransformError> {
        let target = match transform {
            Transform::None => raw,
            Transform::FollowCodeFlow => follow_code_flow(image, raw)?,
            Transform::DereferenceAddress => dereference(image, raw, self.width)?,
        };

        if !self.modules.contains(target) {
            return Err(TransformError::OutOfRange { address: target });
        }
        Ok(target)
    }
}
