//! Fixed-format bytecode for the register-based interpreter the gadget table
//! targets. Opcode and type-index values are those of the host bytecode
//! format and are treated as opaque constants.

pub mod encoding;
pub mod interp;
pub mod op;

pub use op::{decode, DecodeError, Instruction, Op, OpKind};

pub mod opcode {
    pub const MOVE_EXCEPTION: u8 = 0x0d;
    pub const RETURN_OBJECT: u8 = 0x11;
    pub const CONST_4: u8 = 0x12;
    pub const CONST_16: u8 = 0x13;
    pub const NEW_ARRAY: u8 = 0x23;
    pub const FILLED_NEW_ARRAY_RANGE: u8 = 0x25;
    pub const THROW: u8 = 0x27;
    pub const IF_LT: u8 = 0x34;
    pub const AGET_CHAR: u8 = 0x49;
    pub const APUT_CHAR: u8 = 0x50;
    pub const XOR_INT_2ADDR: u8 = 0xb7;
    pub const ADD_INT_LIT8: u8 = 0xd8;
}

/// Type-pool indices of the host image.
pub mod types {
    pub const EXCEPTION: u16 = 0x55;
    pub const CHAR_ARRAY: u16 = 0x1c41;
}

/// Packs two 4-bit fields into one byte, `high` in the upper nibble.
pub(crate) fn pack_nibbles(low: u8, high: u8) -> u8 {
    (high << 4) | (low & 0x0f)
}

/// Inverse of [`pack_nibbles`], returning `(low, high)`.
pub(crate) fn unpack_nibbles(byte: u8) -> (u8, u8) {
    (byte & 0x0f, byte >> 4)
}

#[test]
fn nibbles() {
    assert_eq!(pack_nibbles(0x5, 0x0), 0x05);
    assert_eq!(pack_nibbles(0x3, 0xf), 0xf3);
    assert_eq!(unpack_nibbles(0xf3), (0x3, 0xf));
}
