//! One encoder per operation. Every encoder validates all of its operands
//! before emitting a byte, so a failure never leaves a partial instruction.
//!
//! Operands are taken as `i64` so that out-of-domain values can be expressed
//! and rejected here instead of being truncated by the caller.

use super::{opcode, pack_nibbles};
use crate::range::{sbyte, snibble, sshort, ubyte, unibble, ushort, OutOfRange};

/// `const/4 vA, #+B`
pub fn load_small_const(dst: i64, value: i64) -> Result<Vec<u8>, OutOfRange> {
    let dst = unibble(dst)?;
    let value = snibble(value)?;
    Ok(c![opcode::CONST_4, pack_nibbles(dst, value as u8)])
}

/// `const/16 vAA, #+BBBB`
pub fn load_const(dst: i64, value: i64) -> Result<Vec<u8>, OutOfRange> {
    let dst = ubyte(dst)?;
    let value = sshort(value)?;
    Ok(c![opcode::CONST_16, dst, value.to_le_bytes()])
}

/// `add-int/lit8 vAA, vBB, #+CC`
pub fn add_immediate(dst: i64, src: i64, value: i64) -> Result<Vec<u8>, OutOfRange> {
    let dst = ubyte(dst)?;
    let src = ubyte(src)?;
    let value = sbyte(value)?;
    Ok(c![opcode::ADD_INT_LIT8, dst, src, value as u8])
}

/// `filled-new-array/range {vCCCC .. vNNNN}, type@BBBB`
pub fn alloc_array_range(size: i64, type_index: i64, first: i64) -> Result<Vec<u8>, OutOfRange> {
    let size = ubyte(size)?;
    let type_index = ushort(type_index)?;
    let first = ushort(first)?;
    Ok(c![
        opcode::FILLED_NEW_ARRAY_RANGE,
        size,
        type_index.to_le_bytes(),
        first.to_le_bytes(),
    ])
}

/// `new-array vA, vB, type@CCCC`
pub fn alloc_array(dst: i64, size: i64, type_index: i64) -> Result<Vec<u8>, OutOfRange> {
    let dst = unibble(dst)?;
    let size = unibble(size)?;
    let type_index = ushort(type_index)?;
    Ok(c![
        opcode::NEW_ARRAY,
        pack_nibbles(dst, size),
        type_index.to_le_bytes(),
    ])
}

/// `aget-char vAA, vBB, vCC`
pub fn array_load_char(dst: i64, array: i64, index: i64) -> Result<Vec<u8>, OutOfRange> {
    let dst = ubyte(dst)?;
    let array = ubyte(array)?;
    let index = ubyte(index)?;
    Ok(c![opcode::AGET_CHAR, dst, array, index])
}

/// `aput-char vAA, vBB, vCC`
pub fn array_store_char(src: i64, array: i64, index: i64) -> Result<Vec<u8>, OutOfRange> {
    let src = ubyte(src)?;
    let array = ubyte(array)?;
    let index = ubyte(index)?;
    Ok(c![opcode::APUT_CHAR, src, array, index])
}

/// `xor-int/2addr vA, vB`
pub fn xor_in_place(dst: i64, src: i64) -> Result<Vec<u8>, OutOfRange> {
    let dst = unibble(dst)?;
    let src = unibble(src)?;
    Ok(c![opcode::XOR_INT_2ADDR, pack_nibbles(dst, src)])
}

/// `if-lt vA, vB, +CCCC`, the offset counted in 16-bit code units.
pub fn branch_if_less(first: i64, second: i64, offset: i64) -> Result<Vec<u8>, OutOfRange> {
    let first = unibble(first)?;
    let second = unibble(second)?;
    let offset = sshort(offset)?;
    Ok(c![
        opcode::IF_LT,
        pack_nibbles(first, second),
        offset.to_le_bytes(),
    ])
}

/// `throw vAA`
pub fn throw(src: i64) -> Result<Vec<u8>, OutOfRange> {
    let src = ubyte(src)?;
    Ok(c![opcode::THROW, src])
}

/// `return-object vAA`
pub fn return_object(src: i64) -> Result<Vec<u8>, OutOfRange> {
    let src = ubyte(src)?;
    Ok(c![opcode::RETURN_OBJECT, src])
}

/// `move-exception vAA`
pub fn move_exception(dst: i64) -> Result<Vec<u8>, OutOfRange> {
    let dst = ubyte(dst)?;
    Ok(c![opcode::MOVE_EXCEPTION, dst])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{Signedness, Width};

    #[test]
    fn known_encodings() {
        assert_eq!(load_small_const(5, 0).unwrap(), b"\x12\x05");
        assert_eq!(load_small_const(1, -1).unwrap(), b"\x12\xf1");
        assert_eq!(load_const(2, 0x42).unwrap(), b"\x13\x02\x42\x00");
        assert_eq!(load_const(4, -2).unwrap(), b"\x13\x04\xfe\xff");
        assert_eq!(add_immediate(1, 1, 1).unwrap(), b"\xd8\x01\x01\x01");
        assert_eq!(add_immediate(5, 5, -1).unwrap(), b"\xd8\x05\x05\xff");
        assert_eq!(
            alloc_array_range(3, 0x1c41, 0x0102).unwrap(),
            b"\x25\x03\x41\x1c\x02\x01"
        );
        assert_eq!(alloc_array(3, 2, 0x1c41).unwrap(), b"\x23\x23\x41\x1c");
        assert_eq!(array_load_char(4, 3, 5).unwrap(), b"\x49\x04\x03\x05");
        assert_eq!(array_store_char(4, 3, 5).unwrap(), b"\x50\x04\x03\x05");
        assert_eq!(xor_in_place(4, 2).unwrap(), b"\xb7\x24");
        assert_eq!(branch_if_less(1, 2, -3).unwrap(), b"\x34\x21\xfd\xff");
        assert_eq!(throw(0).unwrap(), b"\x27\x00");
        assert_eq!(return_object(3).unwrap(), b"\x11\x03");
        assert_eq!(move_exception(2).unwrap(), b"\x0d\x02");
    }

    #[test]
    fn rejects_out_of_range() {
        let err = load_small_const(16, 0).unwrap_err();
        assert_eq!(err.width, Width::Nibble);
        assert_eq!(err.signedness, Signedness::Unsigned);

        let err = load_small_const(0, 8).unwrap_err();
        assert_eq!((err.value, err.signedness), (8, Signedness::Signed));

        assert!(load_const(256, 0).is_err());
        assert!(load_const(0, 32768).is_err());
        assert!(add_immediate(0, 0, 128).is_err());
        assert!(add_immediate(0, -1, 0).is_err());
        assert!(alloc_array_range(256, 0, 0).is_err());
        assert!(alloc_array_range(0, 0x1_0000, 0).is_err());
        assert!(alloc_array(0, 16, 0).is_err());
        assert!(array_load_char(0, 0, 300).is_err());
        assert!(array_store_char(-1, 0, 0).is_err());
        assert!(xor_in_place(16, 0).is_err());
        assert!(branch_if_less(0, 0, -32769).is_err());
        assert!(throw(256).is_err());
        assert!(return_object(-1).is_err());
        assert!(move_exception(1000).is_err());
    }

    #[quickcheck]
    fn qc_load_const_layout(dst: u8, value: i16) -> bool {
        let bytes = load_const(i64::from(dst), i64::from(value)).unwrap();
        bytes.len() == 4
            && bytes[0] == opcode::CONST_16
            && bytes[1] == dst
            && bytes[2..] == value.to_le_bytes()
    }

    #[quickcheck]
    fn qc_wide_value_never_encodes(value: i64) -> bool {
        let fits = (-32768..=32767).contains(&value);
        load_const(0, value).is_ok() == fits
    }
}
