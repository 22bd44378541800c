use super::{encoding, opcode, unpack_nibbles};
use crate::range::OutOfRange;
use lazy_static::lazy_static;
use std::{collections::HashMap, convert::TryFrom, fmt};

/// The closed set of operations the assembler composes gadgets from.
///
/// Operand fields are unvalidated; [`Op::encode`] checks them against the
/// widths of the instruction format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Op {
    LoadSmallConst { dst: i64, value: i64 },
    LoadConst { dst: i64, value: i64 },
    AddImmediate { dst: i64, src: i64, value: i64 },
    AllocArrayRange { size: i64, type_index: i64, first: i64 },
    AllocArray { dst: i64, size: i64, type_index: i64 },
    ArrayLoadChar { dst: i64, array: i64, index: i64 },
    ArrayStoreChar { src: i64, array: i64, index: i64 },
    XorInPlace { dst: i64, src: i64 },
    BranchIfLess { first: i64, second: i64, offset: i64 },
    Throw { src: i64 },
    ReturnObject { src: i64 },
    MoveException { dst: i64 },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OpKind {
    LoadSmallConst,
    LoadConst,
    AddImmediate,
    AllocArrayRange,
    AllocArray,
    ArrayLoadChar,
    ArrayStoreChar,
    XorInPlace,
    BranchIfLess,
    Throw,
    ReturnObject,
    MoveException,
}

impl OpKind {
    pub const ALL: [OpKind; 12] = [
        Self::LoadSmallConst,
        Self::LoadConst,
        Self::AddImmediate,
        Self::AllocArrayRange,
        Self::AllocArray,
        Self::ArrayLoadChar,
        Self::ArrayStoreChar,
        Self::XorInPlace,
        Self::BranchIfLess,
        Self::Throw,
        Self::ReturnObject,
        Self::MoveException,
    ];

    pub const fn opcode(self) -> u8 {
        match self {
            Self::LoadSmallConst => opcode::CONST_4,
            Self::LoadConst => opcode::CONST_16,
            Self::AddImmediate => opcode::ADD_INT_LIT8,
            Self::AllocArrayRange => opcode::FILLED_NEW_ARRAY_RANGE,
            Self::AllocArray => opcode::NEW_ARRAY,
            Self::ArrayLoadChar => opcode::AGET_CHAR,
            Self::ArrayStoreChar => opcode::APUT_CHAR,
            Self::XorInPlace => opcode::XOR_INT_2ADDR,
            Self::BranchIfLess => opcode::IF_LT,
            Self::Throw => opcode::THROW,
            Self::ReturnObject => opcode::RETURN_OBJECT,
            Self::MoveException => opcode::MOVE_EXCEPTION,
        }
    }

    /// Encoded length in bytes, fixed per kind.
    pub const fn len(self) -> usize {
        match self {
            Self::LoadSmallConst
            | Self::XorInPlace
            | Self::Throw
            | Self::ReturnObject
            | Self::MoveException => 2,
            Self::LoadConst
            | Self::AddImmediate
            | Self::AllocArray
            | Self::ArrayLoadChar
            | Self::ArrayStoreChar
            | Self::BranchIfLess => 4,
            Self::AllocArrayRange => 6,
        }
    }

    pub fn from_opcode(byte: u8) -> Option<Self> {
        lazy_static! {
            static ref BY_OPCODE: HashMap<u8, OpKind> = OpKind::ALL
                .iter()
                .map(|&kind| (kind.opcode(), kind))
                .collect();
        }
        BY_OPCODE.get(&byte).copied()
    }
}

impl Op {
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::LoadSmallConst { .. } => OpKind::LoadSmallConst,
            Self::LoadConst { .. } => OpKind::LoadConst,
            Self::AddImmediate { .. } => OpKind::AddImmediate,
            Self::AllocArrayRange { .. } => OpKind::AllocArrayRange,
            Self::AllocArray { .. } => OpKind::AllocArray,
            Self::ArrayLoadChar { .. } => OpKind::ArrayLoadChar,
            Self::ArrayStoreChar { .. } => OpKind::ArrayStoreChar,
            Self::XorInPlace { .. } => OpKind::XorInPlace,
            Self::BranchIfLess { .. } => OpKind::BranchIfLess,
            Self::Throw { .. } => OpKind::Throw,
            Self::ReturnObject { .. } => OpKind::ReturnObject,
            Self::MoveException { .. } => OpKind::MoveException,
        }
    }

    pub fn encode(self) -> Result<Instruction, OutOfRange> {
        use Op::*;
        let bytes = match self {
            LoadSmallConst { dst, value } => encoding::load_small_const(dst, value),
            LoadConst { dst, value } => encoding::load_const(dst, value),
            AddImmediate { dst, src, value } => encoding::add_immediate(dst, src, value),
            AllocArrayRange {
                size,
                type_index,
                first,
            } => encoding::alloc_array_range(size, type_index, first),
            AllocArray {
                dst,
                size,
                type_index,
            } => encoding::alloc_array(dst, size, type_index),
            ArrayLoadChar { dst, array, index } => encoding::array_load_char(dst, array, index),
            ArrayStoreChar { src, array, index } => encoding::array_store_char(src, array, index),
            XorInPlace { dst, src } => encoding::xor_in_place(dst, src),
            BranchIfLess {
                first,
                second,
                offset,
            } => encoding::branch_if_less(first, second, offset),
            Throw { src } => encoding::throw(src),
            ReturnObject { src } => encoding::return_object(src),
            MoveException { dst } => encoding::move_exception(dst),
        }?;
        debug_assert_eq!(bytes.len(), self.kind().len());
        debug_assert_eq!(bytes[0], self.kind().opcode());
        Ok(Instruction { op: self, bytes })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Op::*;
        match *self {
            LoadSmallConst { dst, value } => write!(f, "const/4 v{}, #{}", dst, value),
            LoadConst { dst, value } => write!(f, "const/16 v{}, #{}", dst, value),
            AddImmediate { dst, src, value } => {
                write!(f, "add-int/lit8 v{}, v{}, #{}", dst, src, value)
            }
            AllocArrayRange {
                size,
                type_index,
                first,
            } => write!(
                f,
                "filled-new-array/range {{v{} .. v{}}}, type@{:04x}",
                first,
                first + size - 1,
                type_index
            ),
            AllocArray {
                dst,
                size,
                type_index,
            } => write!(f, "new-array v{}, v{}, type@{:04x}", dst, size, type_index),
            ArrayLoadChar { dst, array, index } => {
                write!(f, "aget-char v{}, v{}, v{}", dst, array, index)
            }
            ArrayStoreChar { src, array, index } => {
                write!(f, "aput-char v{}, v{}, v{}", src, array, index)
            }
            XorInPlace { dst, src } => write!(f, "xor-int/2addr v{}, v{}", dst, src),
            BranchIfLess {
                first,
                second,
                offset,
            } => write!(f, "if-lt v{}, v{}, {:+}", first, second, offset),
            Throw { src } => write!(f, "throw v{}", src),
            ReturnObject { src } => write!(f, "return-object v{}", src),
            MoveException { dst } => write!(f, "move-exception v{}", dst),
        }
    }
}

/// An encoded operation. Immutable once produced.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Instruction {
    op: Op,
    bytes: Vec<u8>,
}

impl Instruction {
    pub fn op(&self) -> Op {
        self.op
    }
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("{kind:?} needs {needed} bytes but only {available} remain")]
    Truncated {
        kind: OpKind,
        needed: usize,
        available: usize,
    },
    #[error("no bytes to decode")]
    Empty,
}

/// Decodes the single instruction at the start of `code`. The consumed length
/// is `op.kind().len()`.
pub fn decode(code: &[u8]) -> Result<Op, DecodeError> {
    let &first = code.first().ok_or(DecodeError::Empty)?;
    let kind = OpKind::from_opcode(first).ok_or(DecodeError::UnknownOpcode(first))?;
    if code.len() < kind.len() {
        return Err(DecodeError::Truncated {
            kind,
            needed: kind.len(),
            available: code.len(),
        });
    }
    let b = &code[..kind.len()];
    let byte = |i: usize| i64::from(b[i]);
    let sshort = |i: usize| i64::from(i16::from_le_bytes([b[i], b[i + 1]]));
    let ushort = |i: usize| i64::from(u16::from_le_bytes([b[i], b[i + 1]]));

    let op = match kind {
        OpKind::LoadSmallConst => {
            let (dst, value) = unpack_nibbles(b[1]);
            // sign-extend the high nibble
            let value = i64::from(((value << 4) as i8) >> 4);
            Op::LoadSmallConst {
                dst: i64::from(dst),
                value,
            }
        }
        OpKind::LoadConst => Op::LoadConst {
            dst: byte(1),
            value: sshort(2),
        },
        OpKind::AddImmediate => Op::AddImmediate {
            dst: byte(1),
            src: byte(2),
            value: i64::from(i8::from_le_bytes([b[3]])),
        },
        OpKind::AllocArrayRange => Op::AllocArrayRange {
            size: byte(1),
            type_index: ushort(2),
            first: ushort(4),
        },
        OpKind::AllocArray => {
            let (dst, size) = unpack_nibbles(b[1]);
            Op::AllocArray {
                dst: i64::from(dst),
                size: i64::from(size),
                type_index: ushort(2),
            }
        }
        OpKind::ArrayLoadChar => Op::ArrayLoadChar {
            dst: byte(1),
            array: byte(2),
            index: byte(3),
        },
        OpKind::ArrayStoreChar => Op::ArrayStoreChar {
            src: byte(1),
            array: byte(2),
            index: byte(3),
        },
        OpKind::XorInPlace => {
            let (dst, src) = unpack_nibbles(b[1]);
            Op::XorInPlace {
                dst: i64::from(dst),
                src: i64::from(src),
            }
        }
        OpKind::BranchIfLess => {
            let (first, second) = unpack_nibbles(b[1]);
            Op::BranchIfLess {
                first: i64::from(first),
                second: i64::from(second),
                offset: sshort(2),
            }
        }
        OpKind::Throw => Op::Throw { src: byte(1) },
        OpKind::ReturnObject => Op::ReturnObject { src: byte(1) },
        OpKind::MoveException => Op::MoveException { dst: byte(1) },
    };
    Ok(op)
}

/// Decodes consecutive instructions filling `code` exactly.
pub fn decode_all(mut code: &[u8]) -> Result<Vec<Op>, DecodeError> {
    let mut ops = Vec::new();
    while !code.is_empty() {
        let op = decode(code)?;
        code = &code[op.kind().len()..];
        ops.push(op);
    }
    Ok(ops)
}

impl TryFrom<&[u8]> for Instruction {
    type Error = DecodeError;
    fn try_from(code: &[u8]) -> Result<Self, Self::Error> {
        let op = decode(code)?;
        let bytes = code[..op.kind().len()].to_vec();
        Ok(Self { op, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{bounds, ensure, Signedness, Width};
    use quickcheck::{Arbitrary, Gen};
    use rand::{seq::SliceRandom, Rng};

    fn samples() -> Vec<Op> {
        vec![
            Op::LoadSmallConst { dst: 5, value: 0 },
            Op::LoadSmallConst { dst: 1, value: -1 },
            Op::LoadConst { dst: 2, value: 0x42 },
            Op::LoadConst { dst: 4, value: -300 },
            Op::AddImmediate {
                dst: 5,
                src: 5,
                value: 1,
            },
            Op::AllocArrayRange {
                size: 3,
                type_index: 0x1c41,
                first: 7,
            },
            Op::AllocArray {
                dst: 3,
                size: 2,
                type_index: 0x1c41,
            },
            Op::ArrayLoadChar {
                dst: 4,
                array: 3,
                index: 5,
            },
            Op::ArrayStoreChar {
                src: 4,
                array: 3,
                index: 5,
            },
            Op::XorInPlace { dst: 4, src: 2 },
            Op::BranchIfLess {
                first: 5,
                second: 2,
                offset: -6,
            },
            Op::Throw { src: 0 },
            Op::ReturnObject { src: 3 },
            Op::MoveException { dst: 2 },
        ]
    }

    #[test]
    fn lengths_and_opcodes_are_static() {
        for op in samples() {
            let ins = op.encode().unwrap();
            assert_eq!(ins.len(), op.kind().len(), "op = {}", op);
            assert_eq!(ins.bytes()[0], op.kind().opcode(), "op = {}", op);
            assert_eq!(ins.len() % 2, 0, "op = {}", op);
        }
    }

    #[test]
    fn decode_reverses_encode() {
        let mut stream = Vec::new();
        for op in samples() {
            let ins = op.encode().unwrap();
            assert_eq!(decode(ins.bytes()), Ok(op));
            stream.extend_from_slice(ins.bytes());
        }
        assert_eq!(decode_all(&stream).unwrap(), samples());
    }

    #[test]
    fn opcode_table_is_complete() {
        for &kind in &OpKind::ALL {
            assert_eq!(OpKind::from_opcode(kind.opcode()), Some(kind));
        }
        assert_eq!(OpKind::from_opcode(0x00), None);
    }

    #[test]
    fn decode_errors() {
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
        assert_eq!(decode(&[0xff, 0x00]), Err(DecodeError::UnknownOpcode(0xff)));
        assert_eq!(
            decode(&[opcode::CONST_16, 0x02]),
            Err(DecodeError::Truncated {
                kind: OpKind::LoadConst,
                needed: 4,
                available: 2,
            })
        );
    }

    #[test]
    fn failed_encode_has_no_output() {
        let op = Op::AllocArray {
            dst: 3,
            size: 2,
            type_index: 0x1_0000,
        };
        assert!(op.encode().is_err());
    }

    #[test]
    fn instruction_from_table_bytes() {
        let ins = Instruction::try_from(&b"\x27\x00\xaa\xbb"[..]).unwrap();
        assert_eq!(ins.op(), Op::Throw { src: 0 });
        assert_eq!(ins.bytes(), b"\x27\x00");
    }

    #[test]
    fn display() {
        assert_eq!(
            Op::LoadConst { dst: 2, value: 66 }.to_string(),
            "const/16 v2, #66"
        );
        assert_eq!(
            Op::BranchIfLess {
                first: 1,
                second: 2,
                offset: -3
            }
            .to_string(),
            "if-lt v1, v2, -3"
        );
    }

    #[quickcheck]
    fn qc_small_const_roundtrip(dst: u8, value: i8) -> bool {
        let dst = i64::from(dst % 16);
        let value = i64::from(value % 8);
        let op = Op::LoadSmallConst { dst, value };
        decode(op.encode().unwrap().bytes()) == Ok(op)
    }

    /// An operand biased towards the edges of the operand domains.
    #[derive(Debug, Copy, Clone)]
    struct Operand(i64);

    impl Arbitrary for Operand {
        fn arbitrary<G: Gen>(g: &mut G) -> Self {
            const EDGES: [i64; 12] = [0, 7, 8, 15, 16, 127, 128, 255, 256, 32767, 32768, 65535];
            let value = match g.gen_range(0, 3) {
                0 => i64::arbitrary(g),
                1 => g.gen_range(-70000, 70000),
                _ => {
                    let edge = *EDGES.choose(g).unwrap_or(&0);
                    let edge = if g.gen() { edge } else { -edge - 1 };
                    edge + g.gen_range(-1, 2)
                }
            };
            Self(value)
        }
    }

    /// Builds an op of `kind` from up to three operands, along with the
    /// domain each field is declared in.
    fn build(kind: OpKind, [a, b, c]: [i64; 3]) -> (Op, Vec<(i64, Width, Signedness)>) {
        use Signedness::*;
        use Width::*;
        match kind {
            OpKind::LoadSmallConst => (
                Op::LoadSmallConst { dst: a, value: b },
                vec![(a, Nibble, Unsigned), (b, Nibble, Signed)],
            ),
            OpKind::LoadConst => (
                Op::LoadConst { dst: a, value: b },
                vec![(a, Byte, Unsigned), (b, Short, Signed)],
            ),
            OpKind::AddImmediate => (
                Op::AddImmediate {
                    dst: a,
                    src: b,
                    value: c,
                },
                vec![(a, Byte, Unsigned), (b, Byte, Unsigned), (c, Byte, Signed)],
            ),
            OpKind::AllocArrayRange => (
                Op::AllocArrayRange {
                    size: a,
                    type_index: b,
                    first: c,
                },
                vec![(a, Byte, Unsigned), (b, Short, Unsigned), (c, Short, Unsigned)],
            ),
            OpKind::AllocArray => (
                Op::AllocArray {
                    dst: a,
                    size: b,
                    type_index: c,
                },
                vec![(a, Nibble, Unsigned), (b, Nibble, Unsigned), (c, Short, Unsigned)],
            ),
            OpKind::ArrayLoadChar => (
                Op::ArrayLoadChar {
                    dst: a,
                    array: b,
                    index: c,
                },
                vec![(a, Byte, Unsigned), (b, Byte, Unsigned), (c, Byte, Unsigned)],
            ),
            OpKind::ArrayStoreChar => (
                Op::ArrayStoreChar {
                    src: a,
                    array: b,
                    index: c,
                },
                vec![(a, Byte, Unsigned), (b, Byte, Unsigned), (c, Byte, Unsigned)],
            ),
            OpKind::XorInPlace => (
                Op::XorInPlace { dst: a, src: b },
                vec![(a, Nibble, Unsigned), (b, Nibble, Unsigned)],
            ),
            OpKind::BranchIfLess => (
                Op::BranchIfLess {
                    first: a,
                    second: b,
                    offset: c,
                },
                vec![(a, Nibble, Unsigned), (b, Nibble, Unsigned), (c, Short, Signed)],
            ),
            OpKind::Throw => (Op::Throw { src: a }, vec![(a, Byte, Unsigned)]),
            OpKind::ReturnObject => (Op::ReturnObject { src: a }, vec![(a, Byte, Unsigned)]),
            OpKind::MoveException => (Op::MoveException { dst: a }, vec![(a, Byte, Unsigned)]),
        }
    }

    #[quickcheck]
    fn qc_every_kind_checks_its_operands(a: Operand, b: Operand, c: Operand) -> bool {
        OpKind::ALL.iter().all(|&kind| {
            let (op, fields) = build(kind, [a.0, b.0, c.0]);
            let valid = fields
                .iter()
                .all(|&(value, width, signedness)| ensure(value, width, signedness).is_ok());
            match op.encode() {
                Ok(ins) => {
                    valid
                        && ins.len() == kind.len()
                        && ins.bytes()[0] == kind.opcode()
                        && decode(ins.bytes()) == Ok(op)
                }
                Err(_) => !valid,
            }
        })
    }

    #[test]
    fn every_kind_at_its_bounds() {
        for &kind in &OpKind::ALL {
            let (_, fields) = build(kind, [0; 3]);
            for (i, &(_, width, signedness)) in fields.iter().enumerate() {
                let (lower, upper) = bounds(width, signedness);
                for &(value, ok) in &[
                    (lower, true),
                    (upper, true),
                    (lower - 1, false),
                    (upper + 1, false),
                ] {
                    let mut operands = [0; 3];
                    operands[i] = value as i64;
                    let (op, _) = build(kind, operands);
                    assert_eq!(op.encode().is_ok(), ok, "{:?} field {} = {}", kind, i, value);
                }
            }
        }
    }
}
