//! Assembly of the decode routine into independently dispatchable gadgets.
//!
//! The routine, over the fixed register roles of
//! [`VirtualRegister`](crate::register::VirtualRegister):
//!
//! ```text
//! const/16 vKey, #len ; new-array vResult, vKey, char[]
//! const/16 vKey, #key
//! const/4  vIndex, #0
//! for each encrypted byte:
//!     const/16 vScratch, #byte
//!     xor-int/2addr vScratch, vKey
//!     aput-char vScratch, vResult, vIndex
//!     add-int/lit8 vIndex, vIndex, #1
//! move-exception vKey ; return-object vResult
//! ```
//!
//! Every line above is its own gadget and every gadget ends in
//! `throw vException`, so control only ever moves between gadgets through the
//! exception handler table.

use crate::{
    dex::{types, Instruction, Op},
    range::OutOfRange,
    register::VirtualRegister as V,
};
use std::{convert::TryFrom, fmt};

/// Gadgets that do not depend on the secret length.
pub const FIXED_GADGETS: usize = 4;
/// Gadgets emitted for each byte of the secret.
pub const GADGETS_PER_BYTE: usize = 4;

/// Number of gadgets [`assemble`] produces for a secret of `len` bytes.
pub const fn gadget_count(len: usize) -> usize {
    FIXED_GADGETS + GADGETS_PER_BYTE * len
}

/// The logical step of the decode routine a gadget implements.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Step {
    AllocResult,
    InitKey,
    InitIndex,
    Load(usize),
    Decrypt(usize),
    Store(usize),
    Advance(usize),
    Finish,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocResult => write!(f, "alloc-result"),
            Self::InitKey => write!(f, "init-key"),
            Self::InitIndex => write!(f, "init-index"),
            Self::Load(i) => write!(f, "load[{}]", i),
            Self::Decrypt(i) => write!(f, "decrypt[{}]", i),
            Self::Store(i) => write!(f, "store[{}]", i),
            Self::Advance(i) => write!(f, "advance[{}]", i),
            Self::Finish => write!(f, "finish"),
        }
    }
}

/// A self-contained instruction sequence terminated by exactly one throw.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Gadget {
    step: Step,
    instructions: Vec<Instruction>,
    bytes: Vec<u8>,
}

impl Gadget {
    /// Encodes `body` and appends `throw vException`. Nothing is built if any
    /// operand is out of range.
    pub fn new(step: Step, body: &[Op]) -> Result<Self, AssemblyError> {
        let throw = Op::Throw {
            src: V::Exception.operand(),
        };
        let instructions = body
            .iter()
            .chain(Some(&throw))
            .map(|&op| op.encode())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| AssemblyError { step, source })?;
        let bytes = instructions
            .iter()
            .flat_map(|ins| ins.bytes())
            .copied()
            .collect();
        Ok(Self {
            step,
            instructions,
            bytes,
        })
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sum of the lengths of the instructions.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("could not assemble the {step} gadget: {source}")]
pub struct AssemblyError {
    pub step: Step,
    #[source]
    pub source: OutOfRange,
}

fn reg(r: V) -> i64 {
    r.operand()
}

/// Builds the decode routine for `encrypted`, a secret already XORed with
/// `key`. Fails without returning any gadget if an operand does not fit, e.g.
/// when the secret is longer than a signed 16-bit constant can express.
pub fn assemble(encrypted: &[u8], key: u8) -> Result<Vec<Gadget>, AssemblyError> {
    let len = i64::try_from(encrypted.len()).unwrap_or(i64::MAX);
    let mut gadgets = Vec::with_capacity(gadget_count(encrypted.len()));

    gadgets.push(Gadget::new(
        Step::AllocResult,
        &[
            Op::LoadConst {
                dst: reg(V::Key),
                value: len,
            },
            Op::AllocArray {
                dst: reg(V::Result),
                size: reg(V::Key),
                type_index: i64::from(types::CHAR_ARRAY),
            },
        ],
    )?);
    gadgets.push(Gadget::new(
        Step::InitKey,
        &[Op::LoadConst {
            dst: reg(V::Key),
            value: i64::from(key),
        }],
    )?);
    gadgets.push(Gadget::new(
        Step::InitIndex,
        &[Op::LoadSmallConst {
            dst: reg(V::Index),
            value: 0,
        }],
    )?);

    for (i, &byte) in encrypted.iter().enumerate() {
        gadgets.push(Gadget::new(
            Step::Load(i),
            &[Op::LoadConst {
                dst: reg(V::Scratch),
                value: i64::from(byte),
            }],
        )?);
        gadgets.push(Gadget::new(
            Step::Decrypt(i),
            &[Op::XorInPlace {
                dst: reg(V::Scratch),
                src: reg(V::Key),
            }],
        )?);
        gadgets.push(Gadget::new(
            Step::Store(i),
            &[Op::ArrayStoreChar {
                src: reg(V::Scratch),
                array: reg(V::Result),
                index: reg(V::Index),
            }],
        )?);
        gadgets.push(Gadget::new(
            Step::Advance(i),
            &[Op::AddImmediate {
                dst: reg(V::Index),
                src: reg(V::Index),
                value: 1,
            }],
        )?);
    }

    // The key is dead by now, so its slot takes the caught exception.
    gadgets.push(Gadget::new(
        Step::Finish,
        &[
            Op::MoveException { dst: reg(V::Key) },
            Op::ReturnObject { src: reg(V::Result) },
        ],
    )?);

    debug_assert_eq!(gadgets.len(), gadget_count(encrypted.len()));
    Ok(gadgets)
}
