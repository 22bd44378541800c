//! A small interpreter for the fixed formats in [`super::op`], standing in for
//! the external virtual machine. It models only what the gadgets rely on:
//! integer registers, char arrays, and exception objects moving from a
//! `throw` to the `move-exception` of the next handler.

use super::{decode, types, DecodeError, Op};
use crate::gadget::Gadget;
use std::{convert::TryFrom, fmt};
use tracing::trace;

pub const REGISTER_COUNT: usize = 16;
/// Upper bound on executed instructions per handler, so a backwards branch
/// cannot hang the interpreter.
pub const MAX_STEPS: usize = 4096;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Value {
    Uninit,
    Int(i32),
    Chars(Vec<u16>),
    Array(Vec<i32>),
    Object { type_index: u16 },
}

impl Default for Value {
    fn default() -> Self {
        Self::Uninit
    }
}

/// How a handler left the interpreter.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Exit {
    Throw(Value),
    Return(Value),
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("at 0x{at:x}: {source}")]
    Decode {
        at: usize,
        #[source]
        source: DecodeError,
    },
    #[error("register v{0} does not exist")]
    Register(i64),
    #[error("`{op}` expected {expected} in v{reg}, found {found:?}")]
    Type {
        op: Op,
        reg: i64,
        expected: &'static str,
        found: Value,
    },
    #[error("`{op}`: index {index} out of bounds for length {len}")]
    Bounds { op: Op, index: i32, len: usize },
    #[error("`{op}`: unsupported array type@{type_index:04x}")]
    ArrayType { op: Op, type_index: i64 },
    #[error("`{op}`: negative array size {size}")]
    NegativeSize { op: Op, size: i32 },
    #[error("`move-exception` with no exception pending")]
    NoException,
    #[error("branch to 0x{0:x} leaves the code")]
    BranchTarget(i64),
    #[error("executed {0} instructions without leaving the handler")]
    StepLimit(usize),
    #[error("every handler threw, nothing was returned")]
    NoReturn,
    #[error("returned {0:?} instead of a char array")]
    NotChars(Value),
}

#[derive(Debug, Clone)]
pub struct Vm {
    regs: [Value; REGISTER_COUNT],
    pending: Option<Value>,
    result: Option<Value>,
}

impl Vm {
    /// A frame whose `v0` holds a freshly allocated exception object, as the
    /// dispatcher prepares it before the first handler runs.
    pub fn new() -> Self {
        let mut regs: [Value; REGISTER_COUNT] = Default::default();
        regs[0] = Value::Object {
            type_index: types::EXCEPTION,
        };
        Self {
            regs,
            pending: None,
            result: None,
        }
    }

    pub fn reg(&self, n: usize) -> Option<&Value> {
        self.regs.get(n)
    }

    /// Array built by the last `filled-new-array/range`.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn slot(&mut self, n: i64) -> Result<&mut Value, VmError> {
        match usize::try_from(n) {
            Ok(i) if i < REGISTER_COUNT => Ok(&mut self.regs[i]),
            _ => Err(VmError::Register(n)),
        }
    }

    fn int(&mut self, op: Op, n: i64) -> Result<i32, VmError> {
        match self.slot(n)? {
            Value::Int(v) => Ok(*v),
            other => Err(VmError::Type {
                op,
                reg: n,
                expected: "an int",
                found: other.clone(),
            }),
        }
    }

    fn chars(&mut self, op: Op, n: i64) -> Result<&mut Vec<u16>, VmError> {
        match self.slot(n)? {
            Value::Chars(v) => Ok(v),
            other => Err(VmError::Type {
                op,
                reg: n,
                expected: "a char array",
                found: other.clone(),
            }),
        }
    }

    /// Executes one operation. Returns the exit for `throw` and
    /// `return-object`, and the branch offset in code units for a taken
    /// `if-lt`.
    fn step(&mut self, op: Op) -> Result<Step, VmError> {
        use Op::*;
        match op {
            LoadSmallConst { dst, value } | LoadConst { dst, value } => {
                *self.slot(dst)? = Value::Int(value as i32);
            }
            AddImmediate { dst, src, value } => {
                let v = self.int(op, src)?.wrapping_add(value as i32);
                *self.slot(dst)? = Value::Int(v);
            }
            AllocArrayRange {
                size,
                type_index,
                first,
            } => {
                let values = (first..first + size)
                    .map(|r| self.int(op, r))
                    .collect::<Result<Vec<_>, _>>()?;
                if type_index == i64::from(types::CHAR_ARRAY) {
                    self.result = Some(Value::Chars(values.iter().map(|&v| v as u16).collect()));
                } else {
                    self.result = Some(Value::Array(values));
                }
            }
            AllocArray {
                dst,
                size,
                type_index,
            } => {
                if type_index != i64::from(types::CHAR_ARRAY) {
                    return Err(VmError::ArrayType { op, type_index });
                }
                let size = self.int(op, size)?;
                let len = usize::try_from(size).map_err(|_| VmError::NegativeSize { op, size })?;
                *self.slot(dst)? = Value::Chars(vec![0; len]);
            }
            ArrayLoadChar { dst, array, index } => {
                let index = self.int(op, index)?;
                let arr = self.chars(op, array)?;
                let c = usize::try_from(index)
                    .ok()
                    .and_then(|i| arr.get(i).copied())
                    .ok_or(VmError::Bounds {
                        op,
                        index,
                        len: arr.len(),
                    })?;
                *self.slot(dst)? = Value::Int(i32::from(c));
            }
            ArrayStoreChar { src, array, index } => {
                let value = self.int(op, src)?;
                let index = self.int(op, index)?;
                let arr = self.chars(op, array)?;
                let len = arr.len();
                let i = usize::try_from(index)
                    .ok()
                    .filter(|&i| i < len)
                    .ok_or(VmError::Bounds { op, index, len })?;
                arr[i] = value as u16;
            }
            XorInPlace { dst, src } => {
                let v = self.int(op, dst)? ^ self.int(op, src)?;
                *self.slot(dst)? = Value::Int(v);
            }
            BranchIfLess {
                first,
                second,
                offset,
            } => {
                if self.int(op, first)? < self.int(op, second)? {
                    return Ok(Step::Branch(offset));
                }
            }
            Throw { src } => {
                let thrown = self.slot(src)?.clone();
                if let Value::Object { .. } = thrown {
                    return Ok(Step::Exit(Exit::Throw(thrown)));
                }
                return Err(VmError::Type {
                    op,
                    reg: src,
                    expected: "an object",
                    found: thrown,
                });
            }
            ReturnObject { src } => {
                return Ok(Step::Exit(Exit::Return(self.slot(src)?.clone())));
            }
            MoveException { dst } => {
                let caught = self.pending.take().ok_or(VmError::NoException)?;
                *self.slot(dst)? = caught;
            }
        }
        Ok(Step::Next)
    }

    /// Runs the handler starting at `entry` in `code` until it throws or
    /// returns. A thrown value becomes the pending exception for the next
    /// handler.
    pub fn run_at(&mut self, code: &[u8], entry: usize) -> Result<Exit, VmError> {
        let mut pc = entry;
        for _ in 0..MAX_STEPS {
            let op = decode(code.get(pc..).unwrap_or(&[]))
                .map_err(|source| VmError::Decode { at: pc, source })?;
            trace!("0x{:04x}: {}", pc, op);
            match self.step(op)? {
                Step::Next => pc += op.kind().len(),
                Step::Branch(units) => {
                    let target = pc as i64 + units * 2;
                    pc = usize::try_from(target)
                        .ok()
                        .filter(|&t| t < code.len())
                        .ok_or(VmError::BranchTarget(target))?;
                }
                Step::Exit(exit) => {
                    if let Exit::Throw(thrown) = &exit {
                        self.pending = Some(thrown.clone());
                    }
                    return Ok(exit);
                }
            }
        }
        Err(VmError::StepLimit(MAX_STEPS))
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum Step {
    Next,
    Branch(i64),
    Exit(Exit),
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throw(v) => write!(f, "throw {:?}", v),
            Self::Return(v) => write!(f, "return {:?}", v),
        }
    }
}

fn into_bytes(value: Value) -> Result<Vec<u8>, VmError> {
    match value {
        Value::Chars(chars) => Ok(chars.into_iter().map(|c| c as u8).collect()),
        other => Err(VmError::NotChars(other)),
    }
}

/// Emulates the dispatcher: runs the handler at each offset in turn, passing
/// the thrown exception along, and returns the bytes of the char array the
/// first returning handler yields.
pub fn run_dispatch(
    table: &[u8],
    offsets: impl IntoIterator<Item = usize>,
) -> Result<Vec<u8>, VmError> {
    let mut vm = Vm::new();
    for offset in offsets {
        let exit = vm.run_at(table, offset)?;
        trace!("handler at 0x{:04x}: {}", offset, exit);
        if let Exit::Return(value) = exit {
            return into_bytes(value);
        }
    }
    Err(VmError::NoReturn)
}

/// Runs assembled gadgets in order, each as its own handler.
pub fn run_gadgets(gadgets: &[Gadget]) -> Result<Vec<u8>, VmError> {
    let mut vm = Vm::new();
    for gadget in gadgets {
        if let Exit::Return(value) = vm.run_at(gadget.bytes(), 0)? {
            return into_bytes(value);
        }
    }
    Err(VmError::NoReturn)
}
