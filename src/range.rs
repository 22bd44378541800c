use std::fmt;

/// Operand widths understood by the encoders.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Width {
    Nibble = 4,
    Byte = 8,
    Short = 16,
    Word = 32,
}

impl Width {
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Signedness {
    Signed,
    Unsigned,
}

impl fmt::Display for Signedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed => write!(f, "signed"),
            Self::Unsigned => write!(f, "unsigned"),
        }
    }
}

/// An operand did not fit the bit-width domain declared for it.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error(
    "value {value} is outside the {signedness} {}-bit range [{}, {}]",
    .width.bits(),
    bounds(*.width, *.signedness).0,
    bounds(*.width, *.signedness).1
)]
pub struct OutOfRange {
    pub value: i128,
    pub width: Width,
    pub signedness: Signedness,
}

/// Returns (lower, upper)
pub fn unsigned_range(width: Width) -> (i128, i128) {
    (0, (1_i128 << width.bits()) - 1)
}

/// Returns (lower, upper)
pub fn signed_range(width: Width) -> (i128, i128) {
    let half = 1_i128 << (width.bits() - 1);
    (-half, half - 1)
}

pub fn bounds(width: Width, signedness: Signedness) -> (i128, i128) {
    match signedness {
        Signedness::Signed => signed_range(width),
        Signedness::Unsigned => unsigned_range(width),
    }
}

/// Succeeds silently when `value` lies inside the domain of `width` and
/// `signedness`.
pub fn ensure(
    value: impl Into<i128>,
    width: Width,
    signedness: Signedness,
) -> Result<(), OutOfRange> {
    let value = value.into();
    let (lower, upper) = bounds(width, signedness);
    if lower <= value && value <= upper {
        Ok(())
    } else {
        Err(OutOfRange {
            value,
            width,
            signedness,
        })
    }
}

// The narrowing helpers below cast only after `ensure` has accepted the value.

pub fn unibble(value: i64) -> Result<u8, OutOfRange> {
    ensure(value, Width::Nibble, Signedness::Unsigned)?;
    Ok(value as u8)
}

pub fn snibble(value: i64) -> Result<i8, OutOfRange> {
    ensure(value, Width::Nibble, Signedness::Signed)?;
    Ok(value as i8)
}

pub fn ubyte(value: i64) -> Result<u8, OutOfRange> {
    ensure(value, Width::Byte, Signedness::Unsigned)?;
    Ok(value as u8)
}

pub fn sbyte(value: i64) -> Result<i8, OutOfRange> {
    ensure(value, Width::Byte, Signedness::Signed)?;
    Ok(value as i8)
}

pub fn ushort(value: i64) -> Result<u16, OutOfRange> {
    ensure(value, Width::Short, Signedness::Unsigned)?;
    Ok(value as u16)
}

pub fn sshort(value: i64) -> Result<i16, OutOfRange> {
    ensure(value, Width::Short, Signedness::Signed)?;
    Ok(value as i16)
}

pub fn uword(value: u64) -> Result<u32, OutOfRange> {
    ensure(value, Width::Word, Signedness::Unsigned)?;
    Ok(value as u32)
}
