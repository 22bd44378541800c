//! Text forms of a generated table for a C host.

use crate::{placement::Allocation, table::GeneratedTable};
use std::fmt;

/// Prints bytes as `\xNN` escapes.
pub struct AsEscape<'a>(pub &'a [u8]);

impl fmt::Debug for AsEscape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for AsEscape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "\\x{:02x}", b)?;
        }
        Ok(())
    }
}

/// Handler offsets as a brace initializer of `JUMP_OFFSET(..)` entries, one per
/// line with macro continuations.
pub struct JumpTable<'a>(pub &'a [Allocation]);

impl fmt::Display for JumpTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{\\")?;
        for a in self.0 {
            writeln!(f, "\tJUMP_OFFSET(0x{:x}),\\", a.offset)?;
        }
        write!(f, "}}")
    }
}

/// Table bytes as a brace initializer of char literals.
pub struct ByteTable<'a>(pub &'a [u8]);

impl fmt::Display for ByteTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, b) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ",")?;
            }
            write!(f, "'\\x{:02x}'", b)?;
        }
        write!(f, "}}")
    }
}

/// `JUMP_TABLE` and `TABLE` definitions, ready to be included.
pub struct Header<'a>(pub &'a GeneratedTable);

impl fmt::Display for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#define JUMP_TABLE {}", JumpTable(&self.0.allocations))?;
        writeln!(f, "#define TABLE {}", ByteTable(&self.0.table))
    }
}
