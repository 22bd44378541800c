//! Random, even-aligned, non-overlapping placement of gadgets in a table.

use crate::{gadget::Gadget, render::AsEscape};
use rand::RngCore;
use std::{num::NonZeroU64, ops::Range};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PlacementConfig {
    /// Candidate offsets drawn per gadget before giving up. `None` samples
    /// until a free offset turns up, which does not terminate when the table
    /// has no room left.
    pub max_attempts: Option<NonZeroU64>,
}

/// A gadget and the table offset it was placed at.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Allocation {
    pub offset: u32,
    pub gadget: Gadget,
}

impl Allocation {
    pub fn range(&self) -> Range<u64> {
        let start = u64::from(self.offset);
        start..start + self.gadget.len() as u64
    }

    /// Half-open overlap test against `[offset, offset + len)`.
    pub fn overlaps(&self, offset: u64, len: u64) -> bool {
        let Range { start, end } = self.range();
        (start <= offset && offset < end) || (offset <= start && start < offset + len)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PlacementError {
    #[error("a {len}-byte gadget cannot fit in a {capacity}-byte table")]
    GadgetTooLarge { len: usize, capacity: u32 },
    #[error("{footprint} bytes of gadgets cannot fit in a {capacity}-byte table")]
    Footprint { footprint: u64, capacity: u32 },
    #[error("no free offset for gadget {index} after {attempts} attempts")]
    Exhausted { index: usize, attempts: u64 },
}

/// Number of random bytes drawn per candidate offset:
/// `ceil(log2(capacity)) / 8`, truncated.
pub fn offset_width(capacity: u32) -> usize {
    let bits = match capacity {
        0 | 1 => 0,
        c => 32 - (c - 1).leading_zeros(),
    };
    (bits / 8) as usize
}

fn draw_offset<R: RngCore + ?Sized>(rng: &mut R, width: usize) -> u64 {
    let mut buf = [0_u8; 8];
    rng.fill_bytes(&mut buf[..width]);
    u64::from_le_bytes(buf)
}

/// Rejects gadget sets that no placement could satisfy: a gadget longer than
/// the table, or more gadget bytes in total than the table holds. Draws no
/// randomness.
pub fn ensure_fits(gadgets: &[Gadget], capacity: u32) -> Result<(), PlacementError> {
    if let Some(g) = gadgets.iter().find(|g| g.len() as u64 > u64::from(capacity)) {
        return Err(PlacementError::GadgetTooLarge {
            len: g.len(),
            capacity,
        });
    }
    let footprint: u64 = gadgets.iter().map(|g| g.len() as u64).sum();
    if footprint > u64::from(capacity) {
        return Err(PlacementError::Footprint {
            footprint,
            capacity,
        });
    }
    Ok(())
}

/// Places every gadget, in input order, at a uniformly drawn offset that is
/// even, keeps the gadget inside `capacity`, and overlaps no earlier
/// allocation.
///
/// Inputs [`ensure_fits`] rejects fail before any randomness is drawn.
/// Otherwise sampling is unbounded unless `config.max_attempts` is set.
pub fn place<R: RngCore + ?Sized>(
    rng: &mut R,
    gadgets: Vec<Gadget>,
    capacity: u32,
    config: &PlacementConfig,
) -> Result<Vec<Allocation>, PlacementError> {
    ensure_fits(&gadgets, capacity)?;

    let width = offset_width(capacity);
    let mut allocations: Vec<Allocation> = Vec::with_capacity(gadgets.len());

    for (index, gadget) in gadgets.into_iter().enumerate() {
        let len = gadget.len() as u64;
        let mut attempts = 0_u64;
        let offset = loop {
            if let Some(max) = config.max_attempts {
                if attempts >= max.get() {
                    return Err(PlacementError::Exhausted { index, attempts });
                }
            }
            attempts += 1;

            let candidate = draw_offset(rng, width);
            if candidate % 2 != 0 {
                continue;
            }
            if candidate + len > u64::from(capacity) {
                continue;
            }
            if allocations.iter().any(|a| a.overlaps(candidate, len)) {
                trace!(candidate, "offset collides with an earlier gadget");
                continue;
            }
            break candidate as u32;
        };

        debug!(
            "gadget {} ({}) at 0x{:x} after {} attempts: {}",
            index,
            gadget.step(),
            offset,
            attempts,
            AsEscape(gadget.bytes())
        );
        allocations.push(Allocation { offset, gadget });
    }

    Ok(allocations)
}
