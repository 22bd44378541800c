use crate::{
    cipher,
    gadget::{self, AssemblyError},
    placement::{self, Allocation, PlacementConfig, PlacementError},
    range::{ubyte, uword, OutOfRange},
};
use rand::{CryptoRng, RngCore};
use tracing::info;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableConfig {
    /// Plaintext the gadgets reconstruct.
    pub secret: Vec<u8>,
    /// Single-byte XOR key, checked against the unsigned byte domain.
    pub key: i64,
    pub placement: PlacementConfig,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            secret: b"flag".to_vec(),
            key: 0x42,
            placement: PlacementConfig::default(),
        }
    }
}

/// A finished table together with the allocations the dispatcher is wired to.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GeneratedTable {
    pub allocations: Vec<Allocation>,
    pub table: Vec<u8>,
}

impl GeneratedTable {
    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.allocations.iter().map(|a| a.offset)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid table capacity: {0}")]
    Capacity(#[source] OutOfRange),
    #[error("invalid key: {0}")]
    Cipher(#[source] OutOfRange),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// Fills `capacity` bytes with noise from `rng` and overlays the decode
/// routine for `config.secret` at randomly chosen, even, non-overlapping
/// offsets.
///
/// Capacity, operand and feasibility checks run before any randomness is
/// drawn; nothing partial is returned on error.
pub fn generate_table<R: RngCore + CryptoRng + ?Sized>(
    rng: &mut R,
    capacity: u64,
    config: &TableConfig,
) -> Result<GeneratedTable, GenerateError> {
    let capacity = uword(capacity).map_err(GenerateError::Capacity)?;
    let encrypted = cipher::encrypt(&config.secret, config.key).map_err(GenerateError::Cipher)?;
    let key = ubyte(config.key).map_err(GenerateError::Cipher)?;
    let gadgets = gadget::assemble(&encrypted, key)?;
    placement::ensure_fits(&gadgets, capacity)?;

    let mut table = vec![0; capacity as usize];
    rng.fill_bytes(&mut table);

    let allocations = placement::place(rng, gadgets, capacity, &config.placement)?;
    for a in &allocations {
        let start = a.offset as usize;
        table[start..start + a.gadget.len()].copy_from_slice(a.gadget.bytes());
    }

    info!(
        capacity,
        gadgets = allocations.len(),
        footprint = allocations.iter().map(|a| a.gadget.len()).sum::<usize>(),
        "generated table"
    );
    Ok(GeneratedTable { allocations, table })
}
