use quickcheck::Arbitrary;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// A `ChaCha20Rng` seed.
#[derive(Debug, Clone)]
pub(crate) struct Seed(pub [u8; 32]);

impl Arbitrary for Seed {
    fn arbitrary<G: quickcheck::Gen>(g: &mut G) -> Self {
        let mut seed = [0; 32];
        for x in &mut seed {
            *x = u8::arbitrary(g)
        }
        Self(seed)
    }
}

/// Wraps a seeded `ChaCha20Rng` and counts the bytes handed out.
pub(crate) struct CountingRng {
    inner: ChaCha20Rng,
    pub drawn: usize,
}

impl CountingRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            inner: ChaCha20Rng::seed_from_u64(seed),
            drawn: 0,
        }
    }
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        self.drawn += 4;
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.drawn += 8;
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.drawn += dest.len();
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.drawn += dest.len();
        self.inner.try_fill_bytes(dest)
    }
}

impl CryptoRng for CountingRng {}
