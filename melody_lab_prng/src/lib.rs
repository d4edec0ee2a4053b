// Portable, seedable pseudo-random source for melody generation.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding and
// exposes it through the `rand` traits (`RngCore`, `SeedableRng`). Every
// operation in `melody_lab_music` takes its randomness as an explicit
// `&mut impl Rng` argument, so any `rand` generator works; `MelodyRng` is the
// one the binary and the tests use because its output stream is fixed by this
// file alone and never changes with a `rand` release.
//
// **Critical constraint: determinism.** Given the same seed, `MelodyRng` must
// yield the same sequence on every platform and optimization level. No
// floating point in the core generator.

use rand::rand_core::impls;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Xoshiro256++ generator with a stable output stream.
///
/// Serializable so a caller can snapshot the generator alongside a saved graph
/// and resume the exact same sequence later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodyRng {
    s: [u64; 4],
}

impl MelodyRng {
    /// Create a generator from a `u64` seed, expanded with SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    fn step(&mut self) -> u64 {
        let result = self.s[0]
            .wrapping_add(self.s[3])
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }
}

impl RngCore for MelodyRng {
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.step()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst);
    }
}

impl SeedableRng for MelodyRng {
    type Seed = [u8; 32];

    /// Build directly from 256 bits of state. An all-zero state would make
    /// xoshiro emit zeros forever, so it is replaced by the seed-0 state.
    fn from_seed(seed: Self::Seed) -> Self {
        let mut s = [0u64; 4];
        for (word, chunk) in s.iter_mut().zip(seed.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        if s == [0; 4] {
            return Self::new(0);
        }
        Self { s }
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

/// SplitMix64, used only to expand a `u64` seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
