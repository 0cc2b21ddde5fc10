//! Common Random Numbers
//!
//! Every candidate in a round sees the same random stream; successive rounds
//! see different streams. The stream for a round depends only on the base seed
//! and the round index, so a resumed session replays exactly the seeds an
//! uninterrupted one would have used.

use crate::RandomSource;
use rand::SeedableRng;

/// Shared random source, rewound before each candidate's draw
#[derive(Debug, Clone)]
pub struct CommonRandom {
    base_seed: u64,
    rng: RandomSource,
}

impl CommonRandom {
    /// Create a source from a base seed
    pub fn new(base_seed: u64) -> Self {
        Self {
            base_seed,
            rng: RandomSource::seed_from_u64(base_seed),
        }
    }

    /// Base seed this source was built from
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Seed used for `round`
    pub fn round_seed(&self, round: u64) -> u64 {
        // splitmix64 finaliser over (base, round)
        let mut z = self
            .base_seed
            .wrapping_add(round.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Reset the stream to the start of `round` and hand it out
    pub fn rewind(&mut self, round: u64) -> &mut RandomSource {
        self.rng = RandomSource::seed_from_u64(self.round_seed(round));
        &mut self.rng
    }
}
