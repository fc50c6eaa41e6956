// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::SeedableRng;
use rand::rngs::StdRng;

/// Independent RNG streams derived from one caller seed.
///
/// Each consumer owns its own generator; nothing is shared across calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RngStream {
    Sampling,
    Jitter,
    Missingness,
    Masking,
}

impl RngStream {
    fn salt(self) -> u64 {
        match self {
            Self::Sampling => 0x9e37_79b9_7f4a_7c15,
            Self::Jitter => 0xa076_1d64_78bd_642f,
            Self::Missingness => 0xe703_7ed1_a0b4_28db,
            Self::Masking => 0x8ebc_6af0_9c88_c6e3,
        }
    }
}

/// Builds a fresh generator for `stream`, fully determined by `seed`.
pub fn seeded_rng(seed: u64, stream: RngStream) -> StdRng {
    StdRng::seed_from_u64(splitmix(seed ^ stream.salt()))
}

fn splitmix(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
