use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Explicitly seeded generator owned by a single retry computation.
///
/// The permutation only depends on the ChaCha8 keystream, which is fixed by
/// the seed, so every node derives the same order for the same seed.
pub(crate) struct RetryRng(ChaCha8Rng);

impl RetryRng {
    pub(crate) fn seeded(seed: i64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed as u64))
    }

    /// Fisher–Yates shuffle.
    pub(crate) fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i as u64 + 1) as usize;
            items.swap(i, j);
        }
    }

    /// Uniform value in `0..bound`; `bound` must be non-zero.
    fn below(&mut self, bound: u64) -> u64 {
        // Values under 2^64 mod bound would bias the low residues.
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let value = self.0.next_u64();
            if value >= threshold {
                return value % bound;
            }
        }
    }
}
