use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::RandomSource;

/// Random generator with an accumulating entropy pool
///
/// Starts from a deterministic generator keyed by the device seed. Words added
/// with [`add_entropy`](EntropyPool::add_entropy) sit in the pool until
/// [`reseed`](EntropyPool::reseed) mixes them into a fresh generator state.
pub struct EntropyPool {
    device_seed: u32,
    rng: StdRng,
    pool: Vec<u32>,
}

impl EntropyPool {
    /// Creates a pool keyed by the device-unique seed
    pub fn new(device_seed: u32) -> Self {
        EntropyPool {
            device_seed,
            rng: StdRng::seed_from_u64(u64::from(device_seed)),
            pool: Vec::new(),
        }
    }

    /// Adds raw words to the pool
    pub fn add_entropy(&mut self, words: &[u32]) {
        self.pool.extend_from_slice(words);
    }

    /// Number of words waiting to be mixed in
    pub fn pending_words(&self) -> usize {
        self.pool.len()
    }

    /// Reseeds the generator from its own output mixed with the pooled words
    pub fn reseed(&mut self) {
        let mut seed = [0u8; 32];
        self.rng.fill(&mut seed);

        let words = self.pool.len();
        for (i, word) in self.pool.drain(..).enumerate() {
            let offset = (i * 4) % seed.len();
            for (byte, mixed) in seed[offset..offset + 4].iter_mut().zip(word.to_le_bytes()) {
                *byte ^= mixed;
            }
        }

        self.rng = StdRng::from_seed(seed);
        debug!(words, "random generator reseeded from entropy pool");
    }
}

impl RandomSource for EntropyPool {
    fn random_seed(&self) -> u32 {
        self.device_seed
    }

    fn random_in_range(&mut self, lo: i32, hi: i32) -> i32 {
        if lo >= hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }
}
