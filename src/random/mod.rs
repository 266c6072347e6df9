//! Random source and entropy seeding
//!
//! Everything that draws randomness (transmission jitter, session nonces in the
//! link handler) goes through a [`RandomSource`]. The [`EntropyPool`] is the
//! process-wide implementation; [`seed_entropy`] folds auxiliary sensor readings
//! into it once at startup so that devices sharing a cold-boot state still
//! diverge.

mod pool;
mod seeder;

pub use self::pool::EntropyPool;
pub use self::seeder::{seed_entropy, AuxSensor, CalibratedSensor, TemperatureAdc, ENTROPY_SAMPLES};

/// Source of randomness consumed by the scheduler and the link handler
pub trait RandomSource: Send {
    /// Device-unique seed
    fn random_seed(&self) -> u32;

    /// Uniform integer in `lo..=hi`
    fn random_in_range(&mut self, lo: i32, hi: i32) -> i32;
}
