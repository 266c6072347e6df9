use tracing::{debug, info, warn};

use crate::core::Result;
use super::EntropyPool;

/// Number of sensor readings folded into the pool at startup
pub const ENTROPY_SAMPLES: usize = 4;

/// Raw on-die temperature converter
pub trait TemperatureAdc {
    /// Reads the factory calibration offset
    fn trim_offset(&mut self) -> Result<u16>;

    /// Converts one reading using the calibration offset, in degrees Celsius
    fn read_celsius(&mut self, offset: u16) -> Result<f32>;
}

/// Auxiliary analog sensor usable as an entropy source
pub trait AuxSensor {
    fn sample(&mut self) -> Result<f32>;
}

/// Temperature sensor that reads its calibration offset on first use
pub struct CalibratedSensor<A> {
    adc: A,
    offset: Option<u16>,
}

impl<A: TemperatureAdc> CalibratedSensor<A> {
    pub fn new(adc: A) -> Self {
        CalibratedSensor { adc, offset: None }
    }

    /// Calibration offset, once trained
    pub fn offset(&self) -> Option<u16> {
        self.offset
    }
}

impl<A: TemperatureAdc> AuxSensor for CalibratedSensor<A> {
    fn sample(&mut self) -> Result<f32> {
        let offset = match self.offset {
            Some(offset) => offset,
            None => {
                let offset = self.adc.trim_offset()?;
                debug!(offset, "temperature sensor calibrated");
                self.offset = Some(offset);
                offset
            }
        };
        let celsius = self.adc.read_celsius(offset)?;
        debug!(offset, celsius, "temperature sample");
        Ok(celsius)
    }
}

/// Folds auxiliary sensor readings into the pool and reseeds it
///
/// Without a sensor this is a no-op. A failed reading abandons seeding with a
/// warning; the generator keeps its device-seeded state.
pub fn seed_entropy(sensor: Option<&mut dyn AuxSensor>, pool: &mut EntropyPool) {
    let Some(sensor) = sensor else {
        debug!("no auxiliary sensor, entropy pool left at device seed");
        return;
    };

    let mut words = [0u32; ENTROPY_SAMPLES];
    for word in words.iter_mut() {
        match sensor.sample() {
            Ok(reading) => *word = reading.to_bits(),
            Err(e) => {
                warn!(error = %e, "entropy seeding skipped");
                return;
            }
        }
    }

    pool.add_entropy(&words);
    pool.reseed();
    info!(samples = ENTROPY_SAMPLES, "entropy pool seeded from auxiliary sensor");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::random::RandomSource;

    struct FakeAdc {
        trims: u32,
        reads: u32,
        fail_trim: bool,
        fail_after: Option<u32>,
    }

    impl FakeAdc {
        fn new() -> Self {
            FakeAdc { trims: 0, reads: 0, fail_trim: false, fail_after: None }
        }
    }

    impl TemperatureAdc for &mut FakeAdc {
        fn trim_offset(&mut self) -> Result<u16> {
            self.trims += 1;
            if self.fail_trim {
                return Err(Error::sensor("efuse read failed"));
            }
            Ok(2042)
        }

        fn read_celsius(&mut self, offset: u16) -> Result<f32> {
            if self.fail_after == Some(self.reads) {
                return Err(Error::sensor("conversion timeout"));
            }
            self.reads += 1;
            Ok(offset as f32 / 100.0 + self.reads as f32 * 0.25)
        }
    }

    #[test]
    fn test_calibration_happens_once() {
        let mut adc = FakeAdc::new();
        let mut pool = EntropyPool::new(22);
        {
            let mut sensor = CalibratedSensor::new(&mut adc);
            seed_entropy(Some(&mut sensor), &mut pool);
            assert_eq!(sensor.offset(), Some(2042));
        }
        assert_eq!(adc.trims, 1);
        assert_eq!(adc.reads, ENTROPY_SAMPLES as u32);
        assert_eq!(pool.pending_words(), 0);
    }

    #[test]
    fn test_seeding_changes_draws() {
        let mut adc = FakeAdc::new();
        let mut seeded = EntropyPool::new(22);
        let mut plain = EntropyPool::new(22);
        seed_entropy(Some(&mut CalibratedSensor::new(&mut adc)), &mut seeded);

        let a: Vec<i32> = (0..8).map(|_| seeded.random_in_range(0, 1 << 20)).collect();
        let b: Vec<i32> = (0..8).map(|_| plain.random_in_range(0, 1 << 20)).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_no_sensor_is_noop() {
        let mut pool = EntropyPool::new(22);
        let mut reference = EntropyPool::new(22);
        seed_entropy(None, &mut pool);
        assert_eq!(pool.random_in_range(0, 1000), reference.random_in_range(0, 1000));
    }

    #[test]
    fn test_calibration_failure_skips_seeding() {
        let mut adc = FakeAdc::new();
        adc.fail_trim = true;
        let mut pool = EntropyPool::new(22);
        let mut reference = EntropyPool::new(22);
        seed_entropy(Some(&mut CalibratedSensor::new(&mut adc)), &mut pool);

        assert_eq!(adc.reads, 0);
        assert_eq!(pool.random_in_range(0, 1000), reference.random_in_range(0, 1000));
    }

    #[test]
    fn test_partial_read_failure_adds_nothing() {
        let mut adc = FakeAdc::new();
        adc.fail_after = Some(2);
        let mut pool = EntropyPool::new(22);
        seed_entropy(Some(&mut CalibratedSensor::new(&mut adc)), &mut pool);
        assert_eq!(pool.pending_words(), 0);
        assert_eq!(adc.reads, 2);
    }
}
