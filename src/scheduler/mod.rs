//! Duty-cycle transmit scheduler
//!
//! Owns the single re-armable uplink timer and the pending-transmission flag.
//! The timer task (the "interrupt" side) only ever sets the flag and wakes the
//! dispatcher; the dispatcher reads and clears it once per cycle through
//! [`TxScheduler::take_pending`].

mod timer;

pub use self::timer::{Timer, TimerCallback};

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::core::{AppConfig, TxPeriod};
use crate::event::{Event, EventSender};
use crate::random::RandomSource;

/// Pending-transmission flag shared with the timer context
///
/// Both the set and the read-and-clear run under the same lock, so a timer
/// expiry racing a drain is seen exactly once.
#[derive(Debug, Default)]
pub struct PendingTx {
    flag: Mutex<bool>,
}

impl PendingTx {
    fn lock(&self) -> MutexGuard<'_, bool> {
        // The guarded value is a plain bool, so a poisoned lock is still consistent
        self.flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self) {
        *self.lock() = true;
    }

    /// Reads and clears the flag in one critical section
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.lock(), false)
    }

    pub fn is_set(&self) -> bool {
        *self.lock()
    }
}

/// Schedules duty-cycle uplinks at a jittered period
pub struct TxScheduler {
    base_ms: u32,
    jitter_ms: u32,
    period: TxPeriod,
    pending: Arc<PendingTx>,
    timer: Timer,
}

impl TxScheduler {
    /// Creates an unarmed scheduler; expiries are announced on `events`
    pub fn new(config: &AppConfig, events: EventSender) -> Self {
        let pending = Arc::new(PendingTx::default());
        let on_expiry = {
            let pending = Arc::clone(&pending);
            Arc::new(move || {
                pending.set();
                events.post(Event::TxTimer);
            })
        };

        TxScheduler {
            base_ms: config.base_period_ms(),
            jitter_ms: config.jitter_ms(),
            period: TxPeriod::saturating_from_millis(config.base_period_ms()),
            pending,
            timer: Timer::new(on_expiry),
        }
    }

    /// Draws `base ± jitter` from the random source
    pub fn randomized_period(&self, rng: &mut dyn RandomSource) -> TxPeriod {
        let jitter = i32::try_from(self.jitter_ms).unwrap_or(i32::MAX);
        let offset = rng.random_in_range(-jitter, jitter);
        let millis = (i64::from(self.base_ms) + i64::from(offset)).clamp(1, i64::from(u32::MAX));
        TxPeriod::saturating_from_millis(millis as u32)
    }

    /// Arms the timer with a fresh randomized period and requests a first uplink
    pub fn start(&mut self, rng: &mut dyn RandomSource) {
        self.period = self.randomized_period(rng);
        info!(period_ms = self.period.as_millis(), "starting uplink scheduler");
        self.timer.set_value(self.period.as_duration());
        self.on_timer_fired();
    }

    /// Expiry handling: flag an uplink and re-arm for another period
    pub fn on_timer_fired(&mut self) {
        debug!(period_ms = self.period.as_millis(), "uplink timer fired");
        self.timer.stop();
        self.pending.set();
        self.timer.set_value(self.period.as_duration());
        self.timer.start();
    }

    /// Applies a remotely requested period; zero restores a randomized default
    pub fn set_period(&mut self, requested_ms: u32, rng: &mut dyn RandomSource) -> TxPeriod {
        self.period = match TxPeriod::from_millis(requested_ms) {
            Some(period) => period,
            None => self.randomized_period(rng),
        };

        self.timer.stop();
        self.timer.set_value(self.period.as_duration());
        self.timer.start();

        info!(requested_ms, period_ms = self.period.as_millis(), "uplink period changed");
        self.period
    }

    /// Reads and clears the pending flag
    pub fn take_pending(&self) -> bool {
        self.pending.take()
    }

    pub fn period(&self) -> TxPeriod {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_running()
    }

    /// Handle to the flag, as seen by the timer context
    pub fn pending(&self) -> Arc<PendingTx> {
        Arc::clone(&self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_queue;
    use crate::random::EntropyPool;
    use std::thread;
    use std::time::Duration;

    const LOW: u32 = 35_000;
    const HIGH: u32 = 45_000;

    fn scheduler() -> (TxScheduler, crate::event::EventQueue) {
        let (tx, queue) = event_queue();
        (TxScheduler::new(&AppConfig::default(), tx), queue)
    }

    #[tokio::test]
    async fn test_start_period_and_kick() {
        let (mut scheduler, _queue) = scheduler();
        let mut rng = EntropyPool::new(22);
        scheduler.start(&mut rng);

        let period = scheduler.period().as_millis();
        assert!((LOW..=HIGH).contains(&period), "period {} out of range", period);
        assert!(scheduler.is_armed());
        // The first uplink is requested without waiting a period
        assert!(scheduler.take_pending());
        assert!(!scheduler.take_pending());
    }

    #[tokio::test]
    async fn test_set_period_zero_and_explicit() {
        let (mut scheduler, _queue) = scheduler();
        let mut rng = EntropyPool::new(22);
        scheduler.start(&mut rng);

        for _ in 0..50 {
            let period = scheduler.set_period(0, &mut rng).as_millis();
            assert!((LOW..=HIGH).contains(&period), "period {} out of range", period);
        }

        assert_eq!(scheduler.set_period(60_000, &mut rng).as_millis(), 60_000);
        assert_eq!(scheduler.period().as_duration(), Duration::from_secs(60));
        assert!(scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sets_flag_and_wakes_dispatcher() {
        let (mut scheduler, mut queue) = scheduler();
        let mut rng = EntropyPool::new(22);
        scheduler.start(&mut rng);
        assert!(scheduler.take_pending());

        let period = scheduler.period().as_duration();
        tokio::time::sleep(period + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert!(scheduler.take_pending());
        assert_eq!(queue.try_next(), Some(Event::TxTimer));
        assert_eq!(queue.try_next(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_change_restarts_timer() {
        let (mut scheduler, mut queue) = scheduler();
        let mut rng = EntropyPool::new(22);
        scheduler.start(&mut rng);
        scheduler.take_pending();

        scheduler.set_period(60_000, &mut rng);

        // The old deadline (at most 45 s) must not fire any more
        tokio::time::sleep(Duration::from_millis(50_000)).await;
        tokio::task::yield_now().await;
        assert!(!scheduler.take_pending());
        assert_eq!(queue.try_next(), None);

        tokio::time::sleep(Duration::from_millis(10_001)).await;
        tokio::task::yield_now().await;
        assert!(scheduler.take_pending());
        assert_eq!(queue.try_next(), Some(Event::TxTimer));
    }

    #[test]
    fn test_pending_lockstep_exact_count() {
        const FIRES: usize = 2_000;
        let pending = Arc::new(PendingTx::default());

        let producer = {
            let pending = Arc::clone(&pending);
            thread::spawn(move || {
                for _ in 0..FIRES {
                    pending.set();
                    while pending.is_set() {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut attempts = 0;
        while attempts < FIRES {
            if pending.take() {
                attempts += 1;
            } else {
                thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert_eq!(attempts, FIRES);
        assert!(!pending.take());
    }

    #[test]
    fn test_pending_free_running_ends_clear() {
        const FIRES: usize = 10_000;
        let pending = Arc::new(PendingTx::default());

        let producer = {
            let pending = Arc::clone(&pending);
            thread::spawn(move || {
                for _ in 0..FIRES {
                    pending.set();
                }
            })
        };

        let mut observed = 0;
        for _ in 0..FIRES {
            if pending.take() {
                observed += 1;
            }
        }
        producer.join().unwrap();

        // The last set is still visible unless a drain already consumed it
        if pending.take() {
            observed += 1;
        }
        assert!(observed >= 1);
        assert!(observed <= FIRES);
        assert!(!pending.is_set());
    }
}
