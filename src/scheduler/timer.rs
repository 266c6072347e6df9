use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Expiry callback, run from the timer task
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Re-armable timer backed by a tokio task
///
/// Once started the timer reloads itself with the same value after each
/// expiry, so the callback never has to reach back into the owner to re-arm.
/// Changing the value takes effect on the next [`start`](Timer::start).
pub struct Timer {
    value: Duration,
    callback: TimerCallback,
    task: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new(callback: TimerCallback) -> Self {
        Timer {
            value: Duration::ZERO,
            callback,
            task: None,
        }
    }

    pub fn set_value(&mut self, value: Duration) {
        self.value = value;
    }

    pub fn value(&self) -> Duration {
        self.value
    }

    /// Arms the timer, restarting it if already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        self.stop();
        if self.value.is_zero() {
            warn!("refusing to start timer with zero value");
            return;
        }

        let value = self.value;
        let callback = Arc::clone(&self.callback);
        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(value).await;
                trace!(?value, "timer expired");
                callback();
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
