//! Monotonic time source plus one-shot and periodic schedulers, millisecond
//! resolution, built directly on `tokio::time`.

use std::time::Duration;
use tokio::time::Instant;

/// A periodic task armed "at the tail" of each tick rather than from a fixed
/// origin: the next deadline is computed from `Instant::now()` once the
/// caller's work for this tick has finished, so a slow tick stretches the
/// next interval instead of the loop trying to catch up by bunching ticks.
///
/// Each outgoing packet re-schedules its own next send without needing a
/// re-entrant callback: callers simply `tick().await` in a loop.
pub struct PeriodicTimer {
    period: Duration,
    deadline: Instant,
}

impl PeriodicTimer {
    pub fn new(period_ms: u64) -> Self {
        let period = Duration::from_millis(period_ms.max(1));
        Self {
            period,
            deadline: Instant::now() + period,
        }
    }

    /// Hz-based constructor; adapters expose cadences in Hz, not ms.
    pub fn from_hz(hz: u32) -> Self {
        Self::new((1000 / hz.max(1) as u64).max(1))
    }

    pub fn set_period_ms(&mut self, period_ms: u64) {
        self.period = Duration::from_millis(period_ms.max(1));
    }

    pub fn period_ms(&self) -> u64 {
        self.period.as_millis() as u64
    }

    /// Waits for the current deadline, then re-arms from `now`.
    pub async fn tick(&mut self) {
        tokio::time::sleep_until(self.deadline).await;
        self.deadline = Instant::now() + self.period;
    }
}

/// Schedules a future-producing closure to run once, `delay_ms` from now, on
/// its own task. Used by the initialization ceremony (`reset()` at T+200ms,
/// `initialize()` at T+800ms) and by the emergency-stop auto-clear, which
/// re-arms a fresh one every time `set_emergency_stop(true)` is called.
pub fn spawn_after<F>(delay_ms: u64, fut: F) -> tokio::task::JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        fut.await;
    })
}
