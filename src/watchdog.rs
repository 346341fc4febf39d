//! A resettable countdown timer whose expiry forces the connection state
//! machine to regress. Deadline and timeout live in
//! `crossbeam_utils::atomic::AtomicCell`s so `restart()` and `set_timeout()`
//! can be called from any branch of the core's event loop without a lock
//! that an in-flight `wait_for_fire()` would have to hold across its sleep.

use crossbeam_utils::atomic::AtomicCell;
use std::time::Duration;
use tokio::time::Instant;

pub struct Watchdog {
    timeout: AtomicCell<Duration>,
    deadline: AtomicCell<Instant>,
}

impl Watchdog {
    pub fn new(timeout_ms: u64) -> Self {
        let timeout = Duration::from_millis(timeout_ms.max(1));
        Self {
            timeout: AtomicCell::new(timeout),
            deadline: AtomicCell::new(Instant::now() + timeout),
        }
    }

    /// Sets a new timeout and immediately re-arms from `now`. Used at the
    /// Partial→Full (1000ms) and Full→Failing (500ms) transitions.
    pub fn set_timeout(&self, timeout_ms: u64) {
        self.timeout.store(Duration::from_millis(timeout_ms.max(1)));
        self.restart();
    }

    /// Re-arms from `now` without changing the timeout. Called on every
    /// successful robot packet decode.
    pub fn restart(&self) {
        self.deadline.store(Instant::now() + self.timeout.load());
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.load().as_millis() as u64
    }

    /// Resolves once a deadline has genuinely elapsed without being pushed
    /// out by a concurrent `restart()`/`set_timeout()` in the meantime.
    /// Does not re-arm itself — the caller reacts to the fire (the
    /// Full→Failing transition) and calls `set_timeout()` in response.
    pub async fn wait_for_fire(&self) {
        loop {
            let observed = self.deadline.load();
            tokio::time::sleep_until(observed).await;
            if self.deadline.load() == observed {
                return;
            }
            // Deadline moved while we slept; wait again from the new one.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn restart_pushes_the_deadline_out() {
        let wd = Watchdog::new(500);
        tokio::time::advance(Duration::from_millis(400)).await;
        wd.restart();
        tokio::time::advance(Duration::from_millis(400)).await;
        let fired = tokio::time::timeout(Duration::from_millis(1), wd.wait_for_fire())
            .await
            .is_ok();
        assert!(!fired);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_timeout_with_no_restart() {
        let wd = Watchdog::new(500);
        tokio::time::advance(Duration::from_millis(500)).await;
        let fired = tokio::time::timeout(Duration::from_millis(1), wd.wait_for_fire())
            .await
            .is_ok();
        assert!(fired);
    }

    #[test]
    fn set_timeout_changes_reported_value() {
        let wd = Watchdog::new(1000);
        wd.set_timeout(500);
        assert_eq!(wd.timeout_ms(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_restart_during_wait_is_observed() {
        let wd = std::sync::Arc::new(Watchdog::new(200));
        let wd2 = wd.clone();

        let waiter = tokio::spawn(async move {
            let started = Instant::now();
            wd2.wait_for_fire().await;
            Instant::now().duration_since(started)
        });

        tokio::time::advance(Duration::from_millis(100)).await;
        wd.restart();
        tokio::time::advance(Duration::from_millis(200)).await;

        let elapsed = waiter.await.unwrap();
        assert!(elapsed >= Duration::from_millis(200));
    }
}
