//! Exponential backoff for calls to external routing services.
//!
//! Keeps a failing provider from being hit on every off-route fix.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    not_before: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            current: base,
            not_before: None,
        }
    }

    pub fn ready(&self) -> bool {
        self.not_before.map_or(true, |at| Instant::now() >= at)
    }

    pub fn reset(&mut self) {
        self.current = self.base;
        self.not_before = None;
    }

    /// Record a failure; returns how long to hold off.
    pub fn fail(&mut self) -> Duration {
        let delay = self.current;
        self.not_before = Some(Instant::now() + delay);
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn failure_blocks_until_delay_elapses() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(30));
        assert!(backoff.ready());

        assert_eq!(backoff.fail(), Duration::from_secs(2));
        assert!(!backoff.ready());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(backoff.ready());
    }

    #[tokio::test(start_paused = true)]
    async fn delays_double_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(5));
        let delays: Vec<_> = (0..4).map(|_| backoff.fail()).collect();
        assert_eq!(
            delays,
            [2, 4, 5, 5].map(Duration::from_secs).to_vec()
        );

        backoff.reset();
        assert!(backoff.ready());
        assert_eq!(backoff.fail(), Duration::from_secs(2));
    }
}
