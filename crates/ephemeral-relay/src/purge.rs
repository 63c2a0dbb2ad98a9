//! Recurring purge timer.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Fires once per purge period, independent of traffic. The first tick
/// comes one full period after creation. A scheduler without a period
/// never fires.
#[derive(Debug)]
pub struct PurgeScheduler {
    period: Option<Duration>,
    interval: Option<Interval>,
}

impl PurgeScheduler {
    /// Must be called from within a tokio runtime.
    pub fn new(period: Option<Duration>) -> Self {
        let period = period.filter(|p| !p.is_zero());
        let interval = period.map(|p| {
            let mut interval = interval_at(Instant::now() + p, p);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { period, interval }
    }

    /// Purge period, if purging is enabled
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Wait for the next purge tick
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let start = Instant::now();
        let mut scheduler = PurgeScheduler::new(Some(Duration::from_secs(100)));
        assert_eq!(scheduler.period(), Some(Duration::from_secs(100)));

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(100));

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_scheduler_never_fires() {
        let mut scheduler = PurgeScheduler::new(None);
        assert!(scheduler.period().is_none());
        assert!(
            timeout(Duration::from_secs(10_000), scheduler.tick())
                .await
                .is_err()
        );

        let mut zero = PurgeScheduler::new(Some(Duration::ZERO));
        assert!(zero.period().is_none());
        assert!(timeout(Duration::from_secs(1), zero.tick()).await.is_err());
    }
}
