use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingSettings {
    /// Minimum gap between record starts when calls hit the remote service.
    pub service_interval: Duration,
    /// Gap used for enrichers that report `uses_remote_service() == false`.
    /// `InferenceClient` is always remote; this applies to in-process enrichers.
    pub local_interval: Duration,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            service_interval: Duration::from_secs(4),
            local_interval: Duration::from_secs(1),
        }
    }
}

impl PacingSettings {
    pub fn interval_for(&self, remote: bool) -> Duration {
        if remote {
            self.service_interval
        } else {
            self.local_interval
        }
    }
}

/// Fixed-interval limiter: successive `wait` calls return at least
/// `interval` apart. The first call returns immediately.
#[derive(Debug)]
pub struct IntervalPacer {
    interval: Duration,
    last: Option<Instant>,
}

impl IntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns how long the caller was held back.
    pub async fn wait(&mut self) -> Duration {
        let now = Instant::now();
        let held = match self.last {
            Some(last) => {
                let ready_at = last + self.interval;
                if ready_at > now {
                    tokio::time::sleep_until(ready_at).await;
                    ready_at - now
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };
        self.last = Some(Instant::now());
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_wait_is_free_and_later_ones_are_spaced() {
        let mut pacer = IntervalPacer::new(Duration::from_secs(4));
        let started = Instant::now();

        assert_eq!(pacer.wait().await, Duration::ZERO);
        assert_eq!(pacer.wait().await, Duration::from_secs(4));
        assert_eq!(pacer.wait().await, Duration::from_secs(4));
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_absorbs_the_interval() {
        let mut pacer = IntervalPacer::new(Duration::from_secs(4));
        pacer.wait().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(pacer.wait().await, Duration::ZERO);
    }
}
