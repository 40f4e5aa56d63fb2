use std::future::Future;
use std::time::Duration;

use harvest_logging::{engine_debug, engine_warn};

/// Delay schedule between attempts. `attempt` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * factor^(attempt - 1)`, capped at `max`.
    Exponential {
        base: Duration,
        factor: u32,
        max: Duration,
    },
}

impl Backoff {
    /// Never decreases as `attempt` grows.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, factor, max } => {
                let exponent = attempt.saturating_sub(1);
                let multiplier = factor.max(1).checked_pow(exponent).unwrap_or(u32::MAX);
                base.checked_mul(multiplier).unwrap_or(max).min(max)
            }
        }
    }
}

/// How one attempt of an external call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// The service asked us to slow down, optionally saying for how long.
    RateLimited {
        advised: Option<Duration>,
        message: String,
    },
    /// The request never got a response.
    Transport(String),
    /// Any other non-success answer; retrying will not help.
    Terminal { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last:?}")]
    Exhausted { attempts: u32, last: CallFailure },
    #[error("terminal failure: {0:?}")]
    Terminal(CallFailure),
}

/// Retry policy shared by every external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Used for rate-limit responses that carry no advisory delay.
    pub rate_limit_backoff: Backoff,
    /// Pause before retrying after a transport error.
    pub transport_backoff: Backoff,
    /// Upper bound on a service-advised delay.
    pub max_advised_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_backoff: Backoff::Exponential {
                base: Duration::from_secs(5),
                factor: 2,
                max: Duration::from_secs(60),
            },
            transport_backoff: Backoff::Fixed(Duration::from_secs(2)),
            max_advised_delay: Duration::from_secs(90),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt`, or `None` if the failure is terminal.
    pub fn pause_after(&self, attempt: u32, failure: &CallFailure) -> Option<Duration> {
        match failure {
            CallFailure::RateLimited { advised, .. } => Some(match advised {
                Some(advised) => (*advised).min(self.max_advised_delay),
                None => self.rate_limit_backoff.delay(attempt),
            }),
            CallFailure::Transport(_) => Some(self.transport_backoff.delay(attempt)),
            CallFailure::Terminal { .. } => None,
        }
    }

    /// Runs `call` until it succeeds, fails terminally, or attempts run out.
    /// `call` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CallFailure>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let failure = match call(attempt).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            let Some(pause) = self.pause_after(attempt, &failure) else {
                engine_debug!("{} attempt {} failed terminally: {:?}", label, attempt, failure);
                return Err(RetryError::Terminal(failure));
            };
            if attempt >= max_attempts {
                engine_warn!("{} exhausted {} attempts: {:?}", label, attempt, failure);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: failure,
                });
            }

            engine_warn!(
                "{} attempt {}/{} failed ({:?}); retrying in {:?}",
                label,
                attempt,
                max_attempts,
                failure,
                pause
            );
            tokio::time::sleep(pause).await;
            attempt += 1;
        }
    }
}
