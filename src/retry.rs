//! One retry policy for every networked operation.
//!
//! A policy is `(max_attempts, backoff schedule, retryable predicate)`. Page
//! loads use a clamped exponential schedule, downloads a constant one.

use backoff::backoff::{Backoff, Constant};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Doubling delay clipped to `[min, max]`.
#[derive(Debug, Clone)]
pub struct ClampedExponential {
    base: Duration,
    min: Duration,
    max: Duration,
    step: u32,
}

impl ClampedExponential {
    pub fn new(base: Duration, min: Duration, max: Duration) -> Self {
        Self {
            base,
            min,
            max: max.max(min),
            step: 0,
        }
    }
}

impl Backoff for ClampedExponential {
    fn reset(&mut self) {
        self.step = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        let factor = 1u32.checked_shl(self.step).unwrap_or(u32::MAX);
        self.step = self.step.saturating_add(1);
        let raw = self.base.checked_mul(factor).unwrap_or(self.max);
        Some(raw.clamp(self.min, self.max))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Fixed(Duration),
    Exponential {
        base: Duration,
        min: Duration,
        max: Duration,
    },
}

impl Schedule {
    fn backoff(&self) -> Box<dyn Backoff + Send> {
        match self {
            Schedule::Fixed(delay) => Box::new(Constant::new(*delay)),
            Schedule::Exponential { base, min, max } => {
                Box::new(ClampedExponential::new(*base, *min, *max))
            }
        }
    }

    /// Delays between consecutive attempts, for logging and tests.
    pub fn delays(&self, count: usize) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (0..count)
            .map(|_| backoff.next_backoff().unwrap_or_default())
            .collect()
    }
}

/// The result of an operation run under a policy.
#[derive(Debug)]
pub struct Retried<T, E> {
    pub outcome: Result<T, E>,
    pub attempts: u32,
}

pub struct RetryPolicy<E> {
    max_attempts: u32,
    schedule: Schedule,
    retryable: fn(&E) -> bool,
}

impl<E: Display> RetryPolicy<E> {
    pub fn new(max_attempts: u32, schedule: Schedule, retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule,
            retryable,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration, retryable: fn(&E) -> bool) -> Self {
        Self::new(max_attempts, Schedule::Fixed(delay), retryable)
    }

    pub fn exponential(
        max_attempts: u32,
        base: Duration,
        min: Duration,
        max: Duration,
        retryable: fn(&E) -> bool,
    ) -> Self {
        Self::new(max_attempts, Schedule::Exponential { base, min, max }, retryable)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Retried<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut backoff = self.schedule.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    return Retried {
                        outcome: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt < self.max_attempts && (self.retryable)(&e) => {
                    let delay = backoff.next_backoff().unwrap_or_default();
                    debug!(attempt, max_attempts = self.max_attempts, ?delay, error = %e, "Retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Retried {
                        outcome: Err(e),
                        attempts: attempt,
                    }
                }
            }
        }
    }
}
