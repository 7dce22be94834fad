//! Bounded retry with a pluggable delay schedule.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// `step * n` before retry `n`.
    Linear { step: Duration },
    /// `base * 2^(n-1)` before retry `n`, never more than `cap`.
    Exponential { base: Duration, cap: Duration },
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Linear { step } => step.saturating_mul(attempt),
            Backoff::Exponential { base, cap } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(cap)
            }
        }
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }

    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { step },
        }
    }

    pub fn exponential(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { base, cap },
        }
    }

    /// Attempt count with the floor of one applied.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// The closure receives the 1-based attempt number. The error of the last
/// attempt is returned on exhaustion.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = policy.backoff.delay(attempt);
                debug!(attempt, max_attempts = attempts, delay_ms = delay.as_millis() as u64, error = %e, "Retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
