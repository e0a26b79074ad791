// Retry/backoff policy — maps an attempt number to a delay.
//
// The policy is a plain value; `retry_transient` is the one place that turns
// it into sleeps. Only transient SocialErrors are retried; a server
// Retry-After hint longer than the computed delay wins.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::SocialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Total tries including the first (at least 1).
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max: max.max(base),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): base * 2^(attempt-1),
    /// capped at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }

    /// Delay to wait after `attempt` failed with `err`.
    pub fn delay_after(&self, attempt: u32, err: &SocialError) -> Duration {
        let computed = self.delay_for(attempt);
        match err.retry_after() {
            Some(hint) if hint > computed => hint,
            _ => computed,
        }
    }
}

/// Run `op` until it succeeds, fails non-transiently, or the policy's
/// attempts are used up. Returns the last error in the latter two cases.
pub async fn retry_transient<T, F, Fut>(
    policy: &BackoffPolicy,
    label: &str,
    mut op: F,
) -> Result<T, SocialError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SocialError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt, &e);
                warn!(
                    operation = label,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
