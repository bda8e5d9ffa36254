use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Exponential backoff configuration with sub-second jitter so that
/// simultaneous pipeline runs hitting the same flaky endpoint don't
/// synchronize their retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts for one logical operation (1 = no retry).
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    /// Same delay curve with a different attempt budget.
    pub fn with_max_retries(&self, retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..self.clone()
        }
    }

    /// Compute the delay after a given failed attempt (0-indexed).
    ///
    /// Formula: `min(base_delay * 2^attempt, max_delay) + uniform_jitter(0..1)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp_delay = self
            .base_delay_secs
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let capped = exp_delay.min(self.max_delay_secs);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        Duration::from_secs_f64(capped as f64 + jitter)
    }
}

/// Drive an async operation under the backoff policy.
///
/// Every failure is shown to `classifier`: an `Abort` verdict surfaces the
/// error immediately with no backoff sleep, a `Retry` verdict sleeps the
/// computed delay and tries again until the attempt budget runs out, at
/// which point the final error surfaces as-is. The budget counts attempts,
/// so a budget of 1 means exactly one try.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classifier: C,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let budget = config.max_retries.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if classifier(&err) == RetryAction::Abort || attempt >= budget {
            return Err(err);
        }
        let delay = config.delay_for_attempt(attempt - 1);
        tracing::warn!(
            attempt,
            budget,
            delay_secs = delay.as_secs_f64(),
            "Transient failure, backing off: {err}"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_secs, 2);
        assert_eq!(config.max_delay_secs, 30);
    }

    #[test]
    fn test_delay_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_secs: 2,
            max_delay_secs: 60,
        };
        // attempt 0: 2*1=2, jitter in 0..1, total in 2..3
        let d = config.delay_for_attempt(0);
        assert!(d.as_secs_f64() >= 2.0 && d.as_secs_f64() < 3.0);

        // attempt 1: 2*2=4, total in 4..5
        let d = config.delay_for_attempt(1);
        assert!(d.as_secs_f64() >= 4.0 && d.as_secs_f64() < 5.0);

        // attempt 2: 2*4=8, total in 8..9
        let d = config.delay_for_attempt(2);
        assert!(d.as_secs_f64() >= 8.0 && d.as_secs_f64() < 9.0);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_secs: 2,
            max_delay_secs: 30,
        };
        // attempt 4: min(2*16, 30) = 30, plus jitter in 0..1
        let d = config.delay_for_attempt(4);
        assert!(d.as_secs_f64() >= 30.0 && d.as_secs_f64() < 31.0);
    }

    #[test]
    fn test_with_max_retries_keeps_delays() {
        let config = RetryConfig::default().with_max_retries(1);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.base_delay_secs, 2);
    }

    fn no_delay(attempts: u32) -> RetryConfig {
        RetryConfig {
            max_retries: attempts,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_first_success_consumes_one_attempt() {
        let calls = std::cell::Cell::new(0u32);
        let out: Result<&str, String> = retry_with_backoff(
            &no_delay(4),
            |_| RetryAction::Retry,
            || {
                calls.set(calls.get() + 1);
                async { Ok("resolved") }
            },
        )
        .await;
        assert_eq!(out.unwrap(), "resolved");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_abort_verdict_stops_after_one_attempt() {
        let calls = std::cell::Cell::new(0u32);
        let out: Result<(), String> = retry_with_backoff(
            &no_delay(5),
            |_| RetryAction::Abort,
            || {
                calls.set(calls.get() + 1);
                async { Err("terminal".to_string()) }
            },
        )
        .await;
        assert_eq!(out.unwrap_err(), "terminal");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let calls = std::cell::Cell::new(0u32);
        let out: Result<u32, String> = retry_with_backoff(
            &no_delay(4),
            |_| RetryAction::Retry,
            || {
                let n = calls.get() + 1;
                calls.set(n);
                async move {
                    if n < 3 {
                        Err(format!("flake {n}"))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;
        assert_eq!(out.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_surfaces_final_error() {
        // The budget counts attempts, not extra tries: 3 means 3 runs.
        let calls = std::cell::Cell::new(0u32);
        let out: Result<(), String> = retry_with_backoff(
            &no_delay(3),
            |_| RetryAction::Retry,
            || {
                let n = calls.get() + 1;
                calls.set(n);
                async move { Err(format!("flake {n}")) }
            },
        )
        .await;
        assert_eq!(out.unwrap_err(), "flake 3");
        assert_eq!(calls.get(), 3);
    }
}
