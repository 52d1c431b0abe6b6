use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Jitter {
    None,
    /// Sleep a uniformly random duration between zero and the computed delay.
    Full,
}

/// Exponential backoff: the n-th retry waits `starting_delay * multiplier^(n-1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub starting_delay: Duration,
    pub multiplier: f64,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            starting_delay: Duration::from_secs(1),
            multiplier: 1.5,
            jitter: Jitter::Full,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            starting_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: Jitter::None,
        }
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        self.starting_delay
            .mul_f64(self.multiplier.max(1.0).powi(exponent))
    }

    fn delay(&self, retry: u32) -> Duration {
        let ceiling = self.backoff(retry);
        match self.jitter {
            Jitter::None => ceiling,
            Jitter::Full => {
                let millis = ceiling.as_millis().min(u64::MAX as u128) as u64;
                Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
            }
        }
    }

    /// Runs `operation` until it succeeds, `should_retry` rejects the error,
    /// or `max_attempts` calls have been made. The last error is returned.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        should_retry: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts && should_retry(&error) => {
                    let delay = self.delay(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_by_multiplier() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_500));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_250));
    }

    #[test]
    fn full_jitter_stays_under_ceiling() {
        let policy = RetryPolicy::default();
        for retry in 1..5 {
            assert!(policy.delay(retry) <= policy.backoff(retry));
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = RetryPolicy::immediate(5)
            .run(
                || async {
                    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < 5 {
                        Err("busy")
                    } else {
                        Ok(call)
                    }
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn stops_at_attempt_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = RetryPolicy::immediate(5)
            .run(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("busy")
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Err("busy"));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = RetryPolicy::immediate(5)
            .run(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                },
                |error| *error != "fatal",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
