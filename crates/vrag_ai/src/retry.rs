use std::thread;
use std::time::Duration;

use vrag_core::config::RetryConfig;
use vrag_core::error::AppError;

/// Bounded retry with exponential backoff. Only errors flagged `retryable` are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            backoff_multiplier: cfg.backoff_multiplier,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64;
        let ms = base * self.backoff_multiplier.powi(retry as i32);
        let capped = ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    pub fn run<T>(
        &self,
        operation: &str,
        mut f: impl FnMut() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut attempt: u32 = 1;
        loop {
            match f() {
                Ok(v) => return Ok(v),
                Err(e) if e.retryable && attempt < self.max_attempts => {
                    let delay = self.delay_for_retry(attempt - 1);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient failure"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn retries_retryable_errors_until_success() {
        let calls = Cell::new(0u32);
        let out = instant(3).run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(AppError::new("FLAKY", "try again").with_retryable(true))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(out.expect("succeeds"), 3);
    }

    #[test]
    fn does_not_retry_permanent_errors() {
        let calls = Cell::new(0u32);
        let err = instant(5)
            .run("test", || -> Result<(), AppError> {
                calls.set(calls.get() + 1);
                Err(AppError::new("BROKEN", "no"))
            })
            .unwrap_err();
        assert_eq!(err.code, "BROKEN");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn stops_after_max_attempts() {
        let calls = Cell::new(0u32);
        let err = instant(2)
            .run("test", || -> Result<(), AppError> {
                calls.set(calls.get() + 1);
                Err(AppError::new("FLAKY", "still down").with_retryable(true))
            })
            .unwrap_err();
        assert!(err.retryable);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
        };
        assert_eq!(p.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(p.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(p.delay_for_retry(2), Duration::from_millis(300));
    }
}
