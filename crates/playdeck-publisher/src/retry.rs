//! Exponential backoff with jitter for transient remote failures

use std::future::Future;
use std::time::Duration;

use playdeck_core::config::RetryConfig;
use playdeck_core::{ErrorClass, PublishError, Result};
use rand::Rng;
use tracing::{debug, warn};

/// Random component added on top of the exponential delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Deterministic delays
    None,
    /// Uniform in `[0, delay]`
    Uniform,
}

/// One failed attempt of a logical call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// 0-indexed attempt that failed
    pub attempt: u32,
    /// Wait applied before the next attempt
    pub delay: Duration,
    /// Classification of the failure
    pub class: ErrorClass,
}

/// Bounded exponential backoff, applied around any remote operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            jitter: Jitter::Uniform,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter: Jitter::Uniform,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: if config.jitter {
                Jitter::Uniform
            } else {
                Jitter::None
            },
        }
    }

    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Initial try plus retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Deterministic part of the wait after attempt `n`: `min(max, base * 2^n)`
    pub fn floor_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Wait after attempt `n`, including jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let floor = self.floor_delay(attempt);
        match self.jitter {
            Jitter::None => floor,
            Jitter::Uniform => {
                let bound = u64::try_from(floor.as_millis()).unwrap_or(u64::MAX);
                let jitter = rand::thread_rng().gen_range(0..=bound);
                floor + Duration::from_millis(jitter)
            }
        }
    }

    /// Run `call` until it succeeds, fails fatally or the budget is spent.
    ///
    /// `call` receives the 0-indexed attempt number. The backoff sleep runs
    /// after the attempt's future has completed, so anything the attempt
    /// held (locks, guards) is already released.
    pub async fn run<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_traced(operation, call).await.0
    }

    /// Like [`run`](Self::run), also returning the failed attempts
    pub async fn run_traced<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> (Result<T>, Vec<RetryAttempt>)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut history = Vec::new();
        let mut attempt = 0;

        loop {
            let error = match call(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempts = attempt + 1, "succeeded after retry");
                    }
                    return (Ok(value), history);
                }
                Err(e) if e.is_retryable() => e,
                Err(e) => return (Err(e), history),
            };

            let class = error.class().unwrap_or(ErrorClass::Transport);
            if attempt >= self.max_retries {
                warn!(
                    operation,
                    attempts = attempt + 1,
                    class = %class,
                    error = %error,
                    "retries exhausted"
                );
                return (
                    Err(PublishError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(error),
                    }),
                    history,
                );
            }

            let delay = self.delay_for(attempt);
            warn!(
                operation,
                attempt = attempt + 1,
                max_attempts = self.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                class = %class,
                error = %error,
                "transient failure, backing off"
            );
            history.push(RetryAttempt {
                attempt,
                delay,
                class,
            });

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn scripted(statuses: &[u16]) -> Mutex<VecDeque<u16>> {
        Mutex::new(statuses.iter().copied().collect())
    }

    async fn respond(script: &Mutex<VecDeque<u16>>) -> Result<&'static str> {
        let next = script.lock().unwrap().pop_front().unwrap_or(200);
        if next == 200 {
            Ok("ok")
        } else {
            Err(PublishError::from_status(next, "scripted"))
        }
    }

    #[test]
    fn test_floor_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.floor_delay(0), Duration::from_secs(1));
        assert_eq!(policy.floor_delay(1), Duration::from_secs(2));
        assert_eq!(policy.floor_delay(4), Duration::from_secs(16));
        assert_eq!(policy.floor_delay(5), Duration::from_secs(32));
        assert_eq!(policy.floor_delay(9), Duration::from_secs(32));
        assert_eq!(policy.floor_delay(40), Duration::from_secs(32));
    }

    #[test]
    fn test_jitter_bounded_by_delay() {
        let policy = RetryPolicy::default();
        for attempt in 0..6 {
            let floor = policy.floor_delay(attempt);
            for _ in 0..50 {
                let delay = policy.delay_for(attempt);
                assert!(delay >= floor);
                assert!(delay <= floor * 2);
            }
        }
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 200,
            max_delay_ms: 1_000,
            jitter: false,
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_two_unavailable() {
        let script = scripted(&[503, 503, 200]);
        let policy = RetryPolicy::default();
        let calls = Mutex::new(0u32);

        let started = Instant::now();
        let (result, history) = policy
            .run_traced("get_track", |_| {
                *calls.lock().unwrap() += 1;
                respond(&script)
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(history.len(), 2);
        for record in &history {
            let floor = policy.floor_delay(record.attempt);
            assert!(record.delay >= floor);
            assert!(record.delay <= Duration::from_secs(32));
            assert_eq!(record.class, ErrorClass::ServiceUnavailable);
        }
        let total: Duration = history.iter().map(|r| r.delay).sum();
        assert!(started.elapsed() >= total);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_keeps_class() {
        let script = scripted(&[500, 500, 500, 500, 500]);
        let policy = RetryPolicy::default();

        let (result, history) = policy.run_traced("upload", |_| respond(&script)).await;
        let err = result.unwrap_err();

        match &err {
            PublishError::RetriesExhausted { attempts, last } => {
                assert_eq!(*attempts, 4);
                assert_eq!(last.status(), Some(500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.class(), Some(ErrorClass::ServerError));
        assert_eq!(history.len(), 3);
        // One scripted response left unconsumed
        assert_eq!(script.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        for status in [400, 401, 403, 404] {
            let script = scripted(&[status, 200]);
            let (result, history) = RetryPolicy::default()
                .run_traced("commit", |_| respond(&script))
                .await;
            let err = result.unwrap_err();
            assert_eq!(err.status(), Some(status));
            assert!(!matches!(err, PublishError::RetriesExhausted { .. }));
            assert!(history.is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried() {
        let script = scripted(&[429, 200]);
        let result = RetryPolicy::default()
            .run("insert_edit", |_| respond(&script))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_no_retry_still_wraps() {
        let script = scripted(&[503]);
        let err = RetryPolicy::no_retry()
            .run("probe", |_| respond(&script))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::RetriesExhausted { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_index_is_passed() {
        let seen = Mutex::new(Vec::new());
        let script = scripted(&[500, 200]);
        RetryPolicy::default()
            .run("update_track", |attempt| {
                seen.lock().unwrap().push(attempt);
                respond(&script)
            })
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }
}
