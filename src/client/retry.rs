//! Retry executor - the attempt loop around the HTTP transport.
//!
//! Attempts run `1..=max_retries + 1`. A 2xx ends the loop. A fatal failure
//! is returned immediately. A retryable failure waits for the scheduled delay
//! and tries again, until attempts run out, at which point the last observed
//! error is returned wrapped in [`ClientError::RetriesExhausted`].

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ApiError, ClientError, Result};
use crate::log_component;
use crate::utils::sanitize::truncate_for_log;

use super::backoff::{BackoffScheduler, Sleeper, TokioSleeper};
use super::classifier::{classify, parse_api_error, Classification};
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableError,
    FatalError,
}

/// Record of one attempt within a single call. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,
    /// Wait performed before this attempt (zero for the first)
    pub delay: Duration,
    pub outcome: AttemptOutcome,
    pub status: Option<u16>,
}

/// Runs requests through the transport with classification and backoff.
pub struct RetryExecutor {
    transport: Arc<dyn HttpTransport>,
    scheduler: BackoffScheduler,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Clone for RetryExecutor {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            scheduler: self.scheduler.clone(),
            sleeper: Arc::clone(&self.sleeper),
        }
    }
}

impl RetryExecutor {
    /// Create an executor with default backoff and the tokio timer.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            scheduler: BackoffScheduler::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_scheduler(mut self, scheduler: BackoffScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn scheduler(&self) -> &BackoffScheduler {
        &self.scheduler
    }

    pub fn set_scheduler(&mut self, scheduler: BackoffScheduler) {
        self.scheduler = scheduler;
    }

    /// Execute `request`, returning the first 2xx response.
    pub async fn execute(&self, request: &HttpRequest, api_key: &str) -> Result<HttpResponse> {
        self.execute_traced(request, api_key).await.0
    }

    /// Like [`execute`](Self::execute), also returning the per-attempt trace.
    pub async fn execute_traced(
        &self,
        request: &HttpRequest,
        api_key: &str,
    ) -> (Result<HttpResponse>, Vec<RetryAttempt>) {
        let max_attempts = self.scheduler.max_attempts();
        let mut trace = Vec::new();
        let mut last_err: Option<ApiError> = None;

        for attempt in 1..=max_attempts {
            let mut delay = Duration::ZERO;
            if attempt > 1 {
                delay = self.scheduler.delay(attempt - 1);
                if let Some(ref err) = last_err {
                    log_component!(
                        warn,
                        "retry",
                        "Retrying request after transient error",
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        path = request.path.as_str(),
                        error = %err
                    );
                }
                self.sleeper.sleep(delay).await;
            }

            let failure = match self.transport.send(request, api_key).await {
                Ok(response) if response.is_success() => {
                    trace.push(RetryAttempt {
                        attempt_number: attempt,
                        delay,
                        outcome: AttemptOutcome::Success,
                        status: Some(response.status),
                    });
                    return (Ok(response), trace);
                }
                Ok(response) => parse_api_error(response.status, &truncate_for_log(&response.body)),
                Err(transport_err) => ApiError::Network(transport_err),
            };

            let classification = classify(&failure);
            trace.push(RetryAttempt {
                attempt_number: attempt,
                delay,
                outcome: match classification {
                    Classification::Retryable => AttemptOutcome::RetryableError,
                    Classification::Fatal => AttemptOutcome::FatalError,
                },
                status: failure.status_code(),
            });

            if classification == Classification::Fatal {
                log_component!(
                    error,
                    "retry",
                    "Request failed with non-retryable error",
                    attempt = attempt,
                    path = request.path.as_str(),
                    kind = failure.kind(),
                    error = %failure
                );
                return (Err(ClientError::Api(failure)), trace);
            }

            if attempt == max_attempts {
                log_component!(
                    error,
                    "retry",
                    "Retries exhausted",
                    attempts = attempt,
                    path = request.path.as_str(),
                    kind = failure.kind(),
                    error = %failure
                );
                let err = if attempt == 1 {
                    ClientError::Api(failure)
                } else {
                    ClientError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(ClientError::Api(failure)),
                    }
                };
                return (Err(err), trace);
            }

            last_err = Some(failure);
        }

        // max_attempts is at least 1, so the loop always returns.
        (Err(ClientError::MaxRetriesExceeded), trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Records requested delays without waiting.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    /// Fails with `status` for the first `failures` calls, then returns 200.
    struct FailThenSucceedTransport {
        calls: AtomicU32,
        failures: u32,
        status: u16,
    }

    impl FailThenSucceedTransport {
        fn new(failures: u32, status: u16) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                status,
            }
        }
    }

    #[async_trait]
    impl HttpTransport for FailThenSucceedTransport {
        async fn send(
            &self,
            _request: &HttpRequest,
            _api_key: &str,
        ) -> std::result::Result<HttpResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Ok(HttpResponse::new(self.status, format!("failure {}", n + 1)))
            } else {
                Ok(HttpResponse::new(200, r#"{"content":"ok"}"#))
            }
        }
    }

    /// Always fails at the transport layer.
    struct TimeoutTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl HttpTransport for TimeoutTransport {
        async fn send(
            &self,
            _request: &HttpRequest,
            _api_key: &str,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::timeout("operation timed out"))
        }
    }

    fn executor(
        transport: Arc<dyn HttpTransport>,
        max_retries: i64,
    ) -> (RetryExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let exec = RetryExecutor::new(transport)
            .with_scheduler(BackoffScheduler::new(max_retries, 1.0))
            .with_sleeper(sleeper.clone());
        (exec, sleeper)
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let transport = Arc::new(FailThenSucceedTransport::new(0, 500));
        let (exec, sleeper) = executor(transport.clone(), 3);

        let (result, trace) = exec.execute_traced(&HttpRequest::get("x"), "k").await;
        assert_eq!(result.unwrap().status, 200);
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].outcome, AttemptOutcome::Success);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausts_and_returns_last_error() {
        let transport = Arc::new(FailThenSucceedTransport::new(10, 503));
        let (exec, sleeper) = executor(transport.clone(), 2);

        let (result, trace) = exec.execute_traced(&HttpRequest::get("x"), "k").await;
        let err = result.unwrap_err();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(trace.len(), 3);
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.kind(), "server_error");
        assert!(err.to_string().contains("failure 3"));
    }

    #[tokio::test]
    async fn test_one_retry_then_success() {
        let transport = Arc::new(FailThenSucceedTransport::new(1, 429));
        let (exec, sleeper) = executor(transport.clone(), 3);

        let (result, trace) = exec.execute_traced(&HttpRequest::get("x"), "k").await;
        assert!(result.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        let delays = sleeper.delays.lock().unwrap();
        assert_eq!(delays.len(), 1);
        assert!(delays[0] >= Duration::from_secs(1));
        assert!(delays[0] <= Duration::from_millis(1100));

        assert_eq!(trace[0].outcome, AttemptOutcome::RetryableError);
        assert_eq!(trace[1].outcome, AttemptOutcome::Success);
        assert_eq!(trace[1].delay, delays[0]);
    }

    #[tokio::test]
    async fn test_fatal_never_retried() {
        for status in [400, 401, 403, 404, 422] {
            let transport = Arc::new(FailThenSucceedTransport::new(1, status));
            let (exec, sleeper) = executor(transport.clone(), 3);

            let (result, trace) = exec.execute_traced(&HttpRequest::get("x"), "k").await;
            let err = result.unwrap_err();

            assert_eq!(transport.calls.load(Ordering::SeqCst), 1, "status {}", status);
            assert!(sleeper.delays.lock().unwrap().is_empty());
            assert_eq!(trace[0].outcome, AttemptOutcome::FatalError);
            assert!(err.status_code().is_some());
            assert!(err.attempts().is_none());
        }
    }

    #[tokio::test]
    async fn test_transport_timeouts_retried() {
        let transport = Arc::new(TimeoutTransport {
            calls: AtomicU32::new(0),
        });
        let (exec, _sleeper) = executor(transport.clone(), 1);

        let err = exec.execute(&HttpRequest::get("x"), "k").await.unwrap_err();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.kind(), "network_failure");
        assert_eq!(err.attempts(), Some(2));
    }

    #[tokio::test]
    async fn test_zero_retries_returns_bare_error() {
        let transport = Arc::new(FailThenSucceedTransport::new(5, 500));
        let (exec, _sleeper) = executor(transport.clone(), 0);

        let err = exec.execute(&HttpRequest::get("x"), "k").await.unwrap_err();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ClientError::Api(ApiError::ServerError { .. })));
    }

    #[tokio::test]
    async fn test_delays_grow_exponentially() {
        let transport = Arc::new(FailThenSucceedTransport::new(3, 502));
        let (exec, sleeper) = executor(transport, 3);

        exec.execute(&HttpRequest::get("x"), "k").await.unwrap();
        let delays = sleeper.delays.lock().unwrap();
        assert_eq!(delays.len(), 3);
        for (i, d) in delays.iter().enumerate() {
            let floor = Duration::from_secs(1u64 << i);
            assert!(*d >= floor && *d <= floor.mul_f64(1.1));
        }
    }

    #[tokio::test]
    async fn test_oversized_retry_config_stays_bounded() {
        let transport = Arc::new(FailThenSucceedTransport::new(u32::MAX, 503));
        let sleeper = Arc::new(RecordingSleeper::default());
        let exec = RetryExecutor::new(transport.clone())
            .with_scheduler(BackoffScheduler::new(i64::MAX, 1e30))
            .with_sleeper(sleeper.clone());

        let (result, trace) = exec.execute_traced(&HttpRequest::get("x"), "k").await;
        let attempts = crate::client::backoff::MAX_RETRIES_CEILING + 1;
        assert_eq!(transport.calls.load(Ordering::SeqCst), attempts);
        assert_eq!(trace.len(), attempts as usize);
        assert_eq!(result.unwrap_err().attempts(), Some(attempts));
        let delays = sleeper.delays.lock().unwrap();
        assert!(delays.iter().all(|d| d.as_secs_f64() <= 3600.0));
    }
}
