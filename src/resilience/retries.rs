//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a single handler invocation up to a bounded attempt count
//! - Wait a fixed delay between attempts
//! - Skip retrying error kinds on the policy's exclusion list
//!
//! # Design Decisions
//! - Intermediate failures are logged at debug level and dropped
//! - Only the last failure is surfaced to the caller
//! - Arguments are cloned per attempt; a failed attempt never leaks state

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::handler::HandlerError;

/// Bounded fixed-delay retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Error kinds that fail immediately without retry.
    pub no_retry_on: Vec<String>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            no_retry_on: Vec::new(),
        }
    }

    pub fn no_retry_on(mut self, kind: impl Into<String>) -> Self {
        self.no_retry_on.push(kind.into());
        self
    }

    fn is_excluded(&self, error: &HandlerError) -> bool {
        error
            .kind()
            .map(|kind| self.no_retry_on.iter().any(|k| k == kind))
            .unwrap_or(false)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
            no_retry_on: config.no_retry_on.clone(),
        }
    }
}

/// Per-route retry choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RetrySetting {
    #[default]
    Never,
    /// Use the engine-wide policy from configuration.
    Default,
    Custom(RetryPolicy),
}

impl RetrySetting {
    pub fn resolve<'a>(&'a self, default: &'a RetryPolicy) -> Option<&'a RetryPolicy> {
        match self {
            RetrySetting::Never => None,
            RetrySetting::Default => Some(default),
            RetrySetting::Custom(policy) => Some(policy),
        }
    }
}

/// Run `attempt` until it succeeds, the policy is exhausted, or an excluded
/// error kind is raised.
pub async fn run_with_retry<T, F, Fut>(
    policy: Option<&RetryPolicy>,
    route: &str,
    mut attempt: F,
) -> Result<T, HandlerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HandlerError>>,
{
    let Some(policy) = policy else {
        return attempt().await;
    };

    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if attempts >= policy.max_attempts || policy.is_excluded(&e) => {
                return Err(e);
            }
            Err(e) => {
                tracing::debug!(
                    route = %route,
                    attempt = attempts,
                    delay = ?policy.delay,
                    error = %e,
                    "Handler failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result = run_with_retry(Some(&policy), "r", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(HandlerError::new("flaky"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_surfaces_last_failure() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<(), _> = run_with_retry(Some(&policy), "r", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::new(format!("failure {n}")))
        })
        .await;
        assert_eq!(result.unwrap_err().message(), "failure 2");
    }

    #[tokio::test]
    async fn test_excluded_kind_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1)).no_retry_on("validation");
        let result: Result<(), _> = run_with_retry(Some(&policy), "r", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::with_kind("validation", "bad input"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(None, "r", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::new("nope"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
