//! Backoff retry for permission errors that have not propagated yet
//!
//! IAM grants on a freshly created project take a while to become visible to
//! every control plane. Calls that fail with `PERMISSION_DENIED` are retried
//! with a long first wait followed by short exponential steps. Every other
//! error is returned to the caller untouched.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::DeployError;

/// Retry options
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Retries after the initial attempt
    pub max_retries: u32,

    /// Wait before the first retry
    pub first_delay: Duration,

    /// Base of the exponential wait used from the second retry on
    pub base_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 7,
            first_delay: Duration::from_secs(15),
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryOptions {
    /// No waiting between retries
    pub fn immediate() -> Self {
        Self {
            first_delay: Duration::ZERO,
            base_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Single attempt, for calls already inside a retried step
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::immediate()
        }
    }
}

/// Delay before retry number `retry` (1-based)
pub fn retry_delay(options: &RetryOptions, retry: u32) -> Duration {
    if retry <= 1 {
        options.first_delay
    } else {
        options.base_delay * 2u32.saturating_pow(retry - 2)
    }
}

/// Run `op`, retrying while it fails with `PERMISSION_DENIED`
pub async fn retry_on_permission_denied<T, F, Fut>(
    description: &str,
    options: &RetryOptions,
    mut op: F,
) -> Result<T, DeployError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeployError>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => {
                if retries > 0 {
                    debug!("{} succeeded after {} retries", description, retries);
                }
                return Ok(value);
            }
            Err(e) if e.is_permission_denied() && retries < options.max_retries => {
                retries += 1;
                let delay = retry_delay(options, retries);
                warn!(
                    "{} failed with a permission error (retry {}/{}), waiting {:?} for IAM propagation: {}",
                    description, retries, options.max_retries, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, RpcCode};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn denied() -> DeployError {
        ApiError::new(RpcCode::PermissionDenied, "test", "caller lacks permission").into()
    }

    #[test]
    fn test_retry_delays() {
        let options = RetryOptions::default();
        assert_eq!(retry_delay(&options, 1), Duration::from_secs(15));
        assert_eq!(retry_delay(&options, 2), Duration::from_secs(1));
        assert_eq!(retry_delay(&options, 3), Duration::from_secs(2));
        assert_eq!(retry_delay(&options, 7), Duration::from_secs(32));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_permission_errors() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_on_permission_denied("op", &RetryOptions::default(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(denied())
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 15s before the first retry, 1s before the second
        assert!(started.elapsed() >= Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> =
            retry_on_permission_denied("op", &RetryOptions::default(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(denied())
            })
            .await;

        assert!(result.unwrap_err().is_permission_denied());
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_none_makes_a_single_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_on_permission_denied("op", &RetryOptions::none(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(denied())
        })
        .await;

        assert!(result.unwrap_err().is_permission_denied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_errors_propagate_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> =
            retry_on_permission_denied("op", &RetryOptions::default(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DeployError::from(ApiError::new(RpcCode::NotFound, "get", "missing")))
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
