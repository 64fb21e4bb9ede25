//! Optional retry layer around remote calls.

use rankgrid_core::{ProviderError, RankgridError, RankgridResult, RetryConfig};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries transient provider failures with exponential backoff.
///
/// Rate limits wait for the provider's `Retry-After` (capped by
/// `max_backoff`); timeouts and 5xx answers back off from
/// `initial_backoff`, doubling per attempt. Quota, validation and malformed
/// response errors are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn is_retryable(error: &RankgridError) -> bool {
        match error {
            RankgridError::Provider(ProviderError::RateLimited { .. })
            | RankgridError::Provider(ProviderError::Timeout { .. }) => true,
            RankgridError::Provider(ProviderError::Remote {
                status: Some(status),
                ..
            }) => *status >= 500,
            _ => false,
        }
    }

    /// Wait before retry number `attempt` (0-based) after `error`.
    pub fn delay_for(&self, attempt: u32, error: &RankgridError) -> Duration {
        let delay = match error.retry_after() {
            Some(retry_after) => retry_after,
            None => self
                .config
                .initial_backoff
                .saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(self.config.max_backoff)
    }

    /// Run `op`, retrying retryable failures up to `max_retries` times.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RankgridResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RankgridResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.max_retries && Self::is_retryable(&e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(attempt = attempt + 1, ?delay, error = %e, "retrying provider call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "giving up on provider call");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankgrid_core::{EndpointCategory, QuotaDenial, QuotaError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited(secs: u64) -> RankgridError {
        ProviderError::RateLimited {
            report: "phrase_this".to_string(),
            retry_after_secs: secs,
        }
        .into()
    }

    fn remote(status: Option<u16>) -> RankgridError {
        ProviderError::Remote {
            report: "backlinks".to_string(),
            status,
            message: "boom".to_string(),
        }
        .into()
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(max_retries)
                .with_initial_backoff(Duration::from_millis(100))
                .with_max_backoff(Duration::from_secs(10)),
        )
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RetryPolicy::is_retryable(&rate_limited(5)));
        assert!(RetryPolicy::is_retryable(&remote(Some(503))));
        assert!(!RetryPolicy::is_retryable(&remote(Some(404))));
        assert!(!RetryPolicy::is_retryable(&remote(None)));
        assert!(!RetryPolicy::is_retryable(&RankgridError::from(QuotaError::exceeded(
            EndpointCategory::KeywordResearch,
            QuotaDenial::ProviderBalance,
        ))));
        assert!(!RetryPolicy::is_retryable(&RankgridError::from(
            ProviderError::MalformedResponse {
                report: "phrase_this".to_string(),
                reason: "short".to_string(),
            }
        )));
    }

    #[test]
    fn test_delay_for() {
        let p = policy(3);
        assert_eq!(p.delay_for(0, &remote(Some(500))), Duration::from_millis(100));
        assert_eq!(p.delay_for(2, &remote(Some(500))), Duration::from_millis(400));
        assert_eq!(p.delay_for(20, &remote(Some(500))), Duration::from_secs(10));
        assert_eq!(p.delay_for(0, &rate_limited(3)), Duration::from_secs(3));
        assert_eq!(p.delay_for(0, &rate_limited(60)), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = policy(3)
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(remote(Some(502)))
                } else {
                    Ok("data")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "data");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: RankgridResult<()> = policy(2)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(rate_limited(1))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_disabled_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let result: RankgridResult<()> = RetryPolicy::disabled()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(remote(Some(500)))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
