use groupwatch_core::{ApiError, ApiResult, PagingConfig};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded fixed-backoff retry for throttled requests.
///
/// Only `ApiError::RateLimited` is retried; every other outcome is returned
/// to the caller as-is.
#[derive(Debug, Clone)]
pub struct RateLimitRetry {
    backoff: Duration,
    max_retries: u32,
}

impl RateLimitRetry {
    pub fn new(backoff: Duration, max_retries: u32) -> Self {
        Self {
            backoff,
            max_retries,
        }
    }

    pub fn from_config(config: &PagingConfig) -> Self {
        Self::new(config.rate_limit_backoff(), config.max_rate_limit_retries)
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(ApiError::RateLimited) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} rate limited (retry {}/{}), backing off {:?}",
                        what, attempt, self.max_retries, self.backoff
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(ApiError::RateLimited) => {
                    warn!("{} still rate limited after {} retries", what, attempt);
                    return Err(ApiError::RateLimited);
                }
                other => return other,
            }
        }
    }
}

impl Default for RateLimitRetry {
    fn default() -> Self {
        Self::from_config(&PagingConfig::default())
    }
}
