use std::{future::Future, time::Duration};

use tracing::warn;

use crate::BtcIoError;

/// Exponential backoff schedule for transient RPC failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        (self.base_delay * factor).min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails permanently, or the budget runs out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, BtcIoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BtcIoError>>,
{
    let mut last = String::new();
    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                let delay = policy.delay_for(attempt);
                warn!(error = %e, attempt, ?delay, "transient rpc failure, retrying");
                last = e.to_string();
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(BtcIoError::Exhausted {
        attempts: policy.max_attempts,
        last,
    })
}
