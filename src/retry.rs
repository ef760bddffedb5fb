use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::{AtlasError, Result};

/// Bounded retry with linear backoff (`step * attempt`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Backoff step in milliseconds
    pub step_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, step_ms: u64) -> Self {
        Self { max_retries, step_ms }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Wait before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.step_ms.saturating_mul(attempt as u64))
    }

    /// Run `op` until it succeeds, fails with an error `should_retry` rejects,
    /// or the retry budget is spent.
    pub async fn run<T, F, Fut, P>(&self, label: &str, should_retry: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&AtlasError) -> bool,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && should_retry(&e) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        "{}: attempt {} failed ({}), retrying in {:?}",
                        label,
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, 400)
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}ms", self.max_retries, self.step_ms)
    }
}
