use aura_core::{Result, RetryClass};
use std::time::Duration;
use tracing::warn;

use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

/// Backoff policy for LLM calls.
///
/// Timeouts and connection failures back off exponentially from
/// `base_delay`; rate limits back off linearly in steps of
/// `rate_limit_step`. Any other failure is returned immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            rate_limit_step: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, rate_limit_step: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            rate_limit_step,
        }
    }

    /// Same retry counts, no waiting. For tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based), or `None` if the
    /// failure class is not retried or retries are exhausted.
    pub fn delay_for(&self, class: RetryClass, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        match class {
            RetryClass::Transient => Some(self.base_delay * 2u32.saturating_pow(attempt)),
            RetryClass::RateLimit => Some(self.rate_limit_step * (attempt + 1)),
            RetryClass::Fatal => None,
        }
    }

    /// Run `provider.complete` under this policy.
    pub async fn complete(
        &self,
        provider: &dyn LlmProvider,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let mut attempt = 0;
        loop {
            match provider.complete(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let Some(delay) = self.delay_for(e.retry_class(), attempt) else {
                        return Err(e);
                    };
                    attempt += 1;
                    warn!(
                        provider = provider.name(),
                        attempt,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying llm call"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
