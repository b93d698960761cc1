use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Linear,
    #[default]
    Exponential,
}

/// Retry policy a tool may declare. `max_attempts` counts every attempt,
/// including the first one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable_errors: Option<Vec<String>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            retryable_errors: None,
        }
    }
}

impl RetryConfig {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the failed attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let millis = match self.backoff {
            BackoffStrategy::Linear => self
                .initial_delay_ms
                .saturating_mul(u64::from(attempt) + 1),
            BackoffStrategy::Exponential => {
                let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
                self.initial_delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(millis.min(self.max_delay_ms))
    }

    pub fn is_retryable(&self, message: &str) -> bool {
        match &self.retryable_errors {
            Some(allowed) => allowed.iter().any(|pattern| message.contains(pattern.as_str())),
            None => true,
        }
    }
}
