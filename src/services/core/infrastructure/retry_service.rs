//! Bounded retry with exponential backoff.
//!
//! Both backend clients run their sub-requests through this service instead
//! of carrying their own sleep loops. The caller decides what is retryable;
//! auth rejections are handled separately (token clear + one retry) and
//! should not be passed here as retryable.

use crate::utils::{Logger, RestoError, RestoResult};
use rand::Rng;
use std::future::Future;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt (milliseconds)
    pub base_delay_ms: u64,
    /// Ceiling for any single delay (milliseconds)
    pub max_delay_ms: u64,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
    /// Spread delays to avoid synchronized retries
    pub enable_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 3_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            enable_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> RestoResult<()> {
        if self.max_attempts == 0 {
            return Err(RestoError::config_error(
                "max_attempts must be greater than 0",
            ));
        }
        if self.base_delay_ms == 0 {
            return Err(RestoError::config_error(
                "base_delay_ms must be greater than 0",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(RestoError::config_error(
                "max_delay_ms must be greater than or equal to base_delay_ms",
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(RestoError::config_error(
                "backoff_multiplier must be at least 1.0",
            ));
        }
        Ok(())
    }
}

pub struct RetryService {
    config: RetryConfig,
    logger: Logger,
}

impl RetryService {
    pub fn new(config: RetryConfig) -> RestoResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            logger: Logger::named("retry"),
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` up to `max_attempts` times. The closure receives the
    /// 1-based attempt number so callers can force a token refresh on
    /// retries. Non-retryable errors propagate immediately.
    pub async fn execute<T, F, Fut, P>(
        &self,
        operation_name: &str,
        is_retryable: P,
        operation: F,
    ) -> RestoResult<T>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = RestoResult<T>>,
        P: Fn(&RestoError) -> bool,
    {
        let mut attempt = 1;
        let mut delay = self.config.base_delay_ms;

        loop {
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if attempt >= self.config.max_attempts || !is_retryable(&err) {
                        return Err(err.with_method(operation_name));
                    }

                    self.logger.warn(&format!(
                        "attempt {} of '{}' failed: {}. retrying in {}ms",
                        attempt, operation_name, err, delay
                    ));

                    tokio::time::sleep(tokio::time::Duration::from_millis(self.jittered(delay)))
                        .await;

                    delay = ((delay as f64) * self.config.backoff_multiplier) as u64;
                    if delay > self.config.max_delay_ms {
                        delay = self.config.max_delay_ms;
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn jittered(&self, delay: u64) -> u64 {
        if !self.config.enable_jitter {
            return delay;
        }
        let spread = delay / 10;
        if spread == 0 {
            return delay;
        }
        delay.saturating_add(rand::thread_rng().gen_range(0..=spread))
    }
}
