//! Bounded retry with exponential backoff
//!
//! Every geocoding call runs through [`with_retry`]: an explicit loop over a
//! [`RetryState`] that stops on success, on a non-retryable error, or when the
//! attempt budget is spent. Backoff sleeps race a [`CancellationToken`] so a
//! superseded search stops waiting immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_geocoding::retry::{RetryConfig, with_retry};
//!
//! let config = RetryConfig::default();
//! let outcome = with_retry(&config, &CancellationToken::new(), |state| async move {
//!     fetch(state.attempt).await
//! }).await;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GeocodingError;

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds (default: 1000ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after every attempt (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for a single delay in milliseconds (default: 10000ms)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Whether to randomize delays (default: false)
    #[serde(default)]
    pub jitter_enabled: bool,

    /// Maximum jitter factor (0.0 to 1.0, default: 0.1 = 10%)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay() -> u64 {
    1000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_delay() -> u64 {
    10_000
}

const fn default_jitter_factor() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay(),
            jitter_enabled: false,
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom parameters
    #[must_use]
    pub const fn new(max_attempts: u32, initial_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            multiplier,
            max_delay_ms: default_max_delay(),
            jitter_enabled: false,
            jitter_factor: 0.1,
        }
    }

    /// Millisecond-scale delays for tests that exercise the retry path
    #[must_use]
    pub const fn fast() -> Self {
        Self::new(3, 10, 2.0)
    }

    /// Enable jitter on top of the exponential delays
    #[must_use]
    pub const fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_enabled = true;
        self.jitter_factor = factor;
        self
    }

    /// Fresh state for a new logical request
    #[must_use]
    pub const fn start(&self) -> RetryState {
        RetryState {
            attempt: 1,
            max_attempts: self.max_attempts,
            delay_ms: self.initial_delay_ms,
        }
    }

    /// Apply the cap and optional jitter to a raw backoff delay
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    pub fn effective_delay(&self, delay_ms: u64) -> Duration {
        let capped = delay_ms.min(self.max_delay_ms) as f64;

        let final_delay = if self.jitter_enabled && capped > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Position within one logical request's retry sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Current attempt, 1-based
    pub attempt: u32,
    /// Attempt budget
    pub max_attempts: u32,
    /// Delay to wait before the next attempt, in milliseconds
    pub delay_ms: u64,
}

impl RetryState {
    /// Whether another attempt is allowed after the current one
    #[must_use]
    pub const fn has_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// State for the following attempt
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    pub fn next(self, multiplier: f64) -> Self {
        let delay_ms = (self.delay_ms as f64 * multiplier).min(u64::MAX as f64) as u64;
        Self {
            attempt: self.attempt + 1,
            max_attempts: self.max_attempts,
            delay_ms,
        }
    }
}

/// Final outcome of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The result of the last attempt
    pub result: Result<T, GeocodingError>,
    /// Number of attempts made (1 = no retries)
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    /// Convert to a plain result, discarding metadata
    pub fn into_result(self) -> Result<T, GeocodingError> {
        self.result
    }
}

/// Execute an async operation with retry logic
///
/// The operation receives the current [`RetryState`]. Cancellation of
/// `cancel` ends the loop with [`GeocodingError::Cancelled`], both between
/// attempts and while waiting out a backoff delay.
#[allow(clippy::cast_possible_truncation)]
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut(RetryState) -> Fut,
    Fut: Future<Output = Result<T, GeocodingError>>,
{
    let mut state = config.start();

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome {
                result: Err(GeocodingError::Cancelled),
                attempts: state.attempt - 1,
            };
        }

        match operation(state).await {
            Ok(value) => {
                if state.attempt > 1 {
                    debug!(attempts = state.attempt, "Request succeeded after retries");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: state.attempt,
                };
            },
            Err(err) if err.is_cancellation() => {
                return RetryOutcome {
                    result: Err(err),
                    attempts: state.attempt,
                };
            },
            Err(err) if !err.is_retryable() => {
                debug!(
                    attempt = state.attempt,
                    error = %err,
                    "Request failed with non-retryable error"
                );
                return RetryOutcome {
                    result: Err(err),
                    attempts: state.attempt,
                };
            },
            Err(err) if !state.has_remaining() => {
                warn!(
                    attempts = state.attempt,
                    max_attempts = state.max_attempts,
                    error = %err,
                    "Request failed after max attempts"
                );
                return RetryOutcome {
                    result: Err(err),
                    attempts: state.attempt,
                };
            },
            Err(err) => {
                let delay = config.effective_delay(state.delay_ms);
                warn!(
                    attempt = state.attempt,
                    max_attempts = state.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Request failed, retrying"
                );

                tokio::select! {
                    () = cancel.cancelled() => {
                        return RetryOutcome {
                            result: Err(GeocodingError::Cancelled),
                            attempts: state.attempt,
                        };
                    }
                    () = tokio::time::sleep(delay) => {}
                }

                state = state.next(config.multiplier);
            },
        }
    }
}
