//! Generic fallback executor for pipeline stages.
//!
//! A stage is an ordered list of variant backends. Each variant gets a bounded
//! retry-with-backoff budget for transient errors; permanent errors advance the
//! chain immediately. Success short-circuits. The full attempt history is kept
//! for diagnostics.

use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapters::BackendError;
use crate::domain::StageFailure;

/// Retry policy for transient failures within a single variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts per variant (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Jitter fraction in [0, 1]; each delay is scaled by 1 ± jitter
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> f64 {
    0.2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Deterministic delay for a specific attempt (1-indexed), before jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Delay with jitter applied, used for actual sleeps
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Duration::from_millis((base.as_millis() as f64 * factor).max(0.0) as u64)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// One recorded failure of one variant attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageAttempt {
    pub variant: String,
    pub error: BackendError,
}

impl StageAttempt {
    pub fn to_failure(&self) -> StageFailure {
        StageFailure {
            variant: self.variant.clone(),
            error: self.error.to_string(),
            transient: self.error.is_transient(),
        }
    }
}

/// Result of running a stage's fallback chain
#[derive(Debug, Clone)]
pub enum StageResult<T> {
    /// A variant produced output; `produced_by` names which one
    Success { value: T, produced_by: String },

    /// Every variant exhausted; full attempt history in order
    Failed { attempts: Vec<StageAttempt> },
}

impl<T> StageResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }

    pub fn attempts(&self) -> &[StageAttempt] {
        match self {
            StageResult::Success { .. } => &[],
            StageResult::Failed { attempts } => attempts,
        }
    }
}

/// One variant of a stage: a name plus a factory that starts a fresh attempt.
///
/// The factory shape lets the runner re-invoke a variant for retries without
/// knowing anything about the stage's input or output types.
pub struct VariantCall<'a, T> {
    name: String,
    call: Box<dyn Fn() -> BoxFuture<'a, Result<T, BackendError>> + Send + Sync + 'a>,
}

impl<'a, T> VariantCall<'a, T> {
    pub fn new<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn() -> BoxFuture<'a, Result<T, BackendError>> + Send + Sync + 'a,
    {
        Self {
            name: name.into(),
            call: Box::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Executes a stage's ordered variant chain under one retry policy.
#[derive(Debug, Clone, Default)]
pub struct StageRunner {
    policy: RetryPolicy,
}

impl StageRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run variants strictly in order until one succeeds.
    ///
    /// Transient errors retry the same variant (bounded, with backoff and
    /// jitter); permanent errors record one attempt and move on. Every failed
    /// attempt lands in the history.
    pub async fn run<T>(&self, stage: &str, variants: Vec<VariantCall<'_, T>>) -> StageResult<T> {
        let mut attempts: Vec<StageAttempt> = Vec::new();

        for variant in &variants {
            let mut attempt = 0u32;

            loop {
                attempt += 1;
                debug!(stage, variant = variant.name(), attempt, "Attempting variant");

                match (variant.call)().await {
                    Ok(value) => {
                        info!(stage, variant = variant.name(), "Stage succeeded");
                        return StageResult::Success {
                            value,
                            produced_by: variant.name.clone(),
                        };
                    }
                    Err(error) => {
                        let transient = error.is_transient();
                        warn!(
                            stage,
                            variant = variant.name(),
                            attempt,
                            error = %error,
                            transient,
                            "Variant attempt failed"
                        );
                        attempts.push(StageAttempt {
                            variant: variant.name.clone(),
                            error,
                        });

                        if transient && self.policy.should_retry(attempt) {
                            tokio::time::sleep(self.policy.jittered_delay(attempt)).await;
                            continue;
                        }

                        // Next variant in the chain
                        break;
                    }
                }
            }
        }

        warn!(
            stage,
            attempts = attempts.len(),
            "Stage exhausted all variants"
        );
        StageResult::Failed { attempts }
    }
}
