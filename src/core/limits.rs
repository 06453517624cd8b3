//! Platform constraints and the per-run wall-clock budget.
//!
//! The budget exists because the external scheduler has an execution ceiling:
//! failing fast before a stage beats starting work that cannot finish.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform bounds the artifact must satisfy before publishing is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformLimits {
    /// Minimum video duration in seconds (default: 15)
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f64,

    /// Maximum video duration in seconds (default: 60)
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f64,

    /// Maximum file size in bytes (default: 50MB, the TikTok cap)
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,

    /// Per-call timeout for network-calling stages in seconds (default: 30)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Wall-clock budget for the whole run in seconds (default: 20 min)
    #[serde(default = "default_run_budget")]
    pub run_budget_secs: u64,
}

fn default_min_duration() -> f64 {
    15.0
}
fn default_max_duration() -> f64 {
    60.0
}
fn default_max_size() -> u64 {
    50 * 1024 * 1024
}
fn default_call_timeout() -> u64 {
    30
}
fn default_run_budget() -> u64 {
    1200
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            max_size_bytes: default_max_size(),
            call_timeout_secs: default_call_timeout(),
            run_budget_secs: default_run_budget(),
        }
    }
}

impl PlatformLimits {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }
}

/// Tracks elapsed wall-clock time for one run.
#[derive(Debug, Clone)]
pub struct RunBudget {
    started_at: Instant,
    budget: Duration,
}

impl RunBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Checked before each stage starts; an exhausted budget fails the run
    /// with a recorded cause instead of stalling past the scheduler ceiling.
    pub fn check(&self) -> Result<(), BudgetExceeded> {
        let elapsed = self.elapsed();
        if elapsed >= self.budget {
            return Err(BudgetExceeded {
                elapsed_secs: elapsed.as_secs(),
                budget_secs: self.budget.as_secs(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("run budget exhausted: {elapsed_secs}s >= {budget_secs}s")]
pub struct BudgetExceeded {
    pub elapsed_secs: u64,
    pub budget_secs: u64,
}
