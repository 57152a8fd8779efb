//! Runner configuration and engine dialect.
//!
//! The orchestration core is engine-agnostic: everything it must know about
//! a particular engine's vocabulary (reserved variable names, the terminal
//! status code, the clock unit) lives in [`EngineDialect`], and batch-wide
//! tuning lives in [`RunnerConfig`].

use crate::units;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-specific vocabulary the command builder and router depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDialect {
    /// Variable that sets a dynamic run's stop time (engine units).
    pub stop_time_variable: String,
    /// Variable that sets the telemetry cadence (engine units).
    pub cadence_variable: String,
    /// Telemetry key carrying the job's simulation clock.
    pub clock_variable: String,
    /// Leading numeric code that marks a status message as terminal.
    pub finished_code: u32,
    /// Divisor normalizing the raw clock value to caller time units.
    /// Defaults to one day, so time-functions are evaluated in days.
    pub clock_unit: f64,
}

impl Default for EngineDialect {
    fn default() -> Self {
        Self {
            stop_time_variable: "Engine__StopTime".to_string(),
            cadence_variable: "Engine__DataComm".to_string(),
            clock_variable: "Engine__Time".to_string(),
            finished_code: 530_004,
            clock_unit: units::DAY,
        }
    }
}

impl EngineDialect {
    /// Check whether a status line is the terminal sentinel for a job.
    #[must_use]
    pub fn is_finished_status(&self, status: &str) -> bool {
        status
            .split_whitespace()
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .is_some_and(|code| code == self.finished_code)
    }
}

/// Batch-wide tuning for a runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Engine vocabulary.
    pub dialect: EngineDialect,
    /// Number of jobs the engine may run in parallel.
    pub parallel_jobs: usize,
    /// How many jobs an engine worker may serve before recycling,
    /// forwarded to the engine verbatim. `None` leaves the engine default.
    pub max_job_reuse: Option<usize>,
    /// Engine-side log verbosity. `None` leaves the engine default.
    pub log_detail: Option<u32>,
    /// Whether submissions block until the first telemetry exchange.
    pub block_on_first_telemetry: bool,
    /// Settle delay after issuing a `save` before a job may be marked
    /// finished. The boundary has no write-complete acknowledgment, so a
    /// too-short delay can truncate the snapshot file.
    pub snapshot_settle: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            dialect: EngineDialect::default(),
            parallel_jobs: 4,
            max_job_reuse: None,
            log_detail: None,
            block_on_first_telemetry: false,
            snapshot_settle: Duration::from_secs(2),
        }
    }
}

impl RunnerConfig {
    /// Create a config with default dialect and tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: EngineDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the engine's parallel-job limit.
    #[must_use]
    pub const fn with_parallel_jobs(mut self, jobs: usize) -> Self {
        self.parallel_jobs = jobs;
        self
    }

    /// Set the engine's worker-reuse limit.
    #[must_use]
    pub const fn with_max_job_reuse(mut self, reuse: usize) -> Self {
        self.max_job_reuse = Some(reuse);
        self
    }

    /// Set the engine-side log verbosity.
    #[must_use]
    pub const fn with_log_detail(mut self, level: u32) -> Self {
        self.log_detail = Some(level);
        self
    }

    /// Make submissions block until the first telemetry exchange.
    #[must_use]
    pub const fn with_block_on_first_telemetry(mut self, block: bool) -> Self {
        self.block_on_first_telemetry = block;
        self
    }

    /// Set the snapshot settle delay.
    #[must_use]
    pub const fn with_snapshot_settle(mut self, settle: Duration) -> Self {
        self.snapshot_settle = settle;
        self
    }
}
