//! Job registry: the orchestration-side shadow of every in-flight run.
//!
//! The registry is the only place callback-driven code mutates job state.
//! Records live in a concurrent map keyed by the engine-assigned id; the
//! outstanding count is maintained alongside and signals a condition
//! variable on every transition so the caller's "wait for the batch" blocks
//! instead of polling.

use crate::engine::JobId;
use crate::error::{Error, Result};
use crate::results::TelemetryRecord;
use crate::sweep::ParameterAssignment;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Condvar, Mutex};
use tracing::debug;

/// Lifecycle state of a job.
///
/// `Submitted → Running → Finished`; finished records are released
/// immediately unless the job is persistent, in which case they are
/// retained until [`JobRegistry::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Submitted to the engine; no callback seen yet.
    Submitted,
    /// At least one status or telemetry callback received.
    Running,
    /// Terminal status received.
    Finished,
}

/// Orchestration-side record of one engine job.
#[derive(Debug, Clone)]
pub struct Job {
    /// Zero-based index of the originating assignment or trial.
    pub index: usize,
    /// Trial name for dynamic runs; `None` for sweep jobs.
    pub trial: Option<String>,
    /// The parameter assignment this job was submitted with.
    pub assignment: ParameterAssignment,
    /// Retain this record after the job finishes.
    pub persistent: bool,
    /// Latest decoded telemetry, merged with metadata. For steady runs
    /// this is the terminal record-in-waiting.
    pub latest: Option<TelemetryRecord>,
    /// Lifecycle state.
    pub state: JobState,
}

impl Job {
    /// Create a registry record for a freshly submitted job.
    #[must_use]
    pub const fn new(index: usize, trial: Option<String>, assignment: ParameterAssignment) -> Self {
        Self {
            index,
            trial,
            assignment,
            persistent: false,
            latest: None,
            state: JobState::Submitted,
        }
    }

    /// Mark the record persistent: metadata survives job completion for
    /// caller inspection.
    #[must_use]
    pub const fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

/// Tracks every submitted job and the count still outstanding.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, Job>,
    outstanding: Mutex<usize>,
    idle: Condvar,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly submitted job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the engine re-issued a live id,
    /// which would break telemetry routing.
    pub fn register(&self, id: JobId, job: Job) -> Result<()> {
        if self.jobs.contains_key(&id) {
            return Err(Error::Protocol(format!(
                "engine reassigned live job id {id}"
            )));
        }
        self.jobs.insert(id, job);
        let mut outstanding = self.outstanding.lock().expect("registry lock poisoned");
        *outstanding += 1;
        debug!(job = %id, outstanding = *outstanding, "job registered");
        Ok(())
    }

    /// Read a snapshot of a job's record.
    #[must_use]
    pub fn lookup(&self, id: JobId) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    /// Note that a callback arrived for a job, moving `Submitted` to
    /// `Running`. Unknown ids are ignored: the engine may still flush
    /// messages for jobs it already released.
    pub fn touch(&self, id: JobId) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            if entry.state == JobState::Submitted {
                entry.state = JobState::Running;
            }
        }
    }

    /// Store the latest decoded telemetry for a job.
    pub fn store_latest(&self, id: JobId, record: TelemetryRecord) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            entry.latest = Some(record);
        }
    }

    /// Transition a job to `Finished`, release its record unless
    /// persistent, and decrement the outstanding count.
    ///
    /// Returns the record as it stood at completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for an unknown or already-finished job.
    /// Defensive: correct engines deliver the terminal status at most once.
    pub fn mark_finished(&self, id: JobId) -> Result<Job> {
        let finished = {
            let Some(mut entry) = self.jobs.get_mut(&id) else {
                return Err(Error::Protocol(format!("finish for unknown job {id}")));
            };
            if entry.state == JobState::Finished {
                return Err(Error::Protocol(format!("duplicate finish for job {id}")));
            }
            entry.state = JobState::Finished;
            entry.value().clone()
        };

        if !finished.persistent {
            self.jobs.remove(&id);
        }

        let mut outstanding = self.outstanding.lock().expect("registry lock poisoned");
        debug_assert!(*outstanding > 0, "outstanding count underflow");
        *outstanding = outstanding.saturating_sub(1);
        debug!(job = %id, outstanding = *outstanding, "job finished");
        if *outstanding == 0 {
            self.idle.notify_all();
        }
        Ok(finished)
    }

    /// Number of submitted jobs that have not reached `Finished`.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        *self.outstanding.lock().expect("registry lock poisoned")
    }

    /// Block until every submitted job has finished.
    pub fn wait_idle(&self) {
        let mut outstanding = self.outstanding.lock().expect("registry lock poisoned");
        while *outstanding > 0 {
            outstanding = self
                .idle
                .wait(outstanding)
                .expect("registry lock poisoned");
        }
    }

    /// Drop all records, including persistent ones.
    pub fn clear(&self) {
        self.jobs.clear();
    }

    /// Number of records currently retained (live + persistent).
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check whether no records are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
