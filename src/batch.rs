//! Batch front door: expand, submit, drain, report.
//!
//! [`BatchRunner`] owns the engine session for the life of a batch. A run
//! submits every job up front, then drains the callback event queue on the
//! caller's thread until the registry reports zero outstanding jobs. The
//! drain is a blocking `recv` on the queue, not a poll: the thread sleeps
//! between callbacks and wakes exactly when the engine produces work.

use crate::config::RunnerConfig;
use crate::dynamics::{DynamicInputDriver, Trial};
use crate::engine::{Engine, EngineSession};
use crate::error::Result;
use crate::registry::{Job, JobRegistry};
use crate::results::{BatchReport, JobFailure, ResultAggregator};
use crate::router::{CallbackRouter, SnapshotPolicy};
use crate::script::{InitialState, RunMode, ScriptBuilder};
use crate::sweep::{ParameterAssignment, ParameterGrid};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Options for a steady-state batch.
#[derive(Debug, Clone)]
pub struct SteadyOptions {
    /// Initial condition applied to every job in the batch.
    pub initial_state: InitialState,
    /// Save each job's terminal state as a snapshot file named from its
    /// assignment index.
    pub save_snapshots: bool,
    /// Filename prefix for saved snapshots.
    pub snapshot_prefix: String,
    /// Retain job metadata after completion for caller inspection.
    pub persistent_jobs: bool,
}

impl Default for SteadyOptions {
    fn default() -> Self {
        Self {
            initial_state: InitialState::EngineDefaults,
            save_snapshots: false,
            snapshot_prefix: "snapshot_".to_string(),
            persistent_jobs: false,
        }
    }
}

impl SteadyOptions {
    /// Create default options: engine defaults, no snapshot export.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start every job from a snapshot file.
    #[must_use]
    pub fn from_snapshot(mut self, path: impl Into<String>) -> Self {
        self.initial_state = InitialState::Snapshot(path.into());
        self
    }

    /// Save each job's terminal state as a snapshot file.
    #[must_use]
    pub fn save_snapshots(mut self) -> Self {
        self.save_snapshots = true;
        self
    }

    /// Retain job metadata after completion.
    #[must_use]
    pub const fn persistent_jobs(mut self) -> Self {
        self.persistent_jobs = true;
        self
    }
}

/// Runs batches of simulation jobs against one engine session.
pub struct BatchRunner {
    session: EngineSession,
    config: RunnerConfig,
    model: String,
    tracked_variables: Vec<String>,
    registry: Arc<JobRegistry>,
}

impl BatchRunner {
    /// Open the engine session and prepare a runner for `model`, tracking
    /// the given engine variables in every telemetry exchange.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if an engine session is
    /// already live in this process.
    pub fn new(
        engine: Arc<dyn Engine>,
        model: impl Into<String>,
        tracked_variables: impl IntoIterator<Item = impl Into<String>>,
        config: RunnerConfig,
    ) -> Result<Self> {
        let session = EngineSession::new(engine, &config)?;
        Ok(Self {
            session,
            config,
            model: model.into(),
            tracked_variables: tracked_variables.into_iter().map(Into::into).collect(),
            registry: Arc::new(JobRegistry::new()),
        })
    }

    /// The job registry backing this runner.
    #[must_use]
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Expand a parameter grid and run the full sweep as a steady batch.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] for a malformed grid.
    pub fn run_grid(&mut self, grid: &ParameterGrid, options: &SteadyOptions) -> Result<BatchReport> {
        let assignments = grid.expand()?;
        self.run_steady(&assignments, options)
    }

    /// Run one steady-state job per assignment and collect one terminal
    /// row per job into a shared table.
    ///
    /// Dispatch failures degrade the affected job only; the report lists
    /// them and the batch completes for every sibling.
    ///
    /// # Errors
    ///
    /// Currently infallible after submission; the `Result` covers future
    /// pre-submission validation.
    pub fn run_steady(
        &mut self,
        assignments: &[ParameterAssignment],
        options: &SteadyOptions,
    ) -> Result<BatchReport> {
        let started_at = Utc::now();
        let snapshots = options.save_snapshots.then(|| SnapshotPolicy {
            prefix: options.snapshot_prefix.clone(),
            settle: self.config.snapshot_settle,
        });

        let mut tracked = self.tracked_variables.clone();
        for assignment in assignments {
            extend_unique(&mut tracked, assignment.names());
        }

        let mut router = CallbackRouter::new(
            self.config.dialect.clone(),
            RunMode::Steady,
            Arc::clone(&self.registry),
            ResultAggregator::new(),
            DynamicInputDriver::new(),
            snapshots,
        );

        for (index, assignment) in assignments.iter().enumerate() {
            let script = ScriptBuilder::steady()
                .initial_state(options.initial_state.clone())
                .assignment(assignment.clone())
                .build_line(&self.config.dialect);

            match self.session.submit(
                index,
                &self.model,
                &script,
                &tracked,
                self.config.block_on_first_telemetry,
            ) {
                Ok(job) => {
                    let mut record = Job::new(index, None, assignment.clone());
                    if options.persistent_jobs {
                        record = record.persistent();
                    }
                    self.registry.register(job, record)?;
                }
                Err(err) => {
                    warn!(index, error = %err, "submission failed");
                    router.aggregator_mut().record_failure(JobFailure {
                        index: Some(index),
                        trial: None,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            jobs = self.registry.outstanding_count(),
            assignments = assignments.len(),
            "steady batch started"
        );

        self.drain(&mut router);
        let report = router
            .into_aggregator()
            .into_report(RunMode::Steady, started_at);
        info!(
            rows = report.steady_table().map_or(0, crate::results::ResultTable::len),
            failures = report.failures.len(),
            "steady batch complete"
        );
        Ok(report)
    }

    /// Run one dynamic job per trial: periodic telemetry rows per trial
    /// table, with registered time-functions injected live on every tick.
    ///
    /// # Errors
    ///
    /// Currently infallible after submission; the `Result` covers future
    /// pre-submission validation.
    pub fn run_dynamic(&mut self, trials: Vec<Trial>) -> Result<BatchReport> {
        let started_at = Utc::now();

        let mut tracked = self.tracked_variables.clone();
        extend_unique(
            &mut tracked,
            std::iter::once(self.config.dialect.clock_variable.as_str()),
        );
        for trial in &trials {
            extend_unique(&mut tracked, trial.assignment().names());
            extend_unique(&mut tracked, trial.functions().iter().map(|f| f.name()));
        }

        let mut router = CallbackRouter::new(
            self.config.dialect.clone(),
            RunMode::Dynamic,
            Arc::clone(&self.registry),
            ResultAggregator::new(),
            DynamicInputDriver::new(),
            None,
        );

        for trial in &trials {
            router.aggregator_mut().register_trial(trial.name());
        }

        for (index, trial) in trials.into_iter().enumerate() {
            let trial = Arc::new(trial);
            let mut builder = ScriptBuilder::dynamic(trial.stop_time(), trial.cadence())
                .assignment(trial.assignment().clone());
            if let Some(snapshot) = trial.snapshot() {
                builder = builder.from_snapshot(snapshot);
            }
            for file in trial.timeseries_files() {
                builder = builder.timeseries_file(file.clone());
            }
            let script = builder.build_line(&self.config.dialect);

            // Dynamic jobs always block on the first telemetry exchange so
            // injected inputs line up with the tick that prompted them.
            match self
                .session
                .submit(index, &self.model, &script, &tracked, true)
            {
                Ok(job) => {
                    let mut record =
                        Job::new(index, Some(trial.name().to_string()), trial.assignment().clone());
                    if trial.is_persistent() {
                        record = record.persistent();
                    }
                    self.registry.register(job, record)?;
                    router.driver_mut().attach(job, Arc::clone(&trial));
                }
                Err(err) => {
                    warn!(index, trial = trial.name(), error = %err, "submission failed");
                    router.aggregator_mut().record_failure(JobFailure {
                        index: Some(index),
                        trial: Some(trial.name().to_string()),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(jobs = self.registry.outstanding_count(), "dynamic batch started");

        self.drain(&mut router);
        let report = router
            .into_aggregator()
            .into_report(RunMode::Dynamic, started_at);
        info!(failures = report.failures.len(), "dynamic batch complete");

        // Dynamic metadata has no post-batch consumer; release everything,
        // persistent records included.
        self.registry.clear();
        Ok(report)
    }

    /// Drain the callback queue until no job is outstanding.
    fn drain(&self, router: &mut CallbackRouter) {
        while self.registry.outstanding_count() > 0 {
            match self.session.events().recv() {
                Ok(event) => router.handle(&self.session, event),
                Err(_) => {
                    // Queue closed under us; nothing more will arrive.
                    warn!("engine event queue closed with jobs outstanding");
                    break;
                }
            }
        }
    }
}

/// Append items not already present, preserving first-seen order.
fn extend_unique<'a>(list: &mut Vec<String>, items: impl Iterator<Item = &'a str>) {
    for item in items {
        if !list.iter().any(|existing| existing == item) {
            list.push(item.to_string());
        }
    }
}
