//! Dynamic trials and live input injection.
//!
//! A [`Trial`] is one fully specified dynamic experiment: initial-condition
//! snapshot, fixed parameters, named time-functions, stop time, telemetry
//! cadence, and external time-series inputs. While a trial's job runs, the
//! [`DynamicInputDriver`] evaluates every registered function at each
//! telemetry tick's simulation time and pushes the results back into the
//! job as live `set` commands.

use crate::engine::{EngineSession, JobId};
use crate::error::Result;
use crate::sweep::ParameterAssignment;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A named `time → value` input function.
///
/// Time arrives normalized to the dialect's clock unit (days by default),
/// matching the unit system stop times are configured in.
pub struct TimeFunction {
    name: String,
    func: Box<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl TimeFunction {
    /// Create a named time-function.
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Variable this function drives.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate at a normalized simulation time.
    #[must_use]
    pub fn evaluate(&self, time: f64) -> f64 {
        (self.func)(time)
    }
}

impl std::fmt::Debug for TimeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One named dynamic experiment.
#[derive(Debug)]
pub struct Trial {
    name: String,
    snapshot: Option<String>,
    assignment: ParameterAssignment,
    functions: Vec<TimeFunction>,
    stop_time: f64,
    cadence: f64,
    timeseries_files: Vec<String>,
    persistent: bool,
}

impl Trial {
    /// Start building a trial with the given stop time and telemetry
    /// cadence, both in engine units.
    #[must_use]
    pub fn builder(name: impl Into<String>, stop_time: f64, cadence: f64) -> TrialBuilder {
        TrialBuilder {
            trial: Self {
                name: name.into(),
                snapshot: None,
                assignment: ParameterAssignment::new(),
                functions: Vec::new(),
                stop_time,
                cadence,
                timeseries_files: Vec::new(),
                persistent: false,
            },
        }
    }

    /// Trial name; keys the exported table.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial-condition snapshot path, if not running from engine
    /// defaults.
    #[must_use]
    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// Fixed parameter assignment applied before `start`.
    #[must_use]
    pub const fn assignment(&self) -> &ParameterAssignment {
        &self.assignment
    }

    /// Registered time-functions, in registration order.
    #[must_use]
    pub fn functions(&self) -> &[TimeFunction] {
        &self.functions
    }

    /// Stop time in engine units.
    #[must_use]
    pub const fn stop_time(&self) -> f64 {
        self.stop_time
    }

    /// Telemetry cadence in engine units.
    #[must_use]
    pub const fn cadence(&self) -> f64 {
        self.cadence
    }

    /// External time-series input files, in load order.
    #[must_use]
    pub fn timeseries_files(&self) -> &[String] {
        &self.timeseries_files
    }

    /// Whether the job's metadata should survive completion.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.persistent
    }
}

/// Builder for [`Trial`].
#[derive(Debug)]
pub struct TrialBuilder {
    trial: Trial,
}

impl TrialBuilder {
    /// Load the initial condition from a snapshot file.
    #[must_use]
    pub fn snapshot(mut self, path: impl Into<String>) -> Self {
        self.trial.snapshot = Some(path.into());
        self
    }

    /// Fix a constant parameter for the run.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<crate::value::Value>) -> Self {
        self.trial.assignment.set(name, value);
        self
    }

    /// Register a time-function driving `variable`. Functions are
    /// evaluated in registration order on every telemetry tick.
    #[must_use]
    pub fn input_function(
        mut self,
        variable: impl Into<String>,
        func: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.trial.functions.push(TimeFunction::new(variable, func));
        self
    }

    /// Append an external time-series input file.
    #[must_use]
    pub fn timeseries_file(mut self, path: impl Into<String>) -> Self {
        self.trial.timeseries_files.push(path.into());
        self
    }

    /// Retain the job's metadata after completion.
    #[must_use]
    pub const fn persistent(mut self) -> Self {
        self.trial.persistent = true;
        self
    }

    /// Finish the trial description.
    #[must_use]
    pub fn build(self) -> Trial {
        self.trial
    }
}

/// Pushes time-function values into running jobs, one `set` per function
/// per telemetry tick.
#[derive(Debug, Default)]
pub struct DynamicInputDriver {
    trials: HashMap<JobId, Arc<Trial>>,
}

impl DynamicInputDriver {
    /// Create an empty driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a trial's functions to its submitted job.
    pub fn attach(&mut self, job: JobId, trial: Arc<Trial>) {
        self.trials.insert(job, trial);
    }

    /// Detach a finished job.
    pub fn detach(&mut self, job: JobId) {
        self.trials.remove(&job);
    }

    /// Inject every registered function's value at this tick's normalized
    /// simulation time. Returns the number of commands issued.
    ///
    /// Never called ahead of telemetry: the first injection happens on the
    /// first tick, so no function is extrapolated at `t = 0` before data
    /// exists.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::Protocol`] if the engine no longer knows
    /// the job.
    pub fn on_tick(&self, session: &EngineSession, job: JobId, time: f64) -> Result<usize> {
        let Some(trial) = self.trials.get(&job) else {
            return Ok(0);
        };
        for function in trial.functions() {
            let value = function.evaluate(time);
            debug!(job = %job, variable = function.name(), time, value, "dynamic input injected");
            session.send(job, &format!("set {} {value}", function.name()))?;
        }
        Ok(trial.functions().len())
    }
}
