//! Command-script synthesis.
//!
//! The engine consumes one command string per submission: discrete tokens
//! joined with `;`. Token order is a contract — the engine executes them
//! sequentially and rejects out-of-order mode changes — so [`ScriptBuilder`]
//! owns the ordering and callers only describe the run.
//!
//! Token order:
//! 1. `reset`, or `load <snapshot>` followed by `maptoic`
//! 2. dynamic runs only: one `loadtsv <file>` per time-series file
//! 3. `mode steady` or `mode dynamic`
//! 4. one `set <var> <value>` per assignment entry, in assignment order
//! 5. dynamic runs only: stop time then cadence `set`s
//! 6. `start`
//!
//! No variable-name or range validation happens here; the engine owns that.

use crate::config::EngineDialect;
use crate::sweep::ParameterAssignment;
use serde::{Deserialize, Serialize};

/// Run mode of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Run to a single terminal state; one result row per job.
    Steady,
    /// Run over simulated time with periodic telemetry.
    Dynamic,
}

/// Where a job's initial condition comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialState {
    /// Engine built-in defaults (`reset`).
    EngineDefaults,
    /// A previously saved snapshot file (`load` + `maptoic`).
    Snapshot(String),
}

/// Builds one ordered command script for a single job.
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    mode: RunMode,
    initial_state: InitialState,
    timeseries_files: Vec<String>,
    assignment: ParameterAssignment,
    stop_time: Option<f64>,
    cadence: Option<f64>,
}

impl ScriptBuilder {
    /// Start a steady-state script from engine defaults.
    #[must_use]
    pub const fn steady() -> Self {
        Self {
            mode: RunMode::Steady,
            initial_state: InitialState::EngineDefaults,
            timeseries_files: Vec::new(),
            assignment: ParameterAssignment::new(),
            stop_time: None,
            cadence: None,
        }
    }

    /// Start a dynamic script with the given stop time and telemetry
    /// cadence, both in engine units.
    #[must_use]
    pub const fn dynamic(stop_time: f64, cadence: f64) -> Self {
        Self {
            mode: RunMode::Dynamic,
            initial_state: InitialState::EngineDefaults,
            timeseries_files: Vec::new(),
            assignment: ParameterAssignment::new(),
            stop_time: Some(stop_time),
            cadence: Some(cadence),
        }
    }

    /// Load the initial condition from a snapshot file.
    #[must_use]
    pub fn from_snapshot(mut self, path: impl Into<String>) -> Self {
        self.initial_state = InitialState::Snapshot(path.into());
        self
    }

    /// Set the initial state explicitly.
    #[must_use]
    pub fn initial_state(mut self, state: InitialState) -> Self {
        self.initial_state = state;
        self
    }

    /// Append an external time-series input file (dynamic runs). Files are
    /// loaded in the order given.
    #[must_use]
    pub fn timeseries_file(mut self, path: impl Into<String>) -> Self {
        self.timeseries_files.push(path.into());
        self
    }

    /// Fix the parameter assignment applied before `start`.
    #[must_use]
    pub fn assignment(mut self, assignment: ParameterAssignment) -> Self {
        self.assignment = assignment;
        self
    }

    /// Run mode of the script under construction.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Produce the ordered command tokens.
    #[must_use]
    pub fn build(&self, dialect: &EngineDialect) -> Vec<String> {
        let mut tokens = Vec::with_capacity(self.assignment.len() + 6);

        match &self.initial_state {
            InitialState::EngineDefaults => tokens.push("reset".to_string()),
            InitialState::Snapshot(path) => {
                tokens.push(format!("load {path}"));
                tokens.push("maptoic".to_string());
            }
        }

        if self.mode == RunMode::Dynamic {
            for file in &self.timeseries_files {
                tokens.push(format!("loadtsv {file}"));
            }
        }

        tokens.push(match self.mode {
            RunMode::Steady => "mode steady".to_string(),
            RunMode::Dynamic => "mode dynamic".to_string(),
        });

        for (name, value) in self.assignment.iter() {
            tokens.push(format!("set {name} {value}"));
        }

        if self.mode == RunMode::Dynamic {
            if let Some(stop_time) = self.stop_time {
                tokens.push(format!("set {} {stop_time}", dialect.stop_time_variable));
            }
            if let Some(cadence) = self.cadence {
                tokens.push(format!("set {} {cadence}", dialect.cadence_variable));
            }
        }

        tokens.push("start".to_string());
        tokens
    }

    /// Join the tokens into the single wire string the engine consumes.
    #[must_use]
    pub fn build_line(&self, dialect: &EngineDialect) -> String {
        self.build(dialect).join(";")
    }
}
