//! # Simbatch: Batch Orchestration for External Simulation Engines
//!
//! Simbatch drives batches of process-simulation runs on an external,
//! stateful engine reached through a foreign-function boundary. The engine
//! owns all numerical work and all concurrency; it reports progress through
//! two asynchronous callback channels (status text and telemetry text) and
//! accepts further instructions mid-run as short text commands.
//!
//! This crate owns the orchestration core around that boundary:
//!
//! - **Parameter sweeps**: expand variable → candidate-list grids into the
//!   full Cartesian product of assignments ([`ParameterGrid`])
//! - **Command synthesis**: deterministic, ordered command scripts per job
//!   ([`ScriptBuilder`])
//! - **Job lifecycle**: engine-assigned ids, outstanding-count invariant,
//!   blocking batch wait ([`JobRegistry`])
//! - **Callback routing**: terminal-status classification and telemetry
//!   decoding on a single-consumer event queue ([`CallbackRouter`])
//! - **Live input injection**: named `time → value` functions evaluated at
//!   every telemetry tick ([`Trial`], [`DynamicInputDriver`])
//! - **Result aggregation**: one table per steady batch, one table per
//!   dynamic trial, exported as JSON ([`BatchReport`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use simbatch::{BatchRunner, ParameterGrid, RunnerConfig, SteadyOptions};
//! # use std::sync::Arc;
//! # fn engine() -> Arc<dyn simbatch::Engine> { unimplemented!() }
//!
//! # fn main() -> simbatch::Result<()> {
//! let grid = ParameterGrid::new()
//!     .axis("Plant__CSTR3__param__DOSP", [1.0, 2.0])
//!     .axis("Plant__Influent__param__Q", [21000.0, 24000.0]);
//!
//! let mut runner = BatchRunner::new(
//!     engine(),
//!     "plant_a2o.dll",
//!     ["Plant__Effluent__SNHx", "Plant__Effluent__TCOD"],
//!     RunnerConfig::new().with_parallel_jobs(4),
//! )?;
//!
//! let report = runner.run_grid(&grid, &SteadyOptions::new())?;
//! report.write_json("steady_state_results.json")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod batch;
pub mod config;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod registry;
pub mod results;
pub mod router;
pub mod script;
pub mod sweep;
pub mod units;
pub mod value;

pub use batch::{BatchRunner, SteadyOptions};
pub use config::{EngineDialect, RunnerConfig};
pub use dynamics::{DynamicInputDriver, TimeFunction, Trial, TrialBuilder};
pub use engine::{Engine, EngineEvent, EngineSession, EventSender, JobId};
pub use error::{Error, Result};
pub use registry::{Job, JobRegistry, JobState};
pub use results::{BatchReport, BatchTables, JobFailure, ResultAggregator, ResultTable, TelemetryRecord};
pub use router::{decode_telemetry, CallbackRouter, SnapshotPolicy};
pub use script::{InitialState, RunMode, ScriptBuilder};
pub use sweep::{ParameterAssignment, ParameterGrid};
pub use value::Value;
