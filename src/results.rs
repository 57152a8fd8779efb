//! Result aggregation: decoded telemetry into exportable tables.
//!
//! Steady-state batches collect exactly one terminal record per job into a
//! single shared table. Dynamic batches collect one record per telemetry
//! tick into the owning trial's table. Tables are append-only while the
//! batch runs and are serialized as one JSON artifact per batch once every
//! owning job has finished; spreadsheet formatting stays outside this
//! crate.

use crate::script::RunMode;
use crate::sweep::ParameterAssignment;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::path::Path;
use tracing::info;

/// One decoded telemetry snapshot, merged with its job's metadata.
///
/// Key order is preserved: tracked variables in wire order, then metadata
/// keys in assignment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    entries: Vec<(String, Value)>,
    time: Option<f64>,
}

impl TelemetryRecord {
    /// Create an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            time: None,
        }
    }

    /// Insert or overwrite a keyed value, preserving first-insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Merge a parameter assignment in as metadata. Assignment entries
    /// overwrite telemetry keys of the same name, so the originating
    /// configuration always wins in the exported row.
    pub fn merge_assignment(&mut self, assignment: &ParameterAssignment) {
        for (name, value) in assignment.iter() {
            self.insert(name, value.clone());
        }
    }

    /// Simulation timestamp of this record, in caller time units.
    /// Present only for dynamic-run telemetry.
    #[must_use]
    pub const fn time(&self) -> Option<f64> {
        self.time
    }

    /// Attach the normalized simulation timestamp.
    pub fn set_time(&mut self, time: f64) {
        self.time = Some(time);
    }

    /// Number of keyed values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the record holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Insertion-ordered, append-only sequence of telemetry records.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<TelemetryRecord>,
}

impl ResultTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append one record.
    pub fn append(&mut self, record: TelemetryRecord) {
        self.rows.push(record);
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[TelemetryRecord] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

/// One degraded job in an otherwise completed batch.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    /// Zero-based index of the assignment or trial, when attributable.
    pub index: Option<usize>,
    /// Trial name for dynamic runs.
    pub trial: Option<String>,
    /// What went wrong, verbatim.
    pub reason: String,
}

/// The tables a finished batch produced.
#[derive(Debug, Clone)]
pub enum BatchTables {
    /// One shared table, one row per parameter assignment.
    Steady(ResultTable),
    /// One table per trial, in trial registration order.
    Dynamic(Vec<(String, ResultTable)>),
}

impl Serialize for BatchTables {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Steady(table) => table.serialize(serializer),
            Self::Dynamic(trials) => {
                let mut map = serializer.serialize_map(Some(trials.len()))?;
                for (name, table) in trials {
                    map.serialize_entry(name, table)?;
                }
                map.end()
            }
        }
    }
}

/// Everything a completed batch reports back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Run mode of the batch.
    pub mode: RunMode,
    /// When the first submission went out.
    pub started_at: DateTime<Utc>,
    /// When the last job finished.
    pub finished_at: DateTime<Utc>,
    /// Result tables.
    pub tables: BatchTables,
    /// Jobs that degraded (dispatch or decode failures). The batch still
    /// completed for every other job.
    pub failures: Vec<JobFailure>,
}

impl BatchReport {
    /// The shared steady-state table, if this was a steady batch.
    #[must_use]
    pub const fn steady_table(&self) -> Option<&ResultTable> {
        match &self.tables {
            BatchTables::Steady(table) => Some(table),
            BatchTables::Dynamic(_) => None,
        }
    }

    /// A trial's table by name, if this was a dynamic batch.
    #[must_use]
    pub fn trial_table(&self, name: &str) -> Option<&ResultTable> {
        match &self.tables {
            BatchTables::Steady(_) => None,
            BatchTables::Dynamic(trials) => trials
                .iter()
                .find(|(trial, _)| trial == name)
                .map(|(_, table)| table),
        }
    }

    /// Serialize the report to pretty JSON at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] or [`crate::Error::Serialize`] on
    /// write failure.
    pub fn write_json(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        info!(path = %path.display(), "batch report exported");
        Ok(())
    }
}

/// Accumulates telemetry into tables while the batch runs.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    steady: ResultTable,
    trials: Vec<(String, ResultTable)>,
    failures: Vec<JobFailure>,
}

impl ResultAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a trial table so export order matches trial
    /// registration order even if a trial never ticks.
    pub fn register_trial(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.trials.iter().any(|(n, _)| *n == name) {
            self.trials.push((name, ResultTable::new()));
        }
    }

    /// Append a steady job's terminal record to the shared table.
    pub fn append_steady(&mut self, record: TelemetryRecord) {
        self.steady.append(record);
    }

    /// Append one dynamic tick to its trial's table.
    pub fn append_tick(&mut self, trial: &str, record: TelemetryRecord) {
        if let Some((_, table)) = self.trials.iter_mut().find(|(n, _)| n == trial) {
            table.append(record);
        } else {
            self.trials.push((trial.to_string(), {
                let mut table = ResultTable::new();
                table.append(record);
                table
            }));
        }
    }

    /// Record a degraded job.
    pub fn record_failure(&mut self, failure: JobFailure) {
        self.failures.push(failure);
    }

    /// Number of failures recorded so far.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Finalize into a report once every owning job has finished.
    #[must_use]
    pub fn into_report(self, mode: RunMode, started_at: DateTime<Utc>) -> BatchReport {
        let tables = match mode {
            RunMode::Steady => BatchTables::Steady(self.steady),
            RunMode::Dynamic => BatchTables::Dynamic(self.trials),
        };
        BatchReport {
            mode,
            started_at,
            finished_at: Utc::now(),
            tables,
            failures: self.failures,
        }
    }
}
