//! Callback routing: raw engine events to typed orchestration actions.
//!
//! Every status and telemetry line the engine emits lands here, on the
//! caller's thread, in queue order. The router classifies status messages
//! against the dialect's terminal sentinel, decodes telemetry lines into
//! [`TelemetryRecord`]s, and dispatches to the aggregator and, for dynamic
//! runs, the input driver.
//!
//! Malformed lines are logged, counted as failures, and dropped; they never
//! touch the outstanding-count invariant, so one garbled record cannot hang
//! or corrupt the batch.

use crate::config::EngineDialect;
use crate::dynamics::DynamicInputDriver;
use crate::engine::{EngineEvent, EngineSession, JobId};
use crate::error::{Error, Result};
use crate::registry::JobRegistry;
use crate::results::{JobFailure, ResultAggregator, TelemetryRecord};
use crate::script::RunMode;
use crate::value::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Decode one telemetry line of `key = value` pairs separated by `|`.
///
/// # Errors
///
/// Returns [`Error::ProtocolParse`] when a pair lacks the ` = ` separator.
pub fn decode_telemetry(line: &str) -> Result<TelemetryRecord> {
    let mut record = TelemetryRecord::new();
    for pair in line.split('|') {
        let (key, raw) = pair.split_once(" = ").ok_or_else(|| {
            Error::ProtocolParse(format!("telemetry pair without separator: '{pair}'"))
        })?;
        record.insert(key, Value::decode(raw));
    }
    Ok(record)
}

/// Per-job snapshot export policy for steady batches.
#[derive(Debug, Clone)]
pub struct SnapshotPolicy {
    /// Filename prefix; files are named `<prefix><index>.xml` from the
    /// job's assignment index.
    pub prefix: String,
    /// Settle delay after the `save` command. The boundary has no
    /// write-complete acknowledgment, so this delay is the only guard
    /// against reading a truncated file; the residual race is inherent.
    pub settle: Duration,
}

impl SnapshotPolicy {
    /// Deterministic snapshot filename for an assignment index.
    #[must_use]
    pub fn file_for(&self, index: usize) -> String {
        format!("{}{index}.xml", self.prefix)
    }
}

/// Routes decoded engine events to the registry, aggregator, and driver.
pub struct CallbackRouter {
    dialect: EngineDialect,
    mode: RunMode,
    registry: Arc<JobRegistry>,
    aggregator: ResultAggregator,
    driver: DynamicInputDriver,
    snapshots: Option<SnapshotPolicy>,
}

impl CallbackRouter {
    /// Create a router for one batch.
    #[must_use]
    pub fn new(
        dialect: EngineDialect,
        mode: RunMode,
        registry: Arc<JobRegistry>,
        aggregator: ResultAggregator,
        driver: DynamicInputDriver,
        snapshots: Option<SnapshotPolicy>,
    ) -> Self {
        Self {
            dialect,
            mode,
            registry,
            aggregator,
            driver,
            snapshots,
        }
    }

    /// Route one queued event. Parse failures degrade the affected job
    /// only; the batch keeps running.
    pub fn handle(&mut self, session: &EngineSession, event: EngineEvent) {
        match event {
            EngineEvent::Status { job, text } => self.on_status(session, job, &text),
            EngineEvent::Telemetry { job, line } => {
                if let Err(err) = self.on_telemetry(session, job, &line) {
                    self.degrade(job, &err);
                }
            }
        }
    }

    /// Finish the batch: hand the accumulated tables back.
    #[must_use]
    pub fn into_aggregator(self) -> ResultAggregator {
        self.aggregator
    }

    fn on_status(&mut self, session: &EngineSession, job: JobId, text: &str) {
        debug!(job = %job, status = text, "engine status");
        self.registry.touch(job);

        if !self.dialect.is_finished_status(text) {
            return;
        }

        // Steady runs optionally persist the terminal state. The save must
        // complete before the job is reported done and its metadata
        // released; all we have is the settle delay.
        if self.mode == RunMode::Steady {
            if let Some(policy) = &self.snapshots {
                if let Some(meta) = self.registry.lookup(job) {
                    let file = policy.file_for(meta.index);
                    if let Err(err) = session.send(job, &format!("save {file}")) {
                        warn!(job = %job, error = %err, "snapshot save command failed");
                    } else {
                        std::thread::sleep(policy.settle);
                        debug!(job = %job, file = %file, "snapshot saved");
                    }
                }
            }
        }

        match self.registry.mark_finished(job) {
            Ok(finished) => {
                if self.mode == RunMode::Steady {
                    if let Some(record) = finished.latest {
                        self.aggregator.append_steady(record);
                    } else {
                        self.aggregator.record_failure(JobFailure {
                            index: Some(finished.index),
                            trial: finished.trial.clone(),
                            reason: "job finished without telemetry".to_string(),
                        });
                    }
                }
                self.driver.detach(job);
                session.finish(job);
            }
            Err(err) => {
                // Defensive: a duplicate or stray terminal status must not
                // drive the outstanding count negative.
                warn!(job = %job, error = %err, "ignoring terminal status");
            }
        }
    }

    fn on_telemetry(&mut self, session: &EngineSession, job: JobId, line: &str) -> Result<()> {
        self.registry.touch(job);
        let mut record = decode_telemetry(line)?;

        let Some(meta) = self.registry.lookup(job) else {
            // Late line from a job the engine already released.
            debug!(job = %job, "telemetry for unknown job dropped");
            return Ok(());
        };
        record.merge_assignment(&meta.assignment);

        match self.mode {
            RunMode::Steady => {
                // Only the terminal snapshot makes it into the shared
                // table; keep the latest seen.
                self.registry.store_latest(job, record);
            }
            RunMode::Dynamic => {
                let raw_clock = record
                    .get(&self.dialect.clock_variable)
                    .and_then(Value::as_number)
                    .ok_or_else(|| {
                        Error::ProtocolParse(format!(
                            "dynamic telemetry without numeric clock '{}'",
                            self.dialect.clock_variable
                        ))
                    })?;
                let time = raw_clock / self.dialect.clock_unit;
                record.insert(self.dialect.clock_variable.clone(), Value::Number(time));
                record.set_time(time);

                let trial = meta.trial.as_deref().unwrap_or_default().to_string();
                self.aggregator.append_tick(&trial, record);
                self.driver.on_tick(session, job, time)?;
            }
        }
        Ok(())
    }

    fn degrade(&mut self, job: JobId, err: &Error) {
        warn!(job = %job, error = %err, "telemetry dropped");
        let meta = self.registry.lookup(job);
        self.aggregator.record_failure(JobFailure {
            index: meta.as_ref().map(|m| m.index),
            trial: meta.and_then(|m| m.trial),
            reason: err.to_string(),
        });
    }

    pub(crate) fn driver_mut(&mut self) -> &mut DynamicInputDriver {
        &mut self.driver
    }

    pub(crate) fn aggregator_mut(&mut self) -> &mut ResultAggregator {
        &mut self.aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mixed_types() {
        let record = decode_telemetry("A = 1|B = hello|C = 1;2;3").unwrap();
        assert_eq!(record.get("A"), Some(&Value::Number(1.0)));
        assert_eq!(record.get("B"), Some(&Value::Text("hello".to_string())));
        assert_eq!(
            record.get("C"),
            Some(&Value::List(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
            ]))
        );
    }

    #[test]
    fn test_decode_preserves_wire_order() {
        let record = decode_telemetry("Z = 1|A = 2").unwrap();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Z", "A"]);
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        assert!(matches!(
            decode_telemetry("A = 1|garbage"),
            Err(Error::ProtocolParse(_))
        ));
    }

    #[test]
    fn test_snapshot_policy_filename() {
        let policy = SnapshotPolicy {
            prefix: "snapshot_".to_string(),
            settle: Duration::from_millis(1),
        };
        assert_eq!(policy.file_for(3), "snapshot_3.xml");
    }
}
