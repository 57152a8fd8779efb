//! Engine boundary.
//!
//! The native engine is opaque: it is handed a model, a command script, and
//! the variables to track, then reports back exclusively through two
//! callback slots (status text and data-communication text) invoked from
//! its own worker threads. [`Engine`] is the thin synchronous call surface
//! over that boundary; [`EngineSession`] owns the process-wide
//! single-instance constraint and the event queue both callbacks feed.
//!
//! Callbacks never touch orchestration state directly. An implementation
//! forwards each invocation through its [`EventSender`], and the batch
//! runner drains the matching receiver on the caller's thread. That keeps
//! every registry and table mutation single-threaded regardless of how many
//! engine workers are firing callbacks.

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use tracing::debug;

/// Engine-assigned job identifier. Opaque: the orchestration layer never
/// invents one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub i32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One callback invocation, as queued by the engine's worker threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Out-of-band status text for a job.
    Status {
        /// Job the message belongs to.
        job: JobId,
        /// Raw status line, leading numeric code included.
        text: String,
    },
    /// One telemetry line for a job (`key = value|key = value|...`).
    Telemetry {
        /// Job the line belongs to.
        job: JobId,
        /// Raw telemetry line.
        line: String,
    },
}

/// Handle an [`Engine`] implementation uses to enqueue callback
/// invocations. Cheap to clone; safe to call from any engine thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<EngineEvent>,
}

impl EventSender {
    /// Enqueue a status callback.
    pub fn status(&self, job: JobId, text: impl Into<String>) {
        self.push(EngineEvent::Status {
            job,
            text: text.into(),
        });
    }

    /// Enqueue a telemetry callback.
    pub fn telemetry(&self, job: JobId, line: impl Into<String>) {
        self.push(EngineEvent::Telemetry {
            job,
            line: line.into(),
        });
    }

    fn push(&self, event: EngineEvent) {
        // The receiver only disappears once the session is torn down;
        // late callbacks from a draining engine are dropped.
        if self.tx.send(event).is_err() {
            debug!("engine event dropped after session teardown");
        }
    }
}

/// Synchronous call surface of the external engine.
///
/// Implementations wrap the native scheduler library; tests substitute a
/// scripted stub. All methods may be called from the orchestration thread
/// only; the engine invokes the two callback slots from its own workers.
pub trait Engine: Send + Sync {
    /// Register the event queue both callback slots feed. Called exactly
    /// once, at session construction, before any submission.
    fn connect_events(&self, events: EventSender);

    /// Submit a command script against a model, returning the
    /// engine-assigned job identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dispatch`]-compatible failure text when the engine
    /// rejects the submission or cannot assign an identifier.
    fn submit(
        &self,
        model: &str,
        script: &str,
        tracked_variables: &[String],
        block_on_first_telemetry: bool,
    ) -> std::result::Result<JobId, String>;

    /// Inject one live command into a running job.
    ///
    /// # Errors
    ///
    /// Returns failure text when the job is unknown engine-side.
    fn send(&self, job: JobId, command: &str) -> std::result::Result<(), String>;

    /// Set the number of jobs the engine may run in parallel. Effective
    /// for subsequently submitted jobs.
    fn set_parallel_jobs(&self, jobs: usize);

    /// Set how many jobs an engine worker serves before recycling.
    fn set_max_job_reuse(&self, reuse: usize);

    /// Set engine-side log verbosity.
    fn set_log_detail(&self, level: u32);

    /// Release a job's engine-side resources. Distinct from the
    /// orchestration layer's own metadata release.
    fn finish(&self, job: JobId);

    /// Release the engine instance; invalidates all outstanding job
    /// identifiers.
    fn teardown(&self);
}

// The underlying engine enforces single-instance semantics per process;
// surfacing a second construction as an immediate configuration error beats
// discovering it on the first garbled callback.
static SESSION_LIVE: AtomicBool = AtomicBool::new(false);

/// Live connection to the engine: the single place submissions go out and
/// callback events come back in.
pub struct EngineSession {
    engine: Arc<dyn Engine>,
    events: Receiver<EngineEvent>,
    sender: EventSender,
}

impl EngineSession {
    /// Open the process's engine session and apply the config's
    /// engine-wide tuning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a session is already live in
    /// this process.
    pub fn new(engine: Arc<dyn Engine>, config: &RunnerConfig) -> Result<Self> {
        if SESSION_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Configuration(
                "an engine session is already live in this process".to_string(),
            ));
        }

        let (tx, rx) = channel();
        let sender = EventSender { tx };
        engine.connect_events(sender.clone());
        engine.set_parallel_jobs(config.parallel_jobs);
        if let Some(reuse) = config.max_job_reuse {
            engine.set_max_job_reuse(reuse);
        }
        if let Some(level) = config.log_detail {
            engine.set_log_detail(level);
        }

        Ok(Self {
            engine,
            events: rx,
            sender,
        })
    }

    /// Submit a script, mapping engine rejection to [`Error::Dispatch`].
    pub(crate) fn submit(
        &self,
        index: usize,
        model: &str,
        script: &str,
        tracked_variables: &[String],
        block_on_first_telemetry: bool,
    ) -> Result<JobId> {
        self.engine
            .submit(model, script, tracked_variables, block_on_first_telemetry)
            .map_err(|reason| Error::Dispatch { index, reason })
    }

    /// Inject one live command into a running job.
    pub(crate) fn send(&self, job: JobId, command: &str) -> Result<()> {
        self.engine
            .send(job, command)
            .map_err(Error::Protocol)
    }

    /// Release a job's engine-side resources.
    pub(crate) fn finish(&self, job: JobId) {
        self.engine.finish(job);
    }

    /// The queue engine callbacks land on.
    pub(crate) const fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    /// A sender feeding this session's queue (used by tests and by
    /// engine implementations that register late workers).
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.engine.teardown();
        SESSION_LIVE.store(false, Ordering::Release);
    }
}
