//! Scripted stub engine for end-to-end orchestration tests.
//!
//! The stub plays the native scheduler's role: it assigns job ids, queues
//! the callback lines it was scripted with at submission time, and records
//! every boundary call in an ordered op log so tests can assert sequencing
//! (for example, that a snapshot `save` goes out before `finish`).

use simbatch::{Engine, EventSender, JobId};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// One scripted callback for a job.
#[derive(Debug, Clone)]
pub enum Playback {
    /// Telemetry line delivered to the data-communication slot.
    Telemetry(String),
    /// Status line delivered to the status slot.
    Status(String),
}

/// One recorded boundary call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A script submission, with the joined command line.
    Submit(i32, String),
    /// A live command injection.
    Send(i32, String),
    /// Engine-side job release.
    Finish(i32),
}

/// Scripted engine stub. Each submission consumes the next playbook entry
/// and immediately queues its callbacks; the runner drains them afterwards
/// on its own thread, exactly as with a real engine's buffered channel.
#[derive(Default)]
pub struct StubEngine {
    events: Mutex<Option<EventSender>>,
    next_id: AtomicI32,
    playbook: Mutex<Vec<Vec<Playback>>>,
    log: Mutex<Vec<Op>>,
    reject_submissions: Mutex<Vec<usize>>,
    submissions_seen: AtomicI32,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(101),
            ..Self::default()
        }
    }

    /// Script the callbacks for the next submission (in submission order).
    pub fn play(&self, actions: Vec<Playback>) {
        self.playbook.lock().unwrap().push(actions);
    }

    /// Reject the nth submission (zero-based) with an engine error.
    pub fn reject_submission(&self, index: usize) {
        self.reject_submissions.lock().unwrap().push(index);
    }

    /// Ordered log of every boundary call.
    pub fn ops(&self) -> Vec<Op> {
        self.log.lock().unwrap().clone()
    }

    /// Live commands sent to one job, in order.
    pub fn commands_for(&self, job: i32) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Send(id, command) if id == job => Some(command),
                _ => None,
            })
            .collect()
    }
}

impl Engine for StubEngine {
    fn connect_events(&self, events: EventSender) {
        *self.events.lock().unwrap() = Some(events);
    }

    fn submit(
        &self,
        _model: &str,
        script: &str,
        _tracked_variables: &[String],
        _block_on_first_telemetry: bool,
    ) -> Result<JobId, String> {
        let submission = self.submissions_seen.fetch_add(1, Ordering::SeqCst) as usize;
        if self.reject_submissions.lock().unwrap().contains(&submission) {
            return Err("scripted rejection".to_string());
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.log
            .lock()
            .unwrap()
            .push(Op::Submit(id.0, script.to_string()));

        let mut playbook = self.playbook.lock().unwrap();
        let actions = if playbook.is_empty() {
            Vec::new()
        } else {
            playbook.remove(0)
        };
        let events = self.events.lock().unwrap();
        let events = events.as_ref().expect("events connected before submit");
        for action in actions {
            match action {
                Playback::Telemetry(line) => events.telemetry(id, line),
                Playback::Status(text) => events.status(id, text),
            }
        }
        Ok(id)
    }

    fn send(&self, job: JobId, command: &str) -> Result<(), String> {
        self.log
            .lock()
            .unwrap()
            .push(Op::Send(job.0, command.to_string()));
        Ok(())
    }

    fn set_parallel_jobs(&self, _jobs: usize) {}
    fn set_max_job_reuse(&self, _reuse: usize) {}
    fn set_log_detail(&self, _level: u32) {}

    fn finish(&self, job: JobId) {
        self.log.lock().unwrap().push(Op::Finish(job.0));
    }

    fn teardown(&self) {}
}

/// Serializes tests that open an engine session: only one session may be
/// live per process.
pub fn session_guard() -> MutexGuard<'static, ()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
