//! The task capability contract and a ready-made closure-backed task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::queue::QueueHandle;
use crate::core::status::{StatusSink, TaskStatus};

/// Unique task identifier, assigned by the client before submission.
pub type TaskId = i64;

/// Outcome of a single [`Task::perform`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAgain {
    /// Keep the task scheduled.
    Yes,
    /// Retire the task regardless of its period.
    No,
}

/// A client-supplied unit of deferred work with its own schedule, status,
/// and pause/cancel controls.
///
/// The queue takes over the task's lifecycle on submission: it installs a
/// [`StatusSink`] and a [`QueueHandle`] back-reference, schedules the first
/// run `timeout_ms` milliseconds out, and calls [`perform`](Task::perform)
/// with no queue locks held. Implementations therefore need interior
/// mutability for their flags; every method takes `&self`.
pub trait Task: Send + Sync + 'static {
    /// Stable identifier, unique across tasks submitted to the same queue.
    fn task_id(&self) -> TaskId;

    /// Schedule period in milliseconds. `0` means one-shot: run once, then
    /// retire. Positive values rerun the task that many milliseconds after
    /// each completion. Must not be negative.
    fn timeout_ms(&self) -> i64;

    /// Whether the scheduler should currently skip this task.
    fn paused(&self) -> bool;

    /// Set the paused flag. Implementations should publish a status update
    /// so the row's `paused` field tracks the flag.
    fn set_paused(&self, paused: bool);

    /// Request early termination. Advisory: the task is expected to make its
    /// next [`perform`](Task::perform) return quickly with [`RunAgain::No`].
    fn cancel(&self);

    /// The actual work. May block; invoked with no queue locks held and on
    /// at most one worker at a time.
    fn perform(&self) -> RunAgain;

    /// Current status snapshot.
    fn status(&self) -> TaskStatus;

    /// Replace the status snapshot and forward it through the attached sink.
    /// The queue uses this to deliver the final `complete = true` status
    /// when the task retires.
    fn update_status(&self, status: TaskStatus);

    /// Prefix for countdown text; the admin thread appends the remaining
    /// whole seconds until the next run.
    fn timeout_message(&self) -> String;

    /// Called once at submission with a weak back-reference to the queue,
    /// so the task can self-cancel or submit follow-up work.
    fn attach_queue(&self, queue: QueueHandle);

    /// Called once at submission with the sink status updates flow through.
    fn attach_status_sink(&self, sink: Arc<dyn StatusSink>);
}

type WorkFn = Box<dyn Fn(&FnTask) -> RunAgain + Send + Sync>;

struct FnTaskShared {
    status: TaskStatus,
    sink: Option<Arc<dyn StatusSink>>,
    queue: Option<QueueHandle>,
}

/// A [`Task`] backed by a closure.
///
/// Covers the common case where a task is just a work function plus a
/// schedule. The closure receives the task itself, giving it access to
/// [`cancelled`](FnTask::cancelled), [`set_message`](FnTask::set_message),
/// and [`queue`](FnTask::queue) for self-cancellation or chaining.
///
/// ```
/// use std::sync::Arc;
/// use taskmill::{FnTask, RunAgain, Task};
///
/// let task = FnTask::new(42, 500, |task| {
///     task.set_message("synced");
///     RunAgain::Yes
/// });
/// assert_eq!(task.timeout_ms(), 500);
/// # let _ = Arc::new(task);
/// ```
pub struct FnTask {
    id: TaskId,
    timeout_ms: i64,
    timeout_message: String,
    paused: AtomicBool,
    cancelled: AtomicBool,
    work: WorkFn,
    shared: Mutex<FnTaskShared>,
}

impl FnTask {
    /// Create a task from an id, a period (`0` for one-shot), and a work
    /// closure.
    pub fn new(
        id: TaskId,
        timeout_ms: i64,
        work: impl Fn(&FnTask) -> RunAgain + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            timeout_ms,
            timeout_message: "Next run in ".to_string(),
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            work: Box::new(work),
            shared: Mutex::new(FnTaskShared {
                status: TaskStatus::new(id),
                sink: None,
                queue: None,
            }),
        }
    }

    /// Set the countdown text prefix shown while the task waits.
    #[must_use]
    pub fn with_timeout_message(mut self, message: impl Into<String>) -> Self {
        self.timeout_message = message.into();
        self
    }

    /// Whether [`cancel`](Task::cancel) has been requested.
    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// The queue this task was submitted to, if any.
    pub fn queue(&self) -> Option<QueueHandle> {
        self.shared.lock().queue.clone()
    }

    /// Update the status message and publish the new snapshot.
    pub fn set_message(&self, message: impl Into<String>) {
        {
            let mut shared = self.shared.lock();
            shared.status.message = message.into();
        }
        self.publish();
    }

    /// Update the opaque detail payload and publish the new snapshot.
    pub fn set_detail(&self, detail: serde_json::Value) {
        {
            let mut shared = self.shared.lock();
            shared.status.detail = detail;
        }
        self.publish();
    }

    /// Push the current snapshot through the attached sink, if any.
    fn publish(&self) {
        let (status, sink) = {
            let shared = self.shared.lock();
            (shared.status.clone(), shared.sink.clone())
        };
        if let Some(sink) = sink {
            sink.publish(status);
        }
    }
}

impl Task for FnTask {
    fn task_id(&self) -> TaskId {
        self.id
    }

    fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        {
            let mut shared = self.shared.lock();
            shared.status.paused = paused;
        }
        self.publish();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn perform(&self) -> RunAgain {
        if self.cancelled() {
            return RunAgain::No;
        }
        (self.work)(self)
    }

    fn status(&self) -> TaskStatus {
        self.shared.lock().status.clone()
    }

    fn update_status(&self, status: TaskStatus) {
        {
            let mut shared = self.shared.lock();
            shared.status = status;
        }
        self.publish();
    }

    fn timeout_message(&self) -> String {
        self.timeout_message.clone()
    }

    fn attach_queue(&self, queue: QueueHandle) {
        self.shared.lock().queue = Some(queue);
    }

    fn attach_status_sink(&self, sink: Arc<dyn StatusSink>) {
        self.shared.lock().sink = Some(sink);
    }
}
