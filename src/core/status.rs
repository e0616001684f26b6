//! Observable task status rows and the sink tasks publish through.

use serde::{Deserialize, Serialize};

use crate::core::task::TaskId;

/// Snapshot of a single task's observable state.
///
/// Rows live in the queue's status table and are handed out by
/// [`TaskQueue::view_task_status`](crate::TaskQueue::view_task_status). The
/// `rev` counter is managed by the queue: task-driven updates are re-stamped
/// with the row's current revision, and queue-driven rewrites (countdown
/// messages) bump it, so `rev` is non-decreasing per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Identifier of the task this row describes.
    pub task_id: TaskId,

    /// Human-readable progress or countdown text.
    pub message: String,

    /// Whether the task is currently paused.
    pub paused: bool,

    /// Set on the final status delivered when a task retires.
    pub complete: bool,

    /// Queue-managed revision counter, non-decreasing per `task_id`.
    pub rev: i64,

    /// Opaque client data carried alongside the queue-managed fields.
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl TaskStatus {
    /// Create an empty status row for the given task.
    #[must_use]
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            message: String::new(),
            paused: false,
            complete: false,
            rev: 0,
            detail: serde_json::Value::Null,
        }
    }
}

/// Interface through which a task pushes status updates to its queue.
///
/// The queue installs a sink on every task at submission. Publishing replaces
/// the matching status-table row in place (preserving the row's `rev`) and
/// notifies registered status-changed observers. Publishing after the task
/// has retired no longer updates the table but still notifies observers,
/// which is how the final `complete = true` status is delivered.
pub trait StatusSink: Send + Sync {
    /// Push a status update into the queue's status table.
    fn publish(&self, status: TaskStatus);
}
