//! The task queue: facade, worker sweep loop, and admin ticker.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::core::error::QueueError;
use crate::core::observer::{ObserverRegistry, ObserverToken};
use crate::core::status::{StatusSink, TaskStatus};
use crate::core::task::{RunAgain, Task, TaskId};
use crate::util::clock::now_ms;

/// Per-task scheduling metadata. Owned exclusively by the queue; workers
/// borrow records under the primary lock and clone the task `Arc` to run it
/// with the lock released. `active` guarantees at-most-one worker per record.
struct TaskRecord {
    task: Arc<dyn Task>,
    /// Absolute millisecond timestamp at/after which the task is eligible.
    next_run: i64,
    active: bool,
}

/// Everything guarded by the primary mutex.
struct QueueState {
    tasks: Vec<TaskRecord>,
    /// Scan cursor; workers race over it, restarting at 0 after each sweep.
    next_task_index: usize,
    work_done: bool,
    /// Minimum delay observed during the current sweep, ms.
    wait_for: i64,
    configured_workers: usize,
    active_workers: usize,
}

struct Inner {
    thread_name: String,
    stack_size: usize,
    admin_tick: Duration,

    state: Mutex<QueueState>,
    work_cond: Condvar,
    admin_cond: Condvar,
    worker_exit_cond: Condvar,

    statuses: Mutex<Vec<TaskStatus>>,
    observers: ObserverRegistry,

    finish: AtomicBool,
}

/// Sink installed on every submitted task; routes task-driven status updates
/// into the status table.
struct QueueStatusSink {
    inner: Weak<Inner>,
}

impl StatusSink for QueueStatusSink {
    fn publish(&self, status: TaskStatus) {
        if let Some(inner) = self.inner.upgrade() {
            inner.update_status_row(status);
        }
    }
}

impl Inner {
    /// Replace the matching status row in place, preserving the row's `rev`,
    /// then notify observers. A retired task has no row; the notification
    /// still fires so observers see the final update.
    fn update_status_row(&self, status: TaskStatus) {
        {
            let mut rows = self.statuses.lock();
            if let Some(row) = rows.iter_mut().find(|r| r.task_id == status.task_id) {
                let rev = row.rev;
                *row = status;
                row.rev = rev;
            }
        }
        self.observers.notify_all();
    }

    fn cancel_task(&self, task_id: TaskId) {
        let mut state = self.state.lock();
        if let Some(record) = state
            .tasks
            .iter_mut()
            .find(|r| r.task.task_id() == task_id)
        {
            record.task.cancel();
            // Pull the run forward so the next sweep dispatches the task and
            // its perform, seeing the flag, retires it promptly.
            record.next_run = 0;
            self.work_cond.notify_all();
        }
    }

    fn pause_task(&self, task_id: TaskId, paused: bool) {
        let state = self.state.lock();
        if let Some(record) = state.tasks.iter().find(|r| r.task.task_id() == task_id) {
            record.task.set_paused(paused);
            self.work_cond.notify_all();
        }
    }

    fn toggle_pause_task(&self, task_id: TaskId) {
        let state = self.state.lock();
        if let Some(record) = state.tasks.iter().find(|r| r.task.task_id() == task_id) {
            record.task.set_paused(!record.task.paused());
            self.work_cond.notify_all();
        }
    }

    fn view_task_status<R>(&self, f: impl FnOnce(&[TaskStatus]) -> R) -> R {
        let rows = self.statuses.lock();
        f(&rows)
    }

    /// Rewrite countdown messages for records that are waiting or paused.
    /// Observers are notified only if some message text actually changed.
    fn refresh_waiting_messages(&self) {
        let mut changed = false;
        {
            let state = self.state.lock();
            let now = now_ms();
            for record in &state.tasks {
                if record.active {
                    continue;
                }
                if record.next_run <= now && !record.task.paused() {
                    continue;
                }
                let remaining_s = (record.next_run - now).max(0) / 1000;
                let task_id = record.task.task_id();
                let mut rows = self.statuses.lock();
                if let Some(row) = rows.iter_mut().find(|r| r.task_id == task_id) {
                    let message = if row.paused {
                        "Paused.".to_string()
                    } else if remaining_s == 0 {
                        "Waiting for thread.".to_string()
                    } else {
                        format!("{}{remaining_s}", record.task.timeout_message())
                    };
                    if row.message != message {
                        row.message = message;
                        row.rev += 1;
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.observers.notify_all();
        }
    }

    /// Set `finish`, cancel everything, wake the workers, and block until
    /// the last one has exited.
    fn shutdown_workers(&self) {
        self.finish.store(true, Ordering::Release);
        let mut state = self.state.lock();
        for record in &state.tasks {
            record.task.cancel();
        }
        self.work_cond.notify_all();
        while state.active_workers > 0 {
            self.worker_exit_cond.wait(&mut state);
        }
    }
}

/// Spawn workers until the active count reaches the configured count.
/// Called with the primary lock held; each counter increment precedes its
/// spawn so an exiting worker can never underflow the count.
fn add_threads(inner: &Arc<Inner>, state: &mut QueueState) -> Result<(), QueueError> {
    while state.active_workers < state.configured_workers {
        state.active_workers += 1;
        let worker_inner = Arc::clone(inner);
        let spawn = thread::Builder::new()
            .name(inner.thread_name.clone())
            .stack_size(inner.stack_size)
            .spawn(move || worker_loop(&worker_inner));
        if let Err(source) = spawn {
            state.active_workers -= 1;
            return Err(QueueError::ThreadSpawn {
                role: "worker",
                source,
            });
        }
    }
    Ok(())
}

fn add_task_impl(inner: &Arc<Inner>, task: Arc<dyn Task>) {
    debug_assert!(task.timeout_ms() >= 0, "timeout_ms must be non-negative");

    // Attach before the record becomes visible: a worker may dispatch the
    // task the moment it lands in the list.
    task.attach_queue(QueueHandle {
        inner: Arc::downgrade(inner),
    });
    task.attach_status_sink(Arc::new(QueueStatusSink {
        inner: Arc::downgrade(inner),
    }));

    let mut state = inner.state.lock();
    if inner.finish.load(Ordering::Acquire) {
        warn!(task_id = task.task_id(), "task submitted during shutdown, dropping");
        return;
    }
    debug_assert!(
        state.tasks.iter().all(|r| r.task.task_id() != task.task_id()),
        "duplicate task_id"
    );

    let initial = task.status();
    let next_run = now_ms() + task.timeout_ms();
    debug!(
        task_id = task.task_id(),
        timeout_ms = task.timeout_ms(),
        "task added"
    );
    state.tasks.push(TaskRecord {
        task,
        next_run,
        active: false,
    });
    inner.statuses.lock().push(initial);
    inner.work_cond.notify_one();
    drop(state);

    inner.observers.notify_all();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_string())
}

/// The worker loop. Holds the primary lock except while a task body runs.
///
/// Each pass either advances the scan cursor over one record or, at the end
/// of a sweep, parks on the work condvar for the shortest delay observed.
fn worker_loop(inner: &Arc<Inner>) {
    debug!(worker = %inner.thread_name, "worker thread started");
    let mut state = inner.state.lock();
    while !inner.finish.load(Ordering::Acquire) {
        if state.active_workers > state.configured_workers {
            debug!(worker = %inner.thread_name, "worker exiting to shrink pool");
            break;
        }

        if state.next_task_index < state.tasks.len() {
            let idx = state.next_task_index;
            state.next_task_index += 1;

            let (active, paused, next_run) = {
                let record = &state.tasks[idx];
                (record.active, record.task.paused(), record.next_run)
            };
            if active || paused {
                continue;
            }

            let delay = next_run - now_ms();
            if delay < state.wait_for {
                state.wait_for = delay;
            }
            if delay > 0 {
                continue;
            }

            state.tasks[idx].active = true;
            state.work_done = true;
            let task = Arc::clone(&state.tasks[idx].task);
            drop(state);

            let outcome = catch_unwind(AssertUnwindSafe(|| task.perform()));
            let (run_again, failure) = match outcome {
                Ok(run_again) => (run_again, None),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(task_id = task.task_id(), %reason, "task body panicked");
                    (RunAgain::No, Some(reason))
                }
            };

            state = inner.state.lock();
            let task_id = task.task_id();
            if task.timeout_ms() < 1 || run_again == RunAgain::No {
                // Retire. The record may have shifted while the lock was
                // released, so locate it by id.
                if let Some(pos) = state.tasks.iter().position(|r| r.task.task_id() == task_id) {
                    if pos < state.next_task_index {
                        state.next_task_index -= 1;
                    }
                    state.tasks.remove(pos);
                }
                {
                    let mut rows = inner.statuses.lock();
                    if let Some(pos) = rows.iter().position(|r| r.task_id == task_id) {
                        rows.remove(pos);
                    }
                }
                drop(state);

                let mut final_status = task.status();
                final_status.complete = true;
                if let Some(reason) = failure {
                    final_status.message = format!("Task failed: {reason}");
                }
                task.update_status(final_status);
                debug!(task_id, "task retired");

                state = inner.state.lock();
            } else if let Some(record) = state
                .tasks
                .iter_mut()
                .find(|r| r.task.task_id() == task_id)
            {
                if task.timeout_ms() > 0 {
                    record.next_run = now_ms() + task.timeout_ms();
                }
                record.active = false;
            }
        }

        if state.next_task_index >= state.tasks.len() {
            state.next_task_index = 0;

            let w = state.wait_for;
            state.wait_for = i64::MAX;

            if state.work_done {
                state.work_done = false;
            } else if w == i64::MAX {
                inner.work_cond.wait(&mut state);
            } else {
                // A negative estimate means an eligible record was skipped
                // mid-sweep; clamp to zero and re-sweep immediately.
                let wait = Duration::from_millis(u64::try_from(w).unwrap_or(0));
                let _ = inner.work_cond.wait_for(&mut state, wait);
            }
        }
    }
    state.active_workers -= 1;
    inner.worker_exit_cond.notify_all();
    drop(state);
    debug!(worker = %inner.thread_name, "worker thread exiting");
}

/// The admin loop: once per tick (or when signaled at shutdown), refresh
/// countdown messages.
fn admin_loop(inner: &Arc<Inner>) {
    debug!(admin = %inner.thread_name, "admin thread started");
    let mut state = inner.state.lock();
    while !inner.finish.load(Ordering::Acquire) {
        let _ = inner.admin_cond.wait_for(&mut state, inner.admin_tick);
        if inner.finish.load(Ordering::Acquire) {
            break;
        }
        drop(state);
        inner.refresh_waiting_messages();
        state = inner.state.lock();
    }
    drop(state);
    debug!(admin = %inner.thread_name, "admin thread exiting");
}

/// A multi-threaded, in-process queue for recurring and one-shot background
/// tasks.
///
/// `nThreads` workers poll submitted tasks at their scheduled times and run
/// one task body at a time each; an admin thread refreshes human-readable
/// countdown messages in the status table. Dropping the queue cancels every
/// task and blocks until in-flight work has drained.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use taskmill::{FnTask, QueueConfig, RunAgain, TaskQueue};
///
/// let queue = TaskQueue::new(QueueConfig::new("uploads").with_worker_count(2))?;
/// let uploads = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&uploads);
/// queue.add_task(Arc::new(FnTask::new(1, 0, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     RunAgain::No
/// })));
/// # std::thread::sleep(std::time::Duration::from_millis(300));
/// assert_eq!(uploads.load(Ordering::SeqCst), 1);
/// # Ok::<(), taskmill::QueueError>(())
/// ```
pub struct TaskQueue {
    inner: Arc<Inner>,
    admin: Option<JoinHandle<()>>,
}

impl TaskQueue {
    /// Start a queue: `config.worker_count` worker threads plus the admin
    /// thread (named by prefixing `#` to the worker name).
    ///
    /// # Errors
    ///
    /// [`QueueError::InvalidConfig`] if validation fails,
    /// [`QueueError::ThreadSpawn`] if the OS refuses a thread.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate().map_err(QueueError::InvalidConfig)?;

        let inner = Arc::new(Inner {
            thread_name: config.thread_name.clone(),
            stack_size: config.thread_stack_size,
            admin_tick: Duration::from_millis(config.admin_tick_ms),
            state: Mutex::new(QueueState {
                tasks: Vec::new(),
                next_task_index: 0,
                work_done: false,
                wait_for: i64::MAX,
                configured_workers: config.worker_count,
                active_workers: 0,
            }),
            work_cond: Condvar::new(),
            admin_cond: Condvar::new(),
            worker_exit_cond: Condvar::new(),
            statuses: Mutex::new(Vec::new()),
            observers: ObserverRegistry::default(),
            finish: AtomicBool::new(false),
        });

        {
            let mut state = inner.state.lock();
            if let Err(err) = add_threads(&inner, &mut state) {
                drop(state);
                inner.shutdown_workers();
                return Err(err);
            }
        }

        let admin_inner = Arc::clone(&inner);
        let admin = thread::Builder::new()
            .name(format!("#{}", config.thread_name))
            .spawn(move || admin_loop(&admin_inner))
            .map_err(|source| {
                inner.shutdown_workers();
                QueueError::ThreadSpawn {
                    role: "admin",
                    source,
                }
            })?;

        info!(
            thread_name = %config.thread_name,
            workers = config.worker_count,
            "task queue started"
        );

        Ok(Self {
            inner,
            admin: Some(admin),
        })
    }

    /// Shorthand for a default configuration with the given worker thread
    /// name and pool size.
    ///
    /// # Errors
    ///
    /// Same as [`TaskQueue::new`].
    pub fn with_threads(
        thread_name: impl Into<String>,
        worker_count: usize,
    ) -> Result<Self, QueueError> {
        Self::new(QueueConfig::new(thread_name).with_worker_count(worker_count))
    }

    /// A cloneable, non-owning handle to this queue.
    #[must_use]
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Submit a task. The queue takes over its lifecycle: the first run is
    /// scheduled `timeout_ms` milliseconds out, an initial status row is
    /// published, and a status sink plus queue back-reference are installed.
    pub fn add_task(&self, task: Arc<dyn Task>) {
        add_task_impl(&self.inner, task);
    }

    /// Forward a cancel request to the matching task and wake the workers.
    /// Removal happens in the worker that next dispatches the task and sees
    /// it return [`RunAgain::No`]. Unknown ids are a silent no-op.
    pub fn cancel_task(&self, task_id: TaskId) {
        self.inner.cancel_task(task_id);
    }

    /// Set the matching task's paused flag and wake the workers so the
    /// sweep re-evaluates. Unknown ids are a silent no-op.
    pub fn pause_task(&self, task_id: TaskId, paused: bool) {
        self.inner.pause_task(task_id, paused);
    }

    /// Flip the matching task's paused flag. Unknown ids are a silent no-op.
    pub fn toggle_pause_task(&self, task_id: TaskId) {
        self.inner.toggle_pause_task(task_id);
    }

    /// Invoke `f` with a consistent snapshot of the status table, held under
    /// the status lock. `f` must not call back into the queue.
    pub fn view_task_status<R>(&self, f: impl FnOnce(&[TaskStatus]) -> R) -> R {
        self.inner.view_task_status(f)
    }

    /// Current configured pool size.
    #[must_use]
    pub fn number_of_task_threads(&self) -> usize {
        self.inner.state.lock().configured_workers
    }

    /// Resize the pool. Growing spawns workers immediately. Shrinking is
    /// cooperative: surplus workers exit when they next observe the excess,
    /// so the count converges once running bodies return.
    pub fn set_number_of_task_threads(&self, count: usize) {
        let mut state = self.inner.state.lock();
        state.configured_workers = count;
        if let Err(err) = add_threads(&self.inner, &mut state) {
            warn!(error = %err, "could not grow worker pool");
        }
        self.inner.work_cond.notify_all();
    }

    /// Register an observer invoked after every status mutation. The
    /// callback must not call back into the queue.
    pub fn add_status_changed_callback(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> ObserverToken {
        self.inner.observers.add(Box::new(callback))
    }

    /// Unregister an observer. Unknown tokens are a silent no-op.
    pub fn remove_status_changed_callback(&self, token: ObserverToken) {
        self.inner.observers.remove(token);
    }
}

impl Drop for TaskQueue {
    /// Cancels every task, wakes the workers, waits until the last one has
    /// exited, then joins the admin thread and releases remaining records.
    fn drop(&mut self) {
        self.inner.shutdown_workers();
        {
            // Notify under the primary lock so the signal cannot slip into
            // the admin loop's window between its finish check and its wait.
            let _state = self.inner.state.lock();
            self.inner.admin_cond.notify_all();
        }
        if let Some(admin) = self.admin.take() {
            if admin.join().is_err() {
                error!("admin thread panicked");
            }
        }
        self.inner.state.lock().tasks.clear();
        info!(thread_name = %self.inner.thread_name, "task queue stopped");
    }
}

/// Weak back-reference to a [`TaskQueue`].
///
/// Installed on every task at submission so it can self-cancel, pause
/// itself, or chain follow-up work. Every operation is a silent no-op once
/// the queue has been dropped.
#[derive(Clone)]
pub struct QueueHandle {
    inner: Weak<Inner>,
}

impl QueueHandle {
    /// Submit a task; see [`TaskQueue::add_task`].
    pub fn add_task(&self, task: Arc<dyn Task>) {
        if let Some(inner) = self.inner.upgrade() {
            add_task_impl(&inner, task);
        }
    }

    /// Cancel a task; see [`TaskQueue::cancel_task`].
    pub fn cancel_task(&self, task_id: TaskId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_task(task_id);
        }
    }

    /// Pause or resume a task; see [`TaskQueue::pause_task`].
    pub fn pause_task(&self, task_id: TaskId, paused: bool) {
        if let Some(inner) = self.inner.upgrade() {
            inner.pause_task(task_id, paused);
        }
    }

    /// Flip a task's paused flag; see [`TaskQueue::toggle_pause_task`].
    pub fn toggle_pause_task(&self, task_id: TaskId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.toggle_pause_task(task_id);
        }
    }

    /// Snapshot the status table; see [`TaskQueue::view_task_status`].
    /// Returns `None` if the queue has been dropped.
    pub fn view_task_status<R>(&self, f: impl FnOnce(&[TaskStatus]) -> R) -> Option<R> {
        self.inner.upgrade().map(|inner| inner.view_task_status(f))
    }
}
