//! # taskmill
//!
//! An in-process task queue that schedules recurring and one-shot background
//! tasks over a bounded, resizable pool of worker threads.
//!
//! Clients submit [`Task`]s carrying their own work function, delay/period,
//! and status model; the queue polls them at the right times, runs one task
//! at a time per worker, reports progress through an observable status
//! table, and supports pause, cancel, and live pool resizing. A dedicated
//! admin thread keeps human-readable "time until next run" messages fresh.
//!
//! ## Modules
//!
//! - [`config`] - Queue configuration with serde defaults and validation
//! - [`core`] - The [`Task`] contract, [`TaskStatus`] table, and [`TaskQueue`]
//! - [`util`] - Clock and telemetry helpers
//!
//! ## Examples
//!
//! ### A recurring task
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use taskmill::{FnTask, QueueConfig, RunAgain, TaskQueue};
//!
//! let queue = TaskQueue::new(QueueConfig::new("housekeeping").with_worker_count(2))?;
//!
//! let sweeps = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&sweeps);
//! let task = FnTask::new(1, 25, move |_| {
//!     // Stop after three runs.
//!     if counter.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
//!         RunAgain::Yes
//!     } else {
//!         RunAgain::No
//!     }
//! })
//! .with_timeout_message("Sweeping again in ");
//!
//! queue.add_task(Arc::new(task));
//! # std::thread::sleep(std::time::Duration::from_millis(500));
//! assert_eq!(sweeps.load(Ordering::SeqCst), 3);
//! # Ok::<(), taskmill::QueueError>(())
//! ```
//!
//! ### Watching the status table
//!
//! ```
//! use taskmill::TaskQueue;
//!
//! let queue = TaskQueue::with_threads("watcher", 1)?;
//! let token = queue.add_status_changed_callback(|| {
//!     // Signal a UI refresh; must not call back into the queue.
//! });
//! queue.view_task_status(|rows| assert!(rows.is_empty()));
//! queue.remove_status_changed_callback(token);
//! # Ok::<(), taskmill::QueueError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod core;
pub mod util;

// Re-export main types for convenience
pub use crate::config::QueueConfig;
pub use crate::core::{
    FnTask, ObserverToken, QueueError, QueueHandle, RunAgain, StatusSink, Task, TaskId, TaskQueue,
    TaskStatus,
};
