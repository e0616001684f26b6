//! Core queue types: the task capability contract, status model, observer
//! registry, and the queue itself.

pub mod error;
pub mod observer;
pub mod queue;
pub mod status;
pub mod task;

pub use error::QueueError;
pub use observer::ObserverToken;
pub use queue::{QueueHandle, TaskQueue};
pub use status::{StatusSink, TaskStatus};
pub use task::{FnTask, RunAgain, Task, TaskId};
