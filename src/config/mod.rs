//! Configuration models for the task queue.

pub mod queue;

pub use queue::QueueConfig;
