//! Error types for queue construction.

use thiserror::Error;

/// Errors produced while building a [`TaskQueue`](crate::TaskQueue).
///
/// Once a queue is running, its operations are infallible from the caller's
/// perspective: cancelling an unknown task or removing an unregistered
/// observer are silent no-ops.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An OS thread could not be spawned.
    #[error("failed to spawn {role} thread: {source}")]
    ThreadSpawn {
        /// Which thread failed to start ("worker" or "admin").
        role: &'static str,
        /// The underlying OS error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::InvalidConfig("worker_count must be greater than 0".into());
        assert_eq!(
            format!("{err}"),
            "invalid configuration: worker_count must be greater than 0"
        );

        let err = QueueError::ThreadSpawn {
            role: "worker",
            source: std::io::Error::new(std::io::ErrorKind::Other, "out of pids"),
        };
        assert!(format!("{err}").contains("failed to spawn worker thread"));
    }
}
