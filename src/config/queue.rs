//! Queue configuration structures.

use serde::{Deserialize, Serialize};

/// Default number of worker threads: the CPU count.
fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Default thread stack size: 2MB.
fn default_thread_stack_size() -> usize {
    2 * 1024 * 1024 // 2MB
}

/// Default admin tick interval in milliseconds: 1 second.
fn default_admin_tick_ms() -> u64 {
    1000
}

/// Default base name for worker threads.
fn default_thread_name() -> String {
    "taskmill".to_string()
}

/// Configuration for a [`TaskQueue`](crate::TaskQueue).
///
/// Worker threads all share `thread_name`; the admin thread that refreshes
/// countdown messages is named by prefixing `#`.
///
/// # Example
///
/// ```rust
/// use taskmill::QueueConfig;
///
/// let config = QueueConfig::new("indexer")
///     .with_worker_count(4)
///     .with_admin_tick_ms(500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Base name applied to every worker thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Number of worker threads started at construction.
    ///
    /// Default: `num_cpus::get()`. The pool can be resized later with
    /// [`TaskQueue::set_number_of_task_threads`](crate::TaskQueue::set_number_of_task_threads).
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Stack size per worker thread in bytes.
    ///
    /// Default: 2MB (2 * 1024 * 1024 bytes).
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,

    /// Interval in milliseconds at which the admin thread rewrites
    /// "time until next run" status messages.
    ///
    /// Default: 1000.
    #[serde(default = "default_admin_tick_ms")]
    pub admin_tick_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            worker_count: default_worker_count(),
            thread_stack_size: default_thread_stack_size(),
            admin_tick_ms: default_admin_tick_ms(),
        }
    }
}

impl QueueConfig {
    /// Create a configuration with the given worker thread name and default
    /// values for everything else.
    #[must_use]
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            ..Self::default()
        }
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the thread stack size in bytes.
    #[must_use]
    pub fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Set the admin tick interval in milliseconds.
    #[must_use]
    pub fn with_admin_tick_ms(mut self, tick_ms: u64) -> Self {
        self.admin_tick_ms = tick_ms;
        self
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty".into());
        }
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.admin_tick_ms == 0 {
            return Err("admin_tick_ms must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64KB".into());
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation failure description.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_count >= 1);
        assert_eq!(config.admin_tick_ms, 1000);
    }

    #[test]
    fn test_builder_methods() {
        let config = QueueConfig::new("db-maintenance")
            .with_worker_count(3)
            .with_thread_stack_size(128 * 1024)
            .with_admin_tick_ms(250);
        assert_eq!(config.thread_name, "db-maintenance");
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.thread_stack_size, 128 * 1024);
        assert_eq!(config.admin_tick_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = QueueConfig::new("x").with_worker_count(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let config = QueueConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_tiny_stack() {
        let config = QueueConfig::new("x").with_thread_stack_size(1024);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_str_applies_defaults() {
        let config = QueueConfig::from_json_str(r#"{"thread_name": "sync"}"#).unwrap();
        assert_eq!(config.thread_name, "sync");
        assert_eq!(config.admin_tick_ms, 1000);
        assert!(config.worker_count >= 1);
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        assert!(QueueConfig::from_json_str(r#"{"thread_name": ""}"#).is_err());
        assert!(QueueConfig::from_json_str("not json").is_err());
    }
}
