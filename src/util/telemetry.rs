//! Telemetry bootstrap for structured logging.

/// Install a default env-filtered fmt subscriber if the host application has
/// not already set one.
///
/// The queue only emits `tracing` events; calling this is optional and
/// mainly useful in tests and examples. Applications with their own
/// subscriber can skip it entirely.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
