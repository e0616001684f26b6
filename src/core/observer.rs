//! Status-changed observer registry.

use parking_lot::Mutex;

/// Opaque handle identifying one observer registration.
///
/// Returned by
/// [`TaskQueue::add_status_changed_callback`](crate::TaskQueue::add_status_changed_callback)
/// and required for removal. Tokens are unique per registration, so the same
/// closure may be registered more than once and each registration removed
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

type Callback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    next_token: u64,
    observers: Vec<(ObserverToken, Callback)>,
}

/// Registry of status-changed callbacks, guarded by its own mutex.
///
/// Callbacks are invoked with no queue locks held other than the registry's
/// own; they must not call back into the queue.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    state: Mutex<RegistryState>,
}

impl ObserverRegistry {
    pub(crate) fn add(&self, callback: Callback) -> ObserverToken {
        let mut state = self.state.lock();
        let token = ObserverToken(state.next_token);
        state.next_token += 1;
        state.observers.push((token, callback));
        token
    }

    /// Remove a registration. Unknown tokens are a silent no-op.
    pub(crate) fn remove(&self, token: ObserverToken) {
        let mut state = self.state.lock();
        if let Some(pos) = state.observers.iter().position(|(t, _)| *t == token) {
            state.observers.remove(pos);
        }
    }

    pub(crate) fn notify_all(&self) {
        let state = self.state.lock();
        for (_, callback) in &state.observers {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_tokens_are_unique() {
        let registry = ObserverRegistry::default();
        let a = registry.add(Box::new(|| {}));
        let b = registry.add(Box::new(|| {}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_notify_reaches_every_observer() {
        let registry = ObserverRegistry::default();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            registry.add(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        registry.notify_all();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_remove_affects_only_that_registration() {
        let registry = ObserverRegistry::default();
        let count = Arc::new(AtomicUsize::new(0));

        let count_a = Arc::clone(&count);
        let a = registry.add(Box::new(move || {
            count_a.fetch_add(1, Ordering::SeqCst);
        }));
        let count_b = Arc::clone(&count);
        let _b = registry.add(Box::new(move || {
            count_b.fetch_add(1, Ordering::SeqCst);
        }));

        registry.remove(a);
        registry.notify_all();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_unknown_token_is_noop() {
        let registry = ObserverRegistry::default();
        let token = registry.add(Box::new(|| {}));
        registry.remove(token);
        registry.remove(token); // second removal: nothing to do
        registry.notify_all();
    }
}
