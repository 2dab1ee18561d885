use std::sync::{Arc, Mutex, PoisonError};

type AbortHook = Box<dyn FnOnce() + Send>;

/// Handle to a hook registered with [`AbortSignal::on_abort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbortHookId(u64);

#[derive(Default)]
struct SignalState {
    aborted: bool,
    next_hook: u64,
    hooks: Vec<(AbortHookId, AbortHook)>,
}

/// Owner side of a cancellation signal.
///
/// Calling `abort` triggers every `AbortSignal` handed out by this controller.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that observes this controller.
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Triggers the signal. Idempotent.
    pub fn abort(&self) {
        self.signal.abort();
    }
}

/// Cancellation signal shared between a controller and its observers.
#[derive(Clone, Default)]
pub struct AbortSignal {
    state: Arc<Mutex<SignalState>>,
}

impl AbortSignal {
    /// Returns true once the owning controller has aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .aborted
    }

    /// Registers a hook that runs once when the signal is aborted.
    ///
    /// If the signal is already aborted the hook runs immediately.
    pub fn on_abort<F>(&self, hook: F) -> AbortHookId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = AbortHookId(state.next_hook);
        state.next_hook += 1;
        if state.aborted {
            drop(state);
            hook();
            return id;
        }
        state.hooks.push((id, Box::new(hook)));
        id
    }

    /// Drops a pending hook without running it.
    ///
    /// Returns false if the hook already ran or was removed.
    pub fn remove_hook(&self, id: AbortHookId) -> bool {
        let removed = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state
                .hooks
                .iter()
                .position(|(hook_id, _)| *hook_id == id)
                .map(|pos| state.hooks.remove(pos))
        };
        removed.is_some()
    }

    /// Number of hooks waiting for the abort.
    #[must_use]
    pub fn pending_hooks(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hooks
            .len()
    }

    fn abort(&self) {
        let hooks = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.aborted {
                return;
            }
            state.aborted = true;
            std::mem::take(&mut state.hooks)
        };
        // Hooks run outside the lock so they may inspect the signal.
        for (_, hook) in hooks {
            hook();
        }
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn abort_runs_hooks_once() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        signal.on_abort(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!signal.is_aborted());

        controller.abort();
        controller.abort();

        assert!(signal.is_aborted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hook_registered_after_abort_runs_immediately() {
        let controller = AbortController::new();
        controller.abort();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        controller.signal().on_abort(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_hook_never_runs() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let id = signal.on_abort(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(signal.pending_hooks(), 1);
        assert!(signal.remove_hook(id));
        assert!(!signal.remove_hook(id));
        assert_eq!(signal.pending_hooks(), 0);

        controller.abort();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cloned_controllers_share_signal() {
        let controller = AbortController::new();
        let other = controller.clone();
        other.abort();
        assert!(controller.signal().is_aborted());
    }
}
