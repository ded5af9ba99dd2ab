//! Progress state and one-shot failure notifications for the UI boundary

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Progress of remote store operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    #[default]
    Idle,
    InProgress,
    Success,
}

/// Tracks in-flight store operations and holds at most one pending failure.
///
/// Cheap to clone; clones share the same state, so a UI can keep one while
/// the engine drives it.
#[derive(Debug, Clone)]
pub struct ViewStateMachine {
    state: Arc<watch::Sender<ViewState>>,
    failure: Arc<watch::Sender<Option<String>>>,
    active: Arc<AtomicUsize>,
}

impl Default for ViewStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStateMachine {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ViewState::Idle);
        let (failure, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
            failure: Arc::new(failure),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> ViewState {
        *self.state.borrow()
    }

    pub fn is_in_progress(&self) -> bool {
        self.state() == ViewState::InProgress
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    /// Notified whenever a failure is posted or taken
    pub fn subscribe_failures(&self) -> watch::Receiver<Option<String>> {
        self.failure.subscribe()
    }

    /// Enter `InProgress` until the returned guard is dropped.
    ///
    /// Overlapping guards are counted; the state moves to `Success` when the
    /// last one drops, whether the operation succeeded or not.
    #[must_use = "the operation is only in progress while the guard is alive"]
    pub fn begin(&self) -> InProgressGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(ViewState::InProgress);
        InProgressGuard {
            machine: self.clone(),
        }
    }

    /// Post a failure. An unobserved earlier failure is overwritten.
    ///
    /// The state resets to `Success` only when no other operation is still
    /// in progress; otherwise the last guard to drop does it.
    pub fn fail(&self, detail: impl Into<String>) {
        self.failure.send_replace(Some(detail.into()));
        if self.active.load(Ordering::SeqCst) == 0 {
            self.state.send_replace(ViewState::Success);
        }
    }

    /// Take the pending failure, if any. Each failure is returned once.
    pub fn take_failure(&self) -> Option<String> {
        let mut taken = None;
        self.failure.send_if_modified(|slot| {
            taken = slot.take();
            taken.is_some()
        });
        taken
    }

    /// Look at the pending failure without acknowledging it
    pub fn pending_failure(&self) -> Option<String> {
        self.failure.borrow().clone()
    }

    fn finish(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.send_replace(ViewState::Success);
        }
    }
}

/// Scope of one store operation; see [`ViewStateMachine::begin`]
#[derive(Debug)]
pub struct InProgressGuard {
    machine: ViewStateMachine,
}

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        self.machine.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let view = ViewStateMachine::new();
        assert_eq!(view.state(), ViewState::Idle);
        assert!(view.take_failure().is_none());
    }

    #[test]
    fn test_guard_scopes_in_progress() {
        let view = ViewStateMachine::new();
        {
            let _guard = view.begin();
            assert!(view.is_in_progress());
        }
        assert_eq!(view.state(), ViewState::Success);
    }

    #[test]
    fn test_nested_guards() {
        let view = ViewStateMachine::new();
        let outer = view.begin();
        {
            let _inner = view.begin();
        }
        assert!(view.is_in_progress());
        drop(outer);
        assert_eq!(view.state(), ViewState::Success);
    }

    #[test]
    fn test_failure_is_one_shot() {
        let view = ViewStateMachine::new();
        {
            let _guard = view.begin();
            view.fail("insert failed");
        }

        assert_eq!(view.state(), ViewState::Success);
        assert_eq!(view.take_failure().as_deref(), Some("insert failed"));
        assert!(view.take_failure().is_none());
    }

    #[test]
    fn test_failure_keeps_overlapping_operation_in_progress() {
        let view = ViewStateMachine::new();
        let vote = view.begin();
        {
            let _create = view.begin();
        }
        view.fail("create failed");

        assert!(view.is_in_progress());
        assert_eq!(view.pending_failure().as_deref(), Some("create failed"));
        drop(vote);
        assert_eq!(view.state(), ViewState::Success);
    }

    #[test]
    fn test_fail_without_operation_resets_to_success() {
        let view = ViewStateMachine::new();
        view.fail("late");
        assert_eq!(view.state(), ViewState::Success);
    }

    #[test]
    fn test_unobserved_failure_is_overwritten() {
        let view = ViewStateMachine::new();
        view.fail("first");
        view.fail("second");

        assert_eq!(view.pending_failure().as_deref(), Some("second"));
        assert_eq!(view.take_failure().as_deref(), Some("second"));
        assert!(view.take_failure().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let view = ViewStateMachine::new();
        let ui = view.clone();

        view.fail("boom");
        assert_eq!(ui.take_failure().as_deref(), Some("boom"));
        assert!(view.pending_failure().is_none());
    }

    #[tokio::test]
    async fn test_failure_wakes_subscribers() {
        let view = ViewStateMachine::new();
        let mut rx = view.subscribe_failures();

        view.fail("fetch failed");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_deref(), Some("fetch failed"));

        view.take_failure();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
