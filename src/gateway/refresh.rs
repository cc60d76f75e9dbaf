//! Refresh coordination state machine.
//!
//! The gate has two states, `Idle` and `Refreshing`, for the whole process
//! lifetime. The first request that decides a refresh is needed becomes the
//! leader; every overlapping request becomes a follower and parks on a oneshot
//! until the leader settles. The central invariant: the refresh call is never
//! issued more than once concurrently, enforced by this single state flag
//! rather than a counting semaphore.

use std::sync::Mutex;
use tokio::sync::oneshot;

/// How one refresh cycle ended. Cloneable so the leader's outcome can fan out
/// to every queued waiter.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// The credential was replaced; retry the original request once.
    Refreshed,
    /// Soft failure: no refresh credential present. The access credential may
    /// still be valid, so the session stays intact and the original request
    /// just fails.
    MissingRefreshToken(String),
    /// Hard failure: the session is gone. The leader has already cleared the
    /// store and navigated to login.
    Failed(String),
}

/// Role handed to a request that hit a 401 while holding no retry marker.
pub enum RefreshTicket {
    /// This request must perform the refresh call and then [`RefreshGate::settle`].
    Leader,
    /// A refresh is already in flight; await its outcome.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

enum GateState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

pub struct RefreshGate {
    state: Mutex<GateState>,
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }
}

impl RefreshGate {
    /// Single entry point: either become the leader (Idle -> Refreshing) or
    /// join the pending queue. The lock is never held across an await.
    pub fn join(&self) -> RefreshTicket {
        let mut state = self.state.lock().expect("refresh gate poisoned");
        match &mut *state {
            GateState::Idle => {
                *state = GateState::Refreshing(Vec::new());
                RefreshTicket::Leader
            }
            GateState::Refreshing(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                RefreshTicket::Follower(rx)
            }
        }
    }

    /// Refreshing -> Idle. Drains the queue, delivering the outcome to every
    /// waiter; none may be dropped. Waiters whose callers went away are fine:
    /// a failed send just means nobody is listening anymore.
    pub fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().expect("refresh gate poisoned");
            match std::mem::replace(&mut *state, GateState::Idle) {
                GateState::Refreshing(waiters) => waiters,
                GateState::Idle => Vec::new(),
            }
        };

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self.state.lock().expect("refresh gate poisoned"),
            GateState::Refreshing(_)
        )
    }
}
