use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LifecycleError, Result};

/// States a managed service moves through.
///
/// The happy path is `NotInited -> Inited -> Started -> Live`. `Stopped` is
/// terminal and reachable from every other state; nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    /// Constructed but not yet configured.
    NotInited,
    /// Configured and ready to start.
    Inited,
    /// Startup hook completed.
    Started,
    /// Operational sub-state: fully ready to serve.
    Live,
    /// Terminal.
    Stopped,
}

impl ServiceState {
    /// Whether the transition graph permits moving from `self` to `to`.
    ///
    /// Self-transitions are not permitted.
    pub fn can_transition_to(self, to: ServiceState) -> bool {
        use ServiceState::*;
        match (self, to) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (NotInited, Inited) => true,
            (Inited, Started) => true,
            (Started, Live) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ServiceState::Stopped
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::NotInited => "NotInited",
            ServiceState::Inited => "Inited",
            ServiceState::Started => "Started",
            ServiceState::Live => "Live",
            ServiceState::Stopped => "Stopped",
        };
        write!(f, "{}", name)
    }
}

/// Single authoritative holder of one service's current state.
///
/// Reads are lock-free. `commit` validates against the transition graph and
/// swaps the value; callers serialize commits through the driver's transition
/// guard, so the validate-then-store pair here is never raced. The cell has no
/// side effects beyond the state value itself: notification and counting
/// belong to the driver.
pub(crate) struct StateCell {
    current: AtomicCell<ServiceState>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            current: AtomicCell::new(ServiceState::NotInited),
        }
    }

    pub fn get(&self) -> ServiceState {
        self.current.load()
    }

    /// Replace the current state with `to`, returning the previous state, or
    /// `IllegalTransition` if the graph forbids the move.
    pub fn commit(&self, service: &str, to: ServiceState) -> Result<ServiceState> {
        let from = self.current.load();
        if !from.can_transition_to(to) {
            return Err(LifecycleError::IllegalTransition {
                service: service.to_string(),
                from,
                attempted: to,
            });
        }
        self.current.store(to);
        Ok(from)
    }
}
