use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ListenerError;
use crate::state::ServiceState;

/// Snapshot of one committed transition.
///
/// Constructed once per commit and delivered to every registered listener
/// before the triggering lifecycle operation returns. Not stored anywhere.
#[derive(Debug, Clone)]
pub struct StateChangeEvent {
    pub service_id: Uuid,
    pub service_name: String,
    pub old: ServiceState,
    pub new: ServiceState,
    pub timestamp: SystemTime,
}

impl StateChangeEvent {
    /// Human-readable description of the transition for logging.
    pub fn description(&self) -> String {
        format!(
            "Service '{}' changed state: {} -> {}",
            self.service_name, self.old, self.new
        )
    }
}

/// External observer of a service's transitions.
///
/// Listeners hold no ownership over the service and must not invoke lifecycle
/// operations on it from inside the callback.
pub trait StateChangeListener: Send + Sync {
    fn on_state_change(&self, event: &StateChangeEvent) -> Result<(), ListenerError>;
}

/// Handle returned by [`ListenerRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered collection of observers for one service.
///
/// Delivery order is registration order. Delivery is synchronous and
/// blocking: `notify_all` returns only after every callback has returned.
///
/// Containment policy: a listener that reports an error is logged through the
/// diagnostic sink and skipped; its failure never prevents delivery to later
/// listeners and never changes the outcome of the lifecycle operation that
/// triggered the notification.
pub struct ListenerRegistry {
    entries: Mutex<Vec<(ListenerId, Arc<dyn StateChangeListener>)>>,
    next_id: AtomicU64,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a listener; it will observe every subsequent committed
    /// transition exactly once.
    pub fn register(&self, listener: Arc<dyn StateChangeListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries.lock().push((id, listener));
        debug!("Registered listener {:?}", id);
        id
    }

    /// Remove a previously registered listener. Returns false if the id is
    /// unknown (already removed or never registered here).
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if removed {
            debug!("Unregistered listener {:?}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Deliver `event` to every listener registered at commit time, in
    /// registration order.
    ///
    /// The entry list is snapshotted first so callbacks may register or
    /// unregister listeners without deadlocking; such changes take effect
    /// from the next transition.
    pub fn notify_all(&self, event: &StateChangeEvent) {
        let entries = self.entries.lock().clone();
        for (id, listener) in entries {
            if let Err(e) = listener.on_state_change(event) {
                warn!("Listener {:?} failed during [{}]: {}", id, event.description(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct OrderListener {
        tag: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl StateChangeListener for OrderListener {
        fn on_state_change(&self, _event: &StateChangeEvent) -> Result<(), ListenerError> {
            self.log.lock().push(self.tag);
            Ok(())
        }
    }

    struct FailingListener;

    impl StateChangeListener for FailingListener {
        fn on_state_change(&self, _event: &StateChangeEvent) -> Result<(), ListenerError> {
            Err(ListenerError::new("deliberate failure"))
        }
    }

    struct CountingListener {
        count: AtomicUsize,
    }

    impl StateChangeListener for CountingListener {
        fn on_state_change(&self, _event: &StateChangeEvent) -> Result<(), ListenerError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_event() -> StateChangeEvent {
        StateChangeEvent {
            service_id: Uuid::new_v4(),
            service_name: "test".to_string(),
            old: ServiceState::NotInited,
            new: ServiceState::Inited,
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn test_delivery_follows_registration_order() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..4 {
            registry.register(Arc::new(OrderListener {
                tag,
                log: Arc::clone(&log),
            }));
        }

        registry.notify_all(&test_event());
        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failing_listener_does_not_block_later_ones() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register(Arc::new(OrderListener {
            tag: 1,
            log: Arc::clone(&log),
        }));
        registry.register(Arc::new(FailingListener));
        registry.register(Arc::new(OrderListener {
            tag: 2,
            log: Arc::clone(&log),
        }));

        registry.notify_all(&test_event());
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        });

        let id = registry.register(Arc::clone(&counter) as Arc<dyn StateChangeListener>);
        registry.notify_all(&test_event());
        assert_eq!(counter.count.load(Ordering::SeqCst), 1);

        assert!(registry.unregister(id));
        registry.notify_all(&test_event());
        assert_eq!(counter.count.load(Ordering::SeqCst), 1);

        // Second unregister is a no-op
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }
}
