use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hooks::{ServiceHooks, StartContext};
use crate::config::ServiceConfig;
use crate::error::{HookOp, LifecycleError, Result};
use crate::listener::{ListenerId, ListenerRegistry, StateChangeEvent, StateChangeListener};
use crate::state::{ServiceState, StateCell};

/// Lifecycle driver for one managed component.
///
/// Owns the component's single authoritative state cell and its listener
/// registry, and delegates the actual startup/shutdown work to the injected
/// [`ServiceHooks`]. All operations take `&self` and run on the caller's
/// thread; there is no internal worker.
///
/// Every committed transition produces exactly one `on_state_change` hook
/// call, one pass over the listener registry, and one increment of the
/// transition counter. That includes transitions committed from inside a
/// hook via [`StartContext::go_live`].
///
/// Listeners and the `on_state_change` hook are invoked while the transition
/// guard is held. They may freely read `current_state`, `is_closed` and
/// `transition_count`, and may register or unregister listeners, but must not
/// invoke lifecycle operations on the same service; the sanctioned mid-start
/// nesting goes through [`StartContext`].
pub struct Service {
    id: Uuid,
    name: String,
    hooks: Arc<dyn ServiceHooks>,
    state: StateCell,
    listeners: ListenerRegistry,
    transition_count: AtomicU64,
    /// Tracks whether `stop` ran, independently of the state enum: a service
    /// whose startup failed is `Stopped` but not closed.
    closed: AtomicBool,
    guard: Mutex<Inner>,
}

/// Fields protected by the transition guard.
struct Inner {
    config: Option<ServiceConfig>,
    /// A public operation is mid-hook. Competing operations fail with
    /// `IllegalTransition` instead of observing the pre-hook state.
    op_pending: bool,
}

impl Service {
    pub fn new<S: Into<String>>(name: S, hooks: Arc<dyn ServiceHooks>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            hooks,
            state: StateCell::new(),
            listeners: ListenerRegistry::new(),
            transition_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            guard: Mutex::new(Inner {
                config: None,
                op_pending: false,
            }),
        }
    }

    /// Bind the configuration handle and move `NotInited -> Inited`.
    ///
    /// The handle is immutable afterwards.
    pub fn init(&self, config: ServiceConfig) -> Result<()> {
        let mut inner = self.guard.lock();
        let current = self.state.get();
        if inner.op_pending || current != ServiceState::NotInited {
            return Err(self.illegal(current, ServiceState::Inited));
        }
        let old = self.state.commit(&self.name, ServiceState::Inited)?;
        inner.config = Some(config);
        self.dispatch(old, ServiceState::Inited);
        debug!("Service '{}' initialized", self.name);
        Ok(())
    }

    /// Run the component's startup hook and move to `Started` (or `Live`, if
    /// the hook went live itself).
    ///
    /// Valid only from `Inited`; under concurrent calls exactly one caller
    /// wins and the rest fail with `IllegalTransition`. The `Started` commit
    /// happens only once the hook has succeeded or gone live, so a failing
    /// hook records a single forced commit to `Stopped` before the failure is
    /// propagated. A failed start does not set the closed flag.
    pub fn start(&self) -> Result<()> {
        {
            let mut inner = self.guard.lock();
            let current = self.state.get();
            if inner.op_pending || current != ServiceState::Inited {
                return Err(self.illegal(current, ServiceState::Started));
            }
            inner.op_pending = true;
        }

        debug!("Service '{}' starting", self.name);
        let outcome = self.hooks.on_start(&StartContext::new(self));

        let mut inner = self.guard.lock();
        inner.op_pending = false;
        match outcome {
            Ok(()) => {
                // A hook that went live already committed Started and Live.
                if self.state.get() == ServiceState::Inited {
                    let old = self.state.commit(&self.name, ServiceState::Started)?;
                    self.dispatch(old, ServiceState::Started);
                }
                info!(
                    "Service '{}' started, state: {}",
                    self.name,
                    self.state.get()
                );
                Ok(())
            }
            Err(source) => {
                let old = self.state.commit(&self.name, ServiceState::Stopped)?;
                self.dispatch(old, ServiceState::Stopped);
                warn!("Service '{}' failed to start: {}", self.name, source);
                Err(LifecycleError::hook_failure(
                    &self.name,
                    HookOp::Start,
                    source,
                ))
            }
        }
    }

    /// Move `Started -> Live`. Fails with `IllegalTransition` from any other
    /// state, including a second call once live.
    pub fn enter_operational_state(&self) -> Result<()> {
        let inner = self.guard.lock();
        let current = self.state.get();
        if inner.op_pending || current != ServiceState::Started {
            return Err(self.illegal(current, ServiceState::Live));
        }
        let old = self.state.commit(&self.name, ServiceState::Live)?;
        self.dispatch(old, ServiceState::Live);
        info!("Service '{}' is live", self.name);
        Ok(())
    }

    /// Run the component's shutdown hook and move to the terminal `Stopped`
    /// state.
    ///
    /// Valid from any non-terminal state, including `NotInited`, so
    /// partially-initialized components can still be cleaned up. The closed
    /// flag is set before the hook runs, so pollers observe a closed service
    /// even if the hook fails; a hook failure never prevents the `Stopped`
    /// commit. A second call fails with `IllegalTransition` and never
    /// re-invokes the hook.
    pub fn stop(&self) -> Result<()> {
        {
            let mut inner = self.guard.lock();
            let current = self.state.get();
            if inner.op_pending || !current.can_transition_to(ServiceState::Stopped) {
                return Err(self.illegal(current, ServiceState::Stopped));
            }
            inner.op_pending = true;
        }

        self.closed.store(true, Ordering::SeqCst);
        debug!("Service '{}' stopping", self.name);
        let outcome = self.hooks.on_stop();

        let mut inner = self.guard.lock();
        inner.op_pending = false;
        let old = self.state.commit(&self.name, ServiceState::Stopped)?;
        self.dispatch(old, ServiceState::Stopped);
        drop(inner);

        match outcome {
            Ok(()) => {
                info!("Service '{}' stopped", self.name);
                Ok(())
            }
            Err(source) => {
                warn!(
                    "Service '{}' stop hook failed (service is stopped regardless): {}",
                    self.name, source
                );
                Err(LifecycleError::hook_failure(
                    &self.name,
                    HookOp::Stop,
                    source,
                ))
            }
        }
    }

    /// Diagnostic override: commit `target` without running any hook.
    ///
    /// Skips the per-operation entry conditions but still validates the
    /// transition graph and still routes through the normal commit, notify
    /// and count path, so listener counts stay accurate. Does not touch the
    /// closed flag.
    pub fn force_state(&self, target: ServiceState) -> Result<()> {
        let inner = self.guard.lock();
        let current = self.state.get();
        if inner.op_pending || !current.can_transition_to(target) {
            return Err(self.illegal(current, target));
        }
        let old = self.state.commit(&self.name, target)?;
        self.dispatch(old, target);
        drop(inner);
        debug!("Service '{}' forced to state {}", self.name, target);
        Ok(())
    }

    /// Mid-start go-live, reachable only through [`StartContext`]. The
    /// `Started` commit is deferred to this point so that a hook which fails
    /// without going live never records a `Started` transition.
    pub(super) fn go_live_from_start(&self) -> Result<()> {
        let inner = self.guard.lock();
        let current = self.state.get();
        if current != ServiceState::Inited || !inner.op_pending {
            return Err(self.illegal(current, ServiceState::Live));
        }
        let old = self.state.commit(&self.name, ServiceState::Started)?;
        self.dispatch(old, ServiceState::Started);
        let old = self.state.commit(&self.name, ServiceState::Live)?;
        self.dispatch(old, ServiceState::Live);
        drop(inner);
        info!("Service '{}' went live during startup", self.name);
        Ok(())
    }

    pub fn current_state(&self) -> ServiceState {
        self.state.get()
    }

    /// Whether `stop` ran. Stays false after a failed `start`, even though
    /// the state is `Stopped`, letting callers tell "startup aborted" from
    /// "shut down cleanly".
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of committed transitions, equal to the number of notification
    /// passes the listener registry has seen.
    pub fn transition_count(&self) -> u64 {
        self.transition_count.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration handle, once `init` has bound one.
    pub fn config(&self) -> Option<ServiceConfig> {
        self.guard.lock().config.clone()
    }

    pub fn register_listener(&self, listener: Arc<dyn StateChangeListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// One committed transition: bump the counter, run the component-local
    /// hook, then the external listener pass. Caller holds the transition
    /// guard, so the increment and the notification form one critical
    /// section per commit.
    fn dispatch(&self, old: ServiceState, new: ServiceState) {
        self.transition_count.fetch_add(1, Ordering::SeqCst);
        debug!("Service '{}' state changed: {} -> {}", self.name, old, new);
        self.hooks.on_state_change(old, new);
        let event = StateChangeEvent {
            service_id: self.id,
            service_name: self.name.clone(),
            old,
            new,
            timestamp: SystemTime::now(),
        };
        self.listeners.notify_all(&event);
    }

    fn illegal(&self, from: ServiceState, attempted: ServiceState) -> LifecycleError {
        LifecycleError::IllegalTransition {
            service: self.name.clone(),
            from,
            attempted,
        }
    }
}
