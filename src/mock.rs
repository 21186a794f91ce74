use anyhow::anyhow;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::error::ListenerError;
use crate::listener::{StateChangeEvent, StateChangeListener};
use crate::service::{ServiceHooks, StartContext};
use crate::state::ServiceState;

/// Scriptable hook implementation for exercising the lifecycle driver.
///
/// Can be told to fail at either end of the lifecycle, to delay startup (with
/// the delay interruptible from another thread), and to go live on its own
/// during startup. Counts how often its state-change hook fires.
pub struct MockBehavior {
    fail_on_start: AtomicBool,
    fail_on_close: AtomicBool,
    go_live_in_start: AtomicBool,
    startup_delay: Mutex<Duration>,
    interrupt_tx: Sender<()>,
    interrupt_rx: Receiver<()>,
    state_changes: AtomicU64,
    stop_calls: AtomicU64,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBehavior {
    pub fn new() -> Self {
        let (interrupt_tx, interrupt_rx) = channel::unbounded();
        Self {
            fail_on_start: AtomicBool::new(false),
            fail_on_close: AtomicBool::new(false),
            // Going live during startup is the common case for real
            // components, so it is the mock's default too.
            go_live_in_start: AtomicBool::new(true),
            startup_delay: Mutex::new(Duration::ZERO),
            interrupt_tx,
            interrupt_rx,
            state_changes: AtomicU64::new(0),
            stop_calls: AtomicU64::new(0),
        }
    }

    pub fn set_fail_on_start(&self, fail: bool) {
        self.fail_on_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_close(&self, fail: bool) {
        self.fail_on_close.store(fail, Ordering::SeqCst);
    }

    pub fn set_go_live_in_start(&self, go_live: bool) {
        self.go_live_in_start.store(go_live, Ordering::SeqCst);
    }

    pub fn set_startup_delay(&self, delay: Duration) {
        *self.startup_delay.lock() = delay;
    }

    /// Handle for interrupting a startup delay from another thread.
    pub fn interrupt_handle(&self) -> MockInterrupt {
        MockInterrupt {
            tx: self.interrupt_tx.clone(),
        }
    }

    /// How many transitions the component-local hook has observed.
    pub fn state_change_count(&self) -> u64 {
        self.state_changes.load(Ordering::SeqCst)
    }

    /// How many times `on_stop` ran.
    pub fn stop_count(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl ServiceHooks for MockBehavior {
    fn on_start(&self, ctx: &StartContext<'_>) -> anyhow::Result<()> {
        if self.fail_on_start.load(Ordering::SeqCst) {
            return Err(anyhow!("fail_on_start"));
        }
        let delay = *self.startup_delay.lock();
        if !delay.is_zero() {
            // Interruptible wait: a message arriving on the interrupt channel
            // during the delay is a startup failure, not a swallowed wakeup.
            match self.interrupt_rx.recv_timeout(delay) {
                Ok(()) => return Err(anyhow!("startup interrupted")),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {}
            }
        }
        if self.go_live_in_start.load(Ordering::SeqCst) {
            ctx.go_live()?;
        }
        Ok(())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_close.load(Ordering::SeqCst) {
            return Err(anyhow!("fail_on_close"));
        }
        Ok(())
    }

    fn on_state_change(&self, old: ServiceState, new: ServiceState) {
        self.state_changes.fetch_add(1, Ordering::SeqCst);
        debug!("Mock observed state change: {} -> {}", old, new);
    }
}

/// Clonable handle that aborts a [`MockBehavior`] startup delay in progress.
#[derive(Clone)]
pub struct MockInterrupt {
    tx: Sender<()>,
}

impl MockInterrupt {
    pub fn interrupt(&self) {
        let _ = self.tx.send(());
    }
}

/// Listener that counts notification passes; used by lifecycle tests to
/// check that every committed transition is delivered exactly once.
#[derive(Default)]
pub struct EventCountListener {
    count: AtomicU64,
}

impl EventCountListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl StateChangeListener for EventCountListener {
    fn on_state_change(&self, _event: &StateChangeEvent) -> Result<(), ListenerError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
