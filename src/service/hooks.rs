use super::driver::Service;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::state::ServiceState;

/// Behavior a concrete component plugs into its lifecycle driver.
///
/// The driver holds this capability by reference and calls into it at the
/// transition points; components never wrap or subclass the driver itself.
/// Hooks run synchronously on whichever thread invoked the lifecycle
/// operation.
pub trait ServiceHooks: Send + Sync {
    /// Startup work, invoked by [`Service::start`] while the service is still
    /// `Inited`.
    ///
    /// The hook may call [`StartContext::go_live`] to reach the operational
    /// sub-state before returning, and may block for as long as startup
    /// takes. Returning an error (including one raised by an interrupted
    /// startup wait) forces the service straight to `Stopped` and surfaces to
    /// the caller as a hook failure.
    fn on_start(&self, ctx: &StartContext<'_>) -> anyhow::Result<()>;

    /// Shutdown work, invoked by [`Service::stop`]. The closed flag is
    /// already set when this runs; an error here still leaves the service in
    /// `Stopped`.
    fn on_stop(&self) -> anyhow::Result<()>;

    /// Component-local bookkeeping on every committed transition, invoked
    /// before the external listener pass. Must not call lifecycle operations
    /// on the same service.
    fn on_state_change(&self, _old: ServiceState, _new: ServiceState) {}
}

/// Handle passed to [`ServiceHooks::on_start`], exposing the operations a
/// startup hook may legally perform on its own service while the start is in
/// flight.
pub struct StartContext<'a> {
    service: &'a Service,
}

impl<'a> StartContext<'a> {
    pub(super) fn new(service: &'a Service) -> Self {
        Self { service }
    }

    /// Enter the operational sub-state from inside startup. The driver
    /// commits `Started` and then `Live`, each with its own notification
    /// pass, before the hook returns.
    pub fn go_live(&self) -> Result<()> {
        self.service.go_live_from_start()
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    /// The configuration handle bound at `init`.
    pub fn config(&self) -> Option<ServiceConfig> {
        self.service.config()
    }
}
