pub mod config;
pub mod error;
pub mod listener;
pub mod mock;
pub mod service;
pub mod state;

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{HookOp, LifecycleError, ListenerError, Result};
pub use listener::{ListenerId, ListenerRegistry, StateChangeEvent, StateChangeListener};
pub use mock::{EventCountListener, MockBehavior, MockInterrupt};
pub use service::{Service, ServiceHooks, StartContext};
pub use state::ServiceState;
