use crate::state::ServiceState;
use std::fmt;
use thiserror::Error;

/// Which lifecycle hook was executing when a failure was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOp {
    Start,
    Stop,
}

impl fmt::Display for HookOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOp::Start => write!(f, "start"),
            HookOp::Stop => write!(f, "stop"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("illegal transition for service '{service}': {from} -> {attempted}")]
    IllegalTransition {
        service: String,
        from: ServiceState,
        attempted: ServiceState,
    },

    #[error("{op} hook failed for service '{service}': {source}")]
    HookFailure {
        service: String,
        op: HookOp,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
}

impl LifecycleError {
    pub fn hook_failure<S: Into<String>>(service: S, op: HookOp, source: anyhow::Error) -> Self {
        Self::HookFailure {
            service: service.into(),
            op,
            source,
        }
    }

    /// True when the error is a rejected transition rather than a hook or
    /// configuration failure.
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalTransition { .. })
    }
}

/// Failure reported by an observer callback.
///
/// Contained by the listener registry's diagnostic sink; never propagated to
/// the caller of the lifecycle operation that triggered the notification.
#[derive(Error, Debug)]
#[error("listener failure: {message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
