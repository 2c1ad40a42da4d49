//! Error types returned by the middleware contract and by the runtime.
//!
//! Conditions the runtime recovers from on its own (an object or topic that
//! already exists, a subscription that is already in place, a directory entry
//! that is already gone) are not errors at all; the middleware reports them
//! as outcome variants (see [`crate::middleware`]).

use holonet_core::IdentityError;

/// Failures reported by the transport, directory or broker.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MiddlewareError {
    /// The call did not complete within the transport's timeout.
    #[error("call timed out")]
    Timeout,

    /// The remote service could not be reached.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The admin session is no longer valid.
    #[error("admin session expired")]
    SessionExpired,

    /// The target object is not known to its adapter.
    #[error("object does not exist: {0}")]
    ObjectNotExist(String),

    /// The communicator or adapter has been destroyed.
    #[error("communicator destroyed")]
    Destroyed,

    #[error("{0}")]
    Other(String),
}

impl MiddlewareError {
    /// `true` for network-level failures the caller may retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, MiddlewareError::Timeout | MiddlewareError::Unreachable(_))
    }
}

/// Errors returned by public runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("middleware error: {0}")]
    Middleware(#[from] MiddlewareError),

    #[error("invalid identity: {0}")]
    Identity(#[from] IdentityError),

    /// The agent has no remote identity; register it first.
    #[error("holon '{0}' is not registered")]
    NotRegistered(String),

    /// The agent value already carries a remote identity.
    #[error("holon '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The broker reported the topic as existing but it could not be retrieved.
    #[error("topic '{0}' exists but could not be retrieved")]
    TopicVanished(String),

    /// The runtime has been shut down.
    #[error("runtime has been shut down")]
    ShutDown,
}
