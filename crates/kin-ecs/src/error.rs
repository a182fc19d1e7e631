//! Engine error types.

use thiserror::Error;

use crate::Entity;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EcsError {
    /// The entity is already registered, or already queued for registration.
    #[error("entity already added: {0}")]
    AlreadyAdded(Entity),

    /// The handle does not refer to a live entity.
    #[error("no such entity: {0}")]
    NoSuchEntity(Entity),

    /// `update` was called from inside a running tick.
    #[error("engine is already updating")]
    AlreadyUpdating,

    /// A listener callback failed.
    #[error("listener failed: {0}")]
    Listener(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EcsError {
    /// Wrap an arbitrary error raised by a listener.
    pub fn listener(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Listener(error.into())
    }
}

/// Result type for engine operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Result of a listener callback.
pub type ListenerResult = EcsResult<()>;
