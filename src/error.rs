//! Error types for emberfall.
//!
//! Nothing inside the per-frame update loop fails. Errors only surface from
//! the outer API: persisting configurations and addressing systems in a
//! [`SystemTree`](crate::SystemTree).

use crate::sub_emitter::SystemId;
use thiserror::Error;

/// Errors returned by configuration persistence and tree operations.
#[derive(Debug, Error)]
pub enum ParticleError {
    /// A configuration could not be written to or read from JSON.
    #[error("failed to (de)serialize particle system config: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The id does not name a live system in the tree.
    #[error("no particle system with id {0:?}")]
    UnknownSystem(SystemId),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ParticleError>;
