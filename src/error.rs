//! Error types for moderation operations.

use thiserror::Error;

use crate::surface::SurfaceRole;

/// Result type alias for moderation operations.
pub type Result<T> = std::result::Result<T, ModerationError>;

/// Main error type for the moderation service.
#[derive(Error, Debug)]
pub enum ModerationError {
    /// A moderator action targeted a proposal no longer in the expected
    /// state. Recovered locally with an "already processed" notice; the
    /// store is never mutated on this path.
    #[error("proposal already processed by another moderator")]
    StateConflict,

    /// An outbound send/edit to a messaging surface failed. Retried with
    /// bounded backoff, then logged. Never rolls back committed store state.
    #[error("surface delivery failed: {0}")]
    TransientDelivery(String),

    /// Referenced proposal or user is missing.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A required destination (moderation surface, publication channel) is
    /// unset. Fatal for the specific operation, not for the process.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A message ref was recorded twice for the same (proposal, role).
    /// Refs are write-once; rewriting is a logic error, not an overwrite.
    #[error("message ref already recorded for proposal {proposal} role {role}")]
    RefAlreadyRecorded { proposal: i64, role: SurfaceRole },

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl ModerationError {
    /// Whether the caller may safely retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModerationError::TransientDelivery(_))
    }
}
