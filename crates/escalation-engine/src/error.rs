//! Error types for escalation operations.

use resolveit_complaint_core::{Role, StoreError};
use thiserror::Error;

/// Result type for escalation operations.
pub type Result<T> = std::result::Result<T, EscalationError>;

/// Errors surfaced by the synchronous escalation paths.
///
/// The scheduled sweep never returns per-complaint failures; those are
/// logged and skipped so one bad item cannot abort a batch.
#[derive(Debug, Error)]
pub enum EscalationError {
    /// Complaint does not exist (404-equivalent).
    #[error("complaint not found: {0}")]
    ComplaintNotFound(i64),

    /// User does not exist (404-equivalent).
    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// Actor lacks the role for this operation (403-equivalent).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Chosen escalation target is not a senior employee or admin
    /// (400-equivalent).
    #[error("user {user_id} has role {role} and cannot receive escalations")]
    InvalidTarget { user_id: i64, role: Role },

    /// De-escalation requested on a complaint that is not escalated
    /// (400-equivalent).
    #[error("complaint {0} is not escalated")]
    NotEscalated(i64),

    /// Persistence failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
