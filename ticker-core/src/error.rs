//! Crate-wide error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for fallible Ticker core operations.
pub type TickerResult<T> = Result<T, TickerError>;

/// A single field-scoped validation failure.
///
/// Validation always reports every failing field, never a single opaque
/// error, so callers can annotate each input individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Key of the field the failure applies to.
    pub field: String,
    /// Human-readable message for that field.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the Ticker core.
///
/// Network and remote-rejection failures during history sync are degradable:
/// the coordinator falls back to local state and surfaces a notice instead of
/// returning these. They reach callers directly only from operations that
/// have no local fallback (e.g. preview generation).
#[derive(Debug, Error)]
pub enum TickerError {
    /// Transport-level failure reaching the remote service.
    #[error("network failure: {0}")]
    Network(String),

    /// The remote service answered but rejected the request.
    #[error("remote service rejected request (status {status}): {message}")]
    RemoteRejected {
        /// HTTP status code, or 0 when the rejection had no transport status.
        status: u16,
        /// Message reported by the service, possibly empty.
        message: String,
    },

    /// Local persistence failed. The in-memory state is still updated.
    #[error("storage failure: {0}")]
    Storage(#[from] crate::store::StoreError),

    /// One or more field-scoped validation failures.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// An external capability (e.g. saving to the photo library) refused.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Human-readable description of what was refused.
        message: String,
        /// Whether the user can grant the permission and retry.
        can_retry: bool,
    },
}

impl TickerError {
    /// Validation error for a single unknown or failing field.
    #[must_use]
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Whether this error leaves local state usable (sync degradations).
    #[must_use]
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RemoteRejected { .. })
    }
}
