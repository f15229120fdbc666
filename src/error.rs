//! Whole-call outcomes of the sync pipeline.
//!
//! Per-event failures in batched mode are not errors; they are recorded in
//! [`crate::multistatus::MultiStatus`]. Everything here aborts the call.
use thiserror::Error;

use crate::multistatus::{ErrorReporter, ErrorType};

#[derive(Debug, Error)]
pub enum SyncError {
    /// Misconfigured settings or mapping. Raised before any remote call.
    #[error("{0}")]
    Config(String),

    /// The single event of a non-batched call is unusable.
    #[error("{0}")]
    Validation(String),

    /// The segment resolved for the audience has the wrong type.
    #[error("{0}")]
    SegmentTypeConflict(String),

    /// The batch endpoint refused the whole batch. The segment may have been
    /// created moments ago and not yet accept writes; redrive the batch later.
    #[error("retryable DMP error {status}: {message}")]
    Retryable { status: u16, message: String },

    /// The DMP accepted the batch but rejected the only element of a
    /// non-batched call.
    #[error("DMP rejected the membership update ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transport or decoding failure talking to the DMP.
    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Retryable { .. })
    }

    /// HTTP-style status a host should report for this failure.
    pub fn status(&self) -> u16 {
        match self {
            SyncError::Config(_) | SyncError::Validation(_) | SyncError::SegmentTypeConflict(_) => {
                400
            }
            SyncError::Retryable { .. } => 503,
            SyncError::Rejected { status, .. } => *status,
            SyncError::Remote(_) => 500,
        }
    }

    /// Classification used when a host reports this failure per event.
    pub fn classify(&self) -> (ErrorType, ErrorReporter) {
        match self {
            SyncError::Config(_) | SyncError::Validation(_) | SyncError::SegmentTypeConflict(_) => {
                (ErrorType::PayloadValidationFailed, ErrorReporter::Integrations)
            }
            SyncError::Retryable { .. } => (ErrorType::RetryableError, ErrorReporter::Destination),
            SyncError::Rejected { status, .. } => {
                (ErrorType::from_status(*status), ErrorReporter::Destination)
            }
            SyncError::Remote(_) => (ErrorType::UnknownError, ErrorReporter::Destination),
        }
    }
}
