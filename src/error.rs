//! Crate-level error type and its classification.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::diff::DiffError;
use crate::editor::EditError;
use crate::title::TitleError;
use crate::types::{CompositionId, CompositionKind};

/// Coarse error classes, for hosts deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input: out-of-range index, invalid fragment, bad template.
    Validation,
    /// An identifier the engine relies on is missing or duplicated.
    DataConsistency,
    /// A collaborator call failed or timed out.
    RemoteCall,
    /// The requested composition does not exist (or has another kind).
    NotFound,
    /// No free copy title could be found.
    TitleResolutionExhausted,
    /// Operation not allowed in the current session phase.
    State,
}

/// Error type for coordinator and session operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Rejected by the state store.
    #[error("Edit error: {0}")]
    Edit(#[from] EditError),
    /// Diff or reconciliation invariant violated.
    #[error("Data consistency error: {0}")]
    Consistency(#[from] DiffError),
    /// Title resolution failed.
    #[error("Title error: {0}")]
    Title(#[from] TitleError),
    /// Composition absent or of another kind.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Requested id.
        id: CompositionId,
        /// Requested kind.
        kind: CompositionKind,
    },
    /// A collaborator call returned an error.
    #[error("Remote call {operation} failed: {message}")]
    Remote {
        /// Operation name.
        operation: &'static str,
        /// Collaborator error message.
        message: String,
    },
    /// A collaborator call did not answer in time.
    #[error("Remote call {operation} timed out after {after:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Configured timeout.
        after: Duration,
    },
}

impl SyncError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Edit(EditError::Consistency(_)) => ErrorKind::DataConsistency,
            Self::Edit(e) if e.is_validation() => ErrorKind::Validation,
            Self::Edit(_) => ErrorKind::State,
            Self::Consistency(_) => ErrorKind::DataConsistency,
            Self::Title(TitleError::Exhausted { .. }) => ErrorKind::TitleResolutionExhausted,
            Self::Title(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Remote { .. } | Self::Timeout { .. } => ErrorKind::RemoteCall,
        }
    }

    /// Name of the failed collaborator operation, for remote errors.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Remote { operation, .. } | Self::Timeout { operation, .. } => Some(operation),
            _ => None,
        }
    }
}
