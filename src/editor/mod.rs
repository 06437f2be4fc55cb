//! Composition state store.
//!
//! Holds the `(initial, current)` snapshot pair of one edit session and
//! applies edit actions to the draft.
//!
//! ## Phases
//!
//! ```text
//! Empty ──load──▶ Loaded ──dispatch──▶ Dirty ──begin_save──▶ Saving
//!                   ▲                                          │
//!                   └──────────── complete_save ◀──────────────┤
//!                                 fail_save ──▶ Dirty ◀─────────┘
//! ```
//!
//! Edits are rejected while `Saving`. Leaving a `Dirty` session requires
//! explicit confirmation.

pub mod action;
pub mod reducer;
pub mod state;

pub use action::{EditAction, FragmentChange, PropertyChange};
pub use reducer::{reduce, EditorState};
pub use state::{CompositionStateStore, SaveTicket, SessionPhase};

use crate::diff::DiffError;
use crate::ordering::OrderingError;
use crate::types::{FragmentError, FragmentId, PersistedId};

/// Error type for state store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// Bad index or swap at a list boundary.
    #[error("Ordering error: {0}")]
    Ordering(#[from] OrderingError),
    /// Fragment fails validation.
    #[error("Invalid fragment: {0}")]
    Fragment(#[from] FragmentError),
    /// Replacement list repeats an identity.
    #[error("Duplicate fragment identity: {0}")]
    DuplicateIdentity(FragmentId),
    /// Replacement list holds a persisted id the session has never seen.
    #[error("Fragment {0} is not part of this composition")]
    UnknownFragment(PersistedId),
    /// Title would become blank.
    #[error("Composition title must not be empty")]
    EmptyTitle,
    /// Label is blank.
    #[error("Label must not be empty")]
    EmptyLabel,
    /// No composition loaded.
    #[error("No composition loaded")]
    NotLoaded,
    /// A save is running; edits are locked.
    #[error("A save is in progress")]
    SaveInProgress,
    /// No save is running.
    #[error("No save in progress")]
    NotSaving,
    /// Leaving would discard unsaved edits.
    #[error("Unsaved changes would be lost; confirmation required")]
    UnsavedChanges,
    /// Internal consistency violation while adopting assigned ids.
    #[error("Data consistency error: {0}")]
    Consistency(#[from] DiffError),
}

impl EditError {
    /// Whether the error is caused by bad input rather than session state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Ordering(_)
                | Self::Fragment(_)
                | Self::DuplicateIdentity(_)
                | Self::UnknownFragment(_)
                | Self::EmptyTitle
                | Self::EmptyLabel
        )
    }
}
