//! # composition-sync
//!
//! Editing and synchronization engine for ordered compositions.
//!
//! A composition is an ordered list of fragments (media items, text blocks
//! or nested collections) plus scalar properties and labels. The engine
//! keeps a draft next to the last saved snapshot and turns the difference
//! into the minimal set of remote writes.
//!
//! ## Core Contract
//!
//! 1. Fragment positions are always exactly `0..n` in list order
//! 2. Every edit is a pure transition `(state, action) -> state`
//! 3. A save writes inserts, updates and deletes derived from the two
//!    snapshots, then promotes the draft; a failed save never promotes
//!
//! ## Architecture
//!
//! ```text
//! EditAction → reduce → CompositionStateStore (initial, current)
//!                                  ↓ begin_save
//!                  SyncCoordinator: diff → batches → reconcile → properties → labels
//!                                  ↓
//!                 CompositionBackend / ThumbnailRenderer
//! ```
//!
//! ## Identity
//!
//! Fragments carry either a server-assigned [`PersistedId`] or a
//! client-side [`PendingToken`]. Pending fragments are inserted on save and
//! swapped to their new ids in place; nothing is matched by position.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod ordering;
pub mod diff;
pub mod title;
pub mod canonical;
pub mod editor;
pub mod store;
pub mod sync;
pub mod session;
pub mod config;
pub mod telemetry;
pub mod error;

// Re-exports
pub use types::{
    Composition, CompositionId, CompositionKind, CompositionProperties, Fragment, FragmentError,
    FragmentFields, FragmentId, FragmentKind, MediaCut, NewFragment, OwnerId, PendingToken, PersistedId,
};
pub use ordering::{Direction, OrderingError, PendingTokenAllocator};
pub use diff::{
    diff_fragments, diff_fragments_with_carryover, diff_labels, reconcile_inserts, DiffError,
    FragmentDiff, FragmentUpdate, LabelDiff,
};
pub use title::{resolve_copy_title, TitleError, TitleTemplate};
pub use canonical::{canonical_hash, to_canonical_bytes, Fingerprint};
pub use editor::{
    reduce, CompositionStateStore, EditAction, EditError, EditorState, FragmentChange, PropertyChange,
    SaveTicket, SessionPhase,
};
pub use store::{CompositionBackend, ThumbnailRenderer};
pub use sync::{normalize, SaveFailure, SaveOutcome, SaveReport, SaveWarning, SyncCoordinator};
pub use session::EditSession;
pub use config::SyncConfig;
pub use telemetry::{init_tracing, LogFormat};
pub use error::{ErrorKind, SyncError};
