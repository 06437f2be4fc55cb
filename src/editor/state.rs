//! Session phases and the snapshot-pair store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::action::EditAction;
use super::reducer::{reduce, EditorState};
use super::EditError;
use crate::canonical::Fingerprint;
use crate::diff::reconcile_inserts;
use crate::types::{Composition, CompositionId, PendingToken, PersistedId};

/// Lifecycle phase of an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Nothing loaded.
    Empty,
    /// Draft equals the saved snapshot.
    Loaded,
    /// Draft differs from the saved snapshot.
    Dirty,
    /// A save is running; edits are rejected.
    Saving,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Loaded => write!(f, "loaded"),
            Self::Dirty => write!(f, "dirty"),
            Self::Saving => write!(f, "saving"),
        }
    }
}

/// Everything a save needs, captured when the save starts.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    /// Composition being saved.
    pub composition_id: CompositionId,
    /// Saved snapshot at save start.
    pub initial: Composition,
    /// Draft at save start.
    pub draft: Composition,
    /// Ids inserted by earlier failed saves.
    pub carried: BTreeSet<PersistedId>,
    revision: u64,
}

impl SaveTicket {
    /// Store revision the ticket was issued at.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug, Clone)]
struct Snapshots {
    state: EditorState,
    initial_fingerprint: Fingerprint,
    current_fingerprint: Fingerprint,
}

impl Snapshots {
    fn new(state: EditorState) -> Self {
        let initial_fingerprint = Fingerprint::of(&state.initial);
        let current_fingerprint = Fingerprint::of(&state.current);
        Self {
            state,
            initial_fingerprint,
            current_fingerprint,
        }
    }

    fn is_dirty(&self) -> bool {
        self.initial_fingerprint != self.current_fingerprint || !self.state.carried.is_empty()
    }
}

/// Holds the snapshot pair of one edit session.
///
/// Dirty checks compare fingerprints refreshed on every accepted action,
/// so [`has_unsaved_changes`](Self::has_unsaved_changes) is O(1) and an
/// edit that is later undone by hand reads as clean again.
#[derive(Debug, Clone)]
pub struct CompositionStateStore {
    phase: SessionPhase,
    snapshots: Option<Snapshots>,
    revision: u64,
}

impl CompositionStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Empty,
            snapshots: None,
            revision: 0,
        }
    }

    /// Create a store already loaded with `composition`.
    pub fn loaded(composition: Composition) -> Self {
        let mut store = Self::new();
        store.install(composition);
        store
    }

    /// Load a composition into both snapshots, replacing any session.
    pub fn load(&mut self, composition: Composition) -> Result<(), EditError> {
        if self.phase == SessionPhase::Saving {
            return Err(EditError::SaveInProgress);
        }
        self.install(composition);
        Ok(())
    }

    fn install(&mut self, composition: Composition) {
        tracing::info!(
            composition_id = %composition.id,
            kind = %composition.kind,
            fragments = composition.fragments.len(),
            "Loaded composition"
        );
        self.snapshots = Some(Snapshots::new(EditorState::new(composition)));
        self.phase = SessionPhase::Loaded;
        self.revision += 1;
    }

    /// Apply an edit action to the draft.
    pub fn dispatch(&mut self, action: EditAction) -> Result<(), EditError> {
        if self.phase == SessionPhase::Saving {
            tracing::warn!(action = action.name(), "Rejected edit during save");
            return Err(EditError::SaveInProgress);
        }
        let snapshots = self.snapshots.as_mut().ok_or(EditError::NotLoaded)?;

        let name = action.name();
        let touches_initial = action.touches_initial();
        let next = reduce(&snapshots.state, action).map_err(|e| {
            tracing::warn!(action = name, error = %e, "Rejected edit");
            e
        })?;

        snapshots.state = next;
        snapshots.current_fingerprint = Fingerprint::of(&snapshots.state.current);
        if touches_initial {
            snapshots.initial_fingerprint = Fingerprint::of(&snapshots.state.initial);
        }
        self.phase = if snapshots.is_dirty() { SessionPhase::Dirty } else { SessionPhase::Loaded };
        self.revision += 1;

        tracing::trace!(
            action = name,
            phase = %self.phase,
            revision = self.revision,
            fingerprint = %snapshots.current_fingerprint.to_hex(),
            "Applied edit"
        );
        Ok(())
    }

    /// Whether the draft differs from the saved snapshot.
    ///
    /// In-memory only; never blocks.
    pub fn has_unsaved_changes(&self) -> bool {
        self.snapshots.as_ref().map(Snapshots::is_dirty).unwrap_or(false)
    }

    /// Whether leaving the session needs confirmation.
    pub fn requires_confirmation(&self) -> bool {
        self.phase == SessionPhase::Saving || self.has_unsaved_changes()
    }

    /// Leave the session, dropping the draft.
    ///
    /// A dirty session is only dropped when `confirmed` is set. A running
    /// save can never be abandoned.
    pub fn leave(&mut self, confirmed: bool) -> Result<(), EditError> {
        if self.phase == SessionPhase::Saving {
            return Err(EditError::SaveInProgress);
        }
        if self.has_unsaved_changes() && !confirmed {
            return Err(EditError::UnsavedChanges);
        }
        if let Some(snapshots) = &self.snapshots {
            tracing::info!(
                composition_id = %snapshots.state.current.id,
                discarded = self.has_unsaved_changes(),
                "Left composition session"
            );
        }
        self.snapshots = None;
        self.phase = SessionPhase::Empty;
        self.revision += 1;
        Ok(())
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Counter bumped by every state change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The working draft.
    pub fn current(&self) -> Option<&Composition> {
        self.snapshots.as_ref().map(|s| &s.state.current)
    }

    /// The last saved snapshot.
    pub fn initial(&self) -> Option<&Composition> {
        self.snapshots.as_ref().map(|s| &s.state.initial)
    }

    /// Ids inserted by failed saves and not yet part of the saved snapshot.
    pub fn carried_ids(&self) -> BTreeSet<PersistedId> {
        self.snapshots.as_ref().map(|s| s.state.carried.clone()).unwrap_or_default()
    }

    /// Enter `Saving` and capture the snapshots to save.
    pub fn begin_save(&mut self) -> Result<SaveTicket, EditError> {
        if self.phase == SessionPhase::Saving {
            return Err(EditError::SaveInProgress);
        }
        let snapshots = self.snapshots.as_ref().ok_or(EditError::NotLoaded)?;
        let ticket = SaveTicket {
            composition_id: snapshots.state.current.id,
            initial: snapshots.state.initial.clone(),
            draft: snapshots.state.current.clone(),
            carried: snapshots.state.carried.clone(),
            revision: self.revision + 1,
        };
        self.phase = SessionPhase::Saving;
        self.revision += 1;
        Ok(ticket)
    }

    /// Finish a successful save: `persisted` becomes both snapshots.
    pub fn complete_save(&mut self, ticket: SaveTicket, persisted: Composition) -> Result<(), EditError> {
        self.check_ticket(&ticket)?;
        let snapshots = self.snapshots.as_mut().ok_or(EditError::NotLoaded)?;

        snapshots.state.initial = persisted.clone();
        snapshots.state.current = persisted;
        snapshots.initial_fingerprint = Fingerprint::of(&snapshots.state.initial);
        snapshots.current_fingerprint = snapshots.initial_fingerprint;
        snapshots.state.carried.clear();

        self.phase = SessionPhase::Loaded;
        self.revision += 1;
        Ok(())
    }

    /// Finish a failed save. The saved snapshot is untouched.
    ///
    /// `adopted` pairs pending tokens with ids the insert batch assigned
    /// before the failure. They are written into the draft and carried into
    /// the next save so those fragments are not inserted twice.
    pub fn fail_save(
        &mut self,
        ticket: SaveTicket,
        adopted: &[(PendingToken, PersistedId)],
    ) -> Result<(), EditError> {
        self.check_ticket(&ticket)?;
        let snapshots = self.snapshots.as_mut().ok_or(EditError::NotLoaded)?;

        let outcome = if adopted.is_empty() {
            Ok(())
        } else {
            let (tokens, ids): (Vec<PendingToken>, Vec<PersistedId>) = adopted.iter().copied().unzip();
            reconcile_inserts(&mut snapshots.state.current.fragments, &tokens, &ids).map(|()| {
                snapshots.state.carried.extend(ids);
                snapshots.current_fingerprint = Fingerprint::of(&snapshots.state.current);
            })
        };

        self.phase = if snapshots.is_dirty() { SessionPhase::Dirty } else { SessionPhase::Loaded };
        self.revision += 1;
        outcome.map_err(EditError::from)
    }

    /// Leave `Saving` without a result, for a save that was cancelled
    /// before it finished.
    ///
    /// The saved snapshot and the draft are kept as they are.
    pub fn abort_save(&mut self, revision: u64) -> Result<(), EditError> {
        self.check_revision(revision)?;
        let dirty = self.snapshots.as_ref().map(Snapshots::is_dirty).unwrap_or(false);
        self.phase = if dirty { SessionPhase::Dirty } else { SessionPhase::Loaded };
        self.revision += 1;
        Ok(())
    }

    fn check_ticket(&self, ticket: &SaveTicket) -> Result<(), EditError> {
        self.check_revision(ticket.revision)
    }

    fn check_revision(&self, revision: u64) -> Result<(), EditError> {
        if self.phase != SessionPhase::Saving || revision != self.revision {
            return Err(EditError::NotSaving);
        }
        Ok(())
    }
}

impl Default for CompositionStateStore {
    fn default() -> Self {
        Self::new()
    }
}
