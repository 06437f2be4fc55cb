//! Shared edit session.
//!
//! Couples one [`CompositionStateStore`] with a [`SyncCoordinator`] so a
//! host can dispatch edits from one task while a save runs on another.
//! The store lock is never held across an await; edits arriving while a
//! save is in flight are rejected by the store itself.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::editor::{CompositionStateStore, EditAction, EditError, SessionPhase};
use crate::error::SyncError;
use crate::store::{CompositionBackend, ThumbnailRenderer};
use crate::sync::{SaveReport, SyncCoordinator};
use crate::types::{Composition, CompositionId, CompositionKind, OwnerId};

/// An edit session over one composition.
pub struct EditSession<B: CompositionBackend, T: ThumbnailRenderer> {
    state: Arc<Mutex<CompositionStateStore>>,
    coordinator: Arc<SyncCoordinator<B, T>>,
}

impl<B: CompositionBackend, T: ThumbnailRenderer> Clone for EditSession<B, T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<B: CompositionBackend, T: ThumbnailRenderer> EditSession<B, T> {
    /// Create an empty session.
    pub fn new(coordinator: Arc<SyncCoordinator<B, T>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CompositionStateStore::new())),
            coordinator,
        }
    }

    /// Fetch a composition and start a session on it.
    pub async fn open(
        coordinator: Arc<SyncCoordinator<B, T>>,
        id: &CompositionId,
        kind: CompositionKind,
    ) -> Result<Self, SyncError> {
        let store = coordinator.open(id, kind).await?;
        Ok(Self {
            state: Arc::new(Mutex::new(store)),
            coordinator,
        })
    }

    /// Fetch a composition and load it, replacing the current session.
    ///
    /// Fails while a save is running.
    pub async fn load(&self, id: &CompositionId, kind: CompositionKind) -> Result<(), SyncError> {
        let composition = self.coordinator.fetch(id, kind).await?;
        self.state.lock().load(composition)?;
        Ok(())
    }

    /// Apply an edit action to the draft.
    pub fn dispatch(&self, action: EditAction) -> Result<(), EditError> {
        self.state.lock().dispatch(action)
    }

    /// Save the draft.
    ///
    /// On failure the session stays `Dirty` with the saved snapshot untouched.
    /// Dropping the returned future before it completes ends the save the
    /// same way, without adopting any inserted ids.
    pub async fn save(&self) -> Result<SaveReport, SyncError> {
        let ticket = self.state.lock().begin_save()?;
        let mut in_flight = InFlightSave { state: &self.state, revision: Some(ticket.revision()) };

        let result = self.coordinator.run_save(&ticket).await;

        in_flight.revision = None;
        let mut store = self.state.lock();
        match result {
            Ok(outcome) => {
                store.complete_save(ticket, outcome.persisted)?;
                Ok(outcome.report)
            }
            Err(failure) => {
                if let Err(e) = store.fail_save(ticket, &failure.adopted) {
                    tracing::error!(error = %e, "Could not record failed save");
                }
                Err(failure.error)
            }
        }
    }

    /// Whether the draft differs from the saved snapshot.
    pub fn has_unsaved_changes(&self) -> bool {
        self.state.lock().has_unsaved_changes()
    }

    /// Whether leaving needs confirmation.
    pub fn requires_confirmation(&self) -> bool {
        self.state.lock().requires_confirmation()
    }

    /// Copy of the working draft.
    pub fn current(&self) -> Option<Composition> {
        self.state.lock().current().cloned()
    }

    /// Copy of the last saved snapshot.
    pub fn initial(&self) -> Option<Composition> {
        self.state.lock().initial().cloned()
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase()
    }

    /// Leave the session, dropping the draft.
    pub fn leave(&self, confirmed: bool) -> Result<(), EditError> {
        self.state.lock().leave(confirmed)
    }

    /// Duplicate the composition loaded in this session into `owner`'s account.
    ///
    /// Duplicates the saved snapshot; unsaved edits are not copied.
    pub async fn duplicate(&self, owner: &OwnerId) -> Result<Composition, SyncError> {
        let (id, kind) = {
            let store = self.state.lock();
            let initial = store.initial().ok_or(EditError::NotLoaded)?;
            (initial.id, initial.kind)
        };
        self.coordinator.duplicate(&id, kind, owner).await
    }
}

/// Takes the store out of `Saving` if a save future is dropped mid-flight.
struct InFlightSave<'a> {
    state: &'a Mutex<CompositionStateStore>,
    revision: Option<u64>,
}

impl Drop for InFlightSave<'_> {
    fn drop(&mut self) {
        if let Some(revision) = self.revision.take() {
            tracing::warn!(revision, "Save cancelled before completion; draft kept");
            if let Err(e) = self.state.lock().abort_save(revision) {
                tracing::error!(error = %e, "Could not record cancelled save");
            }
        }
    }
}
