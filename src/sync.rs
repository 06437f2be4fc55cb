//! Synchronization coordinator.
//!
//! Persists a draft against the last saved snapshot.
//!
//! ## Save Protocol
//!
//! 1. Normalize: clear custom title/description of fragments that do not use them
//! 2. Diff the fragment lists (insert / update / delete)
//! 3. Run the three batches concurrently and wait for all of them
//! 4. Replace pending tokens with the ids the insert batch returned
//! 5. Collections only: recompute the thumbnail (failure is a warning)
//! 6. Write composition properties
//! 7. Diff labels and write additions and removals
//! 8. Promote the draft to the saved snapshot
//!
//! No transaction spans the save. A failure after step 3 leaves earlier
//! writes in place; the saved snapshot is not promoted, and ids the insert
//! batch assigned are handed back so the next attempt does not insert the
//! same fragments again.

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

use crate::config::SyncConfig;
use crate::diff::{diff_fragments_with_carryover, diff_labels, reconcile_inserts};
use crate::editor::{CompositionStateStore, SaveTicket};
use crate::error::SyncError;
use crate::ordering::{self, PendingTokenAllocator};
use crate::store::{CompositionBackend, ThumbnailRenderer};
use crate::title::TitleTemplate;
use crate::types::{
    Composition, CompositionId, CompositionKind, Fragment, FragmentFields, FragmentId, OwnerId,
    PendingToken, PersistedId,
};

/// Clear custom fields of fragments that do not use them.
///
/// Returns the number of fragments changed.
pub fn normalize(composition: &mut Composition) -> usize {
    composition
        .fragments
        .iter_mut()
        .map(Fragment::normalize)
        .filter(|changed| *changed)
        .count()
}

/// Non-fatal problem encountered during a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaveWarning {
    /// Thumbnail recomputation failed; the thumbnail was left unset.
    ThumbnailFailed {
        /// Collaborator error.
        message: String,
    },
}

/// Summary of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    /// Saved composition.
    pub composition_id: CompositionId,
    /// Ids assigned to inserted fragments, in draft order.
    pub inserted: Vec<PersistedId>,
    /// Ids updated.
    pub updated: Vec<PersistedId>,
    /// Ids deleted.
    pub deleted: Vec<PersistedId>,
    /// Labels attached.
    pub labels_added: Vec<String>,
    /// Labels detached.
    pub labels_removed: Vec<String>,
    /// Fragments whose stale custom fields were cleared.
    pub normalized: usize,
    /// Thumbnail after the save.
    pub thumbnail_path: Option<String>,
    /// Non-fatal problems.
    pub warnings: Vec<SaveWarning>,
}

/// Result of the network part of a save.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// Draft as persisted: normalized, reconciled, thumbnail and timestamp set.
    pub persisted: Composition,
    /// Summary.
    pub report: SaveReport,
}

/// A failed save.
#[derive(Debug)]
pub struct SaveFailure {
    /// What went wrong.
    pub error: SyncError,
    /// Ids the insert batch assigned before the failure, keyed by pending token.
    pub adopted: Vec<(PendingToken, PersistedId)>,
}

impl SaveFailure {
    fn new(error: SyncError) -> Self {
        Self { error, adopted: Vec::new() }
    }
}

impl From<SyncError> for SaveFailure {
    fn from(error: SyncError) -> Self {
        Self::new(error)
    }
}

/// Drives saves, session loading and duplication against the collaborators.
pub struct SyncCoordinator<B: CompositionBackend, T: ThumbnailRenderer> {
    backend: Arc<B>,
    thumbnails: Arc<T>,
    config: SyncConfig,
    titles: TitleTemplate,
}

impl<B: CompositionBackend, T: ThumbnailRenderer> SyncCoordinator<B, T> {
    /// Create a coordinator.
    ///
    /// Fails if the configured copy-title template does not compile.
    pub fn new(backend: Arc<B>, thumbnails: Arc<T>, config: SyncConfig) -> Result<Self, SyncError> {
        let titles = config.title_template()?;
        Ok(Self { backend, thumbnails, config, titles })
    }

    /// The persistence backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Fetch a composition, failing with `NotFound` when absent or of another kind.
    pub async fn fetch(&self, id: &CompositionId, kind: CompositionKind) -> Result<Composition, SyncError> {
        self.call("fetch_composition", || self.backend.fetch_composition(id, kind))
            .await?
            .ok_or(SyncError::NotFound { id: *id, kind })
    }

    /// Fetch a composition and start an edit session on it.
    pub async fn open(&self, id: &CompositionId, kind: CompositionKind) -> Result<CompositionStateStore, SyncError> {
        let composition = self.fetch(id, kind).await?;
        Ok(CompositionStateStore::loaded(composition))
    }

    /// Save a store owned by the caller.
    pub async fn save(&self, store: &mut CompositionStateStore) -> Result<SaveReport, SyncError> {
        let ticket = store.begin_save()?;
        let mut in_flight = StoreSaveGuard { store, revision: Some(ticket.revision()) };
        let result = self.run_save(&ticket).await;
        in_flight.revision = None;
        let store = &mut *in_flight.store;
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

    /// Persist the draft captured by `ticket`. Does not touch any store.
    pub async fn run_save(&self, ticket: &SaveTicket) -> Result<SaveOutcome, SaveFailure> {
        let span = tracing::info_span!(
            "save",
            composition_id = %ticket.composition_id,
            kind = %ticket.draft.kind,
        );
        async {
            let result = self.persist(ticket).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    inserted = outcome.report.inserted.len(),
                    updated = outcome.report.updated.len(),
                    deleted = outcome.report.deleted.len(),
                    warnings = outcome.report.warnings.len(),
                    "Saved composition"
                ),
                Err(failure) => tracing::warn!(
                    error = %failure.error,
                    adopted = failure.adopted.len(),
                    "Save failed; draft kept"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn persist(&self, ticket: &SaveTicket) -> Result<SaveOutcome, SaveFailure> {
        let composition_id = ticket.composition_id;
        let mut draft = ticket.draft.clone();

        let normalized = normalize(&mut draft);
        let diff = diff_fragments_with_carryover(&ticket.initial.fragments, &draft.fragments, &ticket.carried)
            .map_err(SyncError::from)?;
        let pending = diff.pending_tokens();
        let insert_fields: Vec<FragmentFields> = diff.to_insert.iter().map(Fragment::fields).collect();

        let inserts = async {
            if insert_fields.is_empty() {
                return Ok(Vec::new());
            }
            self.call_once(
                "insert_fragments",
                self.backend.insert_fragments(&composition_id, &insert_fields),
            )
            .await
        };
        let deletes = try_join_all(
            diff.to_delete
                .iter()
                .map(|id| self.call("delete_fragment", move || self.backend.delete_fragment(*id))),
        );
        let updates = try_join_all(
            diff.to_update
                .iter()
                .map(|u| self.call("update_fragment", move || self.backend.update_fragment(u.id, &u.fields))),
        );
        let (inserted, deleted, updated) = tokio::join!(inserts, deletes, updates);

        let assigned = inserted?;
        reconcile_inserts(&mut draft.fragments, &pending, &assigned).map_err(SyncError::from)?;
        let adopted: Vec<(PendingToken, PersistedId)> =
            pending.iter().copied().zip(assigned.iter().copied()).collect();
        let fail = |error: SyncError| SaveFailure { error, adopted: adopted.clone() };

        deleted.map_err(fail)?;
        updated.map_err(fail)?;

        let mut warnings = Vec::new();
        if draft.kind == CompositionKind::Collection {
            match self.attempt("compute_thumbnail", self.thumbnails.compute_thumbnail(&draft)).await {
                Ok(path) => draft.thumbnail_path = Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "Thumbnail recomputation failed; leaving it unset");
                    draft.thumbnail_path = None;
                    warnings.push(SaveWarning::ThumbnailFailed { message: e.to_string() });
                }
            }
        }

        draft.updated_at = Utc::now();
        let properties = draft.properties();
        self.call("update_composition_properties", || {
            self.backend.update_composition_properties(&composition_id, &properties)
        })
        .await
        .map_err(fail)?;

        let labels = diff_labels(&ticket.initial.labels, &draft.labels);
        if !labels.added.is_empty() {
            self.call("add_labels", || self.backend.add_labels(&composition_id, &labels.added))
                .await
                .map_err(fail)?;
        }
        if !labels.removed.is_empty() {
            self.call("remove_labels", || self.backend.remove_labels(&composition_id, &labels.removed))
                .await
                .map_err(fail)?;
        }

        let report = SaveReport {
            composition_id,
            inserted: assigned,
            updated: diff.to_update.iter().map(|u| u.id).collect(),
            deleted: diff.to_delete.clone(),
            labels_added: labels.added,
            labels_removed: labels.removed,
            normalized,
            thumbnail_path: draft.thumbnail_path.clone(),
            warnings,
        };
        Ok(SaveOutcome { persisted: draft, report })
    }

    /// Copy a composition into `owner`'s account under a non-colliding title.
    ///
    /// The copy is private and gets fresh ids and timestamps.
    pub async fn duplicate(
        &self,
        source_id: &CompositionId,
        kind: CompositionKind,
        owner: &OwnerId,
    ) -> Result<Composition, SyncError> {
        let source = self.fetch(source_id, kind).await?;
        let existing: BTreeSet<String> = self
            .call("list_titles_for_owner", || self.backend.list_titles_for_owner(owner, kind))
            .await?
            .into_iter()
            .collect();
        let title = self.titles.resolve(&existing, &source.title)?;

        let mut copy = Composition::new(CompositionId::generate(), title, kind, *owner);
        copy.description = source.description.clone();
        copy.thumbnail_path = source.thumbnail_path.clone();
        copy.labels = source.labels.clone();
        let assigned_id = self
            .call_once("insert_composition", self.backend.insert_composition(&copy))
            .await?;
        copy.id = assigned_id;

        let mut tokens = PendingTokenAllocator::new();
        copy.fragments = source
            .fragments
            .iter()
            .map(|f| Fragment { id: FragmentId::Pending(tokens.allocate()), ..f.clone() })
            .collect();
        ordering::reorder(&mut copy.fragments);
        normalize(&mut copy);

        if !copy.fragments.is_empty() {
            let pending: Vec<PendingToken> = copy.fragments.iter().filter_map(|f| f.id.pending()).collect();
            let fields: Vec<FragmentFields> = copy.fragments.iter().map(Fragment::fields).collect();
            let assigned = self
                .call_once("insert_fragments", self.backend.insert_fragments(&copy.id, &fields))
                .await?;
            reconcile_inserts(&mut copy.fragments, &pending, &assigned)?;
        }

        if !copy.labels.is_empty() {
            let labels: Vec<String> = copy.labels.iter().cloned().collect();
            self.call("add_labels", || self.backend.add_labels(&copy.id, &labels)).await?;
        }

        tracing::info!(
            source_id = %source_id,
            copy_id = %copy.id,
            title = %copy.title,
            fragments = copy.fragments.len(),
            "Duplicated composition"
        );
        Ok(copy)
    }

    /// Run an idempotent call with timeout and retries.
    async fn call<R, F, Fut>(&self, operation: &'static str, mut make: F) -> Result<R, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, B::Error>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(operation, make()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %e, "Retrying remote call");
                    tokio::time::sleep(self.config.backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run a non-idempotent call with a timeout and no retry.
    async fn call_once<R, Fut>(&self, operation: &'static str, call: Fut) -> Result<R, SyncError>
    where
        Fut: Future<Output = Result<R, B::Error>>,
    {
        self.attempt(operation, call).await
    }

    async fn attempt<R, E, Fut>(&self, operation: &'static str, call: Fut) -> Result<R, SyncError>
    where
        E: std::error::Error,
        Fut: Future<Output = Result<R, E>>,
    {
        let after = self.config.call_timeout();
        match tokio::time::timeout(after, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SyncError::Remote { operation, message: e.to_string() }),
            Err(_) => Err(SyncError::Timeout { operation, after }),
        }
    }
}

/// Takes a caller-owned store out of `Saving` if the save future is dropped.
struct StoreSaveGuard<'a> {
    store: &'a mut CompositionStateStore,
    revision: Option<u64>,
}

impl Drop for StoreSaveGuard<'_> {
    fn drop(&mut self) {
        if let Some(revision) = self.revision.take() {
            tracing::warn!(revision, "Save cancelled before completion; draft kept");
            if let Err(e) = self.store.abort_save(revision) {
                tracing::error!(error = %e, "Could not record cancelled save");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{EditAction, FragmentChange, PropertyChange, SessionPhase};
    use crate::error::ErrorKind;
    use crate::store::{FirstItemThumbnail, InMemoryCompositionBackend};
    use crate::types::{FragmentKind, NewFragment};
    use std::time::Duration;
    use uuid::Uuid;

    type Coordinator = SyncCoordinator<InMemoryCompositionBackend, FirstItemThumbnail>;

    fn make_composition(kind: CompositionKind) -> Composition {
        let mut composition = Composition::new(
            CompositionId::new(Uuid::from_u128(1)),
            "Volcanoes",
            kind,
            OwnerId::new(Uuid::from_u128(50)),
        );
        let fragment_kind = match kind {
            CompositionKind::Collection => FragmentKind::Item,
            CompositionKind::Bundle => FragmentKind::Collection,
        };
        composition.fragments = vec![
            Fragment::persisted(1, 0, fragment_kind, Some("etna".to_string())),
            Fragment::persisted(2, 1, fragment_kind, Some("fuji".to_string())),
        ];
        composition.labels.insert("geology".to_string());
        composition
    }

    fn setup(kind: CompositionKind, thumbnails: FirstItemThumbnail) -> (Arc<InMemoryCompositionBackend>, Coordinator) {
        let backend = Arc::new(InMemoryCompositionBackend::new());
        backend.add_composition(make_composition(kind));
        let coordinator = SyncCoordinator::new(Arc::clone(&backend), Arc::new(thumbnails), SyncConfig::fast()).unwrap();
        (backend, coordinator)
    }

    fn id() -> CompositionId {
        CompositionId::new(Uuid::from_u128(1))
    }

    #[test]
    fn test_normalize_counts_changes() {
        let mut composition = make_composition(CompositionKind::Collection);
        composition.fragments[0].custom_title = Some("stale".to_string());
        composition.fragments[1].use_custom_fields = true;
        composition.fragments[1].custom_title = Some("kept".to_string());

        assert_eq!(normalize(&mut composition), 1);
        assert_eq!(composition.fragments[0].custom_title, None);
        assert_eq!(composition.fragments[1].custom_title.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_open_missing_or_wrong_kind() {
        let (_, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let err = coordinator.open(&id(), CompositionKind::Bundle).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let missing = CompositionId::new(Uuid::from_u128(404));
        assert!(coordinator.open(&missing, CompositionKind::Collection).await.is_err());
    }

    #[tokio::test]
    async fn test_save_end_to_end() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        assert!(!store.has_unsaved_changes());

        store.dispatch(EditAction::RemoveFragment { index: 0 }).unwrap();
        store
            .dispatch(EditAction::InsertFragment { index: 0, fragment: NewFragment::item("vesuvius") })
            .unwrap();
        store.dispatch(EditAction::AddLabel { label: "italy".to_string() }).unwrap();
        assert!(store.has_unsaved_changes());

        let report = coordinator.save(&mut store).await.unwrap();
        assert_eq!(report.deleted, vec![PersistedId::new(1)]);
        assert_eq!(report.updated, vec![PersistedId::new(2)]);
        assert_eq!(report.inserted.len(), 1);
        assert_eq!(report.labels_added, vec!["italy".to_string()]);
        assert_eq!(report.thumbnail_path.as_deref(), Some("thumbnails/vesuvius.jpg"));

        assert_eq!(store.phase(), SessionPhase::Loaded);
        assert!(!store.has_unsaved_changes());
        let current = store.current().unwrap();
        assert_eq!(current.fragments[0].id, FragmentId::Persisted(report.inserted[0]));
        assert_eq!(current.fragments[0].position, 0);

        let stored = backend.composition(&id()).unwrap();
        assert_eq!(stored.persisted_ids(), current.persisted_ids());
        assert!(stored.labels.contains("italy"));
    }

    #[tokio::test]
    async fn test_save_normalizes_draft() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        store
            .dispatch(EditAction::UpdateFragment {
                index: 0,
                change: FragmentChange::CustomTitle(Some("never shown".to_string())),
            })
            .unwrap();

        let report = coordinator.save(&mut store).await.unwrap();
        assert_eq!(report.normalized, 1);
        assert_eq!(store.current().unwrap().fragments[0].custom_title, None);
        assert_eq!(backend.composition(&id()).unwrap().fragments[0].custom_title, None);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_warning() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::failing());
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        store
            .dispatch(EditAction::UpdateProperty { change: PropertyChange::Visibility(true), also_initial: false })
            .unwrap();

        let report = coordinator.save(&mut store).await.unwrap();
        assert_eq!(report.thumbnail_path, None);
        assert!(matches!(report.warnings.as_slice(), [SaveWarning::ThumbnailFailed { .. }]));
        assert_eq!(store.phase(), SessionPhase::Loaded);
        assert!(backend.composition(&id()).unwrap().is_public);
    }

    #[tokio::test]
    async fn test_bundle_skips_thumbnail() {
        let (_, coordinator) = setup(CompositionKind::Bundle, FirstItemThumbnail::failing());
        let mut store = coordinator.open(&id(), CompositionKind::Bundle).await.unwrap();
        let report = coordinator.save(&mut store).await.unwrap();
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_update_failure_keeps_session_dirty() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        store
            .dispatch(EditAction::UpdateProperty { change: PropertyChange::Title("Lava".into()), also_initial: false })
            .unwrap();
        backend.fail_next("update_fragment", 10);

        let err = coordinator.save(&mut store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteCall);
        assert_eq!(err.operation(), Some("update_fragment"));
        assert_eq!(store.phase(), SessionPhase::Dirty);
        assert_eq!(store.initial().unwrap().title, "Volcanoes");
        assert_eq!(store.current().unwrap().title, "Lava");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_save_leaves_store_dirty() {
        let backend = Arc::new(InMemoryCompositionBackend::new().with_latency(Duration::from_millis(100)));
        backend.add_composition(make_composition(CompositionKind::Collection));
        let coordinator =
            SyncCoordinator::new(Arc::clone(&backend), Arc::new(FirstItemThumbnail::new()), SyncConfig::fast())
                .unwrap();
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        store
            .dispatch(EditAction::UpdateProperty { change: PropertyChange::Title("Lava".into()), also_initial: false })
            .unwrap();

        let dropped = tokio::time::timeout(Duration::from_millis(10), coordinator.save(&mut store)).await;
        assert!(dropped.is_err());
        assert_eq!(store.phase(), SessionPhase::Dirty);
        assert_eq!(store.initial().unwrap().title, "Volcanoes");

        store.dispatch(EditAction::AddLabel { label: "lava".to_string() }).unwrap();
        coordinator.save(&mut store).await.unwrap();
        assert_eq!(store.phase(), SessionPhase::Loaded);
        assert_eq!(backend.composition(&id()).unwrap().title, "Lava");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        backend.fail_next("update_composition_properties", 2);

        coordinator.save(&mut store).await.unwrap();
        assert_eq!(backend.call_count("update_composition_properties"), 3);
    }

    #[tokio::test]
    async fn test_insert_is_never_retried() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        store
            .dispatch(EditAction::InsertFragment { index: 2, fragment: NewFragment::item("krakatoa") })
            .unwrap();
        backend.fail_next("insert_fragments", 1);

        assert!(coordinator.save(&mut store).await.is_err());
        assert_eq!(backend.call_count("insert_fragments"), 1);
        assert!(store.current().unwrap().fragments[2].id.is_pending());
    }

    #[tokio::test]
    async fn test_retry_after_partial_failure_does_not_reinsert() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let mut store = coordinator.open(&id(), CompositionKind::Collection).await.unwrap();
        store
            .dispatch(EditAction::InsertFragment { index: 2, fragment: NewFragment::item("krakatoa") })
            .unwrap();
        backend.fail_next("update_composition_properties", 10);

        assert!(coordinator.save(&mut store).await.is_err());
        let adopted = store.current().unwrap().fragments[2].id.persisted().unwrap();
        assert_eq!(store.carried_ids(), BTreeSet::from([adopted]));

        backend.fail_next("update_composition_properties", 0);
        let report = coordinator.save(&mut store).await.unwrap();
        assert!(report.inserted.is_empty());
        assert!(report.updated.contains(&adopted));
        assert_eq!(backend.call_count("insert_fragments"), 1);
        assert_eq!(backend.composition(&id()).unwrap().fragments.len(), 3);
        assert!(store.carried_ids().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_resolves_title() {
        let (backend, coordinator) = setup(CompositionKind::Collection, FirstItemThumbnail::new());
        let owner = OwnerId::new(Uuid::from_u128(50));

        let first = coordinator.duplicate(&id(), CompositionKind::Collection, &owner).await.unwrap();
        assert_eq!(first.title, "copy 1: Volcanoes");
        assert_eq!(first.fragments.len(), 2);
        assert!(first.fragments.iter().all(|f| !f.id.is_pending()));
        assert!(!first.is_public);

        let second = coordinator.duplicate(&first.id, CompositionKind::Collection, &owner).await.unwrap();
        assert_eq!(second.title, "copy 2: Volcanoes");

        let stored = backend.composition(&second.id).unwrap();
        assert_eq!(stored.fragments.len(), 2);
        assert!(stored.labels.contains("geology"));
    }
}
