//! End-to-end tests: edit sessions saved through the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use composition_sync::store::{BackendCall, FirstItemThumbnail, InMemoryCompositionBackend};
use composition_sync::{
    Composition, CompositionId, CompositionKind, Direction, EditAction, EditSession, ErrorKind, Fragment,
    FragmentChange, FragmentId, FragmentKind, NewFragment, OwnerId, PersistedId, PropertyChange,
    SaveWarning, SessionPhase, SyncConfig, SyncCoordinator, SyncError,
};
use uuid::Uuid;

type Session = EditSession<InMemoryCompositionBackend, FirstItemThumbnail>;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

const OWNER: u128 = 900;

fn collection_id() -> CompositionId {
    CompositionId::new(Uuid::from_u128(1))
}

fn bundle_id() -> CompositionId {
    CompositionId::new(Uuid::from_u128(2))
}

fn owner() -> OwnerId {
    OwnerId::new(Uuid::from_u128(OWNER))
}

fn seed(backend: &InMemoryCompositionBackend) {
    let mut collection = Composition::new(collection_id(), "Foo", CompositionKind::Collection, owner());
    collection.fragments = vec![
        Fragment::persisted(10, 0, FragmentKind::Item, Some("a".to_string())),
        Fragment::persisted(11, 1, FragmentKind::Text, None),
        Fragment::persisted(12, 2, FragmentKind::Item, Some("c".to_string())),
    ];
    collection.labels.insert("travel".to_string());
    backend.add_composition(collection);

    let mut bundle = Composition::new(bundle_id(), "Trips", CompositionKind::Bundle, owner());
    bundle.fragments = vec![Fragment::persisted(20, 0, FragmentKind::Collection, Some("col-1".to_string()))];
    backend.add_composition(bundle);
}

fn build(backend: InMemoryCompositionBackend, thumbnails: FirstItemThumbnail, config: SyncConfig) -> (
    Arc<InMemoryCompositionBackend>,
    Arc<SyncCoordinator<InMemoryCompositionBackend, FirstItemThumbnail>>,
) {
    seed(&backend);
    let backend = Arc::new(backend);
    let coordinator = SyncCoordinator::new(Arc::clone(&backend), Arc::new(thumbnails), config).unwrap();
    (backend, Arc::new(coordinator))
}

async fn open_collection() -> (Arc<InMemoryCompositionBackend>, Session) {
    let (backend, coordinator) = build(InMemoryCompositionBackend::new(), FirstItemThumbnail::new(), SyncConfig::fast());
    let session = EditSession::open(coordinator, &collection_id(), CompositionKind::Collection)
        .await
        .unwrap();
    (backend, session)
}

fn rename(title: &str) -> EditAction {
    EditAction::UpdateProperty { change: PropertyChange::Title(title.to_string()), also_initial: false }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dirty Tracking
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dirty_flag_follows_content() {
    let (_, session) = open_collection().await;
    assert!(!session.has_unsaved_changes());

    session.dispatch(rename("Bar")).unwrap();
    assert!(session.has_unsaved_changes());
    assert_eq!(session.phase(), SessionPhase::Dirty);

    session.dispatch(rename("Foo")).unwrap();
    assert!(!session.has_unsaved_changes());
    assert_eq!(session.phase(), SessionPhase::Loaded);
}

#[tokio::test]
async fn test_property_applied_to_both_snapshots_stays_clean() {
    let (_, session) = open_collection().await;
    session
        .dispatch(EditAction::UpdateProperty {
            change: PropertyChange::Thumbnail(Some("thumbnails/manual.jpg".to_string())),
            also_initial: true,
        })
        .unwrap();
    assert!(!session.has_unsaved_changes());
}

// ─────────────────────────────────────────────────────────────────────────────
// Save Protocol
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_first_and_insert_new_at_front() {
    let (backend, session) = open_collection().await;
    session.dispatch(EditAction::RemoveFragment { index: 0 }).unwrap();
    session
        .dispatch(EditAction::InsertFragment { index: 0, fragment: NewFragment::item("z") })
        .unwrap();

    let report = session.save().await.unwrap();
    assert_eq!(report.deleted, vec![PersistedId::new(10)]);
    assert_eq!(report.updated, vec![PersistedId::new(11), PersistedId::new(12)]);
    assert_eq!(report.inserted.len(), 1);

    let stored = backend.composition(&collection_id()).unwrap();
    let refs: Vec<Option<&str>> = stored.fragments.iter().map(|f| f.content_ref.as_deref()).collect();
    assert_eq!(refs, vec![Some("z"), None, Some("c")]);
    assert_eq!(stored.fragments.iter().map(|f| f.position).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(stored.thumbnail_path.as_deref(), Some("thumbnails/z.jpg"));

    let current = session.current().unwrap();
    assert_eq!(current.fragments[0].id, FragmentId::Persisted(report.inserted[0]));
    assert_eq!(session.initial().unwrap(), current);
}

#[tokio::test]
async fn test_swap_writes_new_positions() {
    let (backend, session) = open_collection().await;
    session
        .dispatch(EditAction::SwapFragments { index: 2, direction: Direction::Up })
        .unwrap();

    let report = session.save().await.unwrap();
    assert!(report.inserted.is_empty());
    assert!(report.deleted.is_empty());

    let stored = backend.composition(&collection_id()).unwrap();
    let ids: Vec<FragmentId> = stored.fragments.iter().map(|f| f.id).collect();
    assert_eq!(
        ids,
        vec![
            FragmentId::Persisted(PersistedId::new(10)),
            FragmentId::Persisted(PersistedId::new(12)),
            FragmentId::Persisted(PersistedId::new(11)),
        ]
    );
}

#[tokio::test]
async fn test_labels_are_diffed() {
    let (backend, session) = open_collection().await;
    session.dispatch(EditAction::RemoveLabel { label: "travel".to_string() }).unwrap();
    session.dispatch(EditAction::AddLabel { label: "food".to_string() }).unwrap();

    let report = session.save().await.unwrap();
    assert_eq!(report.labels_added, vec!["food".to_string()]);
    assert_eq!(report.labels_removed, vec!["travel".to_string()]);

    let calls = backend.calls();
    assert!(calls.contains(&BackendCall::AddLabels(vec!["food".to_string()])));
    assert!(calls.contains(&BackendCall::RemoveLabels(vec!["travel".to_string()])));
}

#[tokio::test]
async fn test_unchanged_labels_make_no_label_calls() {
    let (backend, session) = open_collection().await;
    session.dispatch(rename("Bar")).unwrap();
    session.save().await.unwrap();
    assert_eq!(backend.call_count("add_labels"), 0);
    assert_eq!(backend.call_count("remove_labels"), 0);
}

#[tokio::test]
async fn test_hidden_custom_fields_are_cleared_on_save() {
    let (backend, session) = open_collection().await;
    session
        .dispatch(EditAction::UpdateFragment {
            index: 0,
            change: FragmentChange::CustomDescription(Some("draft note".to_string())),
        })
        .unwrap();

    let report = session.save().await.unwrap();
    assert_eq!(report.normalized, 1);
    assert_eq!(backend.composition(&collection_id()).unwrap().fragments[0].custom_description, None);
}

#[tokio::test]
async fn test_text_fragment_keeps_its_text() {
    let (backend, session) = open_collection().await;
    session
        .dispatch(EditAction::InsertFragment { index: 0, fragment: NewFragment::text("Intro", "Welcome") })
        .unwrap();

    let rejected = session.dispatch(EditAction::UpdateFragment {
        index: 0,
        change: FragmentChange::UseCustomFields(false),
    });
    assert!(rejected.is_err());
    assert!(session.current().unwrap().fragments[0].use_custom_fields);

    let report = session.save().await.unwrap();
    assert_eq!(report.normalized, 0);
    let stored = backend.composition(&collection_id()).unwrap();
    assert_eq!(stored.fragments[0].custom_title.as_deref(), Some("Intro"));
    assert_eq!(stored.fragments[0].custom_description.as_deref(), Some("Welcome"));
}

#[tokio::test]
async fn test_update_failure_keeps_draft() {
    let (backend, session) = open_collection().await;
    session.dispatch(rename("Bar")).unwrap();
    backend.fail_next("update_fragment", 100);

    let err = session.save().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteCall);
    assert_eq!(session.phase(), SessionPhase::Dirty);
    assert!(session.has_unsaved_changes());
    assert_eq!(session.initial().unwrap().title, "Foo");
    assert_eq!(session.current().unwrap().title, "Bar");
    assert_eq!(backend.composition(&collection_id()).unwrap().title, "Foo");
}

#[tokio::test]
async fn test_retry_after_failure_does_not_duplicate_inserts() {
    let (backend, session) = open_collection().await;
    session
        .dispatch(EditAction::InsertFragment { index: 3, fragment: NewFragment::text("Notes", "On the road") })
        .unwrap();
    backend.fail_next("update_fragment", 100);

    assert!(session.save().await.is_err());
    assert_eq!(backend.call_count("insert_fragments"), 1);
    assert!(!session.current().unwrap().fragments[3].id.is_pending());
    assert!(session.has_unsaved_changes());

    backend.fail_next("update_fragment", 0);
    let report = session.save().await.unwrap();
    assert!(report.inserted.is_empty());
    assert_eq!(backend.call_count("insert_fragments"), 1);
    assert_eq!(backend.composition(&collection_id()).unwrap().fragments.len(), 4);
    assert!(!session.has_unsaved_changes());
}

#[tokio::test]
async fn test_thumbnail_failure_does_not_fail_save() {
    let (_, coordinator) = build(InMemoryCompositionBackend::new(), FirstItemThumbnail::failing(), SyncConfig::fast());
    let session = EditSession::open(coordinator, &collection_id(), CompositionKind::Collection)
        .await
        .unwrap();
    session.dispatch(rename("Bar")).unwrap();

    let report = session.save().await.unwrap();
    assert_eq!(report.thumbnail_path, None);
    assert!(matches!(report.warnings.as_slice(), [SaveWarning::ThumbnailFailed { .. }]));
    assert_eq!(session.phase(), SessionPhase::Loaded);
    assert_eq!(session.initial().unwrap().thumbnail_path, None);
}

#[tokio::test]
async fn test_bundle_accepts_only_collections() {
    let (_, coordinator) = build(InMemoryCompositionBackend::new(), FirstItemThumbnail::new(), SyncConfig::fast());
    let session = EditSession::open(coordinator, &bundle_id(), CompositionKind::Bundle)
        .await
        .unwrap();

    let rejected = session.dispatch(EditAction::InsertFragment { index: 1, fragment: NewFragment::item("x") });
    assert!(rejected.is_err());
    assert!(!session.has_unsaved_changes());

    session
        .dispatch(EditAction::InsertFragment { index: 1, fragment: NewFragment::collection("col-2") })
        .unwrap();
    let report = session.save().await.unwrap();
    assert_eq!(report.inserted.len(), 1);
    assert_eq!(report.thumbnail_path, None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_batches_run_concurrently() {
    let backend = InMemoryCompositionBackend::new().with_latency(Duration::from_millis(100));
    let (_, coordinator) = build(backend, FirstItemThumbnail::new(), SyncConfig::fast());
    let session = EditSession::open(coordinator, &collection_id(), CompositionKind::Collection)
        .await
        .unwrap();
    session.dispatch(EditAction::RemoveFragment { index: 2 }).unwrap();
    session
        .dispatch(EditAction::InsertFragment { index: 0, fragment: NewFragment::item("y") })
        .unwrap();

    let started = tokio::time::Instant::now();
    session.save().await.unwrap();
    // One round for the three batches, one for properties.
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out() {
    let backend = InMemoryCompositionBackend::new().with_latency(Duration::from_secs(5));
    let (backend, coordinator) = build(backend, FirstItemThumbnail::new(), SyncConfig::fast());

    let err = coordinator.fetch(&collection_id(), CompositionKind::Collection).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout { operation: "fetch_composition", .. }));
    assert_eq!(err.kind(), ErrorKind::RemoteCall);
    // Timed-out calls never reach the backend body.
    assert_eq!(backend.call_count("fetch_composition"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_save_can_be_retried() {
    let backend = InMemoryCompositionBackend::new().with_latency(Duration::from_millis(100));
    let (backend, coordinator) = build(backend, FirstItemThumbnail::new(), SyncConfig::fast());
    let session = EditSession::open(coordinator, &collection_id(), CompositionKind::Collection)
        .await
        .unwrap();
    session.dispatch(rename("Bar")).unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), session.save()).await;
    assert!(abandoned.is_err());
    assert_eq!(session.phase(), SessionPhase::Dirty);
    assert!(session.has_unsaved_changes());

    session.save().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Loaded);
    assert_eq!(backend.composition(&collection_id()).unwrap().title, "Bar");
}

#[tokio::test]
async fn test_open_unknown_composition() {
    let (_, coordinator) = build(InMemoryCompositionBackend::new(), FirstItemThumbnail::new(), SyncConfig::fast());
    let missing = CompositionId::new(Uuid::from_u128(404));
    let err = EditSession::open(coordinator, &missing, CompositionKind::Collection)
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─────────────────────────────────────────────────────────────────────────────
// Duplication
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_duplicate_picks_first_free_index() {
    let backend = InMemoryCompositionBackend::new();
    for (id, title) in [(50u128, "copy 1: Foo"), (51, "copy 2: Foo")] {
        backend.add_composition(Composition::new(
            CompositionId::new(Uuid::from_u128(id)),
            title,
            CompositionKind::Collection,
            owner(),
        ));
    }
    let (backend, coordinator) = build(backend, FirstItemThumbnail::new(), SyncConfig::fast());

    let copy = coordinator
        .duplicate(&collection_id(), CompositionKind::Collection, &owner())
        .await
        .unwrap();
    assert_eq!(copy.title, "copy 3: Foo");

    let stored = backend.composition(&copy.id).unwrap();
    assert_eq!(stored.fragments.len(), 3);
    assert!(stored.labels.contains("travel"));
}

#[tokio::test]
async fn test_duplicate_for_other_owner_starts_at_one() {
    let (_, coordinator) = build(InMemoryCompositionBackend::new(), FirstItemThumbnail::new(), SyncConfig::fast());
    let stranger = OwnerId::new(Uuid::from_u128(1234));
    let copy = coordinator
        .duplicate(&collection_id(), CompositionKind::Collection, &stranger)
        .await
        .unwrap();
    assert_eq!(copy.title, "copy 1: Foo");
    assert_eq!(copy.owner_id, stranger);
}
