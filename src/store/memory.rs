//! In-memory backend for testing and embedding.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::{CompositionBackend, ThumbnailRenderer};
use crate::types::{
    Composition, CompositionId, CompositionKind, CompositionProperties, Fragment, FragmentFields,
    FragmentId, FragmentKind, OwnerId, PersistedId,
};

/// Error type for in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryError {
    /// Composition not found.
    #[error("Composition not found: {0}")]
    CompositionNotFound(CompositionId),
    /// Fragment not found.
    #[error("Fragment not found: {0}")]
    FragmentNotFound(PersistedId),
    /// No media item to derive a thumbnail from.
    #[error("Composition {0} has no media item for a thumbnail")]
    NoThumbnailSource(CompositionId),
    /// Failure injected by a test.
    #[error("Injected failure in {0}")]
    Injected(String),
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `fetch_composition`.
    FetchComposition(CompositionId),
    /// `insert_composition`.
    InsertComposition(CompositionId),
    /// `insert_fragments`, with the number of fragments sent.
    InsertFragments {
        /// Target composition.
        composition_id: CompositionId,
        /// Batch size.
        count: usize,
    },
    /// `update_fragment`.
    UpdateFragment(PersistedId),
    /// `delete_fragment`.
    DeleteFragment(PersistedId),
    /// `update_composition_properties`.
    UpdateProperties(CompositionId),
    /// `add_labels`.
    AddLabels(Vec<String>),
    /// `remove_labels`.
    RemoveLabels(Vec<String>),
    /// `list_titles_for_owner`.
    ListTitles(OwnerId),
}

impl BackendCall {
    /// Operation name, as used by [`InMemoryCompositionBackend::fail_next`].
    pub fn operation(&self) -> &'static str {
        match self {
            Self::FetchComposition(_) => "fetch_composition",
            Self::InsertComposition(_) => "insert_composition",
            Self::InsertFragments { .. } => "insert_fragments",
            Self::UpdateFragment(_) => "update_fragment",
            Self::DeleteFragment(_) => "delete_fragment",
            Self::UpdateProperties(_) => "update_composition_properties",
            Self::AddLabels(_) => "add_labels",
            Self::RemoveLabels(_) => "remove_labels",
            Self::ListTitles(_) => "list_titles_for_owner",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    compositions: BTreeMap<CompositionId, Composition>,
    fragment_owner: BTreeMap<PersistedId, CompositionId>,
    next_fragment_id: i64,
    calls: Vec<BackendCall>,
    failures: BTreeMap<String, u32>,
}

impl Inner {
    /// Record the call and consume one injected failure for it, if any.
    fn enter(&mut self, call: BackendCall) -> Result<(), InMemoryError> {
        let operation = call.operation();
        self.calls.push(call);
        if let Some(remaining) = self.failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(InMemoryError::Injected(operation.to_string()));
            }
        }
        Ok(())
    }

    fn fragment_mut(&mut self, id: PersistedId) -> Result<&mut Fragment, InMemoryError> {
        let owner = self.fragment_owner.get(&id).copied().ok_or(InMemoryError::FragmentNotFound(id))?;
        self.compositions
            .get_mut(&owner)
            .and_then(|c| c.fragments.iter_mut().find(|f| f.id == FragmentId::Persisted(id)))
            .ok_or(InMemoryError::FragmentNotFound(id))
    }

    fn register(&mut self, composition: &Composition) {
        for id in composition.persisted_ids() {
            self.fragment_owner.insert(id, composition.id);
            self.next_fragment_id = self.next_fragment_id.max(id.get());
        }
    }
}

/// In-memory composition backend for testing.
///
/// Records every call, can inject failures per operation, and can add a
/// fixed latency to each call.
#[derive(Debug, Default)]
pub struct InMemoryCompositionBackend {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl InMemoryCompositionBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a persisted composition.
    pub fn add_composition(&self, composition: Composition) {
        let mut inner = self.inner.lock();
        inner.register(&composition);
        inner.compositions.insert(composition.id, composition);
    }

    /// Stored state of a composition, fragments in position order.
    pub fn composition(&self, id: &CompositionId) -> Option<Composition> {
        let inner = self.inner.lock();
        inner.compositions.get(id).cloned().map(sorted)
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of calls made to `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.operation() == operation).count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Make the next `times` calls to `operation` fail.
    pub fn fail_next(&self, operation: &str, times: u32) {
        self.inner.lock().failures.insert(operation.to_string(), times);
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn sorted(mut composition: Composition) -> Composition {
    composition.fragments.sort_by_key(|f| f.position);
    composition
}

#[async_trait]
impl CompositionBackend for InMemoryCompositionBackend {
    type Error = InMemoryError;

    async fn fetch_composition(
        &self,
        id: &CompositionId,
        kind: CompositionKind,
    ) -> Result<Option<Composition>, Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::FetchComposition(*id))?;
        Ok(inner
            .compositions
            .get(id)
            .filter(|c| c.kind == kind)
            .cloned()
            .map(sorted))
    }

    async fn insert_composition(&self, composition: &Composition) -> Result<CompositionId, Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::InsertComposition(composition.id))?;
        let mut stored = composition.clone();
        stored.fragments.clear();
        stored.labels = BTreeSet::new();
        inner.compositions.insert(stored.id, stored);
        Ok(composition.id)
    }

    async fn insert_fragments(
        &self,
        composition_id: &CompositionId,
        fragments: &[FragmentFields],
    ) -> Result<Vec<PersistedId>, Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::InsertFragments { composition_id: *composition_id, count: fragments.len() })?;
        if !inner.compositions.contains_key(composition_id) {
            return Err(InMemoryError::CompositionNotFound(*composition_id));
        }

        let mut ids = Vec::with_capacity(fragments.len());
        for fields in fragments {
            inner.next_fragment_id += 1;
            let id = PersistedId::new(inner.next_fragment_id);
            inner.fragment_owner.insert(id, *composition_id);
            let fragment = Fragment {
                id: FragmentId::Persisted(id),
                position: fields.position,
                kind: fields.kind,
                content_ref: fields.content_ref.clone(),
                use_custom_fields: fields.use_custom_fields,
                custom_title: fields.custom_title.clone(),
                custom_description: fields.custom_description.clone(),
                cut: fields.cut,
            };
            if let Some(composition) = inner.compositions.get_mut(composition_id) {
                composition.fragments.push(fragment);
            }
            ids.push(id);
        }
        Ok(ids)
    }

    async fn update_fragment(&self, id: PersistedId, fields: &FragmentFields) -> Result<(), Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::UpdateFragment(id))?;
        let fragment = inner.fragment_mut(id)?;
        fragment.position = fields.position;
        fragment.kind = fields.kind;
        fragment.content_ref = fields.content_ref.clone();
        fragment.use_custom_fields = fields.use_custom_fields;
        fragment.custom_title = fields.custom_title.clone();
        fragment.custom_description = fields.custom_description.clone();
        fragment.cut = fields.cut;
        Ok(())
    }

    async fn delete_fragment(&self, id: PersistedId) -> Result<(), Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::DeleteFragment(id))?;
        // Deleting twice is a no-op.
        if let Some(owner) = inner.fragment_owner.remove(&id) {
            if let Some(composition) = inner.compositions.get_mut(&owner) {
                composition.fragments.retain(|f| f.id != FragmentId::Persisted(id));
            }
        }
        Ok(())
    }

    async fn update_composition_properties(
        &self,
        id: &CompositionId,
        properties: &CompositionProperties,
    ) -> Result<(), Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::UpdateProperties(*id))?;
        let composition = inner.compositions.get_mut(id).ok_or(InMemoryError::CompositionNotFound(*id))?;
        composition.title = properties.title.clone();
        composition.description = properties.description.clone();
        composition.is_public = properties.is_public;
        composition.thumbnail_path = properties.thumbnail_path.clone();
        composition.updated_at = properties.updated_at;
        Ok(())
    }

    async fn add_labels(&self, id: &CompositionId, labels: &[String]) -> Result<(), Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::AddLabels(labels.to_vec()))?;
        let composition = inner.compositions.get_mut(id).ok_or(InMemoryError::CompositionNotFound(*id))?;
        composition.labels.extend(labels.iter().cloned());
        Ok(())
    }

    async fn remove_labels(&self, id: &CompositionId, labels: &[String]) -> Result<(), Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::RemoveLabels(labels.to_vec()))?;
        let composition = inner.compositions.get_mut(id).ok_or(InMemoryError::CompositionNotFound(*id))?;
        for label in labels {
            composition.labels.remove(label);
        }
        Ok(())
    }

    async fn list_titles_for_owner(&self, owner: &OwnerId, kind: CompositionKind) -> Result<Vec<String>, Self::Error> {
        self.pause().await;
        let mut inner = self.inner.lock();
        inner.enter(BackendCall::ListTitles(*owner))?;
        Ok(inner
            .compositions
            .values()
            .filter(|c| &c.owner_id == owner && c.kind == kind)
            .map(|c| c.title.clone())
            .collect())
    }
}

/// Thumbnail renderer that picks the first media item of a collection.
#[derive(Debug, Clone, Default)]
pub struct FirstItemThumbnail {
    failing: bool,
}

impl FirstItemThumbnail {
    /// Create a working renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a renderer whose every call fails.
    pub fn failing() -> Self {
        Self { failing: true }
    }
}

#[async_trait]
impl ThumbnailRenderer for FirstItemThumbnail {
    type Error = InMemoryError;

    async fn compute_thumbnail(&self, composition: &Composition) -> Result<String, Self::Error> {
        if self.failing {
            return Err(InMemoryError::Injected("compute_thumbnail".to_string()));
        }
        composition
            .fragments
            .iter()
            .filter(|f| f.kind == FragmentKind::Item)
            .min_by_key(|f| f.position)
            .and_then(|f| f.content_ref.as_ref())
            .map(|content_ref| format!("thumbnails/{}.jpg", content_ref))
            .ok_or(InMemoryError::NoThumbnailSource(composition.id))
    }
}
