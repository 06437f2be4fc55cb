//! Persistence and thumbnail collaborators.
//!
//! The engine never talks to storage directly. Hosts plug in an
//! implementation of [`CompositionBackend`] (and a [`ThumbnailRenderer`]
//! for collection thumbnails); no wire format is implied.

pub mod memory;

use async_trait::async_trait;

use crate::types::{
    Composition, CompositionId, CompositionKind, CompositionProperties, FragmentFields, OwnerId,
    PersistedId,
};

/// Trait for composition persistence backends.
///
/// Update, delete, property and label calls must be idempotent; the
/// coordinator retries them. Insert calls are never retried.
#[async_trait]
pub trait CompositionBackend: Send + Sync {
    /// Error type for backend operations.
    type Error: std::error::Error + Send + Sync;

    /// Fetch a composition with its fragments and labels.
    ///
    /// Returns `None` when absent or of a different kind.
    async fn fetch_composition(
        &self,
        id: &CompositionId,
        kind: CompositionKind,
    ) -> Result<Option<Composition>, Self::Error>;

    /// Create a composition row (fragments and labels are written separately).
    async fn insert_composition(&self, composition: &Composition) -> Result<CompositionId, Self::Error>;

    /// Insert fragments; returns their new ids in input order.
    async fn insert_fragments(
        &self,
        composition_id: &CompositionId,
        fragments: &[FragmentFields],
    ) -> Result<Vec<PersistedId>, Self::Error>;

    /// Overwrite the fields of one fragment.
    async fn update_fragment(&self, id: PersistedId, fields: &FragmentFields) -> Result<(), Self::Error>;

    /// Delete one fragment.
    async fn delete_fragment(&self, id: PersistedId) -> Result<(), Self::Error>;

    /// Overwrite composition-level scalar properties.
    async fn update_composition_properties(
        &self,
        id: &CompositionId,
        properties: &CompositionProperties,
    ) -> Result<(), Self::Error>;

    /// Attach labels.
    async fn add_labels(&self, id: &CompositionId, labels: &[String]) -> Result<(), Self::Error>;

    /// Detach labels.
    async fn remove_labels(&self, id: &CompositionId, labels: &[String]) -> Result<(), Self::Error>;

    /// Titles of every composition of `kind` owned by `owner`.
    async fn list_titles_for_owner(&self, owner: &OwnerId, kind: CompositionKind) -> Result<Vec<String>, Self::Error>;
}

/// Trait for thumbnail computation. Failures are never fatal to a save.
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    /// Error type for thumbnail computation.
    type Error: std::error::Error + Send + Sync;

    /// Compute the thumbnail path for a composition.
    async fn compute_thumbnail(&self, composition: &Composition) -> Result<String, Self::Error>;
}

pub use memory::{BackendCall, FirstItemThumbnail, InMemoryCompositionBackend, InMemoryError};
