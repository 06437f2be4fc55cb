//! Composition types: collections and bundles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use super::fragment::{Fragment, FragmentId, PersistedId};

/// Unique identifier for a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositionId(Uuid);

impl CompositionId {
    /// Create a new CompositionId from a UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a CompositionId from a UUID string.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CompositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CompositionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier of the profile owning a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Create a new OwnerId from a UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sub-kind of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionKind {
    /// Ordered media items and text blocks.
    Collection,
    /// Ordered collections.
    Bundle,
}

impl CompositionKind {
    /// Parse kind from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "collection" => Some(Self::Collection),
            "bundle" => Some(Self::Bundle),
            _ => None,
        }
    }
}

impl fmt::Display for CompositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection => write!(f, "collection"),
            Self::Bundle => write!(f, "bundle"),
        }
    }
}

/// A collection or bundle: a named, ordered container of fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    /// Unique composition identifier.
    pub id: CompositionId,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Collection or bundle.
    pub kind: CompositionKind,
    /// Owning profile.
    pub owner_id: OwnerId,
    /// Whether the composition is publicly visible.
    pub is_public: bool,
    /// Labels, kept sorted.
    pub labels: BTreeSet<String>,
    /// Fragments in display order.
    pub fragments: Vec<Fragment>,
    /// Derived thumbnail path.
    pub thumbnail_path: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last successful save.
    pub updated_at: DateTime<Utc>,
}

impl Composition {
    /// Create an empty, private composition.
    pub fn new(id: CompositionId, title: impl Into<String>, kind: CompositionKind, owner_id: OwnerId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: None,
            kind,
            owner_id,
            is_public: false,
            labels: BTreeSet::new(),
            fragments: Vec::new(),
            thumbnail_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Scalar properties persisted in one call.
    pub fn properties(&self) -> CompositionProperties {
        CompositionProperties {
            title: self.title.clone(),
            description: self.description.clone(),
            is_public: self.is_public,
            thumbnail_path: self.thumbnail_path.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Persisted fragment ids, in list order.
    pub fn persisted_ids(&self) -> Vec<PersistedId> {
        self.fragments.iter().filter_map(|f| f.id.persisted()).collect()
    }

    /// Find a fragment by identity.
    pub fn fragment(&self, id: &FragmentId) -> Option<&Fragment> {
        self.fragments.iter().find(|f| &f.id == id)
    }

    /// Number of fragments.
    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }
}

/// Composition-level scalar fields written by `update_composition_properties`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionProperties {
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Public visibility.
    pub is_public: bool,
    /// Derived thumbnail path.
    pub thumbnail_path: Option<String>,
    /// Save timestamp.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FragmentKind;

    #[test]
    fn test_kind_roundtrip_str() {
        assert_eq!(CompositionKind::from_str("Bundle"), Some(CompositionKind::Bundle));
        assert_eq!(CompositionKind::Collection.to_string(), "collection");
        assert_eq!(CompositionKind::from_str("folder"), None);
    }

    #[test]
    fn test_persisted_ids_skip_pending() {
        let mut composition = Composition::new(
            CompositionId::new(Uuid::from_u128(1)),
            "Rivers",
            CompositionKind::Collection,
            OwnerId::new(Uuid::from_u128(9)),
        );
        composition.fragments.push(Fragment::persisted(4, 0, FragmentKind::Item, Some("a".into())));
        composition.fragments.push(
            crate::types::NewFragment::text("Intro", "")
                .into_fragment(crate::types::PendingToken::new(1)),
        );

        assert_eq!(composition.persisted_ids(), vec![PersistedId::new(4)]);
        assert!(composition.fragment(&FragmentId::Persisted(PersistedId::new(4))).is_some());
    }
}
