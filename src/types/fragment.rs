//! Fragment types: the ordered entries of a composition.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::composition::CompositionKind;

/// Stable, server-assigned fragment identifier.
///
/// Implements `Ord` so id sets iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersistedId(i64);

impl PersistedId {
    /// Wrap a raw server id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw server id.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PersistedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PersistedId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Locally generated identifier for a fragment that has not been persisted yet.
///
/// Tokens live in their own namespace, so they can never collide with a
/// [`PersistedId`]. Fresh tokens come from
/// [`PendingTokenAllocator`](crate::ordering::PendingTokenAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingToken(u64);

impl PendingToken {
    /// Wrap a raw local token.
    pub fn new(token: u64) -> Self {
        Self(token)
    }

    /// Get the raw local token.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PendingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending-{}", self.0)
    }
}

/// Identity of a fragment: persisted on the server, or still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FragmentId {
    /// Server-assigned id.
    Persisted(PersistedId),
    /// Local token, replaced by a persisted id once the fragment is saved.
    Pending(PendingToken),
}

impl FragmentId {
    /// The persisted id, if any.
    pub fn persisted(&self) -> Option<PersistedId> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Pending(_) => None,
        }
    }

    /// The pending token, if any.
    pub fn pending(&self) -> Option<PendingToken> {
        match self {
            Self::Persisted(_) => None,
            Self::Pending(token) => Some(*token),
        }
    }

    /// Whether the fragment still waits for a server id.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{}", id),
            Self::Pending(token) => write!(f, "{}", token),
        }
    }
}

/// What a fragment points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// An external media item (video, audio).
    Item,
    /// Inline text with no external content.
    Text,
    /// A nested collection (only valid inside a bundle).
    Collection,
}

impl FragmentKind {
    /// Parse kind from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "item" => Some(Self::Item),
            "text" => Some(Self::Text),
            "collection" => Some(Self::Collection),
            _ => None,
        }
    }

    /// Whether this kind references external content.
    pub fn requires_content_ref(&self) -> bool {
        matches!(self, Self::Item | Self::Collection)
    }

    /// Whether the custom title/description are the content itself.
    pub fn requires_custom_fields(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Whether a composition of `kind` may hold fragments of this kind.
    pub fn fits(&self, kind: CompositionKind) -> bool {
        match kind {
            CompositionKind::Collection => matches!(self, Self::Item | Self::Text),
            CompositionKind::Bundle => matches!(self, Self::Collection),
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => write!(f, "item"),
            Self::Text => write!(f, "text"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

/// Start and end offsets (seconds) cutting a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaCut {
    /// Start offset in seconds.
    pub start: u32,
    /// End offset in seconds, exclusive.
    pub end: u32,
}

impl MediaCut {
    /// Create a cut, rejecting empty or inverted ranges.
    pub fn new(start: u32, end: u32) -> Result<Self, FragmentError> {
        let cut = Self { start, end };
        cut.validate()?;
        Ok(cut)
    }

    /// Check `start < end`.
    pub fn validate(&self) -> Result<(), FragmentError> {
        if self.start >= self.end {
            return Err(FragmentError::InvalidCut { start: self.start, end: self.end });
        }
        Ok(())
    }

    /// Length of the cut in seconds.
    pub fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// Structural problems with a single fragment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FragmentError {
    /// Fragment kind not allowed in this composition kind.
    #[error("Fragment kind {fragment} not allowed in a {composition}")]
    KindMismatch {
        /// Kind of the offending fragment.
        fragment: FragmentKind,
        /// Kind of the composition.
        composition: CompositionKind,
    },
    /// Item or collection fragment without a content reference.
    #[error("Fragment of kind {0} requires a content reference")]
    MissingContentRef(FragmentKind),
    /// Text fragment with custom fields switched off; saving would erase its text.
    #[error("Fragment of kind {0} must use its custom fields")]
    CustomFieldsRequired(FragmentKind),
    /// Cut points with `start >= end`.
    #[error("Invalid media cut: start {start} must be before end {end}")]
    InvalidCut {
        /// Start offset.
        start: u32,
        /// End offset.
        end: u32,
    },
}

/// One ordered entry of a composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Persisted id or pending token.
    pub id: FragmentId,
    /// Zero-based position; equals the list index after every edit.
    pub position: usize,
    /// Type tag.
    pub kind: FragmentKind,
    /// External item or sub-collection id. `None` for text fragments.
    pub content_ref: Option<String>,
    /// Whether the custom title/description override the referenced content.
    pub use_custom_fields: bool,
    /// Custom title.
    pub custom_title: Option<String>,
    /// Custom description.
    pub custom_description: Option<String>,
    /// Optional media cut points.
    pub cut: Option<MediaCut>,
}

impl Fragment {
    /// Create a persisted fragment referencing external content.
    ///
    /// Text fragments start with custom fields enabled.
    pub fn persisted(id: i64, position: usize, kind: FragmentKind, content_ref: Option<String>) -> Self {
        Self {
            id: FragmentId::Persisted(PersistedId::new(id)),
            position,
            kind,
            content_ref,
            use_custom_fields: kind.requires_custom_fields(),
            custom_title: None,
            custom_description: None,
            cut: None,
        }
    }

    /// Check the fragment against the composition kind it lives in.
    pub fn validate_for(&self, kind: CompositionKind) -> Result<(), FragmentError> {
        if !self.kind.fits(kind) {
            return Err(FragmentError::KindMismatch {
                fragment: self.kind,
                composition: kind,
            });
        }
        if self.kind.requires_content_ref() && self.content_ref.is_none() {
            return Err(FragmentError::MissingContentRef(self.kind));
        }
        if self.kind.requires_custom_fields() && !self.use_custom_fields {
            return Err(FragmentError::CustomFieldsRequired(self.kind));
        }
        if let Some(cut) = &self.cut {
            cut.validate()?;
        }
        Ok(())
    }

    /// Clear custom title/description when custom fields are disabled.
    ///
    /// Returns `true` if anything was cleared.
    pub fn normalize(&mut self) -> bool {
        if self.use_custom_fields {
            return false;
        }
        let changed = self.custom_title.is_some() || self.custom_description.is_some();
        self.custom_title = None;
        self.custom_description = None;
        changed
    }

    /// The persistable field set of this fragment.
    pub fn fields(&self) -> FragmentFields {
        FragmentFields {
            position: self.position,
            kind: self.kind,
            content_ref: self.content_ref.clone(),
            use_custom_fields: self.use_custom_fields,
            custom_title: self.custom_title.clone(),
            custom_description: self.custom_description.clone(),
            cut: self.cut,
        }
    }
}

/// A fragment that has not been assigned an identity yet.
///
/// The state store turns it into a [`Fragment`] with a fresh pending token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFragment {
    /// Type tag.
    pub kind: FragmentKind,
    /// External item or sub-collection id.
    pub content_ref: Option<String>,
    /// Whether the custom fields are used.
    pub use_custom_fields: bool,
    /// Custom title.
    pub custom_title: Option<String>,
    /// Custom description.
    pub custom_description: Option<String>,
    /// Optional media cut points.
    pub cut: Option<MediaCut>,
}

impl NewFragment {
    /// A media item fragment.
    pub fn item(content_ref: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Item,
            content_ref: Some(content_ref.into()),
            use_custom_fields: false,
            custom_title: None,
            custom_description: None,
            cut: None,
        }
    }

    /// An inline text fragment. Text fragments always use their custom fields.
    pub fn text(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Text,
            content_ref: None,
            use_custom_fields: true,
            custom_title: Some(title.into()),
            custom_description: Some(description.into()),
            cut: None,
        }
    }

    /// A sub-collection fragment (for bundles).
    pub fn collection(content_ref: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Collection,
            content_ref: Some(content_ref.into()),
            use_custom_fields: false,
            custom_title: None,
            custom_description: None,
            cut: None,
        }
    }

    /// Attach a pending token. Position is fixed up by the caller's reorder.
    pub fn into_fragment(self, token: PendingToken) -> Fragment {
        Fragment {
            id: FragmentId::Pending(token),
            position: 0,
            kind: self.kind,
            content_ref: self.content_ref,
            use_custom_fields: self.use_custom_fields,
            custom_title: self.custom_title,
            custom_description: self.custom_description,
            cut: self.cut,
        }
    }
}

/// Persistable fields of a fragment, sent with insert and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentFields {
    /// Position in the composition.
    pub position: usize,
    /// Type tag.
    pub kind: FragmentKind,
    /// External content id.
    pub content_ref: Option<String>,
    /// Custom field switch.
    pub use_custom_fields: bool,
    /// Custom title.
    pub custom_title: Option<String>,
    /// Custom description.
    pub custom_description: Option<String>,
    /// Media cut points.
    pub cut: Option<MediaCut>,
}
