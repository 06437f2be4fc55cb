//! Edit actions dispatched against a composition draft.

use serde::{Deserialize, Serialize};

use crate::ordering::Direction;
use crate::types::{Fragment, MediaCut, NewFragment};

/// Field change for a single fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FragmentChange {
    /// Toggle whether the custom title/description override the content.
    UseCustomFields(bool),
    /// Set or clear the custom title.
    CustomTitle(Option<String>),
    /// Set or clear the custom description.
    CustomDescription(Option<String>),
    /// Set or clear the media cut points.
    Cut(Option<MediaCut>),
    /// Point the fragment at different external content.
    ContentRef(Option<String>),
}

/// Change to a composition-level scalar property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "property", content = "value", rename_all = "snake_case")]
pub enum PropertyChange {
    /// Rename.
    Title(String),
    /// Set or clear the description.
    Description(Option<String>),
    /// Publish or unpublish.
    Visibility(bool),
    /// Set or clear the thumbnail path.
    Thumbnail(Option<String>),
}

/// Edit action applied by [`reduce`](super::reduce).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditAction {
    /// Change one field of the fragment at `index`.
    UpdateFragment {
        /// List index.
        index: usize,
        /// The change.
        change: FragmentChange,
    },
    /// Move the fragment at `index` one step.
    SwapFragments {
        /// List index.
        index: usize,
        /// Up or down.
        direction: Direction,
    },
    /// Insert a new fragment; it receives a fresh pending token.
    InsertFragment {
        /// Target index (`len` appends).
        index: usize,
        /// The fragment content.
        fragment: NewFragment,
    },
    /// Remove the fragment at `index`.
    RemoveFragment {
        /// List index.
        index: usize,
    },
    /// Replace the whole fragment list.
    ReplaceFragments {
        /// New list, in display order.
        fragments: Vec<Fragment>,
    },
    /// Change a composition property.
    ///
    /// With `also_initial`, the change is applied to the saved snapshot too,
    /// for properties the host has already persisted out of band.
    UpdateProperty {
        /// The change.
        change: PropertyChange,
        /// Mirror into the saved snapshot.
        also_initial: bool,
    },
    /// Attach a label.
    AddLabel {
        /// Label text.
        label: String,
    },
    /// Detach a label.
    RemoveLabel {
        /// Label text.
        label: String,
    },
}

impl EditAction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateFragment { .. } => "update_fragment",
            Self::SwapFragments { .. } => "swap_fragments",
            Self::InsertFragment { .. } => "insert_fragment",
            Self::RemoveFragment { .. } => "remove_fragment",
            Self::ReplaceFragments { .. } => "replace_fragments",
            Self::UpdateProperty { .. } => "update_property",
            Self::AddLabel { .. } => "add_label",
            Self::RemoveLabel { .. } => "remove_label",
        }
    }

    /// Whether the action may touch the saved snapshot.
    pub fn touches_initial(&self) -> bool {
        matches!(self, Self::UpdateProperty { also_initial: true, .. })
    }
}
