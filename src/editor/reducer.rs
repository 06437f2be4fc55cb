//! Pure state transition: `(state, action) -> state`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::action::{EditAction, FragmentChange, PropertyChange};
use super::EditError;
use crate::ordering::{self, PendingTokenAllocator};
use crate::types::{Composition, Fragment, FragmentId, PersistedId};

/// Snapshot pair plus the session's pending-token allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorState {
    /// Last successfully persisted snapshot.
    pub initial: Composition,
    /// Working draft.
    pub current: Composition,
    /// Source of pending tokens for inserted fragments.
    pub tokens: PendingTokenAllocator,
    /// Ids inserted by failed saves and not yet part of `initial`.
    #[serde(default)]
    pub carried: BTreeSet<PersistedId>,
}

impl EditorState {
    /// Start a session: both snapshots are deep copies of `composition`.
    ///
    /// Fragments are sorted by their stored position and renumbered.
    pub fn new(mut composition: Composition) -> Self {
        composition.fragments.sort_by_key(|f| f.position);
        ordering::reorder(&mut composition.fragments);
        let tokens = PendingTokenAllocator::after(&composition.fragments);
        Self {
            initial: composition.clone(),
            current: composition,
            tokens,
            carried: BTreeSet::new(),
        }
    }

    /// Whether `id` exists server-side as far as this session knows.
    pub fn knows(&self, id: PersistedId) -> bool {
        self.carried.contains(&id) || self.initial.fragments.iter().any(|f| f.id == FragmentId::Persisted(id))
    }
}

/// Apply `action` to a copy of `state`.
///
/// `state` is never modified; on error nothing changes.
pub fn reduce(state: &EditorState, action: EditAction) -> Result<EditorState, EditError> {
    let mut next = state.clone();
    let kind = next.current.kind;

    match action {
        EditAction::UpdateFragment { index, change } => {
            let len = next.current.fragments.len();
            let fragment = next
                .current
                .fragments
                .get_mut(index)
                .ok_or(ordering::OrderingError::OutOfRange { index, len })?;
            apply_fragment_change(fragment, change);
            fragment.validate_for(kind)?;
        }
        EditAction::SwapFragments { index, direction } => {
            ordering::swap(&mut next.current.fragments, index, direction)?;
        }
        EditAction::InsertFragment { index, fragment } => {
            let len = next.current.fragments.len();
            if index > len {
                return Err(ordering::OrderingError::OutOfRange { index, len }.into());
            }
            let fragment = fragment.into_fragment(next.tokens.allocate());
            fragment.validate_for(kind)?;
            ordering::insert_at(&mut next.current.fragments, index, fragment)?;
        }
        EditAction::RemoveFragment { index } => {
            ordering::remove_at(&mut next.current.fragments, index)?;
        }
        EditAction::ReplaceFragments { fragments } => {
            let fragments = validate_replacement(fragments, &next)?;
            for token in fragments.iter().filter_map(|f| f.id.pending()) {
                next.tokens.observe(token);
            }
            next.current.fragments = fragments;
        }
        EditAction::UpdateProperty { change, also_initial } => {
            if let PropertyChange::Title(title) = &change {
                if title.trim().is_empty() {
                    return Err(EditError::EmptyTitle);
                }
            }
            if also_initial {
                apply_property_change(&mut next.initial, change.clone());
            }
            apply_property_change(&mut next.current, change);
        }
        EditAction::AddLabel { label } => {
            let label = label.trim();
            if label.is_empty() {
                return Err(EditError::EmptyLabel);
            }
            next.current.labels.insert(label.to_string());
        }
        EditAction::RemoveLabel { label } => {
            next.current.labels.remove(label.trim());
        }
    }

    Ok(next)
}

fn apply_fragment_change(fragment: &mut Fragment, change: FragmentChange) {
    match change {
        FragmentChange::UseCustomFields(value) => fragment.use_custom_fields = value,
        FragmentChange::CustomTitle(value) => fragment.custom_title = value,
        FragmentChange::CustomDescription(value) => fragment.custom_description = value,
        FragmentChange::Cut(value) => fragment.cut = value,
        FragmentChange::ContentRef(value) => fragment.content_ref = value,
    }
}

fn apply_property_change(composition: &mut Composition, change: PropertyChange) {
    match change {
        PropertyChange::Title(title) => composition.title = title,
        PropertyChange::Description(description) => composition.description = description,
        PropertyChange::Visibility(is_public) => composition.is_public = is_public,
        PropertyChange::Thumbnail(path) => composition.thumbnail_path = path,
    }
}

/// Check a whole replacement list: unique identities, persisted ids known
/// to the session, kind fit.
fn validate_replacement(mut fragments: Vec<Fragment>, state: &EditorState) -> Result<Vec<Fragment>, EditError> {
    let mut seen: BTreeSet<FragmentId> = BTreeSet::new();
    for fragment in &fragments {
        if !seen.insert(fragment.id) {
            return Err(EditError::DuplicateIdentity(fragment.id));
        }
        if let FragmentId::Persisted(id) = fragment.id {
            if !state.knows(id) {
                return Err(EditError::UnknownFragment(id));
            }
        }
        fragment.validate_for(state.current.kind)?;
    }

    ordering::reorder(&mut fragments);
    Ok(fragments)
}
