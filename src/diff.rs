//! Snapshot diff engine.
//!
//! Classifies the fragments of a working draft against the last persisted
//! snapshot by identity alone:
//!
//! | Set         | Contents                                              |
//! |-------------|-------------------------------------------------------|
//! | `to_insert` | fragments of `current` carrying a pending token        |
//! | `to_update` | persisted ids present in both snapshots (always sent)  |
//! | `to_delete` | persisted ids of `initial` missing from `current`      |
//!
//! The three sets are pairwise disjoint, `to_update ∪ to_delete` equals the
//! persisted id set of `initial`, and once [`reconcile_inserts`] has run,
//! `to_update ∪ assigned` equals the id set of `current`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Fragment, FragmentFields, FragmentId, PendingToken, PersistedId};

/// Error type for the diff engine. Every variant is an invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// The draft holds a persisted id the last snapshot never had.
    #[error("Fragment {0} is persisted but unknown to the last saved snapshot")]
    UnknownPersistedId(PersistedId),
    /// Two fragments share one identity.
    #[error("Duplicate fragment identity: {0}")]
    DuplicateIdentity(FragmentId),
    /// The insert call returned a different number of ids than it was given.
    #[error("Insert returned {actual} ids for {expected} fragments")]
    AssignedCountMismatch {
        /// Number of fragments sent.
        expected: usize,
        /// Number of ids returned.
        actual: usize,
    },
    /// A pending token to reconcile is not in the draft any more.
    #[error("Pending fragment {0} not found during reconciliation")]
    UnknownPendingToken(PendingToken),
}

/// Update payload for one surviving fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentUpdate {
    /// Target fragment.
    pub id: PersistedId,
    /// Fields to write.
    pub fields: FragmentFields,
}

/// Result of diffing two fragment lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentDiff {
    /// Pending fragments, in draft order.
    pub to_insert: Vec<Fragment>,
    /// Surviving fragments, in draft order.
    pub to_update: Vec<FragmentUpdate>,
    /// Removed ids, ascending.
    pub to_delete: Vec<PersistedId>,
}

impl FragmentDiff {
    /// Pending tokens of `to_insert`, in order.
    pub fn pending_tokens(&self) -> Vec<PendingToken> {
        self.to_insert.iter().filter_map(|f| f.id.pending()).collect()
    }

    /// Ids of `to_update`.
    pub fn update_ids(&self) -> BTreeSet<PersistedId> {
        self.to_update.iter().map(|u| u.id).collect()
    }

    /// Ids of `to_delete`.
    pub fn delete_ids(&self) -> BTreeSet<PersistedId> {
        self.to_delete.iter().copied().collect()
    }

    /// Whether there is nothing to insert, update or delete.
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Diff `current` against `initial`.
pub fn diff_fragments(initial: &[Fragment], current: &[Fragment]) -> Result<FragmentDiff, DiffError> {
    diff_fragments_with_carryover(initial, current, &BTreeSet::new())
}

/// Diff `current` against `initial`, treating `carried` ids as persisted too.
///
/// `carried` holds ids assigned by the insert batch of an earlier save that
/// failed afterwards. They exist on the server but not in `initial`, so they
/// are updated (or deleted) rather than inserted a second time.
pub fn diff_fragments_with_carryover(
    initial: &[Fragment],
    current: &[Fragment],
    carried: &BTreeSet<PersistedId>,
) -> Result<FragmentDiff, DiffError> {
    let mut known: BTreeSet<PersistedId> = carried.clone();
    for fragment in initial {
        if let FragmentId::Persisted(id) = fragment.id {
            if !known.insert(id) && !carried.contains(&id) {
                return Err(report(DiffError::DuplicateIdentity(fragment.id)));
            }
        }
    }

    let mut surviving: BTreeSet<PersistedId> = BTreeSet::new();
    let mut to_update = Vec::new();
    let mut tokens: BTreeSet<PendingToken> = BTreeSet::new();
    let mut to_insert = Vec::new();

    for fragment in current {
        match fragment.id {
            FragmentId::Pending(token) => {
                if !tokens.insert(token) {
                    return Err(report(DiffError::DuplicateIdentity(fragment.id)));
                }
                to_insert.push(fragment.clone());
            }
            FragmentId::Persisted(id) => {
                if !surviving.insert(id) {
                    return Err(report(DiffError::DuplicateIdentity(fragment.id)));
                }
                if !known.contains(&id) {
                    return Err(report(DiffError::UnknownPersistedId(id)));
                }
                to_update.push(FragmentUpdate { id, fields: fragment.fields() });
            }
        }
    }

    let to_delete: Vec<PersistedId> = known
        .iter()
        .filter(|id| !surviving.contains(id))
        .copied()
        .collect();

    tracing::debug!(
        insert = to_insert.len(),
        update = to_update.len(),
        delete = to_delete.len(),
        carried = carried.len(),
        "Classified fragment changes"
    );

    Ok(FragmentDiff { to_insert, to_update, to_delete })
}

fn report(error: DiffError) -> DiffError {
    tracing::error!(error = %error, "Fragment diff invariant violated");
    error
}

/// Added and removed labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDiff {
    /// `current - initial`, sorted.
    pub added: Vec<String>,
    /// `initial - current`, sorted.
    pub removed: Vec<String>,
}

impl LabelDiff {
    /// Whether no label changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff two label sets.
pub fn diff_labels(initial: &BTreeSet<String>, current: &BTreeSet<String>) -> LabelDiff {
    LabelDiff {
        added: current.difference(initial).cloned().collect(),
        removed: initial.difference(current).cloned().collect(),
    }
}

/// Replace pending tokens with the ids the server assigned to them.
///
/// `assigned[i]` belongs to `pending[i]`. Positions are left unchanged.
/// Nothing is modified unless every token can be matched exactly once.
pub fn reconcile_inserts(
    fragments: &mut [Fragment],
    pending: &[PendingToken],
    assigned: &[PersistedId],
) -> Result<(), DiffError> {
    if pending.len() != assigned.len() {
        return Err(report(DiffError::AssignedCountMismatch {
            expected: pending.len(),
            actual: assigned.len(),
        }));
    }

    let mut slots: BTreeMap<PendingToken, usize> = BTreeMap::new();
    for (index, fragment) in fragments.iter().enumerate() {
        if let FragmentId::Pending(token) = fragment.id {
            if slots.insert(token, index).is_some() {
                return Err(report(DiffError::DuplicateIdentity(fragment.id)));
            }
        }
    }

    let mut seen: BTreeSet<PendingToken> = BTreeSet::new();
    let mut targets = Vec::with_capacity(pending.len());
    for (token, id) in pending.iter().zip(assigned) {
        if !seen.insert(*token) {
            return Err(report(DiffError::DuplicateIdentity(FragmentId::Pending(*token))));
        }
        let index = slots
            .get(token)
            .copied()
            .ok_or_else(|| report(DiffError::UnknownPendingToken(*token)))?;
        targets.push((index, *id));
    }

    for (index, id) in targets {
        fragments[index].id = FragmentId::Persisted(id);
    }
    Ok(())
}
