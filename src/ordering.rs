//! Fragment ordering.
//!
//! Pure operations over an ordered fragment list. Every structural edit
//! ends with [`reorder`], so positions stay contiguous, zero-based and
//! equal to the list index.

use serde::{Deserialize, Serialize};

use crate::types::{Fragment, PendingToken};

/// Direction of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards index 0.
    Up,
    /// Towards the end of the list.
    Down,
}

impl Direction {
    fn delta(&self) -> isize {
        match self {
            Self::Up => -1,
            Self::Down => 1,
        }
    }
}

/// Error type for ordering operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    /// Index (or swap target) outside the list.
    #[error("Index {index} out of range for {len} fragments")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// List length.
        len: usize,
    },
    /// Swap would move the first entry up or the last entry down.
    #[error("Cannot move fragment at index {index} {direction:?}: already at the boundary")]
    AtBoundary {
        /// Requested index.
        index: usize,
        /// Requested direction.
        direction: Direction,
    },
}

/// Reassign `position := index` in list order.
///
/// Never reorders by value; idempotent.
pub fn reorder(fragments: &mut [Fragment]) {
    for (index, fragment) in fragments.iter_mut().enumerate() {
        fragment.position = index;
    }
}

/// Check that positions are exactly `0..len` in list order.
pub fn is_contiguous(fragments: &[Fragment]) -> bool {
    fragments.iter().enumerate().all(|(index, f)| f.position == index)
}

/// Exchange the entry at `index` with its neighbour in `direction`, then reorder.
///
/// The list is left untouched on error.
pub fn swap(fragments: &mut [Fragment], index: usize, direction: Direction) -> Result<(), OrderingError> {
    let len = fragments.len();
    if index >= len {
        return Err(OrderingError::OutOfRange { index, len });
    }
    let target = index as isize + direction.delta();
    if target < 0 || target as usize >= len {
        return Err(OrderingError::AtBoundary { index, direction });
    }

    fragments.swap(index, target as usize);
    reorder(fragments);
    Ok(())
}

/// Splice `fragment` in at `index` (`index == len` appends), then reorder.
pub fn insert_at(fragments: &mut Vec<Fragment>, index: usize, fragment: Fragment) -> Result<(), OrderingError> {
    let len = fragments.len();
    if index > len {
        return Err(OrderingError::OutOfRange { index, len });
    }
    fragments.insert(index, fragment);
    reorder(fragments);
    Ok(())
}

/// Delete the entry at `index`, reorder, and return the removed fragment.
pub fn remove_at(fragments: &mut Vec<Fragment>, index: usize) -> Result<Fragment, OrderingError> {
    let len = fragments.len();
    if index >= len {
        return Err(OrderingError::OutOfRange { index, len });
    }
    let removed = fragments.remove(index);
    reorder(fragments);
    Ok(removed)
}

/// Hands out pending tokens for one edit session.
///
/// Tokens are never reused, even after the fragment carrying one is
/// removed or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTokenAllocator {
    next: u64,
}

impl PendingTokenAllocator {
    /// Start a fresh allocator.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Start after every token already present in `fragments`.
    pub fn after(fragments: &[Fragment]) -> Self {
        let next = fragments
            .iter()
            .filter_map(|f| f.id.pending())
            .map(|t| t.get() + 1)
            .max()
            .unwrap_or(1);
        Self { next }
    }

    /// Allocate the next token.
    pub fn allocate(&mut self) -> PendingToken {
        let token = PendingToken::new(self.next);
        self.next += 1;
        token
    }

    /// Make sure future tokens are greater than `token`.
    pub fn observe(&mut self, token: PendingToken) {
        if token.get() >= self.next {
            self.next = token.get() + 1;
        }
    }
}

impl Default for PendingTokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}
