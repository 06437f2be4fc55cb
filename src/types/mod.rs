//! Core types for compositions and their fragments.

pub mod composition;
pub mod fragment;

pub use composition::{Composition, CompositionId, CompositionKind, CompositionProperties, OwnerId};
pub use fragment::{
    Fragment, FragmentError, FragmentFields, FragmentId, FragmentKind,
    MediaCut, NewFragment, PendingToken, PersistedId,
};
