//! Canonical serialization for snapshot fingerprints.
//!
//! The state store compares fingerprints instead of walking two snapshots
//! on every dirty check.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Fragments serialize in list order
//! - No HashMap allowed: Labels live in a BTreeSet

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

use crate::types::Composition;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Content fingerprint of a composition snapshot.
///
/// Two snapshots with equal content always share a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint a composition.
    pub fn of(composition: &Composition) -> Self {
        Self(canonical_hash(composition))
    }

    /// Hex form for logs.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}
