//! Ownership metadata for numbered entity/field pairs.
//!
//! The [`EntityOwnership`] map records the owning rank of every `(entity, field)`
//! pair this rank touches and whether that pair is a ghost here. It is filled
//! in by the consistency resolver during the collective numbering step.

use std::collections::BTreeMap;

use crate::dof::FieldId;
use crate::topology::point::PointId;

/// One numbered `(entity, field)` pair.
#[derive(
    Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize,
)]
pub struct DofKey {
    pub point: PointId,
    pub field: FieldId,
}

impl DofKey {
    pub fn new(point: PointId, field: FieldId) -> Self {
        Self { point, field }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OwnershipEntry {
    pub owner: usize,
    pub is_ghost: bool,
}

/// Ownership records keyed by [`DofKey`], iterated in ascending key order.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityOwnership {
    entries: BTreeMap<DofKey, OwnershipEntry>,
}

impl EntityOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or update an ownership entry using `my_rank` to determine ghostness.
    pub fn set_from_owner(&mut self, key: DofKey, owner: usize, my_rank: usize) {
        self.entries.insert(
            key,
            OwnershipEntry {
                owner,
                is_ghost: owner != my_rank,
            },
        );
    }

    /// Retrieve the ownership entry for a pair.
    pub fn entry(&self, key: DofKey) -> Option<OwnershipEntry> {
        self.entries.get(&key).copied()
    }

    /// Retrieve the owning rank for a pair.
    pub fn owner(&self, key: DofKey) -> Option<usize> {
        self.entry(key).map(|entry| entry.owner)
    }

    /// Returns true if the pair is owned by `rank`.
    pub fn is_owned_by(&self, key: DofKey, rank: usize) -> bool {
        self.owner(key).is_some_and(|owner| owner == rank)
    }

    /// Iterate over all tracked pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DofKey, OwnershipEntry)> + '_ {
        self.entries.iter().map(|(k, e)| (*k, *e))
    }

    /// Iterate over owned pairs (non-ghosts).
    pub fn owned(&self) -> impl Iterator<Item = DofKey> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| !e.is_ghost)
            .map(|(k, _)| *k)
    }

    /// Iterate over ghost pairs with their owners.
    pub fn ghosts(&self) -> impl Iterator<Item = (DofKey, usize)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_ghost)
            .map(|(k, e)| (*k, e.owner))
    }
}
