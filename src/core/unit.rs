use std::collections::BTreeMap;
use std::hash::Hash;

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::association::AssociationId;

/// Identity payload of a unit. Two units never share a key.
pub trait DataKey: Eq + Hash + Clone + core::fmt::Debug + Send + Sync + 'static {}

impl<T> DataKey for T where T: Eq + Hash + Clone + core::fmt::Debug + Send + Sync + 'static {}

/// Identity of a unit. Monotonically increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UnitId(pub u64);

impl core::fmt::Display for UnitId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// One discrete pattern held in the network.
#[derive(Debug, Clone)]
pub struct Unit<K, S> {
    pub id: UnitId,
    pub key: K,
    pub state: S,

    // Mirrors of the global association arena; only the network's link/unlink touch these.
    pub(crate) incoming: Vec<AssociationId>,
    pub(crate) outgoing: Vec<AssociationId>,
}

impl<K, S> Unit<K, S> {
    pub fn incoming(&self) -> &[AssociationId] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[AssociationId] {
        &self.outgoing
    }

    pub fn degree(&self) -> usize {
        self.incoming.len() + self.outgoing.len()
    }

    /// Every association touching this unit, incoming first.
    pub fn incident(&self) -> impl Iterator<Item = AssociationId> + '_ {
        self.incoming.iter().chain(self.outgoing.iter()).copied()
    }
}

/// Owns the unit collection and guarantees one unit per key.
#[derive(Debug, Clone)]
pub struct UnitStore<K, S> {
    units: BTreeMap<UnitId, Unit<K, S>>,
    by_key: HashMap<K, UnitId>,
    next_id: u64,
}

impl<K, S> Default for UnitStore<K, S>
where
    K: Eq + Hash + Clone,
    S: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> UnitStore<K, S>
where
    K: Eq + Hash + Clone,
    S: Default,
{
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            by_key: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn lookup(&self, key: &K) -> Option<UnitId> {
        self.by_key.get(key).copied()
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit<K, S>> {
        self.units.get(&id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit<K, S>> {
        self.units.get_mut(&id)
    }

    /// Units in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit<K, S>> {
        self.units.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit<K, S>> {
        self.units.values_mut()
    }

    pub fn ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Create a fresh unit for a key that is not yet present.
    pub(crate) fn create(&mut self, key: K) -> UnitId {
        debug_assert!(!self.by_key.contains_key(&key), "duplicate unit key");
        let id = UnitId(self.next_id);
        self.next_id += 1;
        self.by_key.insert(key.clone(), id);
        self.units.insert(
            id,
            Unit {
                id,
                key,
                state: S::default(),
                incoming: Vec::new(),
                outgoing: Vec::new(),
            },
        );
        id
    }

    /// Re-insert a unit with a known id (image restore).
    pub(crate) fn restore(&mut self, id: UnitId, key: K, state: S) {
        self.by_key.insert(key.clone(), id);
        self.units.insert(
            id,
            Unit {
                id,
                key,
                state,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            },
        );
    }

    pub(crate) fn set_next_id(&mut self, next: u64) {
        self.next_id = next;
    }

    /// Detach a unit. Callers must have unlinked its associations first.
    pub(crate) fn remove(&mut self, id: UnitId) -> Option<Unit<K, S>> {
        let unit = self.units.remove(&id)?;
        self.by_key.remove(&unit.key);
        Some(unit)
    }

    /// Drop every unit; the id counter keeps counting.
    pub(crate) fn clear(&mut self) {
        self.units.clear();
        self.by_key.clear();
    }

    pub(crate) fn key_index_len(&self) -> usize {
        self.by_key.len()
    }
}
