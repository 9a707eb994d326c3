use std::collections::BTreeMap;

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::state::Bounds;
use crate::unit::UnitId;

/// Type alias for association weights (range: -1.0 to 1.0).
pub type Weight = f64;

pub const WEIGHT_MIN: Weight = -1.0;
pub const WEIGHT_MAX: Weight = 1.0;
pub const WEIGHT_BOUNDS: Bounds = Bounds::new(WEIGHT_MIN, WEIGHT_MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AssociationId(pub u64);

impl core::fmt::Display for AssociationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// Directed, weighted edge between two distinct live units.
#[derive(Debug, Clone)]
pub struct Association {
    pub id: AssociationId,
    pub src: UnitId,
    pub dst: UnitId,
    weight: Weight,
    /// Activation moved along this edge during the last spreading pass.
    pub signal: f64,
    pub learning_rate: f64,
}

impl Association {
    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn set_weight(&mut self, weight: Weight) {
        self.weight = WEIGHT_BOUNDS.clamp(weight);
    }

    pub fn fields(&self) -> AssociationFields {
        AssociationFields {
            weight: self.weight,
            signal: self.signal,
            learning_rate: self.learning_rate,
        }
    }

    pub(crate) fn assign(&mut self, fields: AssociationFields) {
        self.set_weight(fields.weight);
        self.signal = fields.signal;
        self.learning_rate = fields.learning_rate;
    }

    /// Max-wins merge used by join: lowest learning rate, strongest weight and signal.
    pub(crate) fn absorb(&mut self, other: AssociationFields) {
        self.learning_rate = self.learning_rate.min(other.learning_rate);
        self.set_weight(self.weight.max(other.weight));
        self.signal = self.signal.max(other.signal);
    }
}

/// The mutable payload of an association, detached from its identity and endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationFields {
    pub weight: Weight,
    pub signal: f64,
    pub learning_rate: f64,
}

impl AssociationFields {
    pub fn fresh(learning_rate: f64) -> Self {
        Self {
            weight: 0.0,
            signal: 0.0,
            learning_rate,
        }
    }
}

/// Owns the association collection; at most one association per ordered pair.
#[derive(Debug, Clone)]
pub struct AssociationStore {
    associations: BTreeMap<AssociationId, Association>,
    by_pair: HashMap<(UnitId, UnitId), AssociationId>,
    next_id: u64,
}

impl Default for AssociationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssociationStore {
    pub fn new() -> Self {
        Self {
            associations: BTreeMap::new(),
            by_pair: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: AssociationId) -> Option<&Association> {
        self.associations.get(&id)
    }

    pub fn get_mut(&mut self, id: AssociationId) -> Option<&mut Association> {
        self.associations.get_mut(&id)
    }

    /// The association from `src` to `dst`, if any.
    pub fn between(&self, src: UnitId, dst: UnitId) -> Option<AssociationId> {
        self.by_pair.get(&(src, dst)).copied()
    }

    /// Associations in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Association> {
        self.associations.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Association> {
        self.associations.values_mut()
    }

    pub(crate) fn insert(
        &mut self,
        src: UnitId,
        dst: UnitId,
        fields: AssociationFields,
    ) -> AssociationId {
        let id = AssociationId(self.next_id);
        self.next_id += 1;
        self.insert_with_id(id, src, dst, fields);
        id
    }

    pub(crate) fn insert_with_id(
        &mut self,
        id: AssociationId,
        src: UnitId,
        dst: UnitId,
        fields: AssociationFields,
    ) {
        debug_assert!(src != dst, "self-association");
        debug_assert!(
            !self.by_pair.contains_key(&(src, dst)),
            "parallel association {src}->{dst}"
        );
        let mut association = Association {
            id,
            src,
            dst,
            weight: 0.0,
            signal: 0.0,
            learning_rate: fields.learning_rate,
        };
        association.assign(fields);
        self.by_pair.insert((src, dst), id);
        self.associations.insert(id, association);
    }

    pub(crate) fn remove(&mut self, id: AssociationId) -> Option<Association> {
        let association = self.associations.remove(&id)?;
        self.by_pair.remove(&(association.src, association.dst));
        Some(association)
    }

    pub(crate) fn set_next_id(&mut self, next: u64) {
        self.next_id = next;
    }

    pub(crate) fn clear(&mut self) {
        self.associations.clear();
        self.by_pair.clear();
    }

    pub(crate) fn pair_index_len(&self) -> usize {
        self.by_pair.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_index_tracks_insert_and_remove() {
        let mut store = AssociationStore::new();
        let ab = store.insert(UnitId(1), UnitId(2), AssociationFields::fresh(0.04));
        let ba = store.insert(UnitId(2), UnitId(1), AssociationFields::fresh(0.04));

        assert_eq!(store.between(UnitId(1), UnitId(2)), Some(ab));
        assert_eq!(store.between(UnitId(2), UnitId(1)), Some(ba));
        assert_eq!(store.between(UnitId(1), UnitId(3)), None);

        store.remove(ab);
        assert_eq!(store.between(UnitId(1), UnitId(2)), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.pair_index_len(), 1);
    }

    #[test]
    fn weight_writes_are_clamped() {
        let mut store = AssociationStore::new();
        let id = store.insert(
            UnitId(1),
            UnitId(2),
            AssociationFields {
                weight: 3.0,
                signal: 0.0,
                learning_rate: 0.04,
            },
        );
        let a = store.get_mut(id).unwrap();
        assert_eq!(a.weight(), WEIGHT_MAX);
        a.set_weight(-9.0);
        assert_eq!(a.weight(), WEIGHT_MIN);
    }

    #[test]
    fn absorb_is_max_wins_with_min_rate() {
        let mut store = AssociationStore::new();
        let id = store.insert(
            UnitId(1),
            UnitId(2),
            AssociationFields {
                weight: 0.2,
                signal: 0.5,
                learning_rate: 0.04,
            },
        );
        let a = store.get_mut(id).unwrap();
        a.absorb(AssociationFields {
            weight: 0.6,
            signal: 0.1,
            learning_rate: 0.02,
        });
        assert_eq!(a.weight(), 0.6);
        assert_eq!(a.signal, 0.5);
        assert_eq!(a.learning_rate, 0.02);
    }
}
