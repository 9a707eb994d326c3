//! The structural engine: two id-addressed arenas plus the operations that
//! create, merge, split, and remove units while keeping adjacency mirrors and
//! the pair index exact.
//!
//! Per-cycle dynamics live in [`crate::dynamics`]; persistence in
//! [`crate::image`].

use hashbrown::HashSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::association::{
    Association, AssociationFields, AssociationId, AssociationStore, WEIGHT_BOUNDS,
};
use crate::error::InvariantViolation;
use crate::policy::Policy;
use crate::state::UnitState;
use crate::unit::{DataKey, Unit, UnitId, UnitStore};

/// How activation moves along associations during a spreading pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpreadMode {
    /// Shares proportional to `|weight|`.
    Standard,
    /// Shares proportional to how much room the destination has left.
    #[default]
    Attraction,
    /// Each destination receives the weighted sum of its sources; nothing is drained.
    Summation,
}

/// Execution tier for the weight-update pass.
///
/// - `Scalar`: single-threaded (default, works everywhere)
/// - `Parallel`: multi-threaded via rayon (requires `parallel` feature)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionTier {
    #[default]
    Scalar,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    /// Create both directed associations to every existing unit on insertion.
    pub fully_connected: bool,
    pub spread_mode: SpreadMode,
    /// Never normalize outgoing shares, even when they exceed the unit's capacity.
    pub allow_overspreading: bool,
    pub tier: ExecutionTier,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::topology()
    }
}

impl NetworkConfig {
    /// Sparse topology network with attraction spreading.
    pub fn topology() -> Self {
        Self {
            fully_connected: false,
            spread_mode: SpreadMode::Attraction,
            allow_overspreading: false,
            tier: ExecutionTier::Scalar,
        }
    }

    /// Fully connected temporal-difference network with summation spreading.
    pub fn temporal() -> Self {
        Self {
            fully_connected: true,
            spread_mode: SpreadMode::Summation,
            allow_overspreading: false,
            tier: ExecutionTier::Scalar,
        }
    }

    pub fn with_fully_connected(mut self, fully_connected: bool) -> Self {
        self.fully_connected = fully_connected;
        self
    }

    pub fn with_spread_mode(mut self, mode: SpreadMode) -> Self {
        self.spread_mode = mode;
        self
    }

    pub fn with_overspreading(mut self, allow: bool) -> Self {
        self.allow_overspreading = allow;
        self
    }

    pub fn with_tier(mut self, tier: ExecutionTier) -> Self {
        self.tier = tier;
        self
    }
}

/// Runtime diagnostics about the network's current state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    pub unit_count: usize,
    pub association_count: usize,
    /// Completed calls to `step()`.
    pub cycles: u64,
    /// Associations created by generation in the last step.
    pub generated_last_cycle: usize,
    /// Units removed by cleanup in the last step.
    pub removed_last_cycle: usize,
    pub mean_activation: f64,
    pub mean_abs_weight: f64,
}

/// Weighted graph of units and associations, generic over the key type and
/// the dynamics policy.
#[derive(Debug, Clone)]
pub struct Network<K, P: Policy> {
    pub(crate) policy: P,
    pub(crate) config: NetworkConfig,
    pub(crate) units: UnitStore<K, P::State>,
    pub(crate) associations: AssociationStore,

    pub(crate) cycles: u64,
    pub(crate) generated_last_cycle: usize,
    pub(crate) removed_last_cycle: usize,
}

impl<K: DataKey, P: Policy> Network<K, P> {
    pub fn new(policy: P, config: NetworkConfig) -> Self {
        Self {
            policy,
            config,
            units: UnitStore::new(),
            associations: AssociationStore::new(),
            cycles: 0,
            generated_last_cycle: 0,
            removed_last_cycle: 0,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.config.tier = tier;
    }

    /// The tier the weight-update pass will actually use, given compiled features.
    pub fn effective_execution_tier(&self) -> ExecutionTier {
        match self.config.tier {
            ExecutionTier::Scalar => ExecutionTier::Scalar,
            ExecutionTier::Parallel => {
                #[cfg(feature = "parallel")]
                {
                    ExecutionTier::Parallel
                }
                #[cfg(not(feature = "parallel"))]
                {
                    ExecutionTier::Scalar
                }
            }
        }
    }

    pub fn units(&self) -> &UnitStore<K, P::State> {
        &self.units
    }

    pub fn associations(&self) -> &AssociationStore {
        &self.associations
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn association_count(&self) -> usize {
        self.associations.len()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The unit holding `key`, if any. No side effects.
    pub fn get_unit(&self, key: &K) -> Option<&Unit<K, P::State>> {
        self.units.lookup(key).and_then(|id| self.units.get(id))
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit<K, P::State>> {
        self.units.get(id)
    }

    /// Mutable access to a unit's scalars. Every setter clamps.
    pub fn state_mut(&mut self, id: UnitId) -> Option<&mut P::State> {
        self.units.get_mut(id).map(|u| &mut u.state)
    }

    pub fn association(&self, id: AssociationId) -> Option<&Association> {
        self.associations.get(id)
    }

    pub fn association_between(&self, src: UnitId, dst: UnitId) -> Option<&Association> {
        self.associations
            .between(src, dst)
            .and_then(|id| self.associations.get(id))
    }

    /// Get-or-create. A new unit in a fully connected network is linked both
    /// ways to every existing unit.
    pub fn insert_data(&mut self, key: K) -> UnitId {
        if let Some(id) = self.units.lookup(&key) {
            return id;
        }

        let existing = if self.config.fully_connected {
            self.units.ids()
        } else {
            Vec::new()
        };

        let id = self.units.create(key);
        let fresh = AssociationFields::fresh(self.policy.default_learning_rate());
        for other in existing {
            self.link(other, id, fresh);
            self.link(id, other, fresh);
        }

        debug!(unit = %id, associations = self.associations.len(), "inserted unit");
        self.check_invariants();
        id
    }

    /// Insert (or find) the unit for `key` and seed it with an input level.
    pub fn ingest(&mut self, key: K, seed: f64) -> UnitId {
        let id = self.insert_data(key);
        if let Some(unit) = self.units.get_mut(id) {
            self.policy.seed(&mut unit.state, seed);
        }
        id
    }

    /// Remove the unit holding `key`. Returns `false` if there was none.
    pub fn delete_data(&mut self, key: &K) -> bool {
        match self.units.lookup(key) {
            Some(id) => self.delete_unit(id),
            None => false,
        }
    }

    /// Remove a unit and every association touching it.
    pub fn delete_unit(&mut self, id: UnitId) -> bool {
        let incident: Vec<AssociationId> = match self.units.get(id) {
            Some(unit) => unit.incident().collect(),
            None => return false,
        };
        for association in incident {
            self.unlink(association);
        }
        self.units.remove(id);

        debug!(unit = %id, "deleted unit");
        self.check_invariants();
        true
    }

    /// Merge the unit holding `delete` into the unit holding `keep`.
    ///
    /// Scalars take the element-wise maximum. Each association `delete` has to a
    /// third unit is folded into the matching association of `keep` (minimum
    /// learning rate, maximum weight and signal) or recreated on `keep`. The
    /// `delete` unit is then removed. Returns `keep`'s id, or `None` if `keep`
    /// does not exist.
    pub fn join_data(&mut self, keep: &K, delete: &K) -> Option<UnitId> {
        let keep_id = self.units.lookup(keep)?;
        let delete_id = match self.units.lookup(delete) {
            Some(id) if id != keep_id => id,
            _ => return Some(keep_id),
        };

        let (delete_state, incoming, outgoing) = {
            let unit = self.units.get(delete_id)?;
            (
                unit.state.clone(),
                unit.incoming.clone(),
                unit.outgoing.clone(),
            )
        };
        if let Some(unit) = self.units.get_mut(keep_id) {
            unit.state.merge_max(&delete_state);
        }

        for association in incoming {
            let Some(a) = self.associations.get(association) else {
                continue;
            };
            let (src, fields) = (a.src, a.fields());
            if src != keep_id {
                self.fold_into(src, keep_id, fields);
            }
        }
        for association in outgoing {
            let Some(a) = self.associations.get(association) else {
                continue;
            };
            let (dst, fields) = (a.dst, a.fields());
            if dst != keep_id {
                self.fold_into(keep_id, dst, fields);
            }
        }

        self.delete_unit(delete_id);
        info!(keep = %keep_id, removed = %delete_id, "joined units");
        Some(keep_id)
    }

    fn fold_into(&mut self, src: UnitId, dst: UnitId, fields: AssociationFields) {
        match self.associations.between(src, dst) {
            Some(existing) => {
                if let Some(a) = self.associations.get_mut(existing) {
                    a.absorb(fields);
                }
            }
            None => {
                self.link(src, dst, fields);
            }
        }
    }

    /// Create (or find) the unit for `new` as a copy of the unit holding `old`.
    ///
    /// `new` receives `old`'s scalars verbatim and a copy of every association
    /// `old` has to a third unit. `old` is left untouched. Returns `None` if
    /// `old` does not exist.
    pub fn split_data(&mut self, old: &K, new: K) -> Option<UnitId> {
        let old_id = self.units.lookup(old)?;
        if self.units.lookup(&new) == Some(old_id) {
            return Some(old_id);
        }

        let new_id = self.insert_data(new);
        let (old_state, incoming, outgoing) = {
            let unit = self.units.get(old_id)?;
            (
                unit.state.clone(),
                unit.incoming.clone(),
                unit.outgoing.clone(),
            )
        };
        if let Some(unit) = self.units.get_mut(new_id) {
            unit.state = old_state;
        }

        for association in incoming {
            let Some(a) = self.associations.get(association) else {
                continue;
            };
            let (src, fields) = (a.src, a.fields());
            if src != new_id {
                self.copy_onto(src, new_id, fields);
            }
        }
        for association in outgoing {
            let Some(a) = self.associations.get(association) else {
                continue;
            };
            let (dst, fields) = (a.dst, a.fields());
            if dst != new_id {
                self.copy_onto(new_id, dst, fields);
            }
        }

        info!(old = %old_id, new = %new_id, "split unit");
        self.check_invariants();
        Some(new_id)
    }

    fn copy_onto(&mut self, src: UnitId, dst: UnitId, fields: AssociationFields) {
        match self.associations.between(src, dst) {
            Some(existing) => {
                if let Some(a) = self.associations.get_mut(existing) {
                    a.assign(fields);
                }
            }
            None => {
                self.link(src, dst, fields);
            }
        }
    }

    /// Link every pair of active units that has no association in either
    /// direction. Sparse networks only; returns the number of associations created.
    pub fn generate_associations(&mut self) -> usize {
        if self.config.fully_connected {
            return 0;
        }

        let active: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| self.policy.is_active(&u.state))
            .map(|u| u.id)
            .collect();

        let fresh = AssociationFields::fresh(self.policy.default_learning_rate());
        let mut created = 0;
        for (i, &a) in active.iter().enumerate() {
            for &b in &active[i + 1..] {
                if self.associations.between(a, b).is_some()
                    || self.associations.between(b, a).is_some()
                {
                    continue;
                }
                self.link(a, b, fresh);
                self.link(b, a, fresh);
                created += 2;
            }
        }

        if created > 0 {
            debug!(active = active.len(), created, "generated associations");
        }
        self.check_invariants();
        created
    }

    /// Drop every unit and association. Id counters keep counting.
    pub fn clear(&mut self) {
        let (units, associations) = (self.units.len(), self.associations.len());
        self.associations.clear();
        self.units.clear();
        self.generated_last_cycle = 0;
        self.removed_last_cycle = 0;
        info!(units, associations, "cleared network");
    }

    /// The only way an association enters the network.
    pub(crate) fn link(
        &mut self,
        src: UnitId,
        dst: UnitId,
        fields: AssociationFields,
    ) -> Option<AssociationId> {
        if src == dst || !self.units.contains(src) || !self.units.contains(dst) {
            return None;
        }
        if self.associations.between(src, dst).is_some() {
            return None;
        }
        let id = self.associations.insert(src, dst, fields);
        self.attach(id, src, dst);
        Some(id)
    }

    pub(crate) fn attach(&mut self, id: AssociationId, src: UnitId, dst: UnitId) {
        if let Some(unit) = self.units.get_mut(src) {
            unit.outgoing.push(id);
        }
        if let Some(unit) = self.units.get_mut(dst) {
            unit.incoming.push(id);
        }
    }

    /// The only way an association leaves the network.
    pub(crate) fn unlink(&mut self, id: AssociationId) -> Option<Association> {
        let association = self.associations.remove(id)?;
        if let Some(unit) = self.units.get_mut(association.src) {
            unit.outgoing.retain(|a| *a != id);
        }
        if let Some(unit) = self.units.get_mut(association.dst) {
            unit.incoming.retain(|a| *a != id);
        }
        Some(association)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let unit_count = self.units.len();
        let association_count = self.associations.len();
        let mean_activation = if unit_count == 0 {
            0.0
        } else {
            self.units.iter().map(|u| u.state.activation()).sum::<f64>() / unit_count as f64
        };
        let mean_abs_weight = if association_count == 0 {
            0.0
        } else {
            self.associations
                .iter()
                .map(|a| a.weight().abs())
                .sum::<f64>()
                / association_count as f64
        };

        Diagnostics {
            unit_count,
            association_count,
            cycles: self.cycles,
            generated_last_cycle: self.generated_last_cycle,
            removed_last_cycle: self.removed_last_cycle,
            mean_activation,
            mean_abs_weight,
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        assert_eq!(self.verify(), Ok(()));
    }

    #[cfg(not(test))]
    #[inline]
    fn check_invariants(&self) {}

    /// Check every structural invariant. Linear in units plus associations.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        if self.units.key_index_len() != self.units.len() {
            return Err(InvariantViolation::KeyIndex {
                indexed: self.units.key_index_len(),
                units: self.units.len(),
            });
        }

        // Each association must be listed exactly once per direction.
        let mut seen_in: HashSet<AssociationId> = HashSet::with_capacity(self.associations.len());
        let mut seen_out: HashSet<AssociationId> = HashSet::with_capacity(self.associations.len());
        let mut entries = 0;
        for unit in self.units.iter() {
            if self.units.lookup(&unit.key) != Some(unit.id) {
                return Err(InvariantViolation::UnindexedUnit(unit.id));
            }
            if unit.id.0 >= self.units.next_id() {
                return Err(InvariantViolation::StaleCounter {
                    id: unit.id.0,
                    next: self.units.next_id(),
                });
            }
            if !unit.state.within_bounds() {
                return Err(InvariantViolation::UnitOutOfBounds(unit.id));
            }
            for id in &unit.incoming {
                match self.associations.get(*id) {
                    Some(a) if a.dst == unit.id => {}
                    _ => {
                        return Err(InvariantViolation::StaleAdjacency {
                            unit: unit.id,
                            association: *id,
                        })
                    }
                }
                if !seen_in.insert(*id) {
                    return Err(InvariantViolation::Unmirrored {
                        association: *id,
                        unit: unit.id,
                    });
                }
            }
            for id in &unit.outgoing {
                match self.associations.get(*id) {
                    Some(a) if a.src == unit.id => {}
                    _ => {
                        return Err(InvariantViolation::StaleAdjacency {
                            unit: unit.id,
                            association: *id,
                        })
                    }
                }
                if !seen_out.insert(*id) {
                    return Err(InvariantViolation::Unmirrored {
                        association: *id,
                        unit: unit.id,
                    });
                }
            }
            entries += unit.degree();
        }

        for a in self.associations.iter() {
            if a.src == a.dst {
                return Err(InvariantViolation::SelfAssociation(a.id));
            }
            if a.id.0 >= self.associations.next_id() {
                return Err(InvariantViolation::StaleCounter {
                    id: a.id.0,
                    next: self.associations.next_id(),
                });
            }
            if !WEIGHT_BOUNDS.contains(a.weight()) {
                return Err(InvariantViolation::WeightOutOfBounds(a.id));
            }
            if self.associations.between(a.src, a.dst) != Some(a.id) {
                return Err(InvariantViolation::DuplicatePair {
                    src: a.src,
                    dst: a.dst,
                });
            }
            for unit in [a.src, a.dst] {
                if self.units.get(unit).is_none() {
                    return Err(InvariantViolation::DanglingEndpoint {
                        association: a.id,
                        unit,
                    });
                }
            }
            if !seen_out.contains(&a.id) {
                return Err(InvariantViolation::Unmirrored {
                    association: a.id,
                    unit: a.src,
                });
            }
            if !seen_in.contains(&a.id) {
                return Err(InvariantViolation::Unmirrored {
                    association: a.id,
                    unit: a.dst,
                });
            }
        }

        if entries != 2 * self.associations.len() {
            return Err(InvariantViolation::AdjacencyCount {
                entries,
                associations: self.associations.len(),
            });
        }
        if self.associations.pair_index_len() != self.associations.len() {
            return Err(InvariantViolation::AdjacencyCount {
                entries: self.associations.pair_index_len(),
                associations: self.associations.len(),
            });
        }
        Ok(())
    }
}
