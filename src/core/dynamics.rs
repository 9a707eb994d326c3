//! Per-cycle passes over a [`Network`].
//!
//! A cycle runs generation (sparse networks only), spreading, the weight
//! update, the three decay passes, and cleanup, in that order. Each pass reads
//! the state left behind by the previous one; within a pass every value is
//! computed from pre-pass state before anything is written.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::association::AssociationId;
use crate::network::{ExecutionTier, Network, SpreadMode};
use crate::policy::Policy;
use crate::state::UnitState;
use crate::unit::{DataKey, UnitId};

/// Reshapes a raw share: flat for small shares, steep near a full share.
#[inline]
pub fn reshape_signal(x: f64) -> f64 {
    let r = 1.0 - x;
    r.powi(4) - 2.0 * r.powi(2) + 1.0
}

/// What one call to [`Network::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub generated: usize,
    pub removed: usize,
}

impl<K: DataKey, P: Policy> Network<K, P> {
    /// Run one full cycle of dynamics.
    pub fn step(&mut self) -> StepReport {
        let generated = self.generate_associations();
        self.spread_activation();
        self.update_weights();
        self.decay_weights();
        self.decay_activations();
        self.leak_loads();
        let removed = self.clean_up();

        self.cycles += 1;
        self.generated_last_cycle = generated;
        self.removed_last_cycle = removed;
        debug!(
            cycle = self.cycles,
            units = self.units.len(),
            associations = self.associations.len(),
            generated,
            removed,
            "step"
        );
        StepReport { generated, removed }
    }

    /// Move activation along associations according to the configured mode.
    pub fn spread_activation(&mut self) {
        match self.config.spread_mode {
            SpreadMode::Standard | SpreadMode::Attraction => self.spread_draining(),
            SpreadMode::Summation => self.spread_summation(),
        }
    }

    fn spread_draining(&mut self) {
        let attraction = self.config.spread_mode == SpreadMode::Attraction;
        let capacity = self.policy.capacity();

        let mut signals: Vec<(AssociationId, f64)> = Vec::with_capacity(self.associations.len());
        for unit in self.units.iter() {
            let activation = unit.state.activation();

            // (association, share numerator) per outgoing edge.
            let shares: Vec<(AssociationId, f64)> = unit
                .outgoing
                .iter()
                .filter_map(|id| {
                    let a = self.associations.get(*id)?;
                    let w = a.weight();
                    let share = if attraction {
                        let dst = self.units.get(a.dst)?.state.activation();
                        if w < 0.0 {
                            w.abs() * dst
                        } else {
                            w.abs() * (capacity - dst)
                        }
                    } else {
                        w.abs()
                    };
                    Some((*id, share))
                })
                .collect();

            let total: f64 = shares.iter().map(|(_, s)| s).sum();
            if total <= 0.0 {
                signals.extend(shares.iter().map(|(id, _)| (*id, 0.0)));
                continue;
            }
            let divisor = if total <= capacity || self.config.allow_overspreading {
                1.0
            } else {
                total
            };
            signals.extend(
                shares
                    .iter()
                    .map(|(id, s)| (*id, reshape_signal(s / divisor * activation))),
            );
        }

        for (id, signal) in signals {
            if let Some(a) = self.associations.get_mut(id) {
                a.signal = signal;
            }
        }

        let transfers: Vec<(UnitId, UnitId, f64, bool)> = self
            .associations
            .iter()
            .map(|a| (a.src, a.dst, a.signal, a.weight() < 0.0))
            .collect();
        for (src, dst, signal, inhibitory) in transfers {
            if let Some(unit) = self.units.get_mut(src) {
                unit.state.add_activation(-signal);
            }
            if let Some(unit) = self.units.get_mut(dst) {
                unit.state.add_activation(if inhibitory { -signal } else { signal });
            }
        }
    }

    fn spread_summation(&mut self) {
        for a in self.associations.iter_mut() {
            a.signal = 0.0;
        }

        let signals: Vec<(AssociationId, UnitId, f64)> = self
            .associations
            .iter()
            .filter_map(|a| {
                let src = self.units.get(a.src)?.state.activation();
                Some((a.id, a.dst, a.weight() * src))
            })
            .collect();

        let mut totals: hashbrown::HashMap<UnitId, f64> = hashbrown::HashMap::new();
        for (id, dst, signal) in signals {
            if let Some(a) = self.associations.get_mut(id) {
                a.signal = signal;
            }
            *totals.entry(dst).or_insert(0.0) += signal;
        }

        for unit in self.units.iter_mut() {
            let total = totals.get(&unit.id).copied().unwrap_or(0.0);
            unit.state.absorb(total);
        }
    }

    /// Apply the policy's learning rule to every association.
    pub fn update_weights(&mut self) {
        for unit in self.units.iter_mut() {
            self.policy.prepare(&mut unit.state);
        }

        let deltas = match self.effective_execution_tier() {
            ExecutionTier::Parallel => self.weight_deltas_parallel(),
            ExecutionTier::Scalar => self.weight_deltas(),
        };

        for (id, delta) in deltas {
            if let Some(a) = self.associations.get_mut(id) {
                let next = a.weight() + delta * a.learning_rate;
                a.set_weight(next);
            }
        }
    }

    fn weight_deltas(&self) -> Vec<(AssociationId, f64)> {
        self.associations
            .iter()
            .filter_map(|a| {
                let src = &self.units.get(a.src)?.state;
                let dst = &self.units.get(a.dst)?.state;
                Some((a.id, self.policy.weight_delta(src, dst, a.weight())))
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn weight_deltas_parallel(&self) -> Vec<(AssociationId, f64)> {
        let units = &self.units;
        let policy = &self.policy;
        let associations: Vec<_> = self.associations.iter().collect();
        associations
            .into_par_iter()
            .filter_map(|a| {
                let src = &units.get(a.src)?.state;
                let dst = &units.get(a.dst)?.state;
                Some((a.id, policy.weight_delta(src, dst, a.weight())))
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn weight_deltas_parallel(&self) -> Vec<(AssociationId, f64)> {
        self.weight_deltas()
    }

    pub fn decay_weights(&mut self) {
        for a in self.associations.iter_mut() {
            let next = self.policy.decay_weight(a.weight());
            a.set_weight(next);
        }
    }

    pub fn decay_activations(&mut self) {
        for unit in self.units.iter_mut() {
            self.policy.decay_activation(&mut unit.state);
        }
    }

    pub fn leak_loads(&mut self) {
        for unit in self.units.iter_mut() {
            self.policy.leak_load(&mut unit.state);
        }
    }

    /// Remove every unit that is negligible itself and only touches negligible
    /// associations. Returns the number of units removed.
    pub fn clean_up(&mut self) -> usize {
        let threshold = self.policy.weight_removal_threshold();
        let doomed: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| self.policy.is_negligible(&u.state))
            .filter(|u| {
                u.incident().all(|id| {
                    self.associations
                        .get(id)
                        .map_or(true, |a| a.weight().abs() <= threshold)
                })
            })
            .map(|u| u.id)
            .collect();

        for id in &doomed {
            self.delete_unit(*id);
        }
        if !doomed.is_empty() {
            debug!(removed = doomed.len(), "cleaned up units");
        }
        doomed.len()
    }
}
