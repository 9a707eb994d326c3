//! Topology-based associative memory: units carry a load and an activation.
//!
//! Load is the raw input-driven level. Once it reaches the firing threshold the
//! unit fires (activation jumps to its maximum). Activation is what spreads
//! along associations and what decays with a logistic weakening factor, so a
//! freshly fired unit holds on to most of its activation for a few cycles.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::association::WEIGHT_MAX;
use crate::policy::Policy;
use crate::state::{Bounds, UnitState};

pub const LOAD_BOUNDS: Bounds = Bounds::new(0.0, 1.0);
pub const ACTIVATION_BOUNDS: Bounds = Bounds::new(0.0, 1.0);
pub const ACTIVATION_THRESHOLD: f64 = LOAD_BOUNDS.max;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TopologyState {
    load: f64,
    activation: f64,
}

impl TopologyState {
    pub fn load(&self) -> f64 {
        self.load
    }

    /// Set the load; reaching the firing threshold saturates the activation.
    pub fn set_load(&mut self, load: f64) {
        self.load = LOAD_BOUNDS.clamp(load);
        if self.load >= ACTIVATION_THRESHOLD {
            self.activation = ACTIVATION_BOUNDS.max;
        }
    }

    /// Set the load without firing.
    pub(crate) fn assign_load(&mut self, load: f64) {
        self.load = LOAD_BOUNDS.clamp(load);
    }
}

impl UnitState for TopologyState {
    const FIELDS: &'static [&'static str] = &["load", "activation"];
    const BOUNDS: &'static [Bounds] = &[LOAD_BOUNDS, ACTIVATION_BOUNDS];

    fn values(&self) -> Vec<f64> {
        vec![self.load, self.activation]
    }

    fn from_values(values: &[f64]) -> Option<Self> {
        match values {
            [load, activation] => Some(Self {
                load: LOAD_BOUNDS.clamp(*load),
                activation: ACTIVATION_BOUNDS.clamp(*activation),
            }),
            _ => None,
        }
    }

    fn merge_max(&mut self, other: &Self) {
        self.load = self.load.max(other.load);
        self.activation = self.activation.max(other.activation);
    }

    fn activation(&self) -> f64 {
        self.activation
    }

    fn set_activation(&mut self, value: f64) {
        self.activation = ACTIVATION_BOUNDS.clamp(value);
    }
}

/// Tunables of the topology rule. Defaults reproduce the reference constants.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TopologyParams {
    /// Shift that makes the destination term negative while the destination is under-active.
    pub extinction_strength: f64,
    /// Weight of the error-correction term. Zero disables it.
    pub correction_strength: f64,
    pub learning_rate: f64,
    pub weight_decay_rate: f64,
    pub load_leak_rate: f64,
    pub activation_decay_rate: f64,
    pub logistic_steepness: f64,
    pub logistic_midpoint: f64,
    pub load_removal_threshold: f64,
    pub activation_removal_threshold: f64,
    pub weight_removal_threshold: f64,
}

impl Default for TopologyParams {
    fn default() -> Self {
        Self {
            extinction_strength: 0.8,
            correction_strength: 0.0,
            learning_rate: 0.04,
            weight_decay_rate: 0.000_001,
            load_leak_rate: 0.2,
            activation_decay_rate: 0.1,
            logistic_steepness: 7.0,
            logistic_midpoint: 0.5,
            load_removal_threshold: LOAD_BOUNDS.max * 0.01,
            activation_removal_threshold: ACTIVATION_BOUNDS.max * 0.01,
            weight_removal_threshold: WEIGHT_MAX * 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyPolicy {
    pub params: TopologyParams,
}

impl TopologyPolicy {
    pub fn new(params: TopologyParams) -> Self {
        Self { params }
    }

    /// `CAP - (CAP - load)^2`: amplifies weak source loads.
    fn source_term(&self, src: &TopologyState) -> f64 {
        let cap = LOAD_BOUNDS.max;
        cap - (cap - src.load).powi(2)
    }

    /// `(load * (CAP + K) - K)^15`: negligible until the destination nears saturation.
    fn destination_term(&self, dst: &TopologyState) -> f64 {
        let cap = LOAD_BOUNDS.max;
        let k = self.params.extinction_strength;
        (dst.load * (cap + k) - k).powi(15)
    }
}

impl Policy for TopologyPolicy {
    type State = TopologyState;

    const NAME: &'static str = "topology";

    fn default_learning_rate(&self) -> f64 {
        self.params.learning_rate
    }

    fn capacity(&self) -> f64 {
        ACTIVATION_BOUNDS.max
    }

    fn seed(&self, state: &mut TopologyState, value: f64) {
        state.set_load(value);
    }

    fn is_active(&self, state: &TopologyState) -> bool {
        state.load > self.params.load_removal_threshold
    }

    fn is_negligible(&self, state: &TopologyState) -> bool {
        state.load <= self.params.load_removal_threshold
            && state.activation <= self.params.activation_removal_threshold
    }

    fn weight_removal_threshold(&self) -> f64 {
        self.params.weight_removal_threshold
    }

    fn weight_delta(&self, src: &TopologyState, dst: &TopologyState, weight: f64) -> f64 {
        let hebbian = self.source_term(src) * self.destination_term(dst) * (WEIGHT_MAX - weight.abs());
        let correction =
            self.params.correction_strength * (dst.activation - src.activation) * weight;
        hebbian + correction
    }

    fn decay_weight(&self, weight: f64) -> f64 {
        weight + weight * -self.params.weight_decay_rate
    }

    fn decay_activation(&self, state: &mut TopologyState) {
        let a = state.activation;
        let weakening =
            1.0 / (1.0 + (self.params.logistic_steepness * (a - self.params.logistic_midpoint)).exp());
        state.set_activation(a + a * -self.params.activation_decay_rate * weakening);
    }

    fn leak_load(&self, state: &mut TopologyState) {
        let load = state.load;
        state.assign_load(load + load * -self.params.load_leak_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(load: f64, activation: f64) -> TopologyState {
        TopologyState::from_values(&[load, activation]).unwrap()
    }

    #[test]
    fn full_load_fires() {
        let mut s = TopologyState::default();
        s.set_load(0.5);
        assert_eq!(s.activation(), 0.0);
        s.set_load(3.0);
        assert_eq!(s.load(), 1.0);
        assert_eq!(s.activation(), 1.0);
    }

    #[test]
    fn learning_needs_an_active_destination() {
        let p = TopologyPolicy::default();
        let src = state(1.0, 1.0);
        assert!(p.weight_delta(&src, &state(1.0, 1.0), 0.0) > 0.99);
        // (0.2 * 1.8 - 0.8)^15 is a tiny negative number.
        let weak = p.weight_delta(&src, &state(0.2, 0.0), 0.0);
        assert!(weak < 0.0 && weak > -1e-4);
        // No headroom left at full weight.
        assert_eq!(p.weight_delta(&src, &state(1.0, 1.0), 1.0), 0.0);
    }

    #[test]
    fn activation_decay_is_slow_near_saturation() {
        let p = TopologyPolicy::default();
        let mut high = state(0.0, 1.0);
        let mut mid = state(0.0, 0.5);
        p.decay_activation(&mut high);
        p.decay_activation(&mut mid);
        let high_drop = 1.0 - high.activation();
        let mid_drop = 0.5 - mid.activation();
        assert!(high_drop < 0.01);
        assert!((mid_drop - 0.025).abs() < 1e-12);
    }

    #[test]
    fn leak_never_fires() {
        let p = TopologyPolicy::default();
        let mut s = state(1.0, 0.0);
        p.leak_load(&mut s);
        assert!((s.load() - 0.8).abs() < 1e-12);
        assert_eq!(s.activation(), 0.0);
    }

    #[test]
    fn negligible_requires_every_field_below_threshold() {
        let p = TopologyPolicy::default();
        assert!(p.is_negligible(&state(0.0, 0.0)));
        assert!(p.is_negligible(&state(0.01, 0.005)));
        assert!(!p.is_negligible(&state(0.0, 0.02)));
        assert!(!p.is_negligible(&state(0.5, 0.0)));
    }
}
