//! Temporal-difference associative memory.
//!
//! Each unit keeps its current input, an eligibility trace that follows the
//! input with a lag, and the summed signal it received this cycle and last
//! cycle. Weights learn from the temporal-difference error of the destination
//! times the trace of the source.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::policy::Policy;
use crate::state::{Bounds, UnitState};

pub const INPUT_BOUNDS: Bounds = Bounds::new(0.0, 1.0);
pub const TRACE_BOUNDS: Bounds = Bounds::new(0.0, 1.0);
/// Sum over every incoming association, so only the floor is fixed.
pub const SIGNAL_SUM_BOUNDS: Bounds = Bounds::new(0.0, f64::MAX);
pub const ERROR_BOUNDS: Bounds = Bounds::new(-1.0, 1.0);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemporalState {
    input: f64,
    trace: f64,
    signal_sum: f64,
    signal_sum_old: f64,
    error: f64,
}

impl TemporalState {
    pub fn input(&self) -> f64 {
        self.input
    }

    pub fn set_input(&mut self, input: f64) {
        self.input = INPUT_BOUNDS.clamp(input);
    }

    pub fn trace(&self) -> f64 {
        self.trace
    }

    pub fn signal_sum(&self) -> f64 {
        self.signal_sum
    }

    pub fn signal_sum_old(&self) -> f64 {
        self.signal_sum_old
    }

    pub fn error(&self) -> f64 {
        self.error
    }
}

impl UnitState for TemporalState {
    const FIELDS: &'static [&'static str] =
        &["input", "trace", "signal_sum", "signal_sum_old", "error"];
    const BOUNDS: &'static [Bounds] = &[
        INPUT_BOUNDS,
        TRACE_BOUNDS,
        SIGNAL_SUM_BOUNDS,
        SIGNAL_SUM_BOUNDS,
        ERROR_BOUNDS,
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.input,
            self.trace,
            self.signal_sum,
            self.signal_sum_old,
            self.error,
        ]
    }

    fn from_values(values: &[f64]) -> Option<Self> {
        match values {
            [input, trace, signal_sum, signal_sum_old, error] => Some(Self {
                input: INPUT_BOUNDS.clamp(*input),
                trace: TRACE_BOUNDS.clamp(*trace),
                signal_sum: SIGNAL_SUM_BOUNDS.clamp(*signal_sum),
                signal_sum_old: SIGNAL_SUM_BOUNDS.clamp(*signal_sum_old),
                error: ERROR_BOUNDS.clamp(*error),
            }),
            _ => None,
        }
    }

    fn merge_max(&mut self, other: &Self) {
        self.input = self.input.max(other.input);
        self.trace = self.trace.max(other.trace);
        self.signal_sum = self.signal_sum.max(other.signal_sum);
        self.signal_sum_old = self.signal_sum_old.max(other.signal_sum_old);
        self.error = self.error.max(other.error);
    }

    /// The input is what flows along outgoing associations.
    fn activation(&self) -> f64 {
        self.input
    }

    fn set_activation(&mut self, value: f64) {
        self.set_input(value);
    }

    fn absorb(&mut self, total: f64) {
        self.signal_sum = SIGNAL_SUM_BOUNDS.clamp(total);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TemporalParams {
    /// Step size of the error term.
    pub alpha: f64,
    /// Salience of the input.
    pub beta: f64,
    /// Discount applied to the current signal sum.
    pub gamma: f64,
    /// Rate at which the trace follows the input.
    pub trace_rate: f64,
    pub learning_rate: f64,
    pub input_removal_threshold: f64,
    pub trace_removal_threshold: f64,
    pub signal_sum_removal_threshold: f64,
    pub weight_removal_threshold: f64,
}

impl Default for TemporalParams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            beta: 1.0,
            gamma: 0.95,
            trace_rate: 0.2,
            learning_rate: 1.0,
            input_removal_threshold: 0.01,
            trace_removal_threshold: 0.01,
            signal_sum_removal_threshold: 0.01,
            weight_removal_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalPolicy {
    pub params: TemporalParams,
}

impl TemporalPolicy {
    pub fn new(params: TemporalParams) -> Self {
        Self { params }
    }
}

impl Policy for TemporalPolicy {
    type State = TemporalState;

    const NAME: &'static str = "temporal";

    fn default_learning_rate(&self) -> f64 {
        self.params.learning_rate
    }

    fn seed(&self, state: &mut TemporalState, value: f64) {
        state.set_input(value);
    }

    fn is_active(&self, state: &TemporalState) -> bool {
        state.input > self.params.input_removal_threshold
    }

    fn is_negligible(&self, state: &TemporalState) -> bool {
        state.input <= self.params.input_removal_threshold
            && state.trace <= self.params.trace_removal_threshold
            && state.signal_sum <= self.params.signal_sum_removal_threshold
    }

    fn weight_removal_threshold(&self) -> f64 {
        self.params.weight_removal_threshold
    }

    fn prepare(&self, state: &mut TemporalState) {
        let p = &self.params;
        let error =
            p.alpha * p.beta * (state.input + p.gamma * state.signal_sum - state.signal_sum_old);
        state.error = ERROR_BOUNDS.clamp(error);
    }

    fn weight_delta(&self, src: &TemporalState, dst: &TemporalState, _weight: f64) -> f64 {
        dst.error * src.trace
    }

    /// Moves the trace toward the input and remembers this cycle's signal sum.
    fn decay_activation(&self, state: &mut TemporalState) {
        let trace = state.trace + self.params.trace_rate * (state.input - state.trace);
        state.trace = TRACE_BOUNDS.clamp(trace);
        state.signal_sum_old = state.signal_sum;
    }

    /// Inputs only last for the cycle they were presented in.
    fn leak_load(&self, state: &mut TemporalState) {
        state.input = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_follows_temporal_difference() {
        let p = TemporalPolicy::default();
        let mut s = TemporalState::from_values(&[1.0, 0.0, 0.5, 0.25, 0.0]).unwrap();
        p.prepare(&mut s);
        let expected = 0.1 * (1.0 + 0.95 * 0.5 - 0.25);
        assert!((s.error() - expected).abs() < 1e-12);
    }

    #[test]
    fn trace_lags_input_and_input_resets() {
        let p = TemporalPolicy::default();
        let mut s = TemporalState::default();
        p.seed(&mut s, 1.0);
        s.absorb(0.4);
        p.decay_activation(&mut s);
        p.leak_load(&mut s);
        assert!((s.trace() - 0.2).abs() < 1e-12);
        assert_eq!(s.signal_sum_old(), 0.4);
        assert_eq!(s.input(), 0.0);
    }

    #[test]
    fn signal_sum_has_floor_but_no_cap() {
        let mut s = TemporalState::default();
        s.absorb(-0.3);
        assert_eq!(s.signal_sum(), 0.0);
        s.absorb(1.6);
        assert_eq!(s.signal_sum(), 1.6);
        assert!(s.within_bounds());
    }

    #[test]
    fn compound_prediction_raises_error_above_single_cue() {
        let p = TemporalPolicy::default();
        let mut single = TemporalState::default();
        single.absorb(0.8);
        let mut compound = TemporalState::default();
        compound.absorb(1.6);
        p.prepare(&mut single);
        p.prepare(&mut compound);
        assert!(compound.error() > single.error());
        assert!((compound.error() - 0.1 * 0.95 * 1.6).abs() < 1e-12);
    }

    #[test]
    fn delta_is_destination_error_times_source_trace() {
        let p = TemporalPolicy::default();
        let src = TemporalState::from_values(&[0.0, 0.5, 0.0, 0.0, 0.0]).unwrap();
        let dst = TemporalState::from_values(&[0.0, 0.0, 0.0, 0.0, 0.2]).unwrap();
        assert!((p.weight_delta(&src, &dst, 0.7) - 0.1).abs() < 1e-12);
    }
}
