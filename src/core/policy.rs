use crate::state::UnitState;

/// Pluggable dynamics for one network variant.
///
/// The structural engine is written once; a policy supplies the scalar-state
/// shape of its units, the local learning rule, and the per-cycle decay
/// functions. The learning half (`prepare`, `weight_delta`) runs during the
/// weight-update pass; the decay half (`decay_weight`, `decay_activation`,
/// `leak_load`) runs in the passes that follow it.
pub trait Policy: Send + Sync + 'static {
    type State: UnitState;

    /// Short variant name, recorded in network images.
    const NAME: &'static str;

    /// Learning rate given to freshly created associations.
    fn default_learning_rate(&self) -> f64;

    /// Activation a unit can hold before it resists receiving more.
    fn capacity(&self) -> f64 {
        1.0
    }

    /// Apply an ingested scalar to a unit (input-driven activity).
    fn seed(&self, state: &mut Self::State, value: f64);

    /// Whether the unit takes part in association generation.
    fn is_active(&self, state: &Self::State) -> bool;

    /// Whether every scalar of the unit is at or below its removal threshold.
    fn is_negligible(&self, state: &Self::State) -> bool;

    /// `|weight|` at or below which an association no longer keeps its endpoints alive.
    fn weight_removal_threshold(&self) -> f64;

    /// Per-unit work that must happen before any weight delta is computed.
    fn prepare(&self, _state: &mut Self::State) {}

    /// Unscaled weight change for one association; the engine multiplies by the
    /// association's learning rate and re-clamps.
    fn weight_delta(&self, src: &Self::State, dst: &Self::State, weight: f64) -> f64;

    fn decay_weight(&self, weight: f64) -> f64 {
        weight
    }

    fn decay_activation(&self, state: &mut Self::State);

    fn leak_load(&self, state: &mut Self::State);
}
