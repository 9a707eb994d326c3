use core::fmt::Debug;

/// Closed interval a scalar field is kept in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        // NaN collapses to the lower bound.
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Scalar state carried by every unit.
///
/// Each implementation declares a fixed, named set of bounded doubles. Every
/// setter clamps, so no write can leave a field outside its interval.
pub trait UnitState: Clone + Debug + Default + Send + Sync + 'static {
    /// Field names in the order `values()` reports them.
    const FIELDS: &'static [&'static str];

    /// Declared interval per field, same order as `FIELDS`.
    const BOUNDS: &'static [Bounds];

    fn values(&self) -> Vec<f64>;

    /// Rebuild state from a value vector. Values are clamped; `None` if the width is wrong.
    fn from_values(values: &[f64]) -> Option<Self>;

    /// Element-wise maximum of `self` and `other`, written into `self`.
    fn merge_max(&mut self, other: &Self);

    /// Level that flows along outgoing associations.
    fn activation(&self) -> f64;

    fn set_activation(&mut self, value: f64);

    #[inline]
    fn add_activation(&mut self, delta: f64) {
        let next = self.activation() + delta;
        self.set_activation(next);
    }

    /// Receive the summed incoming signal of a summation spreading pass.
    fn absorb(&mut self, total: f64) {
        self.set_activation(total);
    }

    /// Named view of the current values.
    fn fields(&self) -> Vec<(&'static str, f64)> {
        Self::FIELDS.iter().copied().zip(self.values()).collect()
    }

    fn within_bounds(&self) -> bool {
        self.values()
            .iter()
            .zip(Self::BOUNDS)
            .all(|(v, b)| b.contains(*v))
    }
}
