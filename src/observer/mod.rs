use crate::association::{Association, AssociationId};
use crate::network::{Diagnostics, Network};
use crate::policy::Policy;
use crate::state::UnitState;
use crate::unit::{DataKey, Unit, UnitId};

/// A unit's identity plus its named scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitView<K> {
    pub id: UnitId,
    pub key: K,
    pub fields: Vec<(&'static str, f64)>,
}

impl<K> UnitView<K> {
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationView {
    pub id: AssociationId,
    pub src: UnitId,
    pub dst: UnitId,
    pub weight: f64,
    pub signal: f64,
    pub learning_rate: f64,
}

/// A read-only copy of what the network looks like right now.
///
/// Design intent:
/// - Observers cannot mutate or steer the network.
/// - Snapshotting is *on-demand* and allocates; the cycle itself stays unchanged.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot<K> {
    pub diagnostics: Diagnostics,
    pub units: Vec<UnitView<K>>,
    pub associations: Vec<AssociationView>,
}

pub struct NetworkAdapter<'a, K, P: Policy> {
    network: &'a Network<K, P>,
}

impl<'a, K: DataKey, P: Policy> NetworkAdapter<'a, K, P> {
    pub fn new(network: &'a Network<K, P>) -> Self {
        Self { network }
    }

    pub fn snapshot(&self) -> NetworkSnapshot<K> {
        NetworkSnapshot {
            diagnostics: self.network.diagnostics(),
            units: self.network.units().iter().map(unit_view).collect(),
            associations: self
                .network
                .associations()
                .iter()
                .map(association_view)
                .collect(),
        }
    }

    /// The unit holding `key`, if any.
    pub fn query(&self, key: &K) -> Option<UnitView<K>> {
        self.network.get_unit(key).map(unit_view)
    }
}

impl<'a, K, P> NetworkAdapter<'a, K, P>
where
    K: DataKey + AsRef<str>,
    P: Policy,
{
    /// Units whose key starts with the word `name`, e.g. every pattern a
    /// given sender has submitted.
    pub fn cohort(&self, name: &str) -> Vec<UnitView<K>> {
        self.network
            .units()
            .iter()
            .filter(|u| u.key.as_ref().split_whitespace().next() == Some(name))
            .map(unit_view)
            .collect()
    }
}

fn unit_view<K: Clone, S: UnitState>(unit: &Unit<K, S>) -> UnitView<K> {
    UnitView {
        id: unit.id,
        key: unit.key.clone(),
        fields: unit.state.fields(),
    }
}

fn association_view(a: &Association) -> AssociationView {
    AssociationView {
        id: a.id,
        src: a.src,
        dst: a.dst,
        weight: a.weight(),
        signal: a.signal,
        learning_rate: a.learning_rate,
    }
}
