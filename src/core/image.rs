//! Flat, serializable image of a network.
//!
//! The image records every unit (id, key, scalar vector), every association
//! (id, endpoints, weight, learning rate) and both id counters. The transient
//! per-cycle signal is not recorded. Adjacency mirrors are not stored either;
//! they are rebuilt from the association list on restore.

use hashbrown::HashSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::association::{AssociationFields, AssociationId};
use crate::error::RestoreError;
use crate::network::{Network, NetworkConfig};
use crate::policy::Policy;
use crate::state::UnitState;
use crate::unit::{DataKey, UnitId};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnitRecord<K> {
    pub id: UnitId,
    pub key: K,
    pub state: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssociationRecord {
    pub id: AssociationId,
    pub src: UnitId,
    pub dst: UnitId,
    pub weight: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkImage<K> {
    /// Name of the policy that produced the image.
    pub variant: String,
    pub next_unit_id: u64,
    pub next_association_id: u64,
    pub units: Vec<UnitRecord<K>>,
    pub associations: Vec<AssociationRecord>,
}

impl<K: DataKey, P: Policy> Network<K, P> {
    pub fn to_image(&self) -> NetworkImage<K> {
        NetworkImage {
            variant: P::NAME.to_string(),
            next_unit_id: self.units.next_id(),
            next_association_id: self.associations.next_id(),
            units: self
                .units
                .iter()
                .map(|u| UnitRecord {
                    id: u.id,
                    key: u.key.clone(),
                    state: u.state.values(),
                })
                .collect(),
            associations: self
                .associations
                .iter()
                .map(|a| AssociationRecord {
                    id: a.id,
                    src: a.src,
                    dst: a.dst,
                    weight: a.weight(),
                    learning_rate: a.learning_rate,
                })
                .collect(),
        }
    }

    /// Rebuild a network from an image. The image is validated in full before
    /// anything is built; scalar values are clamped into their bounds.
    pub fn from_image(
        policy: P,
        config: NetworkConfig,
        image: NetworkImage<K>,
    ) -> Result<Self, RestoreError> {
        validate::<K, P>(&image)?;

        let mut network = Network::new(policy, config);
        let mut units = image.units;
        units.sort_by_key(|u| u.id);
        for record in units {
            let state = P::State::from_values(&record.state).ok_or(RestoreError::StateWidth {
                unit: record.id,
                expected: P::State::FIELDS.len(),
                got: record.state.len(),
            })?;
            network.units.restore(record.id, record.key, state);
        }

        let mut associations = image.associations;
        associations.sort_by_key(|a| a.id);
        for record in associations {
            network.associations.insert_with_id(
                record.id,
                record.src,
                record.dst,
                AssociationFields {
                    weight: record.weight,
                    signal: 0.0,
                    learning_rate: record.learning_rate,
                },
            );
            network.attach(record.id, record.src, record.dst);
        }

        network.units.set_next_id(image.next_unit_id);
        network.associations.set_next_id(image.next_association_id);

        debug!(
            units = network.units.len(),
            associations = network.associations.len(),
            "restored network image"
        );
        debug_assert_eq!(network.verify(), Ok(()));
        Ok(network)
    }
}

fn validate<K: DataKey, P: Policy>(image: &NetworkImage<K>) -> Result<(), RestoreError> {
    if image.variant != P::NAME {
        return Err(RestoreError::VariantMismatch {
            expected: P::NAME.to_string(),
            found: image.variant.clone(),
        });
    }

    let width = P::State::FIELDS.len();
    let mut unit_ids = HashSet::new();
    let mut keys = HashSet::new();
    for record in &image.units {
        if !unit_ids.insert(record.id) {
            return Err(RestoreError::DuplicateUnitId(record.id));
        }
        if !keys.insert(&record.key) {
            return Err(RestoreError::DuplicateKey(record.id));
        }
        if record.state.len() != width {
            return Err(RestoreError::StateWidth {
                unit: record.id,
                expected: width,
                got: record.state.len(),
            });
        }
        if record.id.0 >= image.next_unit_id {
            return Err(RestoreError::Counter {
                kind: "unit",
                next: image.next_unit_id,
                id: record.id.0,
            });
        }
    }

    let mut association_ids = HashSet::new();
    let mut pairs = HashSet::new();
    for record in &image.associations {
        if !association_ids.insert(record.id) {
            return Err(RestoreError::DuplicateAssociationId(record.id));
        }
        for endpoint in [record.src, record.dst] {
            if !unit_ids.contains(&endpoint) {
                return Err(RestoreError::MissingEndpoint {
                    association: record.id,
                    unit: endpoint,
                });
            }
        }
        if record.src == record.dst {
            return Err(RestoreError::SelfAssociation(record.id));
        }
        if !pairs.insert((record.src, record.dst)) {
            return Err(RestoreError::DuplicatePair {
                src: record.src,
                dst: record.dst,
            });
        }
        if record.id.0 >= image.next_association_id {
            return Err(RestoreError::Counter {
                kind: "association",
                next: image.next_association_id,
                id: record.id.0,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::TemporalPolicy;
    use crate::topology::TopologyPolicy;

    fn sample() -> Network<String, TopologyPolicy> {
        let mut net = Network::new(TopologyPolicy::default(), NetworkConfig::topology());
        for k in ["A", "B", "C"] {
            net.ingest(k.to_string(), 1.0);
        }
        net.step();
        net.delete_data(&"C".to_string());
        net
    }

    #[test]
    fn restore_rebuilds_mirrors_and_counters() {
        let net = sample();
        let image = net.to_image();
        assert_eq!(image.variant, "topology");
        assert_eq!(image.units.len(), 2);
        assert_eq!(image.associations.len(), 2);

        let restored =
            Network::from_image(TopologyPolicy::default(), *net.config(), image.clone()).unwrap();
        assert_eq!(restored.verify(), Ok(()));
        assert_eq!(restored.to_image(), image);
        for unit in net.units().iter() {
            let other = restored.unit(unit.id).unwrap();
            assert_eq!(other.key, unit.key);
            assert_eq!(other.state, unit.state);
            assert_eq!(other.degree(), unit.degree());
        }

        // Counters continue where the original left off.
        let mut restored = restored;
        assert_eq!(restored.insert_data("D".to_string()), UnitId(4));
    }

    #[test]
    fn rejects_wrong_variant() {
        let image = sample().to_image();
        let err = Network::<String, TemporalPolicy>::from_image(
            TemporalPolicy::default(),
            NetworkConfig::temporal(),
            image,
        )
        .unwrap_err();
        assert!(matches!(err, RestoreError::VariantMismatch { .. }));
    }

    #[test]
    fn rejects_dangling_endpoint() {
        let mut image = sample().to_image();
        image.associations[0].dst = UnitId(99);
        let err = Network::from_image(TopologyPolicy::default(), NetworkConfig::topology(), image)
            .unwrap_err();
        assert!(matches!(err, RestoreError::MissingEndpoint { .. }));
    }

    #[test]
    fn rejects_parallel_edges_and_stale_counters() {
        let mut image = sample().to_image();
        let mut twin = image.associations[0].clone();
        twin.id = AssociationId(image.next_association_id);
        image.next_association_id += 1;
        image.associations.push(twin);
        let err = Network::from_image(
            TopologyPolicy::default(),
            NetworkConfig::topology(),
            image.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, RestoreError::DuplicatePair { .. }));

        image.associations.pop();
        image.next_unit_id = 1;
        let err = Network::from_image(TopologyPolicy::default(), NetworkConfig::topology(), image)
            .unwrap_err();
        assert!(matches!(err, RestoreError::Counter { kind: "unit", .. }));
    }

    #[test]
    fn rejects_wrong_state_width() {
        let mut image = sample().to_image();
        image.units[1].state.push(0.0);
        let err = Network::from_image(TopologyPolicy::default(), NetworkConfig::topology(), image)
            .unwrap_err();
        assert!(matches!(err, RestoreError::StateWidth { .. }));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn image_survives_json() {
        let image = sample().to_image();
        let text = serde_json::to_string(&image).unwrap();
        let back: NetworkImage<String> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.next_unit_id, image.next_unit_id);
        assert_eq!(back.units.len(), image.units.len());
        for (a, b) in back.associations.iter().zip(&image.associations) {
            assert_eq!((a.id, a.src, a.dst), (b.id, b.src, b.dst));
            assert!((a.weight - b.weight).abs() < 1e-12);
        }

        let restored =
            Network::from_image(TopologyPolicy::default(), NetworkConfig::topology(), back);
        assert!(restored.is_ok());
    }
}
