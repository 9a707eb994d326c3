//! # assocnet
//!
//! An incremental associative-memory network engine.
//!
//! The network is a live weighted graph of *units* (one per distinct pattern)
//! joined by directed *associations*. Every cycle spreads activation along the
//! associations, adjusts weights with a local learning rule, decays state, and
//! removes structure that no longer matters. Units can be merged, split and
//! deleted at any time without ever leaving a dangling or duplicated edge.
//!
//! The structural engine is written once and is generic over a [`policy::Policy`].
//! Two policies ship with the crate:
//!
//! - [`topology::TopologyPolicy`]: load/activation units, sparse associations
//!   created between co-active units, Hebbian-style learning.
//! - [`temporal::TemporalPolicy`]: fully connected units that learn from a
//!   temporal-difference error and an eligibility trace.
//!
//! ## Quick Start
//!
//! ```
//! use assocnet::prelude::*;
//!
//! let mut net = Network::new(TopologyPolicy::default(), NetworkConfig::topology());
//!
//! // Two patterns seen together.
//! let red = net.ingest("cam red".to_string(), 1.0);
//! let ball = net.ingest("cam ball".to_string(), 1.0);
//! net.step();
//!
//! assert_eq!(net.association_count(), 2);
//! assert!(net.association_between(red, ball).unwrap().weight() > 0.0);
//!
//! // Merge one into the other.
//! net.join_data(&"cam red".to_string(), &"cam ball".to_string());
//! assert_eq!(net.unit_count(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialization of configs, parameters and network images
//! - `parallel`: Enable multi-threaded weight updates via rayon
//!
//! ## Modules
//!
//! - [`network`]: Structural engine, configuration, diagnostics
//! - [`dynamics`]: Per-cycle spreading, learning, decay and cleanup
//! - [`simulation`]: Shared handle, input queue and cycle driver
//! - [`command`]: Text command protocol
//! - [`image`]: Flat persistence image
//! - [`observer`]: Read-only observation adapters

#[path = "core/state.rs"]
pub mod state;

#[path = "core/unit.rs"]
pub mod unit;

#[path = "core/association.rs"]
pub mod association;

#[path = "core/policy.rs"]
pub mod policy;

#[path = "core/topology.rs"]
pub mod topology;

#[path = "core/temporal.rs"]
pub mod temporal;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/dynamics.rs"]
pub mod dynamics;

#[path = "core/image.rs"]
pub mod image;

#[path = "core/command.rs"]
pub mod command;

#[path = "core/simulation.rs"]
pub mod simulation;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use assocnet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::association::{Association, AssociationId, Weight, WEIGHT_MAX, WEIGHT_MIN};
    pub use crate::command::{Command, PrintTarget};
    pub use crate::dynamics::StepReport;
    pub use crate::error::{CommandError, InputError, InvariantViolation, RestoreError};
    pub use crate::image::NetworkImage;
    pub use crate::network::{Diagnostics, ExecutionTier, Network, NetworkConfig, SpreadMode};
    pub use crate::observer::{NetworkAdapter, NetworkSnapshot, UnitView};
    pub use crate::policy::Policy;
    pub use crate::simulation::{
        CycleReport, Inbox, Input, SharedNetwork, Simulation, SimulationConfig,
    };
    pub use crate::state::UnitState;
    pub use crate::temporal::{TemporalParams, TemporalPolicy, TemporalState};
    pub use crate::topology::{TopologyParams, TopologyPolicy, TopologyState};
    pub use crate::unit::{DataKey, Unit, UnitId};
}
