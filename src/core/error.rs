use thiserror::Error;

use crate::association::AssociationId;
use crate::unit::UnitId;

/// A broken structural invariant. Reaching one of these is a bug in the engine,
/// not a recoverable condition; structural operations assert against them in
/// debug builds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("key index has {indexed} entries for {units} units")]
    KeyIndex { indexed: usize, units: usize },

    #[error("unit {0} is not reachable through its own key")]
    UnindexedUnit(UnitId),

    #[error("association {association} references missing unit {unit}")]
    DanglingEndpoint {
        association: AssociationId,
        unit: UnitId,
    },

    #[error("association {0} connects a unit to itself")]
    SelfAssociation(AssociationId),

    #[error("association {association} is not mirrored in unit {unit}")]
    Unmirrored {
        association: AssociationId,
        unit: UnitId,
    },

    #[error("unit {unit} lists unknown or foreign association {association}")]
    StaleAdjacency {
        unit: UnitId,
        association: AssociationId,
    },

    #[error("{entries} adjacency entries for {associations} associations")]
    AdjacencyCount { entries: usize, associations: usize },

    #[error("more than one association from {src} to {dst}")]
    DuplicatePair { src: UnitId, dst: UnitId },

    #[error("unit {0} holds a scalar outside its bounds")]
    UnitOutOfBounds(UnitId),

    #[error("association {0} holds a weight outside its bounds")]
    WeightOutOfBounds(AssociationId),

    #[error("id {id} is not below the generator counter {next}")]
    StaleCounter { id: u64, next: u64 },
}

/// A command line that cannot be turned into a network operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command line")]
    Empty,

    #[error("missing command verb")]
    MissingVerb,

    #[error("unknown command verb `{0}`")]
    UnknownVerb(String),

    #[error("`{verb}` expects {expected} argument(s), got {got}")]
    Arity {
        verb: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unknown print target `{0}`")]
    UnknownPrintTarget(String),
}

/// Input that could not be queued for the driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("simulation is no longer receiving input")]
    Closed,
}

/// A network image that cannot be restored without breaking an invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RestoreError {
    #[error("image was written by the `{found}` variant, expected `{expected}`")]
    VariantMismatch { expected: String, found: String },

    #[error("duplicate unit id {0}")]
    DuplicateUnitId(UnitId),

    #[error("duplicate unit key on unit {0}")]
    DuplicateKey(UnitId),

    #[error("unit {unit} has {got} state values, expected {expected}")]
    StateWidth {
        unit: UnitId,
        expected: usize,
        got: usize,
    },

    #[error("duplicate association id {0}")]
    DuplicateAssociationId(AssociationId),

    #[error("association {association} references missing unit {unit}")]
    MissingEndpoint {
        association: AssociationId,
        unit: UnitId,
    },

    #[error("association {0} connects a unit to itself")]
    SelfAssociation(AssociationId),

    #[error("more than one association from {src} to {dst}")]
    DuplicatePair { src: UnitId, dst: UnitId },

    #[error("{kind} counter {next} does not exceed stored id {id}")]
    Counter {
        kind: &'static str,
        next: u64,
        id: u64,
    },
}
