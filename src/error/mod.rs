use thiserror::Error;

/// Top-level error type for the crate.
#[derive(Error, Debug)]
pub enum PknetError {
    /// An invalid structural request made while building the model
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The state vector handed to the RHS or the solver has the wrong length
    #[error("state vector has {actual} entries but the model has {expected} compartments")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A stored rate function broke its evaluation contract
    #[error(transparent)]
    Rate(#[from] RateError),

    /// Propagated failure from the ODE solver
    #[error("ODE solver failed: {0}")]
    Solver(#[from] diffsol::error::DiffsolError),

    #[error("{0}")]
    Other(String),
}

/// Structural misuse of the model builder. Checked eagerly at call time,
/// never coerced or retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("compartment name {0:?} is already in use")]
    DuplicateName(String),

    #[error("no compartment named {0:?}")]
    UnknownCompartment(String),

    #[error("volume of compartment {name:?} must be positive, got {volume}")]
    NonPositiveVolume { name: String, volume: f64 },

    #[error("the model already has a root compartment")]
    AlreadyInitialized,

    #[error("the model has no compartments yet; call create_root first")]
    Uninitialized,

    #[error("dosing window {index} has {width} entries, expected [start, stop] pairs")]
    MalformedWindow { index: usize, width: usize },

    #[error("dosing window {index} is invalid: [{start}, {stop}]")]
    InvalidWindow { index: usize, start: f64, stop: f64 },

    #[error("compartment {name:?} has no input to shift to the new parent")]
    NoInputToShift { name: String },

    #[error("compartment {name:?} has no output to shift to the new child")]
    NoOutputToShift { name: String },

    #[error(
        "siblings exchange mass by first-order kinetics; \
         add manual inputs and outputs for any other behaviour"
    )]
    SiblingConnectionNotFirstOrder,

    #[error("time grid must contain at least one point and be strictly increasing")]
    InvalidTimeGrid,
}

/// A rate function failed its `(t, q) -> scalar` contract at evaluation
/// time. Attachment never introspects functions; these surface only when
/// the RHS is evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateError {
    #[error("rate function returned a non-finite value at t = {time}")]
    NonFinite { time: f64 },

    #[error("rate function references state index {index}, but the state vector has {len} entries")]
    IndexOutOfBounds { index: usize, len: usize },
}
