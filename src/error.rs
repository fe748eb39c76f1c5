//! Error types for model validation, network generation and simulation.
//!
//! Configuration problems are reported as [`ModelError`] before any work
//! starts. Numerical failures during a run are reported as
//! [`SimulationError`] and only affect that run.

use thiserror::Error;

/// Malformed model input, detected eagerly.
///
/// Every variant carries a `context` string naming where the problem was
/// found (for example `rule 'bind' reactant 0`).
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("{context}: unknown molecule type '{name}'")]
    UnknownMoleculeType { context: String, name: String },

    #[error("{context}: molecule type '{molecule}' has no component '{component}'")]
    UnknownComponent {
        context: String,
        molecule: String,
        component: String,
    },

    #[error("{context}: state '{state}' is not declared for {molecule}.{component}")]
    InvalidState {
        context: String,
        molecule: String,
        component: String,
        state: String,
    },

    #[error("{context}: {molecule}.{component} requires a state")]
    MissingState {
        context: String,
        molecule: String,
        component: String,
    },

    #[error("{context}: bond label {label} has no partner")]
    DanglingBond { context: String, label: u32 },

    #[error("{context}: bond label {label} is used more than twice")]
    OverusedBond { context: String, label: u32 },

    #[error("{context}: {molecule}.{component} exceeds its bond capacity of {max_bonds}")]
    BondCapacity {
        context: String,
        molecule: String,
        component: String,
        max_bonds: u8,
    },

    #[error("{context}: bond between {from} and {to} is not symmetric")]
    AsymmetricBond {
        context: String,
        from: String,
        to: String,
    },

    #[error("{context}: species is not a single connected complex")]
    DisconnectedSpecies { context: String },

    #[error("{context}: invalid molecule mapping: {reason}")]
    InvalidMapping { context: String, reason: String },

    #[error("cannot parse '{text}': {message}")]
    Syntax { text: String, message: String },

    #[error("{context}: undefined parameter '{name}'")]
    UndefinedParameter { context: String, name: String },

    #[error("{context}: cannot parse expression '{expression}': {message}")]
    Expression {
        context: String,
        expression: String,
        message: String,
    },

    #[error("circular parameter definitions: {names:?}")]
    CircularParameters { names: Vec<String> },

    #[error("{context}: duplicate declaration of '{name}'")]
    Duplicate { context: String, name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Numerical failure of a single simulation run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("step size underflow at t={time:.6e} (h={step:.3e})")]
    StepSizeUnderflow {
        time: f64,
        step: f64,
        state: Vec<f64>,
    },

    #[error("exceeded {steps} internal steps at t={time:.6e}")]
    StepBudgetExceeded { time: f64, steps: u64 },

    #[error("non-finite value for species {species} at t={time:.6e}")]
    NonFinite { time: f64, species: usize },

    #[error(
        "negative population {population} for species {species} after reaction {reaction} at t={time:.6e}"
    )]
    NegativePopulation {
        time: f64,
        species: usize,
        population: i64,
        reaction: usize,
    },

    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Crate-level error.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

pub type Result<T> = std::result::Result<T, Error>;
