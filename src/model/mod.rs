//! Model primitives: molecule types, species graphs, patterns, rules and
//! parameters, plus the structured model a front end hands over.
//!
//! - MoleculeTypes: declared molecule/component types
//! - SpeciesGraph: arena graph of molecules joined by bonds
//! - Pattern: species template with state/bond wildcards
//! - Rule: compiled graph rewrite with its rate law and symmetry
//! - Canonical: invariant label plus exact isomorphism check
//! - Model: validated input for generation and simulation

pub mod canonical;
pub mod definition;
pub mod graph;
pub mod molecule;
pub mod notation;
pub mod parameters;
pub mod pattern;
pub mod rule;

pub use canonical::{automorphism_count, canonical_label, is_isomorphic, Canonical, CanonicalLabel};
pub use definition::{Model, ModelSpec, RuleSpec, SeedSpec};
pub use graph::{Component, Molecule, Site, SpeciesGraph};
pub use molecule::{ComponentType, MoleculeType, MoleculeTypeId, MoleculeTypes};
pub use notation::{parse_pattern, parse_species};
pub use parameters::{ParameterValue, Parameters};
pub use pattern::{BondConstraint, Pattern, PatternComponent, PatternMolecule, StateConstraint};
pub use rule::{MoleculeMapping, RateLaw, Rule};
