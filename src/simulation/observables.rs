//! Observables: named linear combinations of species quantities.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ModelError;
use crate::model::notation::parse_pattern;
use crate::model::pattern::Pattern;
use crate::network::generator::Network;
use crate::network::matcher::{count_embeddings, matches};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservableKind {
    /// Each species weighted by the number of pattern matches it contains.
    Molecules(Vec<String>),
    /// Each species counted once if any pattern matches it.
    Species(Vec<String>),
    /// Explicit (species index, coefficient) terms.
    Group(Vec<(usize, f64)>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    pub name: String,
    pub kind: ObservableKind,
}

impl Observable {
    pub fn molecules(name: &str, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: ObservableKind::Molecules(patterns.iter().map(|p| p.to_string()).collect()),
        }
    }

    pub fn species(name: &str, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: ObservableKind::Species(patterns.iter().map(|p| p.to_string()).collect()),
        }
    }

    pub fn group(name: &str, terms: Vec<(usize, f64)>) -> Self {
        Self {
            name: name.to_string(),
            kind: ObservableKind::Group(terms),
        }
    }

    /// Resolve against a generated network.
    pub fn resolve(&self, network: &Network) -> Result<ResolvedObservable, ModelError> {
        let parse = |texts: &[String]| -> Result<Vec<Pattern>, ModelError> {
            texts.iter().map(|t| parse_pattern(&network.types, t)).collect()
        };
        let terms: Vec<(usize, f64)> = match &self.kind {
            ObservableKind::Molecules(texts) => {
                let patterns = parse(texts)?;
                network
                    .species
                    .iter()
                    .filter_map(|s| {
                        let n: usize = patterns.iter().map(|p| count_embeddings(p, &s.graph)).sum();
                        (n > 0).then_some((s.index, n as f64))
                    })
                    .collect()
            }
            ObservableKind::Species(texts) => {
                let patterns = parse(texts)?;
                network
                    .species
                    .iter()
                    .filter(|s| patterns.iter().any(|p| matches(p, &s.graph)))
                    .map(|s| (s.index, 1.0))
                    .collect()
            }
            ObservableKind::Group(terms) => {
                if let Some(&(index, _)) = terms.iter().find(|&&(i, _)| i >= network.species.len()) {
                    return Err(ModelError::InvalidConfig(format!(
                        "observable '{}' references species {} of {}",
                        self.name,
                        index,
                        network.species.len()
                    )));
                }
                terms.clone()
            }
        };
        if terms.is_empty() {
            warn!(observable = %self.name, "observable matches no species");
        }
        Ok(ResolvedObservable {
            name: self.name.clone(),
            terms,
        })
    }
}

/// Observable as (species index, coefficient) terms.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedObservable {
    pub name: String,
    pub terms: Vec<(usize, f64)>,
}

impl ResolvedObservable {
    #[inline]
    pub fn value(&self, quantities: &[f64]) -> f64 {
        self.terms.iter().map(|&(i, c)| c * quantities[i]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::{ComponentType, MoleculeType, MoleculeTypes};
    use crate::model::notation::parse_species;
    use crate::network::generator::Termination;
    use crate::network::store::Species;

    fn network() -> Network {
        let mut types = MoleculeTypes::new();
        types
            .declare(MoleculeType::new("L", vec![ComponentType::new("r"), ComponentType::new("r")]))
            .unwrap();
        types
            .declare(MoleculeType::new("R", vec![ComponentType::new("l")]))
            .unwrap();
        let species = ["L(r,r)", "R(l)", "L(r!1,r).R(l!1)", "R(l!1).L(r!1,r!2).R(l!2)"]
            .iter()
            .enumerate()
            .map(|(index, text)| Species {
                index,
                graph: parse_species(&types, text).unwrap(),
                quantity: 1.0,
            })
            .collect();
        Network {
            types,
            species,
            reactions: Vec::new(),
            rules: Vec::new(),
            termination: Termination::Converged,
            iterations: 0,
            rejected_products: 0,
        }
    }

    #[test]
    fn test_molecules_counts_matches() {
        let network = network();
        let bound_r = Observable::molecules("R_bound", &["R(l!+)"]).resolve(&network).unwrap();
        assert_eq!(bound_r.terms, vec![(2, 1.0), (3, 2.0)]);
        assert_eq!(bound_r.value(&[1.0, 1.0, 2.0, 3.0]), 8.0);
    }

    #[test]
    fn test_species_counts_once() {
        let network = network();
        let complexes = Observable::species("complexes", &["R(l!+)"]).resolve(&network).unwrap();
        assert_eq!(complexes.terms, vec![(2, 1.0), (3, 1.0)]);
    }

    #[test]
    fn test_group_bounds_checked() {
        let network = network();
        assert!(Observable::group("bad", vec![(9, 1.0)]).resolve(&network).is_err());
        assert!(Observable::group("ok", vec![(0, 2.0)]).resolve(&network).is_ok());
    }
}
