//! Mass-action kinetics compiled from a network.
//!
//! Deterministic propensities use powers of concentrations; stochastic
//! propensities use falling factorials of populations. The statistical factor
//! already folded into each rate carries the 1/n! for identical reactants.

use std::collections::BTreeMap;

use crate::network::generator::Network;

#[derive(Clone, Debug)]
struct CompiledReaction {
    rate: f64,
    /// (species, copies consumed).
    reactants: Vec<(usize, u32)>,
    /// Net change per species, zeros dropped.
    changes: Vec<(usize, i64)>,
}

/// Stoichiometry and rates of a network, ready for integration.
#[derive(Clone, Debug)]
pub struct ReactionSystem {
    n_species: usize,
    reactions: Vec<CompiledReaction>,
}

impl ReactionSystem {
    pub fn from_network(network: &Network) -> Self {
        let reactions = network
            .reactions
            .iter()
            .map(|reaction| {
                let mut net: BTreeMap<usize, i64> = BTreeMap::new();
                for &(s, n) in &reaction.reactants {
                    *net.entry(s).or_default() -= n as i64;
                }
                for &(s, n) in &reaction.products {
                    *net.entry(s).or_default() += n as i64;
                }
                let changes = net.into_iter().filter(|&(_, d)| d != 0).collect();
                CompiledReaction {
                    rate: reaction.rate,
                    reactants: reaction.reactants.iter().map(|&(s, n)| (s, n as u32)).collect(),
                    changes,
                }
            })
            .collect();
        Self {
            n_species: network.species.len(),
            reactions,
        }
    }

    #[inline]
    pub fn n_species(&self) -> usize {
        self.n_species
    }

    #[inline]
    pub fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    /// Right-hand side dy/dt of the mass-action ODE.
    pub fn derivatives(&self, y: &[f64], dydt: &mut [f64]) {
        dydt.iter_mut().for_each(|d| *d = 0.0);
        for reaction in &self.reactions {
            let flux = reaction
                .reactants
                .iter()
                .fold(reaction.rate, |acc, &(s, n)| acc * y[s].powi(n as i32));
            for &(s, delta) in &reaction.changes {
                dydt[s] += delta as f64 * flux;
            }
        }
    }

    /// Stochastic propensity of reaction `r`.
    #[inline]
    pub fn propensity(&self, r: usize, populations: &[i64]) -> f64 {
        let reaction = &self.reactions[r];
        reaction.reactants.iter().fold(reaction.rate, |acc, &(s, n)| {
            acc * falling_factorial(populations[s], n)
        })
    }

    pub fn propensities(&self, populations: &[i64], out: &mut [f64]) -> f64 {
        let mut total = 0.0;
        for (r, a) in out.iter_mut().enumerate() {
            *a = self.propensity(r, populations);
            total += *a;
        }
        total
    }

    /// Fire reaction `r`. Returns the first species driven negative, if any.
    pub fn fire(&self, r: usize, populations: &mut [i64]) -> Option<usize> {
        let mut negative = None;
        for &(s, delta) in &self.reactions[r].changes {
            populations[s] += delta;
            if populations[s] < 0 && negative.is_none() {
                negative = Some(s);
            }
        }
        negative
    }
}

/// x (x-1) ... (x-n+1), zero when fewer than n copies exist.
#[inline]
fn falling_factorial(x: i64, n: u32) -> f64 {
    if x < n as i64 {
        return 0.0;
    }
    (0..n as i64).fold(1.0, |acc, i| acc * (x - i) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::MoleculeTypes;
    use crate::model::graph::SpeciesGraph;
    use crate::network::generator::{Reaction, Termination};
    use crate::network::store::Species;

    fn network(reactions: Vec<Reaction>, n: usize) -> Network {
        Network {
            types: MoleculeTypes::new(),
            species: (0..n)
                .map(|index| Species {
                    index,
                    graph: SpeciesGraph::new(),
                    quantity: 0.0,
                })
                .collect(),
            reactions,
            rules: Vec::new(),
            termination: Termination::Converged,
            iterations: 1,
            rejected_products: 0,
        }
    }

    fn reaction(reactants: Vec<(usize, usize)>, products: Vec<(usize, usize)>, rate: f64) -> Reaction {
        Reaction {
            reactants,
            products,
            rule: 0,
            rule_name: "r".to_string(),
            statistical_factor: 1.0,
            rate,
        }
    }

    #[test]
    fn test_falling_factorial() {
        assert_eq!(falling_factorial(5, 2), 20.0);
        assert_eq!(falling_factorial(1, 2), 0.0);
        assert_eq!(falling_factorial(3, 0), 1.0);
    }

    #[test]
    fn test_dimerization_conventions() {
        // 2 X -> Y with c = 0.5
        let system = ReactionSystem::from_network(&network(vec![reaction(vec![(0, 2)], vec![(1, 1)], 0.5)], 2));
        let mut dydt = vec![0.0; 2];
        system.derivatives(&[4.0, 0.0], &mut dydt);
        assert_eq!(dydt, vec![-16.0, 8.0]);
        assert_eq!(system.propensity(0, &[4, 0]), 6.0);
    }

    #[test]
    fn test_catalyst_has_no_net_change() {
        // E + S -> E + P
        let system = ReactionSystem::from_network(&network(
            vec![reaction(vec![(0, 1), (1, 1)], vec![(0, 1), (2, 1)], 1.0)],
            3,
        ));
        let mut populations = vec![1, 3, 0];
        assert_eq!(system.fire(0, &mut populations), None);
        assert_eq!(populations, vec![1, 2, 1]);
    }

    #[test]
    fn test_fire_reports_negative() {
        let system = ReactionSystem::from_network(&network(vec![reaction(vec![(0, 1)], vec![], 1.0)], 1));
        let mut populations = vec![0];
        assert_eq!(system.fire(0, &mut populations), Some(0));
    }
}
