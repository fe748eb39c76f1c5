//! Pattern embeddings into species graphs.
//!
//! Backtracking search over pattern molecules in the pattern's search order.
//! A molecule's candidates come from the bond partners of an already mapped
//! neighbor when there is one, otherwise from every molecule of its type.
//! Components are then assigned one at a time over same-named slots.

use crate::model::graph::{Site, SpeciesGraph};
use crate::model::pattern::{BondConstraint, Pattern};

const UNMAPPED: usize = usize::MAX;

/// Injective map from pattern molecules/components into a species.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Embedding {
    /// Species molecule of each pattern molecule.
    pub molecules: Vec<usize>,
    /// Species component slot of each listed pattern component.
    pub components: Vec<Vec<usize>>,
}

impl Embedding {
    /// Species site of listed component `component` of pattern molecule `molecule`.
    #[inline]
    pub fn site(&self, molecule: usize, component: usize) -> Site {
        Site::new(self.molecules[molecule], self.components[molecule][component])
    }

    /// Shift molecule images by `offset`, e.g. after merging graphs.
    pub fn offset(&self, offset: usize) -> Embedding {
        Embedding {
            molecules: self.molecules.iter().map(|m| m + offset).collect(),
            components: self.components.clone(),
        }
    }

    /// Split an embedding of concatenated patterns back into per-pattern parts.
    pub fn split(&self, offsets: &[usize]) -> Vec<Embedding> {
        let total = self.molecules.len();
        offsets
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = offsets.get(i + 1).copied().unwrap_or(total);
                Embedding {
                    molecules: self.molecules[start..end].to_vec(),
                    components: self.components[start..end].to_vec(),
                }
            })
            .collect()
    }
}

struct Matcher<'a, F> {
    pattern: &'a Pattern,
    graph: &'a SpeciesGraph,
    molecules: Vec<usize>,
    components: Vec<Vec<usize>>,
    used: Vec<bool>,
    visit: F,
}

impl<'a, F> Matcher<'a, F>
where
    F: FnMut(&Embedding) -> bool,
{
    fn new(pattern: &'a Pattern, graph: &'a SpeciesGraph, visit: F) -> Self {
        Self {
            pattern,
            graph,
            molecules: vec![UNMAPPED; pattern.len()],
            components: pattern
                .molecules()
                .iter()
                .map(|m| vec![UNMAPPED; m.components.len()])
                .collect(),
            used: vec![false; graph.len()],
            visit,
        }
    }

    fn candidates(&self, pm: usize) -> Vec<usize> {
        let molecule = &self.pattern.molecules()[pm];
        let anchor = molecule.components.iter().find_map(|component| {
            let (qm, qc) = component.partner()?;
            if qm == pm || self.molecules[qm] == UNMAPPED {
                return None;
            }
            Some(Site::new(self.molecules[qm], self.components[qm][qc]))
        });
        let mut pool: Vec<usize> = match anchor {
            Some(site) => self.graph.partners(site).iter().map(|s| s.molecule).collect(),
            None => (0..self.graph.len()).collect(),
        };
        pool.sort_unstable();
        pool.dedup();
        pool.retain(|&sm| !self.used[sm] && self.graph.molecules[sm].type_id == molecule.type_id);
        pool
    }

    /// Returns true when the visitor asks to stop.
    fn molecule(&mut self, k: usize) -> bool {
        if k == self.pattern.order().len() {
            let embedding = Embedding {
                molecules: self.molecules.clone(),
                components: self.components.clone(),
            };
            return (self.visit)(&embedding);
        }
        let pm = self.pattern.order()[k];
        for sm in self.candidates(pm) {
            self.molecules[pm] = sm;
            self.used[sm] = true;
            let stop = self.component(k, pm, sm, 0);
            self.used[sm] = false;
            self.molecules[pm] = UNMAPPED;
            if stop {
                return true;
            }
        }
        false
    }

    fn component(&mut self, k: usize, pm: usize, sm: usize, c: usize) -> bool {
        let (pattern, graph) = (self.pattern, self.graph);
        let listed = &pattern.molecules()[pm].components;
        if c == listed.len() {
            return self.molecule(k + 1);
        }
        let constraint = &listed[c];
        for &slot in constraint.slots() {
            if self.components[pm][..c].contains(&slot) {
                continue;
            }
            let instance = &graph.molecules[sm].components[slot];
            if !constraint.state.admits(instance.state) || !constraint.bond.admits_count(instance.bonds.len()) {
                continue;
            }
            if let BondConstraint::Label(_) = constraint.bond {
                if let Some((qm, qc)) = constraint.partner() {
                    let partner_molecule = self.molecules[qm];
                    let partner_slot = self.components[qm][qc];
                    if partner_molecule != UNMAPPED
                        && partner_slot != UNMAPPED
                        && !instance.bonds.contains(&Site::new(partner_molecule, partner_slot))
                    {
                        continue;
                    }
                }
            }
            self.components[pm][c] = slot;
            let stop = self.component(k, pm, sm, c + 1);
            self.components[pm][c] = UNMAPPED;
            if stop {
                return true;
            }
        }
        false
    }
}

/// Visit embeddings in deterministic order until `visit` returns true.
pub fn for_each_embedding<F>(pattern: &Pattern, graph: &SpeciesGraph, visit: F)
where
    F: FnMut(&Embedding) -> bool,
{
    if pattern.is_empty() {
        return;
    }
    Matcher::new(pattern, graph, visit).molecule(0);
}

/// All embeddings of `pattern` into `graph`.
pub fn embeddings(pattern: &Pattern, graph: &SpeciesGraph) -> Vec<Embedding> {
    let mut found = Vec::new();
    for_each_embedding(pattern, graph, |e| {
        found.push(e.clone());
        false
    });
    found
}

/// True if the pattern embeds at least once.
pub fn matches(pattern: &Pattern, graph: &SpeciesGraph) -> bool {
    let mut hit = false;
    for_each_embedding(pattern, graph, |_| {
        hit = true;
        true
    });
    hit
}

/// Number of distinct embeddings: the match multiplicity of `pattern` in `graph`.
pub fn count_embeddings(pattern: &Pattern, graph: &SpeciesGraph) -> usize {
    let mut count = 0;
    for_each_embedding(pattern, graph, |_| {
        count += 1;
        false
    });
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::{ComponentType, MoleculeType, MoleculeTypes};
    use crate::model::notation::{parse_pattern, parse_species};

    fn types() -> MoleculeTypes {
        let mut types = MoleculeTypes::new();
        types
            .declare(MoleculeType::new(
                "A",
                vec![ComponentType::new("b"), ComponentType::with_states("y", &["U", "P"])],
            ))
            .unwrap();
        types
            .declare(MoleculeType::new("B", vec![ComponentType::new("a")]))
            .unwrap();
        types
            .declare(MoleculeType::new("L", vec![ComponentType::new("r"), ComponentType::new("r")]))
            .unwrap();
        types
            .declare(MoleculeType::new("R", vec![ComponentType::new("l")]))
            .unwrap();
        types
    }

    #[test]
    fn test_free_site_constraint() {
        let types = types();
        let free = parse_pattern(&types, "A(b)").unwrap();
        assert!(matches(&free, &parse_species(&types, "A()").unwrap()));
        assert!(!matches(&free, &parse_species(&types, "A(b!1).B(a!1)").unwrap()));
    }

    #[test]
    fn test_state_and_wildcards() {
        let types = types();
        let species = parse_species(&types, "A(b!1,y~P).B(a!1)").unwrap();
        assert!(matches(&parse_pattern(&types, "A(y~P)").unwrap(), &species));
        assert!(!matches(&parse_pattern(&types, "A(y~U)").unwrap(), &species));
        assert!(matches(&parse_pattern(&types, "A(b!+)").unwrap(), &species));
        assert!(matches(&parse_pattern(&types, "A(b!?)").unwrap(), &species));
        assert!(matches(&parse_pattern(&types, "A(b!1).B(a!1)").unwrap(), &species));
    }

    #[test]
    fn test_labeled_bond_must_join_the_pair() {
        let types = types();
        let species = parse_species(&types, "R(l!1).L(r!1,r!2).R(l!2)").unwrap();
        let pattern = parse_pattern(&types, "L(r!1).R(l!1)").unwrap();
        // either r site, each with its own R
        assert_eq!(count_embeddings(&pattern, &species), 2);
        let e = embeddings(&pattern, &species);
        for embedding in &e {
            let l = embedding.site(0, 0);
            let r = embedding.site(1, 0);
            assert!(species.partners(l).contains(&r));
        }
    }

    #[test]
    fn test_symmetric_sites_multiply_matches() {
        let types = types();
        let species = parse_species(&types, "L(r,r)").unwrap();
        assert_eq!(count_embeddings(&parse_pattern(&types, "L(r)").unwrap(), &species), 2);
        assert_eq!(count_embeddings(&parse_pattern(&types, "L(r,r)").unwrap(), &species), 2);
        assert_eq!(count_embeddings(&parse_pattern(&types, "L()").unwrap(), &species), 1);
    }

    #[test]
    fn test_injective_molecules() {
        let types = types();
        let species = parse_species(&types, "A()").unwrap();
        let pattern = Pattern::concat(
            &types,
            &[parse_pattern(&types, "A()").unwrap(), parse_pattern(&types, "A()").unwrap()],
            "test",
        )
        .unwrap();
        assert_eq!(count_embeddings(&pattern, &species), 0);
    }

    #[test]
    fn test_split_embedding() {
        let types = types();
        let species = parse_species(&types, "A(b!1).B(a!1)").unwrap();
        let pattern = Pattern::concat(
            &types,
            &[parse_pattern(&types, "A()").unwrap(), parse_pattern(&types, "B()").unwrap()],
            "test",
        )
        .unwrap();
        let e = embeddings(&pattern, &species);
        assert_eq!(e.len(), 1);
        let parts = e[0].split(&[0, 1]);
        assert_eq!(parts[0].molecules, vec![0]);
        assert_eq!(parts[1].molecules, vec![1]);
    }
}
