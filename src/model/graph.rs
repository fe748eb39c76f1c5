//! Concrete species graphs.
//!
//! A species is an undirected labeled graph of molecule instances. Molecules
//! and their components live in an arena and are addressed by integer
//! [`Site`] handles; a bond is stored on both of its endpoints.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::molecule::{MoleculeTypeId, MoleculeTypes};
use crate::error::ModelError;

/// Address of one component: (molecule index, component slot).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Site {
    pub molecule: usize,
    pub component: usize,
}

impl Site {
    #[inline]
    pub fn new(molecule: usize, component: usize) -> Self {
        Self { molecule, component }
    }
}

/// A component instance: current state index and bond endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Index into the component type's `states`, `None` for stateless components.
    pub state: Option<usize>,
    pub bonds: Vec<Site>,
}

/// A molecule instance. Always carries every component of its type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Molecule {
    pub type_id: MoleculeTypeId,
    pub components: Vec<Component>,
}

/// Concrete molecular complex.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesGraph {
    pub molecules: Vec<Molecule>,
}

impl SpeciesGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a molecule of the given type with default states and no bonds.
    pub fn add_molecule(&mut self, types: &MoleculeTypes, type_id: MoleculeTypeId) -> usize {
        let components = types
            .get(type_id)
            .components
            .iter()
            .map(|c| Component {
                state: if c.has_states() { Some(0) } else { None },
                bonds: Vec::new(),
            })
            .collect();
        self.molecules.push(Molecule { type_id, components });
        self.molecules.len() - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    #[inline]
    pub fn component(&self, site: Site) -> &Component {
        &self.molecules[site.molecule].components[site.component]
    }

    #[inline]
    pub fn partners(&self, site: Site) -> &[Site] {
        &self.component(site).bonds
    }

    pub fn set_state(&mut self, site: Site, state: Option<usize>) {
        self.molecules[site.molecule].components[site.component].state = state;
    }

    pub fn add_bond(&mut self, a: Site, b: Site) {
        self.molecules[a.molecule].components[a.component].bonds.push(b);
        self.molecules[b.molecule].components[b.component].bonds.push(a);
    }

    /// Remove one bond between `a` and `b`. Returns false if none existed.
    pub fn remove_bond(&mut self, a: Site, b: Site) -> bool {
        let from_a = &mut self.molecules[a.molecule].components[a.component].bonds;
        let Some(pos) = from_a.iter().position(|&s| s == b) else {
            return false;
        };
        from_a.remove(pos);
        let from_b = &mut self.molecules[b.molecule].components[b.component].bonds;
        if let Some(pos) = from_b.iter().position(|&s| s == a) {
            from_b.remove(pos);
        }
        true
    }

    /// Remove every bond attached to `site`.
    pub fn clear_bonds(&mut self, site: Site) {
        let partners = std::mem::take(&mut self.molecules[site.molecule].components[site.component].bonds);
        for partner in partners {
            let back = &mut self.molecules[partner.molecule].components[partner.component].bonds;
            if let Some(pos) = back.iter().position(|&s| s == site) {
                back.remove(pos);
            }
        }
    }

    /// Every bond once, as (lower, higher) endpoint pairs in sorted order.
    pub fn bonds(&self) -> Vec<(Site, Site)> {
        let mut bonds = Vec::new();
        for (m, molecule) in self.molecules.iter().enumerate() {
            for (c, component) in molecule.components.iter().enumerate() {
                let here = Site::new(m, c);
                for &other in &component.bonds {
                    if here < other {
                        bonds.push((here, other));
                    }
                }
            }
        }
        bonds.sort();
        bonds
    }

    pub fn bond_count(&self) -> usize {
        self.molecules
            .iter()
            .flat_map(|m| m.components.iter())
            .map(|c| c.bonds.len())
            .sum::<usize>()
            / 2
    }

    /// Distinct molecules bonded to molecule `m`, ascending.
    pub fn neighbors(&self, m: usize) -> Vec<usize> {
        let set: BTreeSet<usize> = self.molecules[m]
            .components
            .iter()
            .flat_map(|c| c.bonds.iter().map(|s| s.molecule))
            .filter(|&n| n != m)
            .collect();
        set.into_iter().collect()
    }

    /// Number of molecules of each type id.
    pub fn type_counts(&self) -> Vec<(MoleculeTypeId, usize)> {
        let mut counts: Vec<(MoleculeTypeId, usize)> = Vec::new();
        for molecule in &self.molecules {
            match counts.iter_mut().find(|(t, _)| *t == molecule.type_id) {
                Some((_, n)) => *n += 1,
                None => counts.push((molecule.type_id, 1)),
            }
        }
        counts.sort();
        counts
    }

    pub fn contains_type(&self, type_id: MoleculeTypeId) -> bool {
        self.molecules.iter().any(|m| m.type_id == type_id)
    }

    /// Append a copy of `other`, returning the molecule offset of the copy.
    pub fn merge(&mut self, other: &SpeciesGraph) -> usize {
        let offset = self.molecules.len();
        for molecule in &other.molecules {
            let mut copy = molecule.clone();
            for component in &mut copy.components {
                for bond in &mut component.bonds {
                    bond.molecule += offset;
                }
            }
            self.molecules.push(copy);
        }
        offset
    }

    /// Connected components as ascending molecule index lists, ordered by
    /// their lowest molecule index.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.molecules.len()];
        let mut groups = Vec::new();
        for start in 0..self.molecules.len() {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut group = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(m) = queue.pop_front() {
                for n in self.neighbors(m) {
                    if !seen[n] {
                        seen[n] = true;
                        group.push(n);
                        queue.push_back(n);
                    }
                }
            }
            group.sort_unstable();
            groups.push(group);
        }
        groups
    }

    pub fn is_connected(&self) -> bool {
        self.connected_components().len() <= 1
    }

    /// Induced subgraph on `molecules`, in the given order. Bonds leaving the
    /// selection are dropped.
    pub fn extract(&self, molecules: &[usize]) -> SpeciesGraph {
        let mut remap = vec![usize::MAX; self.molecules.len()];
        for (new, &old) in molecules.iter().enumerate() {
            remap[old] = new;
        }
        let molecules = molecules
            .iter()
            .map(|&old| {
                let source = &self.molecules[old];
                Molecule {
                    type_id: source.type_id,
                    components: source
                        .components
                        .iter()
                        .map(|c| Component {
                            state: c.state,
                            bonds: c
                                .bonds
                                .iter()
                                .filter(|s| remap[s.molecule] != usize::MAX)
                                .map(|s| Site::new(remap[s.molecule], s.component))
                                .collect(),
                        })
                        .collect(),
                }
            })
            .collect();
        SpeciesGraph { molecules }
    }

    /// Split into connected complexes.
    pub fn split(&self) -> Vec<SpeciesGraph> {
        self.connected_components()
            .iter()
            .map(|group| self.extract(group))
            .collect()
    }

    /// Drop the given molecules and every bond touching them.
    pub fn remove_molecules(&mut self, doomed: &BTreeSet<usize>) -> Vec<Option<usize>> {
        let mut remap = Vec::with_capacity(self.molecules.len());
        let mut next = 0;
        for m in 0..self.molecules.len() {
            if doomed.contains(&m) {
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }
        let old = std::mem::take(&mut self.molecules);
        for (m, mut molecule) in old.into_iter().enumerate() {
            if remap[m].is_none() {
                continue;
            }
            for component in &mut molecule.components {
                component.bonds = component
                    .bonds
                    .iter()
                    .filter_map(|s| remap[s.molecule].map(|n| Site::new(n, s.component)))
                    .collect();
            }
            self.molecules.push(molecule);
        }
        remap
    }

    /// Check structural invariants against the declared types.
    pub fn validate(&self, types: &MoleculeTypes, context: &str) -> Result<(), ModelError> {
        for (m, molecule) in self.molecules.iter().enumerate() {
            if molecule.type_id >= types.len() {
                return Err(ModelError::UnknownMoleculeType {
                    context: context.to_string(),
                    name: format!("#{}", molecule.type_id),
                });
            }
            let mtype = types.get(molecule.type_id);
            if molecule.components.len() != mtype.components.len() {
                return Err(ModelError::InvalidConfig(format!(
                    "{}: molecule {} has {} components, type '{}' declares {}",
                    context,
                    m,
                    molecule.components.len(),
                    mtype.name,
                    mtype.components.len()
                )));
            }
            for (c, (component, ctype)) in molecule.components.iter().zip(&mtype.components).enumerate() {
                match (component.state, ctype.has_states()) {
                    (Some(s), true) if s < ctype.states.len() => {}
                    (None, false) => {}
                    (None, true) => {
                        return Err(ModelError::MissingState {
                            context: context.to_string(),
                            molecule: mtype.name.clone(),
                            component: ctype.name.clone(),
                        })
                    }
                    (Some(s), _) => {
                        return Err(ModelError::InvalidState {
                            context: context.to_string(),
                            molecule: mtype.name.clone(),
                            component: ctype.name.clone(),
                            state: format!("#{}", s),
                        })
                    }
                }
                if component.bonds.len() > ctype.max_bonds as usize {
                    return Err(ModelError::BondCapacity {
                        context: context.to_string(),
                        molecule: mtype.name.clone(),
                        component: ctype.name.clone(),
                        max_bonds: ctype.max_bonds,
                    });
                }
                let here = Site::new(m, c);
                for &other in &component.bonds {
                    let symmetric = other.molecule < self.molecules.len()
                        && other.component < self.molecules[other.molecule].components.len()
                        && other != here
                        && self.partners(other).contains(&here);
                    if !symmetric {
                        return Err(ModelError::AsymmetricBond {
                            context: context.to_string(),
                            from: format!("{}.{}", m, c),
                            to: format!("{}.{}", other.molecule, other.component),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Render in bond-label notation, e.g. `A(b!1,y~P).B(a!1)`.
    pub fn display<'a>(&'a self, types: &'a MoleculeTypes) -> GraphDisplay<'a> {
        GraphDisplay { graph: self, types }
    }
}

/// [`fmt::Display`] adapter returned by [`SpeciesGraph::display`].
pub struct GraphDisplay<'a> {
    graph: &'a SpeciesGraph,
    types: &'a MoleculeTypes,
}

impl fmt::Display for GraphDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<(Site, Site)> = self.graph.bonds();
        let label_of = |a: Site, b: Site| {
            let key = if a < b { (a, b) } else { (b, a) };
            labels.iter().position(|&l| l == key).map(|i| i + 1).unwrap_or(0)
        };
        for (m, molecule) in self.graph.molecules.iter().enumerate() {
            if m > 0 {
                write!(f, ".")?;
            }
            let mtype = self.types.get(molecule.type_id);
            write!(f, "{}(", mtype.name)?;
            for (c, component) in molecule.components.iter().enumerate() {
                if c > 0 {
                    write!(f, ",")?;
                }
                let ctype = &mtype.components[c];
                write!(f, "{}", ctype.name)?;
                if let Some(state) = component.state.and_then(|s| ctype.states.get(s)) {
                    write!(f, "~{}", state)?;
                }
                for &partner in &component.bonds {
                    write!(f, "!{}", label_of(Site::new(m, c), partner))?;
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::{ComponentType, MoleculeType};

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
    }

    fn complex(types: &MoleculeTypes) -> SpeciesGraph {
        let mut g = SpeciesGraph::new();
        let a = g.add_molecule(types, 0);
        let b = g.add_molecule(types, 1);
        g.add_bond(Site::new(a, 0), Site::new(b, 0));
        g
    }

    #[test]
    fn test_bonds_are_symmetric() {
        let types = types();
        let g = complex(&types);
        assert_eq!(g.partners(Site::new(0, 0)), &[Site::new(1, 0)]);
        assert_eq!(g.partners(Site::new(1, 0)), &[Site::new(0, 0)]);
        assert_eq!(g.bond_count(), 1);
        assert!(g.validate(&types, "test").is_ok());
    }

    #[test]
    fn test_split_after_unbinding() {
        let types = types();
        let mut g = complex(&types);
        assert!(g.is_connected());
        assert!(g.remove_bond(Site::new(0, 0), Site::new(1, 0)));
        let parts = g.split();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].molecules[0].type_id, 0);
        assert_eq!(parts[1].molecules[0].type_id, 1);
    }

    #[test]
    fn test_merge_offsets_bonds() {
        let types = types();
        let mut g = complex(&types);
        let offset = g.merge(&complex(&types));
        assert_eq!(offset, 2);
        assert_eq!(g.partners(Site::new(2, 0)), &[Site::new(3, 0)]);
        assert_eq!(g.connected_components().len(), 2);
    }

    #[test]
    fn test_remove_molecules_drops_bonds() {
        let types = types();
        let mut g = complex(&types);
        let remap = g.remove_molecules(&BTreeSet::from([1]));
        assert_eq!(remap, vec![Some(0), None]);
        assert_eq!(g.len(), 1);
        assert!(g.partners(Site::new(0, 0)).is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_state() {
        let types = types();
        let mut g = complex(&types);
        g.set_state(Site::new(0, 1), None);
        assert!(matches!(
            g.validate(&types, "seed"),
            Err(ModelError::MissingState { .. })
        ));
    }

    #[test]
    fn test_display_notation() {
        let types = types();
        let g = complex(&types);
        assert_eq!(g.display(&types).to_string(), "A(b!1,y~U).B(a!1)");
    }
}
