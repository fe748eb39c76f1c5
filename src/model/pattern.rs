//! Patterns: species graph templates with wildcards.
//!
//! Every constrainable field is a closed variant so matching is a total
//! function over a fixed set of cases. Bond labels pair components inside
//! a single pattern; an unpaired label is a configuration error.

use std::collections::{BTreeMap, VecDeque};

use super::molecule::{MoleculeTypeId, MoleculeTypes};
use crate::error::ModelError;

/// Constraint on a component's internal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateConstraint {
    /// Any state (or a stateless component).
    Wildcard,
    /// Exactly this state index.
    Exact(usize),
}

impl StateConstraint {
    #[inline]
    pub fn admits(&self, state: Option<usize>) -> bool {
        match *self {
            StateConstraint::Wildcard => true,
            StateConstraint::Exact(s) => state == Some(s),
        }
    }
}

/// Constraint on a component's bonds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BondConstraint {
    /// Explicitly free: no bonds at all.
    Unbound,
    /// Bonded or not, don't care (`!?`).
    Wildcard,
    /// Bonded to something not named by the pattern (`!+`).
    Bound,
    /// Bonded to the pattern component carrying the same label.
    Label(u32),
}

impl BondConstraint {
    /// Check the bond count part of the constraint.
    #[inline]
    pub fn admits_count(&self, bonds: usize) -> bool {
        match self {
            BondConstraint::Unbound => bonds == 0,
            BondConstraint::Wildcard => true,
            BondConstraint::Bound | BondConstraint::Label(_) => bonds > 0,
        }
    }

    pub fn label(&self) -> Option<u32> {
        match *self {
            BondConstraint::Label(label) => Some(label),
            _ => None,
        }
    }
}

/// One constrained component of a pattern molecule.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternComponent {
    pub name: String,
    pub state: StateConstraint,
    pub bond: BondConstraint,
    /// Slots of the molecule type that carry this name.
    slots: Vec<usize>,
    /// (molecule, component) of the labeled partner, if any.
    partner: Option<(usize, usize)>,
}

impl PatternComponent {
    pub fn new(name: &str, state: StateConstraint, bond: BondConstraint) -> Self {
        Self {
            name: name.to_string(),
            state,
            bond,
            slots: Vec::new(),
            partner: None,
        }
    }

    /// Component with no state constraint that must be free.
    pub fn free(name: &str) -> Self {
        Self::new(name, StateConstraint::Wildcard, BondConstraint::Unbound)
    }

    #[inline]
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    #[inline]
    pub fn partner(&self) -> Option<(usize, usize)> {
        self.partner
    }
}

/// A molecule in a pattern. Only the listed components are constrained.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternMolecule {
    pub type_id: MoleculeTypeId,
    pub components: Vec<PatternComponent>,
}

impl PatternMolecule {
    pub fn new(type_id: MoleculeTypeId, components: Vec<PatternComponent>) -> Self {
        Self { type_id, components }
    }
}

/// A validated pattern with resolved bond partners and a search order.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    molecules: Vec<PatternMolecule>,
    order: Vec<usize>,
}

impl Pattern {
    /// Validate molecules against `types` and resolve labels.
    pub fn new(
        types: &MoleculeTypes,
        mut molecules: Vec<PatternMolecule>,
        context: &str,
    ) -> Result<Self, ModelError> {
        let mut labels: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();

        for (m, molecule) in molecules.iter_mut().enumerate() {
            if molecule.type_id >= types.len() {
                return Err(ModelError::UnknownMoleculeType {
                    context: context.to_string(),
                    name: format!("#{}", molecule.type_id),
                });
            }
            let mtype = types.get(molecule.type_id);
            for (c, component) in molecule.components.iter_mut().enumerate() {
                component.slots = mtype.slots_named(&component.name).collect();
                if component.slots.is_empty() {
                    return Err(ModelError::UnknownComponent {
                        context: context.to_string(),
                        molecule: mtype.name.clone(),
                        component: component.name.clone(),
                    });
                }
                if let StateConstraint::Exact(s) = component.state {
                    let ctype = &mtype.components[component.slots[0]];
                    if s >= ctype.states.len() {
                        return Err(ModelError::InvalidState {
                            context: context.to_string(),
                            molecule: mtype.name.clone(),
                            component: component.name.clone(),
                            state: format!("#{}", s),
                        });
                    }
                }
                if let Some(label) = component.bond.label() {
                    labels.entry(label).or_default().push((m, c));
                }
            }
            for component in &molecule.components {
                let listed = molecule
                    .components
                    .iter()
                    .filter(|other| other.name == component.name)
                    .count();
                if listed > component.slots.len() {
                    return Err(ModelError::InvalidConfig(format!(
                        "{}: {} lists component '{}' {} times but the type declares {}",
                        context,
                        mtype.name,
                        component.name,
                        listed,
                        component.slots.len()
                    )));
                }
            }
        }

        for (label, ends) in labels {
            match ends.as_slice() {
                [(m1, c1), (m2, c2)] => {
                    molecules[*m1].components[*c1].partner = Some((*m2, *c2));
                    molecules[*m2].components[*c2].partner = Some((*m1, *c1));
                }
                [_] => {
                    return Err(ModelError::DanglingBond {
                        context: context.to_string(),
                        label,
                    })
                }
                _ => {
                    return Err(ModelError::OverusedBond {
                        context: context.to_string(),
                        label,
                    })
                }
            }
        }

        let order = search_order(&molecules);
        Ok(Self { molecules, order })
    }

    /// Join several patterns into one (disconnected) pattern.
    pub fn concat(types: &MoleculeTypes, patterns: &[Pattern], context: &str) -> Result<Self, ModelError> {
        let mut molecules = Vec::new();
        let mut next_label = 0u32;
        for pattern in patterns {
            let base = next_label;
            let mut max_label = 0;
            for molecule in &pattern.molecules {
                let mut copy = molecule.clone();
                for component in &mut copy.components {
                    if let BondConstraint::Label(label) = component.bond {
                        component.bond = BondConstraint::Label(base + label);
                        max_label = max_label.max(label + 1);
                    }
                }
                molecules.push(copy);
            }
            next_label = base + max_label;
        }
        Self::new(types, molecules, context)
    }

    #[inline]
    pub fn molecules(&self) -> &[PatternMolecule] {
        &self.molecules
    }

    /// Molecule visiting order used by the matcher: connected groups
    /// breadth-first from their most constrained molecule.
    #[inline]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    /// Molecule type ids the pattern requires, deduplicated.
    pub fn required_types(&self) -> Vec<MoleculeTypeId> {
        let mut ids: Vec<MoleculeTypeId> = self.molecules.iter().map(|m| m.type_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

fn search_order(molecules: &[PatternMolecule]) -> Vec<usize> {
    let n = molecules.len();
    let neighbors = |m: usize| -> Vec<usize> {
        let mut out: Vec<usize> = molecules[m]
            .components
            .iter()
            .filter_map(|c| c.partner.map(|(pm, _)| pm))
            .filter(|&pm| pm != m)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    };
    let weight = |m: usize| -> usize {
        molecules[m]
            .components
            .iter()
            .map(|c| {
                1 + usize::from(matches!(c.state, StateConstraint::Exact(_)))
                    + usize::from(c.bond != BondConstraint::Wildcard)
            })
            .sum()
    };

    let mut seen = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let Some(root) = (0..n)
            .filter(|&m| !seen[m])
            .max_by(|&a, &b| weight(a).cmp(&weight(b)).then(b.cmp(&a)))
        else {
            break;
        };
        seen[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(m) = queue.pop_front() {
            order.push(m);
            for next in neighbors(m) {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }
    order
}
