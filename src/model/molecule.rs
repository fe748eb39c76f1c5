//! Molecule and component type declarations.
//!
//! Types are immutable once registered. Species and patterns refer to them
//! by [`MoleculeTypeId`] and component slot index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Index of a molecule type in a [`MoleculeTypes`] registry.
pub type MoleculeTypeId = usize;

/// A binding site / state-bearing component of a molecule type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentType {
    pub name: String,
    /// Allowed internal states. Empty means the component is stateless.
    #[serde(default)]
    pub states: Vec<String>,
    /// Maximum simultaneous bonds on this component.
    #[serde(default = "default_max_bonds")]
    pub max_bonds: u8,
}

fn default_max_bonds() -> u8 {
    1
}

impl ComponentType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            states: Vec::new(),
            max_bonds: 1,
        }
    }

    pub fn with_states(name: &str, states: &[&str]) -> Self {
        Self {
            states: states.iter().map(|s| s.to_string()).collect(),
            ..Self::new(name)
        }
    }

    pub fn max_bonds(mut self, max_bonds: u8) -> Self {
        self.max_bonds = max_bonds;
        self
    }

    #[inline]
    pub fn has_states(&self) -> bool {
        !self.states.is_empty()
    }

    pub fn allows_state(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    /// State given to freshly created instances.
    pub fn default_state(&self) -> Option<&str> {
        self.states.first().map(String::as_str)
    }
}

/// A declared molecule type: a name plus an ordered list of components.
///
/// Component names may repeat (`A(b,b)`); same-named components are
/// interchangeable for matching and isomorphism.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeType {
    pub name: String,
    #[serde(default)]
    pub components: Vec<ComponentType>,
}

impl MoleculeType {
    pub fn new(name: &str, components: Vec<ComponentType>) -> Self {
        Self {
            name: name.to_string(),
            components,
        }
    }

    /// Slots whose component carries the given name, in declaration order.
    pub fn slots_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.components
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.name == name)
            .map(|(i, _)| i)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.iter().any(|c| c.name == name)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let context = format!("molecule type '{}'", self.name);
        for component in &self.components {
            let mut seen = Vec::with_capacity(component.states.len());
            for state in &component.states {
                if seen.contains(&state) {
                    return Err(ModelError::Duplicate {
                        context: format!("{}.{}", context, component.name),
                        name: state.clone(),
                    });
                }
                seen.push(state);
            }
            if component.max_bonds == 0 {
                return Err(ModelError::InvalidConfig(format!(
                    "{}: component '{}' must allow at least one bond",
                    context, component.name
                )));
            }
        }
        Ok(())
    }
}

/// Registry of declared molecule types, scoped to one model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MoleculeType>", into = "Vec<MoleculeType>")]
pub struct MoleculeTypes {
    types: Vec<MoleculeType>,
    by_name: HashMap<String, MoleculeTypeId>,
}

impl MoleculeTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a molecule type and return its id.
    pub fn declare(&mut self, molecule_type: MoleculeType) -> Result<MoleculeTypeId, ModelError> {
        if self.by_name.contains_key(&molecule_type.name) {
            return Err(ModelError::Duplicate {
                context: "molecule types".to_string(),
                name: molecule_type.name,
            });
        }
        molecule_type.validate()?;
        let id = self.types.len();
        self.by_name.insert(molecule_type.name.clone(), id);
        self.types.push(molecule_type);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: MoleculeTypeId) -> &MoleculeType {
        &self.types[id]
    }

    pub fn id_of(&self, name: &str) -> Option<MoleculeTypeId> {
        self.by_name.get(name).copied()
    }

    /// Look up a type by name, reporting an error with the given context.
    pub fn resolve(&self, name: &str, context: &str) -> Result<MoleculeTypeId, ModelError> {
        self.id_of(name).ok_or_else(|| ModelError::UnknownMoleculeType {
            context: context.to_string(),
            name: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MoleculeTypeId, &MoleculeType)> {
        self.types.iter().enumerate()
    }
}

impl From<Vec<MoleculeType>> for MoleculeTypes {
    fn from(types: Vec<MoleculeType>) -> Self {
        let by_name = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self { types, by_name }
    }
}

impl From<MoleculeTypes> for Vec<MoleculeType> {
    fn from(types: MoleculeTypes) -> Self {
        types.types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_resolve() {
        let mut types = MoleculeTypes::new();
        let a = types
            .declare(MoleculeType::new(
                "A",
                vec![ComponentType::new("b"), ComponentType::with_states("y", &["U", "P"])],
            ))
            .unwrap();
        assert_eq!(types.id_of("A"), Some(a));
        assert_eq!(types.get(a).components[1].default_state(), Some("U"));
        assert!(types.resolve("B", "test").is_err());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut types = MoleculeTypes::new();
        types.declare(MoleculeType::new("A", vec![])).unwrap();
        let err = types.declare(MoleculeType::new("A", vec![])).unwrap_err();
        assert!(matches!(err, ModelError::Duplicate { .. }));
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let mut types = MoleculeTypes::new();
        let err = types
            .declare(MoleculeType::new(
                "A",
                vec![ComponentType::with_states("y", &["U", "U"])],
            ))
            .unwrap_err();
        assert!(matches!(err, ModelError::Duplicate { .. }));
    }

    #[test]
    fn test_repeated_component_slots() {
        let t = MoleculeType::new("A", vec![ComponentType::new("b"), ComponentType::new("b")]);
        assert_eq!(t.slots_named("b").collect::<Vec<_>>(), vec![0, 1]);
    }
}
