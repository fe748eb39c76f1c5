//! Bond-label notation for species and patterns.
//!
//! `A(b!1,y~P).B(a!1)` is a complex of an `A` and a `B` joined by bond 1,
//! with `A.y` in state `P`. Patterns additionally accept `!+` (bound to
//! anything), `!?` (bond don't care) and `~?` (state don't care). A pattern
//! component without a `!` must be free. Omitted components are
//! unconstrained in patterns and take their defaults in species.

use std::collections::BTreeMap;

use super::graph::{Site, SpeciesGraph};
use super::molecule::MoleculeTypes;
use super::pattern::{BondConstraint, Pattern, PatternComponent, PatternMolecule, StateConstraint};
use crate::error::ModelError;

#[derive(Debug, PartialEq)]
enum BondToken {
    Label(u32),
    Bound,
    Wildcard,
}

#[derive(Debug)]
struct ParsedComponent {
    name: String,
    state: Option<String>,
    bonds: Vec<BondToken>,
}

#[derive(Debug)]
struct ParsedMolecule {
    name: String,
    components: Vec<ParsedComponent>,
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().filter(|c| !c.is_whitespace()).collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ModelError {
        ModelError::Syntax {
            text: self.text.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ModelError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}' at position {}", c, self.pos)))
        }
    }

    fn name(&mut self) -> Result<String, ModelError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("expected a name at position {}", start)));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn complex(mut self) -> Result<Vec<ParsedMolecule>, ModelError> {
        let mut molecules = vec![self.molecule()?];
        while self.eat('.') {
            molecules.push(self.molecule()?);
        }
        if self.pos != self.chars.len() {
            return Err(self.error(format!("unexpected '{}'", self.chars[self.pos])));
        }
        Ok(molecules)
    }

    fn molecule(&mut self) -> Result<ParsedMolecule, ModelError> {
        let name = self.name()?;
        let mut components = Vec::new();
        if self.eat('(') {
            if !self.eat(')') {
                loop {
                    components.push(self.component()?);
                    if self.eat(')') {
                        break;
                    }
                    self.expect(',')?;
                }
            }
        }
        Ok(ParsedMolecule { name, components })
    }

    fn component(&mut self) -> Result<ParsedComponent, ModelError> {
        let name = self.name()?;
        let mut state = None;
        let mut bonds = Vec::new();
        loop {
            if self.eat('~') {
                if state.is_some() {
                    return Err(self.error(format!("component '{}' has two states", name)));
                }
                state = Some(if self.eat('?') { "?".to_string() } else { self.name()? });
            } else if self.eat('!') {
                let token = if self.eat('+') {
                    BondToken::Bound
                } else if self.eat('?') {
                    BondToken::Wildcard
                } else {
                    let label = self.name()?;
                    let label = label
                        .parse::<u32>()
                        .map_err(|_| self.error(format!("bond label '{}' is not a number", label)))?;
                    BondToken::Label(label)
                };
                bonds.push(token);
            } else {
                break;
            }
        }
        Ok(ParsedComponent { name, state, bonds })
    }
}

/// Parse a concrete species. Every bond must be labeled and paired.
pub fn parse_species(types: &MoleculeTypes, text: &str) -> Result<SpeciesGraph, ModelError> {
    let context = format!("species '{}'", text);
    let parsed = Parser::new(text).complex()?;
    let mut graph = SpeciesGraph::new();
    let mut labels: BTreeMap<u32, Vec<Site>> = BTreeMap::new();

    for molecule in &parsed {
        let type_id = types.resolve(&molecule.name, &context)?;
        let mtype = types.get(type_id);
        let m = graph.add_molecule(types, type_id);
        let mut used = vec![false; mtype.components.len()];

        for component in &molecule.components {
            let slot = mtype
                .slots_named(&component.name)
                .find(|&slot| !used[slot])
                .ok_or_else(|| ModelError::UnknownComponent {
                    context: context.clone(),
                    molecule: mtype.name.clone(),
                    component: component.name.clone(),
                })?;
            used[slot] = true;
            let ctype = &mtype.components[slot];

            if let Some(state) = &component.state {
                let index = ctype.states.iter().position(|s| s == state).ok_or_else(|| {
                    ModelError::InvalidState {
                        context: context.clone(),
                        molecule: mtype.name.clone(),
                        component: ctype.name.clone(),
                        state: state.clone(),
                    }
                })?;
                graph.set_state(Site::new(m, slot), Some(index));
            }
            for bond in &component.bonds {
                match bond {
                    BondToken::Label(label) => labels.entry(*label).or_default().push(Site::new(m, slot)),
                    _ => {
                        return Err(ModelError::Syntax {
                            text: text.to_string(),
                            message: "species bonds must be numbered".to_string(),
                        })
                    }
                }
            }
        }
    }

    for (label, ends) in labels {
        match ends.as_slice() {
            [a, b] => graph.add_bond(*a, *b),
            [_] => return Err(ModelError::DanglingBond { context, label }),
            _ => return Err(ModelError::OverusedBond { context, label }),
        }
    }
    graph.validate(types, &context)?;
    Ok(graph)
}

/// Parse a pattern.
pub fn parse_pattern(types: &MoleculeTypes, text: &str) -> Result<Pattern, ModelError> {
    let context = format!("pattern '{}'", text);
    let parsed = Parser::new(text).complex()?;
    let mut molecules = Vec::with_capacity(parsed.len());

    for molecule in parsed {
        let type_id = types.resolve(&molecule.name, &context)?;
        let mtype = types.get(type_id);
        let mut components = Vec::with_capacity(molecule.components.len());
        for component in molecule.components {
            let slot = mtype
                .slots_named(&component.name)
                .next()
                .ok_or_else(|| ModelError::UnknownComponent {
                    context: context.clone(),
                    molecule: mtype.name.clone(),
                    component: component.name.clone(),
                })?;
            let ctype = &mtype.components[slot];
            let state = match component.state.as_deref() {
                None | Some("?") => StateConstraint::Wildcard,
                Some(state) => StateConstraint::Exact(
                    ctype.states.iter().position(|s| s == state).ok_or_else(|| {
                        ModelError::InvalidState {
                            context: context.clone(),
                            molecule: mtype.name.clone(),
                            component: ctype.name.clone(),
                            state: state.to_string(),
                        }
                    })?,
                ),
            };
            let bond = match component.bonds.as_slice() {
                [] => BondConstraint::Unbound,
                [BondToken::Label(label)] => BondConstraint::Label(*label),
                [BondToken::Bound] => BondConstraint::Bound,
                [BondToken::Wildcard] => BondConstraint::Wildcard,
                _ => {
                    return Err(ModelError::Syntax {
                        text: text.to_string(),
                        message: format!("component '{}' has more than one bond", component.name),
                    })
                }
            };
            components.push(PatternComponent::new(&component.name, state, bond));
        }
        molecules.push(PatternMolecule::new(type_id, components));
    }
    Pattern::new(types, molecules, &context)
}
