//! Model parameters and arithmetic expressions over them.
//!
//! Definitions may reference each other in any order; they are resolved by
//! repeated passes and a cycle is reported as [`ModelError::CircularParameters`].

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use meval::{Context, ContextProvider, Expr};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Right-hand side of a parameter definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Value(f64),
    Expression(String),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Value(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(expression: &str) -> Self {
        ParameterValue::Expression(expression.to_string())
    }
}

/// Resolved numeric parameters, in definition order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    names: Vec<String>,
    values: Vec<f64>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

struct Scope<'a>(&'a Parameters);

impl<'a> ContextProvider for Scope<'a> {
    fn get_var(&self, name: &str) -> Option<f64> {
        self.0.get(name)
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve definitions into numbers.
    pub fn resolve(definitions: &[(String, ParameterValue)]) -> Result<Self, ModelError> {
        Self::resolve_with(definitions, &[])
    }

    /// Resolve definitions with some parameters pinned to new values.
    ///
    /// An override replaces the definition, so expressions depending on it
    /// pick up the new value.
    pub fn resolve_with(
        definitions: &[(String, ParameterValue)],
        overrides: &[(String, f64)],
    ) -> Result<Self, ModelError> {
        let mut seen = HashSet::new();
        for (name, _) in definitions {
            if !seen.insert(name.as_str()) {
                return Err(ModelError::Duplicate {
                    context: "parameters".to_string(),
                    name: name.clone(),
                });
            }
        }
        for (name, _) in overrides {
            if !seen.contains(name.as_str()) {
                return Err(ModelError::UndefinedParameter {
                    context: "parameter overrides".to_string(),
                    name: name.clone(),
                });
            }
        }

        let mut resolved: HashMap<String, f64> = overrides.iter().cloned().collect();
        let mut pending: Vec<&(String, ParameterValue)> = definitions
            .iter()
            .filter(|(name, _)| !resolved.contains_key(name))
            .collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for definition in pending {
                let (name, value) = definition;
                let context = format!("parameter '{}'", name);
                let result = match value {
                    ParameterValue::Value(v) => Ok(*v),
                    ParameterValue::Expression(text) => {
                        let partial = Self::from_map(definitions, &resolved);
                        match partial.try_evaluate(text, &context)? {
                            Evaluation::Value(v) => Ok(v),
                            Evaluation::Unknown(missing) => Err(missing),
                        }
                    }
                };
                match result {
                    Ok(v) => {
                        resolved.insert(name.clone(), v);
                    }
                    Err(missing) if seen.contains(missing.as_str()) => waiting.push(definition),
                    Err(missing) => {
                        return Err(ModelError::UndefinedParameter { context, name: missing });
                    }
                }
            }
            if waiting.len() == before {
                return Err(ModelError::CircularParameters {
                    names: waiting.iter().map(|(name, _)| name.clone()).collect(),
                });
            }
            pending = waiting;
        }

        Ok(Self::from_map(definitions, &resolved))
    }

    fn from_map(definitions: &[(String, ParameterValue)], resolved: &HashMap<String, f64>) -> Self {
        let mut parameters = Self::new();
        for (name, _) in definitions {
            if let Some(&value) = resolved.get(name) {
                parameters.set(name, value);
            }
        }
        parameters
    }

    /// Insert or overwrite a single value.
    pub fn set(&mut self, name: &str, value: f64) {
        match self.index_of(name) {
            Some(i) => self.values[i] = value,
            None => {
                self.by_name.insert(name.to_string(), self.names.len());
                self.names.push(name.to_string());
                self.values.push(value);
            }
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        if self.by_name.len() == self.names.len() {
            self.by_name.get(name).copied()
        } else {
            // deserialized without the index
            self.names.iter().position(|n| n == name)
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }

    /// Evaluate an arithmetic expression against these parameters.
    pub fn evaluate(&self, expression: &str, context: &str) -> Result<f64, ModelError> {
        match self.try_evaluate(expression, context)? {
            Evaluation::Value(v) => Ok(v),
            Evaluation::Unknown(name) => Err(ModelError::UndefinedParameter {
                context: context.to_string(),
                name,
            }),
        }
    }

    fn try_evaluate(&self, expression: &str, context: &str) -> Result<Evaluation, ModelError> {
        let parse_error = |message: String| ModelError::Expression {
            context: context.to_string(),
            expression: expression.to_string(),
            message,
        };
        let expr = Expr::from_str(expression).map_err(|err| parse_error(err.to_string()))?;
        match expr.eval_with_context((Scope(self), Context::new())) {
            Ok(v) if v.is_finite() => Ok(Evaluation::Value(v)),
            Ok(v) => Err(parse_error(format!("evaluates to {}", v))),
            Err(meval::Error::UnknownVariable(name)) => Ok(Evaluation::Unknown(name)),
            Err(err) => Err(parse_error(err.to_string())),
        }
    }
}

enum Evaluation {
    Value(f64),
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(items: &[(&str, ParameterValue)]) -> Vec<(String, ParameterValue)> {
        items.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_forward_references_resolve() {
        let p = Parameters::resolve(&defs(&[
            ("kd", "koff / kon".into()),
            ("kon", 2.0.into()),
            ("koff", 0.5.into()),
        ]))
        .unwrap();
        assert_eq!(p.get("kd"), Some(0.25));
        assert_eq!(p.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["kd", "kon", "koff"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let err = Parameters::resolve(&defs(&[("a", "b + 1".into()), ("b", "2 * a".into())])).unwrap_err();
        assert!(matches!(err, ModelError::CircularParameters { names } if names.len() == 2));
    }

    #[test]
    fn test_undefined_reference() {
        let err = Parameters::resolve(&defs(&[("a", "missing * 3".into())])).unwrap_err();
        assert_eq!(
            err,
            ModelError::UndefinedParameter {
                context: "parameter 'a'".to_string(),
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_override_propagates() {
        let d = defs(&[("k", 1.0.into()), ("k2", "2 * k".into())]);
        let p = Parameters::resolve_with(&d, &[("k".to_string(), 5.0)]).unwrap();
        assert_eq!(p.get("k2"), Some(10.0));
    }

    #[test]
    fn test_evaluate_expression() {
        let mut p = Parameters::new();
        p.set("k", 3.0);
        assert_eq!(p.evaluate("k^2 + 1", "rate").unwrap(), 10.0);
        assert!(matches!(
            p.evaluate("k +", "rate"),
            Err(ModelError::Expression { .. })
        ));
    }
}
