//! Load patterns, load combinations and the combination container.
//!
//! A load pattern is a named set of nodal loads. A load combination is a
//! named linear expression over patterns (`"1.35*G1+1.5*Q1"`), parsed once at
//! definition time so malformed expressions fail before any solve is
//! attempted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// One nodal load: `value` applied at local DOF `dof` of node `node`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalLoad {
    pub node: usize,
    pub dof: usize,
    pub value: f64,
}

/// A named set of nodal loads applied together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPattern {
    pub name: String,
    pub loads: Vec<NodalLoad>,
}

impl LoadPattern {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loads: Vec::new(),
        }
    }

    /// Builder-style variant of [`add_nodal_load`](Self::add_nodal_load).
    pub fn with_load(mut self, node: usize, dof: usize, value: f64) -> Self {
        self.add_nodal_load(node, dof, value);
        self
    }

    pub fn add_nodal_load(&mut self, node: usize, dof: usize, value: f64) {
        self.loads.push(NodalLoad { node, dof, value });
    }
}

/// One term of a combination expression: `factor * pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboTerm {
    pub factor: f64,
    pub pattern: String,
}

/// A named linear combination of load patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCombination {
    pub name: String,
    pub terms: Vec<ComboTerm>,
}

impl LoadCombination {
    /// Parse an expression of the form `"1.35*G1+1.5*Q1"` or `"G1-Q1"`.
    ///
    /// Terms are separated by `+`/`-`; each term is either `factor*PATTERN`
    /// or a bare `PATTERN` (factor 1). Whitespace is ignored.
    pub fn parse(name: impl Into<String>, expr: &str) -> Result<Self> {
        let name = name.into();
        let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ModelError::InvalidExpression {
                expr: expr.to_string(),
                detail: "empty expression".to_string(),
            });
        }

        let mut terms = Vec::new();
        let mut rest = compact.as_str();
        let mut sign = 1.0;
        if let Some(stripped) = rest.strip_prefix('-') {
            sign = -1.0;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('+') {
            rest = stripped;
        }

        for piece in rest.split_inclusive(['+', '-']) {
            let (term_src, next_sign) = match piece.strip_suffix('+') {
                Some(t) => (t, 1.0),
                None => match piece.strip_suffix('-') {
                    Some(t) => (t, -1.0),
                    None => (piece, 1.0),
                },
            };

            let (factor, pattern) = match term_src.split_once('*') {
                Some((f, p)) => {
                    let factor: f64 = f.parse().map_err(|_| ModelError::InvalidExpression {
                        expr: expr.to_string(),
                        detail: format!("bad factor '{f}'"),
                    })?;
                    (factor, p)
                }
                None => (1.0, term_src),
            };

            if pattern.is_empty() {
                return Err(ModelError::InvalidExpression {
                    expr: expr.to_string(),
                    detail: "missing pattern name".to_string(),
                });
            }

            terms.push(ComboTerm {
                factor: sign * factor,
                pattern: pattern.to_string(),
            });
            sign = next_sign;
        }

        Ok(Self { name, terms })
    }
}

/// Container for defined load patterns and combinations.
///
/// Combinations are validated against the defined patterns at definition
/// time; lookups by name are exact.
#[derive(Debug, Default)]
pub struct LoadCaseRegistry {
    patterns: BTreeMap<String, LoadPattern>,
    combinations: BTreeMap<String, LoadCombination>,
}

impl LoadCaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or replace) a load pattern.
    pub fn define_pattern(&mut self, pattern: LoadPattern) {
        self.patterns.insert(pattern.name.clone(), pattern);
    }

    pub fn get_pattern(&self, name: &str) -> Option<&LoadPattern> {
        self.patterns.get(name)
    }

    /// Define a combination from an expression over already-defined patterns.
    pub fn define_combination(&mut self, name: &str, expr: &str) -> Result<()> {
        if self.combinations.contains_key(name) {
            return Err(ModelError::DuplicateCombination(name.to_string()));
        }
        let combo = LoadCombination::parse(name, expr)?;
        for term in &combo.terms {
            if !self.patterns.contains_key(&term.pattern) {
                return Err(ModelError::UnknownPattern(term.pattern.clone()));
            }
        }
        self.combinations.insert(name.to_string(), combo);
        Ok(())
    }

    pub fn get_combination(&self, name: &str) -> Option<&LoadCombination> {
        self.combinations.get(name)
    }

    pub fn remove_combination(&mut self, name: &str) -> Result<()> {
        self.combinations
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ModelError::UnknownCombination(name.to_string()))
    }

    /// Names of all defined combinations, in lexical order.
    pub fn combination_names(&self) -> Vec<String> {
        self.combinations.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_factored_expression() {
        let combo = LoadCombination::parse("ULS", "1.35*G1+1.5*Q1").unwrap();
        assert_eq!(combo.terms.len(), 2);
        assert_eq!(combo.terms[0].factor, 1.35);
        assert_eq!(combo.terms[0].pattern, "G1");
        assert_eq!(combo.terms[1].factor, 1.5);
        assert_eq!(combo.terms[1].pattern, "Q1");
    }

    #[test]
    fn parses_bare_and_negative_terms() {
        let combo = LoadCombination::parse("C", "G1-0.3*Q1").unwrap();
        assert_eq!(combo.terms[0].factor, 1.0);
        assert_eq!(combo.terms[1].factor, -0.3);
    }

    #[test]
    fn rejects_malformed_factor() {
        let err = LoadCombination::parse("C", "x.y*G1").unwrap_err();
        assert!(matches!(err, ModelError::InvalidExpression { .. }));
    }

    #[test]
    fn combination_requires_known_patterns() {
        let mut cases = LoadCaseRegistry::new();
        cases.define_pattern(LoadPattern::new("G1").with_load(0, 0, 10.0));
        assert!(cases.define_combination("C1", "G1+Q9").is_err());
        assert!(cases.define_combination("C1", "1.35*G1").is_ok());
        assert!(cases.get_combination("C1").is_some());
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let mut cases = LoadCaseRegistry::new();
        cases.define_pattern(LoadPattern::new("G1"));
        cases.define_combination("C1", "G1").unwrap();
        let err = cases.define_combination("C1", "2*G1").unwrap_err();
        assert!(matches!(err, ModelError::DuplicateCombination(_)));
    }

    #[test]
    fn remove_unknown_combination_fails() {
        let mut cases = LoadCaseRegistry::new();
        assert!(cases.remove_combination("missing").is_err());
    }
}
