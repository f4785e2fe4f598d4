use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex_lite::RegexBuilder;

use super::condition::{CompareOp, Condition, Operand};
use super::error::EvalError;
use super::{Facts, Value};

type CustomFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Predicates every registry starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `find(haystack, needle)`: case-insensitive `\b<needle>\b` match.
    Find,
    /// `in(needle, haystack)`: plain substring containment.
    In,
    Compare(CompareOp),
}

impl Builtin {
    pub const ALL: [Builtin; 8] = [
        Builtin::Find,
        Builtin::In,
        Builtin::Compare(CompareOp::Eq),
        Builtin::Compare(CompareOp::Neq),
        Builtin::Compare(CompareOp::Gt),
        Builtin::Compare(CompareOp::Gte),
        Builtin::Compare(CompareOp::Lt),
        Builtin::Compare(CompareOp::Lte),
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Find => "find",
            Builtin::In => "in",
            Builtin::Compare(op) => op.symbol(),
        }
    }

    fn test(self, left: &Value, right: &Value) -> bool {
        match self {
            Builtin::Find => find_word(&left.as_text(), &right.as_text()),
            Builtin::In => right.as_text().contains(&left.as_text()),
            Builtin::Compare(op) => left.compare(op, right).unwrap_or(false),
        }
    }
}

/// Whole-word, case-insensitive search. The needle is matched literally.
///
/// `regex_lite` only folds ASCII case, so both sides are lowercased first.
fn find_word(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex_lite::escape(&needle.to_lowercase()));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .is_ok_and(|re| re.is_match(&haystack.to_lowercase()))
}

#[derive(Clone)]
enum PredicateKind {
    Builtin(Builtin),
    Custom(Arc<CustomFn>),
}

impl fmt::Debug for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateKind::Builtin(b) => write!(f, "Builtin({})", b.name()),
            PredicateKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Proof that a predicate name is registered. Conditions built through a
/// handle cannot fail with [`EvalError::UnknownPredicate`] against the
/// registry that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateHandle {
    name: String,
}

impl PredicateHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn condition(&self, left: impl Into<Operand>, right: impl Into<Operand>) -> Condition {
        Condition::new(&self.name, left, right)
    }
}

/// Name → predicate lookup used while evaluating conditions.
#[derive(Debug, Clone)]
pub struct PredicateRegistry {
    predicates: HashMap<String, PredicateKind>,
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateRegistry {
    /// A registry holding the builtin predicates.
    #[must_use]
    pub fn new() -> Self {
        let predicates = Builtin::ALL
            .iter()
            .map(|b| (b.name().to_owned(), PredicateKind::Builtin(*b)))
            .collect();
        Self { predicates }
    }

    /// Register (or replace) a custom predicate.
    pub fn register(
        &mut self,
        name: &str,
        f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> PredicateHandle {
        self.predicates
            .insert(name.to_owned(), PredicateKind::Custom(Arc::new(f)));
        PredicateHandle {
            name: name.to_owned(),
        }
    }

    /// Handle for an already registered name.
    #[must_use]
    pub fn handle(&self, name: &str) -> Option<PredicateHandle> {
        self.predicates.contains_key(name).then(|| PredicateHandle {
            name: name.to_owned(),
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered predicate names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Evaluate one condition.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownPredicate`] if the condition names a
    /// predicate this registry does not hold.
    pub fn test(&self, condition: &Condition, facts: &Facts) -> Result<bool, EvalError> {
        let kind = self
            .predicates
            .get(&condition.predicate)
            .ok_or_else(|| EvalError::UnknownPredicate {
                name: condition.predicate.clone(),
            })?;
        let (left, right) = &condition.operands;
        let (Some(left), Some(right)) = (left.resolve(facts), right.resolve(facts)) else {
            return Ok(false);
        };
        Ok(match kind {
            PredicateKind::Builtin(b) => b.test(left, right),
            PredicateKind::Custom(f) => f(left, right),
        })
    }

    /// Evaluate the conjunction of `conditions`. An empty slice holds.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownPredicate`] for the first unregistered
    /// predicate reached before a condition fails.
    pub fn evaluate_all(&self, conditions: &[Condition], facts: &Facts) -> Result<bool, EvalError> {
        for condition in conditions {
            if !self.test(condition, facts)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
