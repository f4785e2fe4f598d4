use std::fmt;
use std::sync::Arc;

use super::error::EvalError;
use super::evaluation_report::EvaluationReport;
use super::outcome::Outcome;
use super::predicate::PredicateRegistry;
use super::rule::RuleNode;
use super::Facts;

/// Picks at most one outcome from a forest of rule trees.
///
/// Built fresh for each evaluation pass from the current roots. Every
/// matching node of every matching root is a candidate; the candidate with
/// the highest salience wins, ties going to the most recently attached.
///
/// # Example
///
/// ```
/// use ruleguide::{Facts, Outcome, RuleNode, RulesEngine, var};
///
/// let mut engine = RulesEngine::new();
/// engine.add_root_rule(RuleNode::new("R1").when(var("query").find("invoice")).with_page(5));
/// engine.add_root_rule(
///     RuleNode::new("R2").when(var("query").find("invoice")).with_page(9).with_salience(10),
/// );
///
/// let outcome = engine.evaluate(&Facts::query("Where is my invoice?")).unwrap();
/// assert_eq!(outcome, Some(Outcome::page(9)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    root_rules: Vec<RuleNode>,
    predicates: Arc<PredicateRegistry>,
}

impl RulesEngine {
    /// An empty engine over the builtin predicates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty engine over a caller-provided registry.
    #[must_use]
    pub fn with_predicates(predicates: Arc<PredicateRegistry>) -> Self {
        Self {
            root_rules: Vec::new(),
            predicates,
        }
    }

    /// Attach every root in order.
    #[must_use]
    pub fn with_roots(mut self, roots: impl IntoIterator<Item = RuleNode>) -> Self {
        for root in roots {
            self.add_root_rule(root);
        }
        self
    }

    /// Attach `rule` as the last root, stamping it with the attachment time.
    pub fn add_root_rule(&mut self, mut rule: RuleNode) {
        rule.restamp();
        self.root_rules.push(rule);
    }

    #[must_use]
    pub fn root_rules(&self) -> &[RuleNode] {
        &self.root_rules
    }

    #[must_use]
    pub fn predicates(&self) -> &PredicateRegistry {
        &self.predicates
    }

    /// Evaluate the forest against `facts`.
    ///
    /// Returns the winning node's outcome, or `None` when no root matches.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownPredicate`] as soon as a visited condition
    /// names an unregistered predicate.
    pub fn evaluate(&self, facts: &Facts) -> Result<Option<Outcome>, EvalError> {
        crate::evaluate::evaluate(&self.root_rules, facts, &self.predicates)
    }

    /// Evaluate with diagnostics: candidates, winner and timing.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub fn evaluate_detailed(&self, facts: &Facts) -> Result<EvaluationReport, EvalError> {
        crate::evaluate::evaluate_detailed(&self.root_rules, facts, &self.predicates)
    }

    /// Parse and compile rule-language source into an engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error`](crate::Error) on parse or compile failure.
    pub fn from_dsl(input: &str) -> Result<Self, crate::Error> {
        let parsed = crate::parse::parse(input)?;
        let roots = crate::compile::forest(parsed.rules)?;
        Ok(Self::new().with_roots(roots))
    }

    /// Read a rule file and compile it into an engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error`](crate::Error) on I/O, parse, or compile failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::Error> {
        let input = std::fs::read_to_string(path)?;
        Self::from_dsl(&input)
    }
}

impl fmt::Display for RulesEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: usize = self
            .root_rules
            .iter()
            .map(|r| 1 + r.descendant_count())
            .sum();
        write!(
            f,
            "RulesEngine({} roots, {} nodes, {} predicates)",
            self.root_rules.len(),
            nodes,
            self.predicates.names().len(),
        )
    }
}
