use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::condition::Condition;
use super::error::EvalError;
use super::outcome::Outcome;
use super::predicate::PredicateRegistry;
use super::Facts;

static NEXT_ATTACHMENT: AtomicU64 = AtomicU64::new(0);

/// When a node was last attached to a tree.
///
/// Ordered by wall-clock instant, then by a process-wide attachment
/// counter, so two attachments within the same clock tick still order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp {
    at: OffsetDateTime,
    seq: u64,
}

impl Stamp {
    #[must_use]
    pub fn now() -> Self {
        Self::at(OffsetDateTime::now_utc())
    }

    /// A stamp for a given instant, still taking the next sequence number.
    #[must_use]
    pub fn at(at: OffsetDateTime) -> Self {
        Self {
            at,
            seq: NEXT_ATTACHMENT.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn instant(&self) -> OffsetDateTime {
        self.at
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

/// One node of a decision tree.
///
/// A node matches when every condition holds (no conditions: always).
/// Children are owned exclusively and only join the tree through
/// [`add_child`](Self::add_child), which restamps them.
///
/// ```
/// use ruleguide::{Facts, PredicateRegistry, RuleNode, var};
///
/// let rule = RuleNode::new("Invoices")
///     .when(var("query").find("invoice"))
///     .with_page(5);
///
/// let registry = PredicateRegistry::new();
/// let hit = rule.evaluate(&Facts::query("Where is my invoice?"), &registry).unwrap();
/// assert!(hit.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RuleNode {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub outcome: Outcome,
    pub salience: i64,
    attached: Stamp,
    children: Vec<RuleNode>,
}

/// The canonical JSON form of a node: no children, stamp or row id.
#[derive(Debug, Serialize, Deserialize)]
struct RuleDocument {
    name: String,
    conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(default)]
    salience: i64,
}

impl RuleNode {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            conditions: Vec::new(),
            outcome: Outcome::default(),
            salience: 0,
            attached: Stamp::now(),
            children: Vec::new(),
        }
    }

    /// Append a condition to the conjunction.
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.outcome.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.outcome.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    #[must_use]
    pub fn with_salience(mut self, salience: i64) -> Self {
        self.salience = salience;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: RuleNode) -> Self {
        self.add_child(child);
        self
    }

    /// Attach `child` as the last child, stamping it with the attachment time.
    pub fn add_child(&mut self, mut child: RuleNode) {
        child.restamp();
        self.children.push(child);
    }

    /// Attach `child` keeping the stamp it already carries.
    pub(crate) fn push_child(&mut self, child: RuleNode) {
        self.children.push(child);
    }

    #[must_use]
    pub fn children(&self) -> &[RuleNode] {
        &self.children
    }

    #[must_use]
    pub fn attached(&self) -> Stamp {
        self.attached
    }

    pub(crate) fn restamp(&mut self) {
        self.attached = Stamp::now();
    }

    #[cfg(test)]
    pub(crate) fn set_stamp(&mut self, stamp: Stamp) {
        self.attached = stamp;
    }

    /// Number of nodes below this one.
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }

    /// Dot-joined display path of this node under `parent_path`.
    #[must_use]
    pub fn path(&self, parent_path: &str) -> String {
        if parent_path.is_empty() {
            self.name.clone()
        } else {
            format!("{parent_path}.{}", self.name)
        }
    }

    /// Test this node alone. Children are never consulted.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] if a condition names an unregistered predicate.
    pub fn evaluate(
        &self,
        facts: &Facts,
        predicates: &PredicateRegistry,
    ) -> Result<Option<&RuleNode>, EvalError> {
        let satisfied = predicates.evaluate_all(&self.conditions, facts)?;
        tracing::trace!(rule = %self.name, satisfied, "evaluated rule");
        Ok(satisfied.then_some(self))
    }

    /// Matching nodes below this one, each branch listed children-before-parent.
    /// Subtrees under a non-matching child are not visited. Does not test `self`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] if a visited condition names an unregistered predicate.
    pub fn evaluate_descendants(
        &self,
        facts: &Facts,
        predicates: &PredicateRegistry,
    ) -> Result<Vec<&RuleNode>, EvalError> {
        let mut out = Vec::new();
        crate::evaluate::collect_descendants(self, facts, predicates, &mut out)?;
        Ok(out)
    }

    /// Encode `{name, conditions, page, prompt, salience}` as JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if encoding fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&RuleDocument {
            name: self.name.clone(),
            conditions: self.conditions.clone(),
            page: self.outcome.page,
            prompt: self.outcome.prompt.clone(),
            salience: self.salience,
        })
    }

    /// Decode a node produced by [`to_json`](Self::to_json). The result has
    /// no children and a fresh stamp.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let doc: RuleDocument = serde_json::from_str(json)?;
        Ok(Self {
            conditions: doc.conditions,
            outcome: Outcome::new(doc.page, doc.prompt),
            salience: doc.salience,
            ..Self::new(&doc.name)
        })
    }
}
