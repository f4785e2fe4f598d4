//! Turning a query into a retrieval directive.
//!
//! This is the "check rules" step in front of semantic search: the stored
//! forest is evaluated against the query text and the winning outcome, if
//! usable, overrides the default retrieval.

use std::fmt;
use std::sync::Arc;

use crate::store::{RuleStore, StoreError};
use crate::{Facts, Outcome, PredicateRegistry, RuleNode, RulesEngine};

/// What the retrieval pipeline should do with a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// No rule applies; run ordinary semantic search.
    Default,
    /// Restrict retrieval to `page` and/or prepend `prompt` to the instructions.
    Guided {
        page: Option<u32>,
        prompt: Option<String>,
    },
}

impl Retrieval {
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Page 0 and blank prompts mean "not set".
    fn from_outcome(outcome: Outcome) -> Self {
        let page = outcome.page.filter(|&p| p > 0);
        let prompt = outcome.prompt.filter(|p| !p.trim().is_empty());
        if page.is_none() && prompt.is_none() {
            Self::Default
        } else {
            Self::Guided { page, prompt }
        }
    }
}

impl fmt::Display for Retrieval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default retrieval"),
            Self::Guided { page, prompt } => {
                f.write_str("guided")?;
                if let Some(page) = page {
                    write!(f, " page {page}")?;
                }
                if let Some(prompt) = prompt {
                    write!(f, " prompt {prompt:?}")?;
                }
                Ok(())
            }
        }
    }
}

/// Evaluate `roots` against `query` and decide how to retrieve.
///
/// Roots without conditions are skipped; they would match every query.
/// An unknown predicate is a configuration error of the stored rules, not of
/// the query, so it is logged and the query falls back to default retrieval.
#[must_use]
pub fn route(roots: Vec<RuleNode>, query: &str, predicates: Arc<PredicateRegistry>) -> Retrieval {
    let total = roots.len();
    let engine = RulesEngine::with_predicates(predicates)
        .with_roots(roots.into_iter().filter(|r| !r.conditions.is_empty()));
    if engine.root_rules().len() < total {
        tracing::debug!(
            skipped = total - engine.root_rules().len(),
            "skipping root rules without conditions"
        );
    }

    match engine.evaluate(&Facts::query(query)) {
        Ok(Some(outcome)) => Retrieval::from_outcome(outcome),
        Ok(None) => Retrieval::Default,
        Err(err) => {
            tracing::warn!(error = %err, "rule evaluation failed; using default retrieval");
            Retrieval::Default
        }
    }
}

/// [`route`] over the forest currently held by `store`, with builtin predicates.
///
/// # Errors
///
/// Returns [`StoreError`] if the rules cannot be loaded.
pub fn route_stored(store: &RuleStore, query: &str) -> Result<Retrieval, StoreError> {
    let roots = store.load_roots()?;
    Ok(route(roots, query, Arc::new(PredicateRegistry::new())))
}
