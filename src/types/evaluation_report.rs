use std::fmt;
use std::time::Duration;

use super::outcome::Outcome;

/// Detailed evaluation report returned by
/// [`RulesEngine::evaluate_detailed()`](super::engine::RulesEngine::evaluate_detailed).
///
/// Lists every matching node in collection order, the winner, and the
/// wall-clock duration of the pass.
#[derive(Debug, Clone)]
#[must_use]
pub struct EvaluationReport {
    outcome: Option<Outcome>,
    winner: Option<String>,
    candidates: Vec<String>,
    duration: Duration,
}

impl EvaluationReport {
    pub(crate) fn new(
        outcome: Option<Outcome>,
        winner: Option<String>,
        candidates: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            outcome,
            winner,
            candidates,
            duration,
        }
    }

    /// Same value [`RulesEngine::evaluate()`](super::engine::RulesEngine::evaluate) returns.
    #[must_use]
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    #[must_use]
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Names of matching nodes, children before parents, roots in order.
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.winner, &self.outcome) {
            (Some(name), Some(outcome)) => write!(f, "winner: {name} ({outcome})")?,
            _ => write!(f, "winner: none")?,
        }
        write!(f, ", candidates: [{}]", self.candidates.join(", "))?;
        write!(f, ", duration: {:?}", self.duration)?;
        Ok(())
    }
}
