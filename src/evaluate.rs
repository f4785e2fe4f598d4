use std::time::Instant;

use crate::types::{EvaluationReport, Stamp};
use crate::{EvalError, Facts, Outcome, PredicateRegistry, RuleNode};

/// Depth-first walk below `node`: every matching child contributes its own
/// matching descendants and then itself. Non-matching children are pruned.
pub(crate) fn collect_descendants<'a>(
    node: &'a RuleNode,
    facts: &Facts,
    predicates: &PredicateRegistry,
    out: &mut Vec<&'a RuleNode>,
) -> Result<(), EvalError> {
    for child in node.children() {
        if let Some(hit) = child.evaluate(facts, predicates)? {
            collect_descendants(hit, facts, predicates, out)?;
            out.push(hit);
        }
    }
    Ok(())
}

/// All matching nodes of the forest: per matching root, its matching
/// descendants followed by the root, roots in declaration order.
pub(crate) fn candidates<'a>(
    roots: &'a [RuleNode],
    facts: &Facts,
    predicates: &PredicateRegistry,
) -> Result<Vec<&'a RuleNode>, EvalError> {
    let mut out = Vec::new();
    for root in roots {
        if let Some(hit) = root.evaluate(facts, predicates)? {
            collect_descendants(hit, facts, predicates, &mut out)?;
            out.push(hit);
        }
    }
    Ok(out)
}

fn precedence(node: &RuleNode) -> (i64, Stamp) {
    (node.salience, node.attached())
}

/// Highest salience wins; equal salience goes to the most recent attachment.
/// Only exact key ties (a cloned node) fall back to collection order.
pub(crate) fn select_winner<'a>(candidates: &[&'a RuleNode]) -> Option<&'a RuleNode> {
    let mut best: Option<&'a RuleNode> = None;
    for &candidate in candidates {
        match best {
            Some(current) if precedence(candidate) <= precedence(current) => {}
            _ => best = Some(candidate),
        }
    }
    best
}

pub(crate) fn evaluate(
    roots: &[RuleNode],
    facts: &Facts,
    predicates: &PredicateRegistry,
) -> Result<Option<Outcome>, EvalError> {
    let found = candidates(roots, facts, predicates)?;
    match select_winner(&found) {
        Some(winner) => {
            tracing::debug!(
                rule = %winner.name,
                salience = winner.salience,
                candidates = found.len(),
                "rule selected"
            );
            Ok(Some(winner.outcome.clone()))
        }
        None => {
            tracing::debug!("no rules were satisfied");
            Ok(None)
        }
    }
}

pub(crate) fn evaluate_detailed(
    roots: &[RuleNode],
    facts: &Facts,
    predicates: &PredicateRegistry,
) -> Result<EvaluationReport, EvalError> {
    let start = Instant::now();
    let found = candidates(roots, facts, predicates)?;
    let winner = select_winner(&found);
    let duration = start.elapsed();

    Ok(EvaluationReport::new(
        winner.map(|w| w.outcome.clone()),
        winner.map(|w| w.name.clone()),
        found.iter().map(|r| r.name.clone()).collect(),
        duration,
    ))
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::{var, Condition};

    fn registry() -> PredicateRegistry {
        PredicateRegistry::new()
    }

    fn weather_forest() -> Vec<RuleNode> {
        let r1 = RuleNode::new("Rule 1")
            .when(var("content").find("hot"))
            .when(var("content").find("low humidity"))
            .with_page(1)
            .with_salience(1)
            .with_child(
                RuleNode::new("Rule 1.1")
                    .when(var("content").find("high pressure"))
                    .with_page(10)
                    .with_salience(2)
                    .with_child(
                        RuleNode::new("Rule 1.1.1")
                            .when(var("content").find("extreme"))
                            .with_page(100)
                            .with_salience(3),
                    ),
            )
            .with_child(
                RuleNode::new("Rule 1.2")
                    .when(var("content").find("windy"))
                    .with_page(20)
                    .with_salience(3),
            )
            .with_child(
                RuleNode::new("Rule 1.3")
                    .when(var("content").find("humid"))
                    .with_page(30)
                    .with_salience(1),
            );
        let r2 = RuleNode::new("Rule 2")
            .when(var("content").find("cold"))
            .with_page(2)
            .with_salience(2);
        vec![r1, r2]
    }

    const WEATHER: &str = "It is a hot and cold, windy, and humid day with high pressure \
                           and low humidity, and extreme conditions";

    #[test]
    fn candidate_order_is_children_before_parent_per_root() {
        let roots = weather_forest();
        let facts = Facts::new().set("content", WEATHER);
        let names: Vec<&str> = candidates(&roots, &facts, &registry())
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Rule 1.1.1", "Rule 1.1", "Rule 1.2", "Rule 1.3", "Rule 1", "Rule 2"]
        );
    }

    #[test]
    fn highest_salience_then_latest_attachment_wins() {
        let roots = weather_forest();
        let facts = Facts::new().set("content", WEATHER);
        // 1.1.1 and 1.2 share salience 3; 1.2 was attached after 1.1.1's
        // parent chain was built, so the later stamp decides.
        let found = candidates(&roots, &facts, &registry()).unwrap();
        let winner = select_winner(&found).unwrap();
        let (a, b) = (
            found.iter().find(|r| r.name == "Rule 1.1.1").unwrap(),
            found.iter().find(|r| r.name == "Rule 1.2").unwrap(),
        );
        let expected = if a.attached() > b.attached() { a } else { b };
        assert_eq!(winner.name, expected.name);
    }

    #[test]
    fn equal_instant_falls_back_to_sequence() {
        let at = OffsetDateTime::UNIX_EPOCH;
        let mut older = RuleNode::new("older").with_page(1);
        let mut newer = RuleNode::new("newer").with_page(2);
        older.set_stamp(Stamp::at(at));
        newer.set_stamp(Stamp::at(at));
        let roots = vec![newer, older];
        let found = candidates(&roots, &Facts::new(), &registry()).unwrap();
        assert_eq!(select_winner(&found).unwrap().name, "newer");
    }

    #[test]
    fn identical_keys_keep_first_candidate() {
        let a = RuleNode::new("a").with_page(1);
        let mut b = a.clone();
        b.name = "b".into();
        let roots = vec![a, b];
        let found = candidates(&roots, &Facts::new(), &registry()).unwrap();
        assert_eq!(select_winner(&found).unwrap().name, "a");
    }

    #[test]
    fn no_candidates_is_none() {
        let roots = weather_forest();
        let facts = Facts::new().set("content", "a mild day");
        assert_eq!(evaluate(&roots, &facts, &registry()), Ok(None));
    }

    #[test]
    fn unknown_predicate_in_matching_branch_propagates() {
        let roots = vec![RuleNode::new("root")
            .with_child(RuleNode::new("bad").when(Condition::new("nope", var("q"), "x")))];
        let err = evaluate(&roots, &Facts::new(), &registry()).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnknownPredicate {
                name: "nope".into()
            }
        );
    }

    #[test]
    fn detailed_lists_candidates_and_winner() {
        let roots = weather_forest();
        let facts = Facts::new().set("content", "cold");
        let report = evaluate_detailed(&roots, &facts, &registry()).unwrap();
        assert_eq!(report.winner(), Some("Rule 2"));
        assert_eq!(report.candidates(), &["Rule 2"]);
        assert_eq!(report.outcome(), Some(&Outcome::page(2)));
    }
}
