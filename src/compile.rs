use std::collections::{HashMap, HashSet};

use crate::parse::RuleDecl;
use crate::{CompileError, RuleNode};

/// Assemble parsed declarations into a forest of root nodes.
///
/// Rules without `extends` become roots, in declaration order. Every other
/// rule is attached under the rule it extends; siblings keep declaration
/// order. Names must be unique so `extends` is unambiguous.
///
/// # Errors
///
/// Returns [`CompileError`] on duplicate names, an `extends` naming an
/// undeclared rule, or an inheritance cycle.
pub fn forest(decls: Vec<RuleDecl>) -> Result<Vec<RuleNode>, CompileError> {
    check_duplicates(&decls)?;
    check_parents(&decls)?;
    check_cycles(&decls)?;

    let index: HashMap<&str, usize> = decls
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); decls.len()];
    let mut roots = Vec::new();
    for (i, decl) in decls.iter().enumerate() {
        match decl.parent.as_deref() {
            Some(parent) => children[index[parent]].push(i),
            None => roots.push(i),
        }
    }

    let mut slots: Vec<Option<RuleDecl>> = decls.into_iter().map(Some).collect();
    Ok(roots
        .into_iter()
        .filter_map(|i| build(i, &mut slots, &children))
        .collect())
}

fn build(i: usize, slots: &mut [Option<RuleDecl>], children: &[Vec<usize>]) -> Option<RuleNode> {
    let decl = slots[i].take()?;
    let mut node = RuleNode::new(&decl.name)
        .with_outcome(decl.outcome)
        .with_salience(decl.salience);
    node.conditions = decl.conditions;
    for &child in &children[i] {
        if let Some(child) = build(child, slots, children) {
            node.add_child(child);
        }
    }
    Some(node)
}

fn check_duplicates(decls: &[RuleDecl]) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for decl in decls {
        if !seen.insert(decl.name.as_str()) {
            return Err(CompileError::DuplicateRule {
                name: decl.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_parents(decls: &[RuleDecl]) -> Result<(), CompileError> {
    let names: HashSet<&str> = decls.iter().map(|d| d.name.as_str()).collect();
    for decl in decls {
        if let Some(parent) = &decl.parent {
            if !names.contains(parent.as_str()) {
                return Err(CompileError::UndefinedParent {
                    rule: decl.name.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Unvisited,
    OnPath,
    Done,
}

/// Each rule has at most one parent, so following `extends` links from any
/// rule either reaches a root or loops.
fn check_cycles(decls: &[RuleDecl]) -> Result<(), CompileError> {
    let parent_of: HashMap<&str, &str> = decls
        .iter()
        .filter_map(|d| d.parent.as_deref().map(|p| (d.name.as_str(), p)))
        .collect();
    let mut state: HashMap<&str, WalkState> = decls
        .iter()
        .map(|d| (d.name.as_str(), WalkState::Unvisited))
        .collect();

    for decl in decls {
        let mut path: Vec<&str> = Vec::new();
        let mut current = Some(decl.name.as_str());
        while let Some(name) = current {
            match state.get(name).copied() {
                Some(WalkState::Done) => break,
                Some(WalkState::OnPath) => {
                    let start = path.iter().position(|&n| n == name).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&n| n.to_owned()).collect();
                    cycle.push(name.to_owned());
                    return Err(CompileError::CyclicInheritance { path: cycle });
                }
                Some(WalkState::Unvisited) | None => {
                    state.insert(name, WalkState::OnPath);
                    path.push(name);
                    current = parent_of.get(name).copied();
                }
            }
        }
        for name in path {
            state.insert(name, WalkState::Done);
        }
    }
    Ok(())
}
