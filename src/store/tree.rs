use std::collections::HashMap;

use crate::{Condition, Outcome, RuleNode};

use super::StoreError;

/// A row of the `rules` table as read by the recursive queries.
#[derive(Debug, Clone)]
pub(crate) struct RuleRow {
    pub id: i64,
    pub name: String,
    pub conditions: String,
    pub prompt: String,
    pub page: i64,
    pub salience: i64,
    pub parent_id: Option<i64>,
}

/// A reconstructed node together with its row id and stored parent.
///
/// `rule` carries its complete subtree.
#[derive(Debug, Clone)]
pub struct StoredRule {
    pub id: i64,
    pub rule: RuleNode,
    pub parent: Option<i64>,
}

/// Rows decoded into childless nodes plus the parent → children links
/// that could be resolved within the row set.
pub(crate) struct Forest {
    order: Vec<(i64, Option<i64>)>,
    nodes: HashMap<i64, RuleNode>,
    children: HashMap<i64, Vec<i64>>,
}

impl Forest {
    /// Decode `rows` (sorted by id) and link children to parents present in
    /// the set. `seed` is the top of a subtree read; its parent is expected
    /// to be absent. Any other row whose parent is missing stays unlinked.
    pub(crate) fn assemble(rows: Vec<RuleRow>, seed: Option<i64>) -> Result<Self, StoreError> {
        let mut order = Vec::with_capacity(rows.len());
        let mut nodes = HashMap::with_capacity(rows.len());
        for row in rows {
            order.push((row.id, row.parent_id));
            nodes.insert(row.id, decode(row)?);
        }

        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        for &(id, parent) in &order {
            let Some(parent) = parent else { continue };
            if nodes.contains_key(&parent) {
                children.entry(parent).or_default().push(id);
            } else if seed != Some(id) {
                tracing::warn!(rule = id, parent, "parent row not found; leaving rule unlinked");
            }
        }

        Ok(Self {
            order,
            nodes,
            children,
        })
    }

    /// The node for `id` with its full subtree attached. Stamps come from
    /// decoding, so they follow row id order.
    fn tree(&self, id: i64) -> Option<RuleNode> {
        let mut node = self.nodes.get(&id)?.clone();
        for &child in self.children.get(&id).map_or(&[][..], Vec::as_slice) {
            if let Some(child) = self.tree(child) {
                node.push_child(child);
            }
        }
        Some(node)
    }

    /// One entry per row, in id order.
    pub(crate) fn entries(&self) -> Vec<StoredRule> {
        self.order
            .iter()
            .filter_map(|&(id, parent)| self.tree(id).map(|rule| StoredRule { id, rule, parent }))
            .collect()
    }

    /// Only rows without a stored parent, with subtrees.
    pub(crate) fn roots(&self) -> Vec<RuleNode> {
        self.order
            .iter()
            .filter(|(_, parent)| parent.is_none())
            .filter_map(|&(id, _)| self.tree(id))
            .collect()
    }
}

fn decode(row: RuleRow) -> Result<RuleNode, StoreError> {
    let conditions: Vec<Condition> = serde_json::from_str(&row.conditions)?;
    let page = u32::try_from(row.page).ok().filter(|&p| p > 0);
    let prompt = Some(row.prompt).filter(|p| !p.is_empty());
    let mut node = RuleNode::new(&row.name)
        .with_outcome(Outcome::new(page, prompt))
        .with_salience(row.salience);
    node.conditions = conditions;
    Ok(node)
}
