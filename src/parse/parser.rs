use crate::{Condition, Outcome};

/// One `rule ... end` block as written, before the forest is assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecl {
    pub name: String,
    /// Name given after `extends`, if any.
    pub parent: Option<String>,
    pub salience: i64,
    pub conditions: Vec<Condition>,
    pub outcome: Outcome,
}

/// The result of parsing a rule file: declarations in source order.
#[derive(Debug, Default)]
pub struct ParsedRules {
    pub rules: Vec<RuleDecl>,
}
