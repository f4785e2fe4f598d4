use thiserror::Error;

/// Raised while evaluating conditions. The engine never catches these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unknown predicate '{name}'")]
    UnknownPredicate { name: String },
}

/// Semantic errors found while assembling a parsed rule file into a forest.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("duplicate rule name '{name}'")]
    DuplicateRule { name: String },

    #[error("rule '{rule}' extends undefined rule '{parent}'")]
    UndefinedParent { rule: String, parent: String },

    #[error("cyclic inheritance detected: {}", path.join(" -> "))]
    CyclicInheritance { path: Vec<String> },
}
