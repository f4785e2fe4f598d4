pub mod compile;
mod error;
mod evaluate;
pub mod guidance;
pub mod parse;
pub mod store;
mod types;

pub use error::Error;
pub use guidance::{route, Retrieval};
pub use parse::ParseError;
pub use store::{RuleStore, StoreError, StoreOptions, StoredRule};
pub use types::{
    var, Builtin, CompareOp, CompileError, Condition, EvalError, EvaluationReport, Facts, Operand,
    Outcome, PredicateHandle, PredicateRegistry, RuleNode, RulesEngine, Stamp, Value, VarRef,
};
