mod condition;
mod engine;
mod error;
mod evaluation_report;
mod facts;
mod outcome;
mod predicate;
mod rule;
mod value;

pub use condition::{var, CompareOp, Condition, Operand, VarRef};
pub use engine::RulesEngine;
pub use error::{CompileError, EvalError};
pub use evaluation_report::EvaluationReport;
pub use facts::Facts;
pub use outcome::Outcome;
pub use predicate::{Builtin, PredicateHandle, PredicateRegistry};
pub use rule::{RuleNode, Stamp};
pub use value::Value;
