use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::{Facts, Value};

/// Comparison operators available as builtin predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// The predicate name this operator is registered under.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    pub(crate) fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Neq,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Gte,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Lte,
            _ => return None,
        })
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One argument of a condition: either a reference into the facts or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// `{"var": "<path>"}`.
    Var { var: String },
    Literal(Value),
}

impl Operand {
    /// Resolve against the facts. A dangling `var` resolves to `None`.
    #[must_use]
    pub fn resolve<'a>(&'a self, facts: &'a Facts) -> Option<&'a Value> {
        match self {
            Operand::Var { var } => facts.get(var),
            Operand::Literal(value) => Some(value),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Literal(Value::Int(v))
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Literal(Value::Float(v))
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Literal(Value::Bool(v))
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Literal(Value::from(v))
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Literal(Value::String(v))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var { var } => f.write_str(var),
            Operand::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// A single test of a rule: a predicate name applied to two operands.
///
/// Encoded as `{"<predicate>": [<operand>, <operand>]}`, the shape the rule
/// table stores in its `conditions` column.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub predicate: String,
    pub operands: (Operand, Operand),
}

impl Condition {
    #[must_use]
    pub fn new(predicate: &str, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self {
            predicate: predicate.to_owned(),
            operands: (left.into(), right.into()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (left, right) = &self.operands;
        match CompareOp::from_symbol(&self.predicate) {
            Some(op) => write!(f, "{left} {op} {right}"),
            None => write!(f, "{}({left}, {right})", self.predicate),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.predicate, &self.operands)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, (Operand, Operand)>::deserialize(deserializer)?;
        if map.len() != 1 {
            return Err(de::Error::invalid_length(
                map.len(),
                &"a single predicate entry",
            ));
        }
        let Some((predicate, operands)) = map.into_iter().next() else {
            return Err(de::Error::custom("empty condition"));
        };
        Ok(Condition {
            predicate,
            operands,
        })
    }
}

/// Builder for conditions whose left operand is a fact reference.
/// Created by [`var()`].
#[derive(Debug, Clone)]
pub struct VarRef {
    path: String,
}

impl VarRef {
    /// Case-insensitive whole-word match of `needle` inside this fact.
    #[must_use]
    pub fn find(self, needle: impl Into<Operand>) -> Condition {
        Condition::new("find", self, needle)
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    #[must_use]
    pub fn neq(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Neq, value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn gte(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Gte, value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn lte(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Lte, value)
    }

    fn compare(self, op: CompareOp, value: impl Into<Operand>) -> Condition {
        Condition::new(op.symbol(), self, value)
    }
}

impl From<VarRef> for Operand {
    fn from(r: VarRef) -> Self {
        Operand::Var { var: r.path }
    }
}

/// Reference a fact by dot-separated path.
#[must_use]
pub fn var(path: &str) -> VarRef {
    VarRef {
        path: path.to_owned(),
    }
}
