use serde::{Deserialize, Serialize};

use crate::model::FieldId;

/// A predicate operator from the grammar in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn is_equality(self) -> bool {
        matches!(self, Operator::Eq)
    }

    pub fn is_range(self) -> bool {
        matches!(self, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }
}

/// A literal bound to a predicate, or the unbound placeholder `?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Placeholder,
    Integer(i64),
    Float(f64),
    Str(String),
    Date(String),
}

/// A `(field, operator, value?)` predicate. Per §3, equality of two
/// conditions is by `(field, operator)` alone — the literal is bound only
/// at execution time and plays no role in enumeration or planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: FieldId,
    pub op: Operator,
    pub value: Literal,
}

impl Condition {
    pub fn key(&self) -> (FieldId, Operator) {
        (self.field, self.op)
    }
}

/// A `field = value` assignment in an `UPDATE`/`INSERT` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub field: FieldId,
    pub value: Literal,
}
