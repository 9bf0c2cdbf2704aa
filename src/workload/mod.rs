//! Workload (§3, §6): a frozen model plus a weighted list of statements and
//! a storage budget. Built incrementally with [`Workload::with_statement`];
//! invalid statements mark the workload invalid rather than aborting the
//! build, so `valid()` can report every problem at once (§7).

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::model::Model;
use crate::statement::Statement;

pub use loader::load;

/// One statement at a given weight for the currently selected `mix`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedStatement {
    pub statement: Statement,
    pub weight: f64,
}

/// `(Model, list of (Statement, weight>0), storage_budget>0, mix label)` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    model: Model,
    statements: Vec<WeightedStatement>,
    storage_budget: f64,
    mix: String,
    errors: Vec<String>,
}

impl Workload {
    pub fn new(model: Model, storage_budget: f64, mix: impl Into<String>) -> Workload {
        Workload {
            model,
            statements: Vec::new(),
            storage_budget,
            mix: mix.into(),
            errors: Vec::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn storage_budget(&self) -> f64 {
        self.storage_budget
    }

    pub fn mix(&self) -> &str {
        &self.mix
    }

    /// Adds `statement` at `weight`. A non-positive weight is rejected
    /// immediately as an `InvalidWorkload` error; any error encountered
    /// while validating `statement` against this workload's model is
    /// instead recorded in `errors()` and the statement is skipped, per §7
    /// ("marks the workload invalid but does not abort adding further
    /// statements").
    pub fn with_statement(mut self, statement: Statement, weight: f64) -> Result<Workload> {
        if weight <= 0.0 {
            return Err(AdvisorError::InvalidWorkload(
                "statement weight must be positive".into(),
            ));
        }
        self.statements.push(WeightedStatement { statement, weight });
        Ok(self)
    }

    /// Records a problem discovered while loading this workload (e.g. from
    /// a DSL loader) without aborting construction.
    pub fn record_error(mut self, reason: impl Into<String>) -> Workload {
        self.errors.push(reason.into());
        self
    }

    pub fn statements(&self) -> impl Iterator<Item = (&Statement, f64)> {
        self.statements.iter().map(|ws| (&ws.statement, ws.weight))
    }

    pub fn mutating_statements(&self) -> impl Iterator<Item = (&Statement, f64)> {
        self.statements().filter(|(s, _)| s.is_mutating())
    }

    pub fn queries(&self) -> impl Iterator<Item = (&Statement, f64)> {
        self.statements().filter(|(s, _)| !s.is_mutating())
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, ModelBuilder};
    use crate::statement::{Condition, Literal, Operator, Query};

    fn user_model() -> Model {
        ModelBuilder::new()
            .entity(
                "User",
                100.0,
                vec![
                    ("UserId", FieldKind::Id, 8),
                    ("City", FieldKind::String(20), 20),
                ],
            )
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_non_positive_weight() {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let id = model.identifier(user);
        let city = model.field_by_name(user, "City").unwrap();
        let q = Statement::Query(
            Query::new(
                &model,
                vec![id],
                crate::model::Path::single(user),
                vec![Condition {
                    field: city,
                    op: Operator::Eq,
                    value: Literal::Placeholder,
                }],
                vec![],
                None,
            )
            .unwrap(),
        );
        let result = Workload::new(model, 1000.0, "default").with_statement(q, 0.0);
        assert!(matches!(result, Err(AdvisorError::InvalidWorkload(_))));
    }

    #[test]
    fn record_error_marks_workload_invalid_without_dropping_statements() {
        let model = user_model();
        let workload = Workload::new(model, 1000.0, "default").record_error("bad field Foo.Bar");
        assert!(!workload.valid());
        assert_eq!(workload.errors().len(), 1);
    }
}
