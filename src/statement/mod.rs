//! Statement AST (§3): queries and the three mutating statement kinds, plus
//! the conditions/settings they carry. Statements are produced by the
//! parser (§6) and are otherwise immutable value types — all downstream
//! components borrow them.

mod condition;

pub use condition::{Condition, Literal, Operator, Setting};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AdvisorError, Result};
use crate::model::{EntityId, FieldId, Model, Path};

fn fields_on_path(model: &Model, path: &Path, fields: &[FieldId]) -> bool {
    fields
        .iter()
        .all(|&f| path.contains(model.field(f).entity))
}

/// A read statement: `SELECT <select> FROM <path> WHERE <conditions> ORDER
/// BY <order_by> LIMIT <limit>` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub select: Vec<FieldId>,
    pub path: Path,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<FieldId>,
    pub limit: Option<usize>,
}

impl Query {
    /// Validates the invariants of §3: at least one equality predicate, at
    /// most one range predicate, no predicate on a foreign key, and every
    /// referenced field lies on `path`.
    pub fn new(
        model: &Model,
        select: Vec<FieldId>,
        path: Path,
        conditions: Vec<Condition>,
        order_by: Vec<FieldId>,
        limit: Option<usize>,
    ) -> Result<Query> {
        if !conditions.iter().any(|c| c.op.is_equality()) {
            return Err(AdvisorError::InvalidStatement(
                "query must have at least one equality predicate".into(),
            ));
        }
        let range_count = conditions.iter().filter(|c| c.op.is_range()).count();
        if range_count > 1 {
            return Err(AdvisorError::InvalidStatement(
                "query must not have more than one range predicate".into(),
            ));
        }
        for c in &conditions {
            if model.field(c.field).is_foreign_key() {
                return Err(AdvisorError::InvalidStatement(format!(
                    "predicate on foreign key field {} is not allowed",
                    model.field(c.field).name
                )));
            }
        }
        let condition_fields: Vec<FieldId> = conditions.iter().map(|c| c.field).collect();
        if !fields_on_path(model, &path, &select)
            || !fields_on_path(model, &path, &condition_fields)
            || !fields_on_path(model, &path, &order_by)
        {
            return Err(AdvisorError::InvalidStatement(
                "all referenced fields must lie on the query path".into(),
            ));
        }

        Ok(Query {
            select,
            path,
            conditions,
            order_by,
            limit,
        })
    }

    pub fn equality_fields(&self) -> HashSet<FieldId> {
        self.conditions
            .iter()
            .filter(|c| c.op.is_equality())
            .map(|c| c.field)
            .collect()
    }

    pub fn range_field(&self) -> Option<FieldId> {
        self.conditions.iter().find(|c| c.op.is_range()).map(|c| c.field)
    }

    /// All fields this query references anywhere (select, predicates, order by).
    pub fn referenced_fields(&self) -> HashSet<FieldId> {
        let mut fields: HashSet<FieldId> = self.select.iter().copied().collect();
        fields.extend(self.conditions.iter().map(|c| c.field));
        fields.extend(self.order_by.iter().copied());
        fields
    }

    /// Initial cardinality estimate for the planner's [`ExecutionState`]
    /// (§4.2): the expected count of the path's first entity, per the
    /// simple statistical model of §3.
    pub fn cardinality_estimate(&self, model: &Model) -> f64 {
        model.entity(self.path.first()).count
    }
}

/// `UPDATE <target> [FROM <path>] SET <settings> [WHERE <conditions>]` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub target: EntityId,
    pub path: Path,
    pub settings: Vec<Setting>,
    pub conditions: Vec<Condition>,
}

impl Update {
    pub fn new(
        model: &Model,
        target: EntityId,
        path: Path,
        settings: Vec<Setting>,
        conditions: Vec<Condition>,
    ) -> Result<Update> {
        if path.last() != target {
            return Err(AdvisorError::InvalidStatement(
                "update path must end at the target entity".into(),
            ));
        }
        for s in &settings {
            if model.field(s.field).entity != target {
                return Err(AdvisorError::InvalidStatement(format!(
                    "setting on {} does not belong to target entity {}",
                    model.field(s.field).name,
                    model.entity(target).name
                )));
            }
        }
        Ok(Update {
            target,
            path,
            settings,
            conditions,
        })
    }

    pub fn setting_fields(&self) -> HashSet<FieldId> {
        self.settings.iter().map(|s| s.field).collect()
    }
}

/// `INSERT INTO <target> SET <settings>` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insert {
    pub target: EntityId,
    pub settings: Vec<Setting>,
}

impl Insert {
    pub fn new(model: &Model, target: EntityId, settings: Vec<Setting>) -> Result<Insert> {
        let id_field = model.identifier(target);
        if !settings.iter().any(|s| s.field == id_field) {
            return Err(AdvisorError::InvalidStatement(format!(
                "insert into {} must supply its identifier field",
                model.entity(target).name
            )));
        }
        Ok(Insert { target, settings })
    }

    pub fn setting_fields(&self) -> HashSet<FieldId> {
        self.settings.iter().map(|s| s.field).collect()
    }
}

/// `DELETE <target> [FROM <path>] [WHERE <conditions>]` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delete {
    pub target: EntityId,
    pub path: Option<Path>,
    pub conditions: Vec<Condition>,
}

/// Sum type over the four statement kinds (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    Query(Query),
    Update(Update),
    Insert(Insert),
    Delete(Delete),
}

impl Statement {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Statement::Query(_))
    }
}
