//! UpdatePlanner (§4.3): pairs each mutating statement with the support
//! queries it needs against a candidate (or chosen) index set, and emits
//! the insert/delete steps that keep an affected index consistent.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::index::Index;
use crate::model::{EntityId, FieldId, Model, Path};
use crate::statement::{Condition, Query, Statement};

/// An insert/delete step against one affected index, produced once a
/// schema (a chosen subset of indexes) is known (§4.3 steps 2-3).
#[derive(Debug, Clone)]
pub enum UpdateStep {
    Insert { index_key: String },
    Delete { index_key: String },
}

/// The fields a mutating statement writes (settings) or entirely touches
/// (every field of its target entity, for inserts and deletes).
pub fn touched_fields(model: &Model, statement: &Statement) -> HashSet<FieldId> {
    match statement {
        Statement::Update(u) => u.setting_fields(),
        Statement::Insert(ins) => model.entity(ins.target).fields.iter().copied().collect(),
        Statement::Delete(d) => model.entity(d.target).fields.iter().copied().collect(),
        Statement::Query(_) => HashSet::new(),
    }
}

/// Whether `statement` modifies `index` (§4.3): their touched/all fields intersect.
pub fn modifies(model: &Model, statement: &Statement, index: &Index) -> bool {
    let touched = touched_fields(model, statement);
    index.all_fields().iter().any(|f| touched.contains(f))
}

fn target_and_conditions(statement: &Statement) -> Option<(EntityId, Path, Vec<Condition>)> {
    match statement {
        Statement::Update(u) => Some((u.target, u.path.clone(), u.conditions.clone())),
        Statement::Delete(d) => Some((
            d.target,
            d.path.clone().unwrap_or_else(|| Path::single(d.target)),
            d.conditions.clone(),
        )),
        Statement::Insert(_) | Statement::Query(_) => None,
    }
}

/// Truncates `index_path` at `target`, then appends `stmt_path` (skipping
/// its first entity, which coincides with `target`) — "a path spliced from
/// i.path up to m.target entity plus m's own path" (§4.3 step 1).
fn splice_to_target(model: &Model, index_path: &Path, target: EntityId, stmt_path: &Path) -> Result<Path> {
    let pos = index_path
        .position(target)
        .expect("modifies() guarantees target lies on index.path");
    let mut entities = index_path.entities()[..=pos].to_vec();
    entities.extend(stmt_path.entities().iter().skip(1));
    Path::new(model, entities)
}

/// Derives the single support query `statement` needs to keep `index`
/// consistent, or `None` if no query is required (§4.3 step 1).
pub fn support_query_for(model: &Model, statement: &Statement, index: &Index) -> Result<Option<Query>> {
    if !modifies(model, statement, index) {
        return Ok(None);
    }

    match statement {
        Statement::Insert(_) => {
            // Inserts carry no WHERE clause; the fields available to derive a
            // lookup from are the insert's own settings, which by
            // construction already supply every hash field of id- and
            // foreign-key-keyed indexes. We do not synthesize a lookup for
            // hash fields absent from settings (open question, §9/DESIGN.md).
            Ok(None)
        }
        Statement::Update(_) | Statement::Delete(_) => {
            let (target, stmt_path, conditions) = target_and_conditions(statement).unwrap();
            let supplied: HashSet<FieldId> = conditions
                .iter()
                .filter(|c| c.op.is_equality())
                .map(|c| c.field)
                .collect();
            let needed: Vec<FieldId> = index
                .hash_fields
                .iter()
                .copied()
                .filter(|f| !supplied.contains(f))
                .collect();
            if needed.is_empty() {
                return Ok(None);
            }
            if !conditions.iter().any(|c| c.op.is_equality()) {
                // No anchor to key a lookup by; we cannot build a valid Query.
                return Ok(None);
            }
            let path = splice_to_target(model, &index.path, target, &stmt_path)?;
            let query = Query::new(model, needed, path, conditions, vec![], None)?;
            Ok(Some(query))
        }
        Statement::Query(_) => Ok(None),
    }
}

/// All support queries a mutating statement derives against a candidate
/// index set, used both to feed the enumerator (§4.1) and, later, to plan
/// the statement's own execution.
pub fn support_queries(
    model: &Model,
    statement: &Statement,
    candidates: &HashMap<String, Index>,
) -> Result<Vec<Query>> {
    let mut queries = Vec::new();
    for index in candidates.values() {
        if let Some(q) = support_query_for(model, statement, index)? {
            queries.push(q);
        }
    }
    Ok(queries)
}

/// The full per-mutation plan: the support queries it depends on, plus the
/// insert/delete step for every affected index in a chosen schema.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub support_queries: Vec<Query>,
    pub steps: Vec<UpdateStep>,
}

/// Builds the update plan for `statement` against a *chosen* schema
/// (post-MILP index set), emitting InsertStep/DeleteStep per §4.3 steps 2-3.
pub fn plan_update(
    model: &Model,
    statement: &Statement,
    chosen: &HashMap<String, Index>,
) -> Result<UpdatePlan> {
    let support_queries = support_queries(model, statement, chosen)?;
    let mut steps = Vec::new();

    for (key, index) in chosen {
        if !modifies(model, statement, index) {
            continue;
        }
        match statement {
            Statement::Insert(_) => steps.push(UpdateStep::Insert { index_key: key.clone() }),
            Statement::Update(u) => {
                steps.push(UpdateStep::Insert { index_key: key.clone() });
                let settings = u.setting_fields();
                let key_changed = index.hash_fields.iter().chain(index.order_fields.iter()).any(|f| settings.contains(f));
                if key_changed {
                    steps.push(UpdateStep::Delete { index_key: key.clone() });
                }
            }
            Statement::Delete(_) => steps.push(UpdateStep::Delete { index_key: key.clone() }),
            Statement::Query(_) => {}
        }
    }

    Ok(UpdatePlan { support_queries, steps })
}
