//! Wires the components together in the order described by §2's data flow:
//! enumerate candidates over the whole workload, plan every read query
//! against them, then let [`milp::solve_schema`] choose the final schema.
//! This is the entry point the CLI binary drives.

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;

use crate::cost::CostModel;
use crate::enumerator::IndexEnumerator;
use crate::error::Result;
use crate::index::Index;
use crate::milp::{self, GoodLpBackend, QueryPlans, Schema};
use crate::model::Model;
use crate::planner::Planner;
use crate::statement::Statement;
use crate::workload::Workload;

/// Runs enumeration, planning, and selection for `workload`, returning the
/// chosen schema.
pub fn advise(model: &Model, workload: &Workload, cost_model: &dyn CostModel, deadline: Option<Instant>) -> Result<Schema> {
    tracing::info!(statements = workload.len(), "enumerating candidate indexes");
    let candidates: BTreeMap<String, Index> = IndexEnumerator::new(model).indexes_for_workload(workload)?.into_iter().collect();
    tracing::info!(candidates = candidates.len(), "enumeration finished");

    let all_indexes: Vec<Index> = candidates.values().cloned().collect();
    let planner = Planner::new(model, cost_model);

    let queries: Vec<(&Statement, f64)> = workload.queries().collect();
    let query_plans: Vec<QueryPlans<'_>> = queries
        .into_par_iter()
        .map(|(statement, weight)| {
            let q = match statement {
                Statement::Query(q) => q,
                _ => unreachable!("workload.queries() only yields Statement::Query"),
            };
            tracing::debug!(path_len = q.path.len(), "planning query");
            planner.plan(q, &all_indexes).map(|plans| QueryPlans { query: q, weight, plans })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!("solving schema selection MILP");
    milp::solve_schema(
        model,
        workload,
        &candidates,
        &query_plans,
        || Box::new(GoodLpBackend::new()),
        deadline,
    )
}
