//! CostModel (§4.4): pluggable per-step cost used by both the query planner's
//! best-first search and the MILP's plan-selection objective. Kept as a
//! trait object so the CLI/config layer can swap models without touching
//! the planner.

use crate::index::Index;
use crate::model::Model;
use crate::planner::PlanStep;

/// Assigns a numeric cost to a single plan step, given the model and the
/// cardinality flowing into the step.
pub trait CostModel: Send + Sync {
    fn step_cost(&self, model: &Model, step: &PlanStep, cardinality: f64) -> f64;

    fn plan_cost(&self, model: &Model, steps: &[PlanStep], initial_cardinality: f64) -> f64 {
        let mut cardinality = initial_cardinality;
        let mut total = 0.0;
        for step in steps {
            total += self.step_cost(model, step, cardinality);
            cardinality = step.output_cardinality(cardinality);
        }
        total
    }
}

/// Cost proportional to the number of rows an index lookup is expected to
/// scan (`Index::expected_entries`), the simplest model in §4.4.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryCountCost;

impl CostModel for EntryCountCost {
    fn step_cost(&self, model: &Model, step: &PlanStep, cardinality: f64) -> f64 {
        match step {
            PlanStep::IndexLookup { index, .. } => index_entries(model, index),
            PlanStep::Filter { .. } => cardinality,
            PlanStep::Sort { .. } => cardinality * (cardinality.max(1.0)).log2(),
            PlanStep::Limit { .. } => 0.0,
        }
    }
}

/// Cost weighted by bytes moved (`entries * entry_size`), favoring narrow
/// indexes over row-count alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSizeCost;

impl CostModel for FieldSizeCost {
    fn step_cost(&self, model: &Model, step: &PlanStep, cardinality: f64) -> f64 {
        match step {
            PlanStep::IndexLookup { index, .. } => index.entry_size(model) as f64 * index_entries(model, index),
            PlanStep::Filter { .. } => cardinality * 8.0,
            PlanStep::Sort { .. } => cardinality * (cardinality.max(1.0)).log2() * 8.0,
            PlanStep::Limit { .. } => 0.0,
        }
    }
}

fn index_entries(model: &Model, index: &Index) -> f64 {
    index.expected_entries(model)
}
