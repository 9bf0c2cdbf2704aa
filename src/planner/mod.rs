//! Query planner (§4.2): best-first search over [`ExecutionState`] that
//! finds every minimum-cost sequence of [`PlanStep`]s satisfying a query
//! against a candidate index set.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use crate::cost::CostModel;
use crate::error::{AdvisorError, Result};
use crate::index::Index;
use crate::model::{FieldId, Model};
use crate::statement::Query;

/// One step of a query execution plan (§4.2).
#[derive(Debug, Clone)]
pub enum PlanStep {
    IndexLookup {
        index: Index,
        eq_fields: BTreeSet<FieldId>,
        range_field: Option<FieldId>,
        order_by: Vec<FieldId>,
        limit: Option<usize>,
        output_cardinality: f64,
    },
    Filter {
        remaining_eq: BTreeSet<FieldId>,
        remaining_range: Option<FieldId>,
    },
    Sort {
        fields: Vec<FieldId>,
    },
    Limit {
        n: usize,
    },
}

impl PlanStep {
    pub fn output_cardinality(&self, cardinality: f64) -> f64 {
        match self {
            PlanStep::IndexLookup { output_cardinality, .. } => *output_cardinality,
            PlanStep::Filter { .. } | PlanStep::Sort { .. } => cardinality,
            PlanStep::Limit { n } => cardinality.min(*n as f64),
        }
    }
}

/// A complete plan and its total cost under some [`CostModel`].
#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub cost: f64,
}

/// The structural part of an [`ExecutionState`] used for deduplication in
/// the planner's closed set — cardinality is deliberately excluded (§9).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    eq_satisfied: BTreeSet<FieldId>,
    range_satisfied: bool,
    order_satisfied: bool,
    path_covered: usize,
    fields_available: BTreeSet<FieldId>,
}

#[derive(Debug, Clone)]
struct ExecutionState {
    eq_satisfied: BTreeSet<FieldId>,
    range_satisfied: bool,
    order_satisfied: bool,
    fields_available: BTreeSet<FieldId>,
    cardinality: f64,
    path_covered: usize,
    cost: f64,
    steps: Vec<PlanStep>,
}

impl ExecutionState {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            eq_satisfied: self.eq_satisfied.clone(),
            range_satisfied: self.range_satisfied,
            order_satisfied: self.order_satisfied,
            path_covered: self.path_covered,
            fields_available: self.fields_available.clone(),
        }
    }

    fn is_terminal(&self, q: &Query) -> bool {
        let eq_needed = q.equality_fields();
        let select: BTreeSet<FieldId> = q.select.iter().copied().collect();
        self.path_covered == q.path.len()
            && eq_needed.iter().all(|f| self.eq_satisfied.contains(f))
            && (q.range_field().is_none() || self.range_satisfied)
            && (q.order_by.is_empty() || self.order_satisfied)
            && select.iter().all(|f| self.fields_available.contains(f))
    }
}

/// Ties are broken by a fingerprint's `Ord` derivation so the search is
/// deterministic regardless of index-set iteration order (§5).
#[derive(Debug, Clone, PartialEq)]
struct Candidate(ExecutionState);

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest cost pops first.
        other
            .0
            .cost
            .partial_cmp(&self.0.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.0.path_covered.cmp(&self.0.path_covered))
    }
}

/// Finds every minimum-cost plan for `q` against candidate set `indexes`,
/// under `cost_model` (§4.2).
pub struct Planner<'a> {
    model: &'a Model,
    cost_model: &'a dyn CostModel,
}

impl<'a> Planner<'a> {
    pub fn new(model: &'a Model, cost_model: &'a dyn CostModel) -> Self {
        Planner { model, cost_model }
    }

    pub fn plan(&self, q: &Query, indexes: &[Index]) -> Result<Vec<Plan>> {
        let initial = ExecutionState {
            eq_satisfied: BTreeSet::new(),
            range_satisfied: false,
            order_satisfied: q.order_by.is_empty(),
            fields_available: BTreeSet::new(),
            cardinality: q.cardinality_estimate(self.model),
            path_covered: 0,
            cost: 0.0,
            steps: Vec::new(),
        };

        let mut heap = BinaryHeap::new();
        heap.push(Candidate(initial));
        let mut visited: HashSet<Fingerprint> = HashSet::new();
        let mut best: Option<f64> = None;
        let mut results: Vec<Plan> = Vec::new();

        while let Some(Candidate(state)) = heap.pop() {
            if let Some(b) = best {
                if state.cost > b {
                    break; // every remaining candidate is at least this costly
                }
            }

            if state.is_terminal(q) {
                let finished = self.finish(q, &state);
                match best {
                    None => {
                        best = Some(finished.cost);
                        results.push(finished);
                    }
                    Some(b) if (finished.cost - b).abs() < 1e-9 => results.push(finished),
                    Some(b) if finished.cost < b => {
                        best = Some(finished.cost);
                        results = vec![finished];
                    }
                    _ => {}
                }
                continue;
            }

            let fp = state.fingerprint();
            if !visited.insert(fp) {
                continue;
            }

            for index in indexes {
                if let Some(next) = self.try_index_lookup(q, &state, index) {
                    heap.push(Candidate(next));
                }
            }
            if let Some(next) = self.try_filter(q, &state) {
                heap.push(Candidate(next));
            }
            if let Some(next) = self.try_sort(q, &state) {
                heap.push(Candidate(next));
            }
        }

        if results.is_empty() {
            return Err(AdvisorError::NoPlan(format!(
                "no plan covers path of length {} starting at {}",
                q.path.len(),
                self.model.entity(q.path.first()).name
            )));
        }
        Ok(results)
    }

    fn finish(&self, q: &Query, state: &ExecutionState) -> Plan {
        let mut steps = state.steps.clone();
        let mut cardinality = state.cardinality;
        if let Some(limit) = q.limit {
            steps.push(PlanStep::Limit { n: limit });
            cardinality = cardinality.min(limit as f64);
        }
        let _ = cardinality;
        let cost = self
            .cost_model
            .plan_cost(self.model, &steps, q.cardinality_estimate(self.model));
        Plan { steps, cost }
    }

    fn try_index_lookup(&self, q: &Query, state: &ExecutionState, index: &Index) -> Option<ExecutionState> {
        if state.path_covered >= q.path.len() {
            return None;
        }
        let next_entity = q.path.entities()[state.path_covered];
        if index.path.first() != next_entity {
            return None;
        }

        let eq_remaining: BTreeSet<FieldId> = q
            .equality_fields()
            .into_iter()
            .filter(|f| !state.eq_satisfied.contains(f))
            .collect();
        let reachable: BTreeSet<FieldId> = eq_remaining.union(&state.fields_available).copied().collect();
        if !index.hash_fields.is_subset(&reachable) {
            return None;
        }

        let mut eq_satisfied = state.eq_satisfied.clone();
        eq_satisfied.extend(index.hash_fields.iter().filter(|f| eq_remaining.contains(f)));

        let range_satisfied = state.range_satisfied
            || q.range_field()
                .map(|r| index.order_fields.first() == Some(&r))
                .unwrap_or(false);

        let order_satisfied = state.order_satisfied
            || (!q.order_by.is_empty()
                && q.order_by
                    .iter()
                    .zip(index.order_fields.iter())
                    .all(|(a, b)| a == b)
                && q.order_by.len() <= index.order_fields.len());

        let mut fields_available = state.fields_available.clone();
        fields_available.extend(index.all_fields());

        // §4.2: advances cardinality by a join-selectivity factor of
        // (target entity count / source entity count) — i.e. the ratio
        // `index.expected_entries` accumulates along its own path — times a
        // predicate selectivity. The model carries no distinct-value stats
        // beyond entity counts, so predicate selectivity is taken as 1.0.
        let predicate_selectivity = 1.0;
        let output_cardinality = state.cardinality * index.join_selectivity(self.model) * predicate_selectivity;
        let mut steps = state.steps.clone();
        steps.push(PlanStep::IndexLookup {
            index: index.clone(),
            eq_fields: index.hash_fields.clone(),
            range_field: q.range_field().filter(|r| index.order_fields.first() == Some(r)),
            order_by: index.order_fields.clone(),
            limit: None,
            output_cardinality,
        });

        let added_cost = self.cost_model.step_cost(
            self.model,
            steps.last().unwrap(),
            state.cardinality,
        );

        Some(ExecutionState {
            eq_satisfied,
            range_satisfied,
            order_satisfied,
            fields_available,
            cardinality: output_cardinality,
            path_covered: state.path_covered + index.path.len(),
            cost: state.cost + added_cost,
            steps,
        })
    }

    fn try_filter(&self, q: &Query, state: &ExecutionState) -> Option<ExecutionState> {
        let remaining_eq: BTreeSet<FieldId> = q
            .equality_fields()
            .into_iter()
            .filter(|f| !state.eq_satisfied.contains(f) && state.fields_available.contains(f))
            .collect();
        let remaining_range = q
            .range_field()
            .filter(|r| !state.range_satisfied && state.fields_available.contains(r));
        if remaining_eq.is_empty() && remaining_range.is_none() {
            return None;
        }

        let mut steps = state.steps.clone();
        steps.push(PlanStep::Filter {
            remaining_eq: remaining_eq.clone(),
            remaining_range,
        });
        let added_cost = self.cost_model.step_cost(self.model, steps.last().unwrap(), state.cardinality);

        let mut eq_satisfied = state.eq_satisfied.clone();
        eq_satisfied.extend(remaining_eq);

        Some(ExecutionState {
            eq_satisfied,
            range_satisfied: state.range_satisfied || remaining_range.is_some(),
            order_satisfied: state.order_satisfied,
            fields_available: state.fields_available.clone(),
            cardinality: state.cardinality,
            path_covered: state.path_covered,
            cost: state.cost + added_cost,
            steps,
        })
    }

    fn try_sort(&self, q: &Query, state: &ExecutionState) -> Option<ExecutionState> {
        if state.order_satisfied || q.order_by.is_empty() {
            return None;
        }
        if !q.order_by.iter().all(|f| state.fields_available.contains(f)) {
            return None;
        }
        let mut steps = state.steps.clone();
        steps.push(PlanStep::Sort { fields: q.order_by.clone() });
        let added_cost = self.cost_model.step_cost(self.model, steps.last().unwrap(), state.cardinality);
        Some(ExecutionState {
            eq_satisfied: state.eq_satisfied.clone(),
            range_satisfied: state.range_satisfied,
            order_satisfied: true,
            fields_available: state.fields_available.clone(),
            cardinality: state.cardinality,
            path_covered: state.path_covered,
            cost: state.cost + added_cost,
            steps,
        })
    }
}
