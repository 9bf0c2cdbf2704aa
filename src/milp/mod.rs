//! SearchMILP (§4.5): builds the binary program over candidate indexes and
//! candidate query plans, and solves it through a thin [`SolverBackend`]
//! trait so the modeling layer underneath (`good_lp`, by default its
//! pure-Rust `microlp` backend) stays swappable without touching the
//! constraint-building code.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use good_lp::{default_solver, variable, Expression, ResolutionError, Solution as GoodLpSolution, SolverModel};

use crate::error::{AdvisorError, NoSolutionKind, Result};
use crate::index::Index;
use crate::model::Model;
use crate::planner::{Plan, PlanStep};
use crate::statement::{Query, Statement};
use crate::update_planner;
use crate::workload::Workload;

/// Opaque handle to a variable registered with a [`SolverBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

/// A linear combination of solver variables plus a constant (§4.5).
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    pub constant: f64,
    pub terms: Vec<(VarId, f64)>,
}

impl LinExpr {
    pub fn var(v: VarId) -> LinExpr {
        LinExpr { constant: 0.0, terms: vec![(v, 1.0)] }
    }

    pub fn add_term(mut self, v: VarId, coeff: f64) -> LinExpr {
        self.terms.push((v, coeff));
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ConstraintOp {
    Le,
    Eq,
    Ge,
}

/// The thin interface to a MILP engine (§9 design notes): register binary
/// variables, accumulate constraints and an objective, then solve once.
pub trait SolverBackend {
    fn add_binary_var(&mut self, name: &str) -> VarId;
    fn add_constraint(&mut self, lhs: LinExpr, op: ConstraintOp, rhs: f64);
    fn set_objective_minimize(&mut self, expr: LinExpr);
    fn solve(self: Box<Self>, deadline: Option<Instant>) -> Result<BTreeMap<VarId, bool>>;
}

/// The default backend: `good_lp`'s modeling layer over its pure-Rust
/// `microlp` solver.
#[derive(Default)]
pub struct GoodLpBackend {
    names: Vec<String>,
    constraints: Vec<(LinExpr, ConstraintOp, f64)>,
    objective: LinExpr,
}

impl GoodLpBackend {
    pub fn new() -> Self {
        GoodLpBackend::default()
    }
}

impl SolverBackend for GoodLpBackend {
    fn add_binary_var(&mut self, name: &str) -> VarId {
        let id = VarId(self.names.len());
        self.names.push(name.to_string());
        id
    }

    fn add_constraint(&mut self, lhs: LinExpr, op: ConstraintOp, rhs: f64) {
        self.constraints.push((lhs, op, rhs));
    }

    fn set_objective_minimize(&mut self, expr: LinExpr) {
        self.objective = expr;
    }

    fn solve(self: Box<Self>, deadline: Option<Instant>) -> Result<BTreeMap<VarId, bool>> {
        if let Some(d) = deadline {
            if Instant::now() >= d {
                return Err(AdvisorError::NoSolution(NoSolutionKind::Timeout));
            }
        }

        let mut vars = good_lp::variables!();
        let handles: Vec<_> = self.names.iter().map(|_| vars.add(variable().binary())).collect();

        let to_expr = |lin: &LinExpr| -> Expression {
            let mut expr = Expression::from(lin.constant);
            for (v, coeff) in &lin.terms {
                expr = expr + handles[v.0] * *coeff;
            }
            expr
        };

        let objective = to_expr(&self.objective);
        let mut problem = vars.minimise(objective).using(default_solver);
        for (lhs, op, rhs) in &self.constraints {
            let expr = to_expr(lhs);
            let constraint = match op {
                ConstraintOp::Le => expr.leq(*rhs),
                ConstraintOp::Eq => expr.eq(*rhs),
                ConstraintOp::Ge => expr.geq(*rhs),
            };
            problem = problem.with(constraint);
        }

        let solution = problem.solve().map_err(|e| match e {
            ResolutionError::Infeasible => AdvisorError::NoSolution(NoSolutionKind::Coverage),
            ResolutionError::Unbounded => AdvisorError::NoSolution(NoSolutionKind::Budget),
            _ => AdvisorError::NoSolution(NoSolutionKind::Coverage),
        })?;

        Ok(handles
            .iter()
            .enumerate()
            .map(|(i, h)| (VarId(i), solution.value(*h) > 0.5))
            .collect())
    }
}

/// All candidate plans computed for one workload query, keyed by its
/// position among `workload.queries()`.
pub struct QueryPlans<'q> {
    pub query: &'q Query,
    pub weight: f64,
    pub plans: Vec<Plan>,
}

/// The chosen schema: the enabled index keys and the selected plan per
/// query, as produced by [`solve_schema`].
#[derive(Debug, Clone)]
pub struct Schema {
    pub chosen_indexes: BTreeSet<String>,
    pub chosen_plans: Vec<(usize, Plan)>,
}

fn plan_index_keys(plan: &Plan) -> BTreeSet<String> {
    plan.steps
        .iter()
        .filter_map(|s| match s {
            PlanStep::IndexLookup { index, .. } => Some(index.key()),
            _ => None,
        })
        .collect()
}

/// Cost charged for keeping `index` consistent under one occurrence of
/// mutating statement `statement` (§4.4's `field_size` style: proportional
/// to bytes written).
fn update_cost(model: &Model, statement: &Statement, index: &Index) -> f64 {
    if update_planner::modifies(model, statement, index) {
        index.entry_size(model) as f64
    } else {
        0.0
    }
}

/// Variables registered while building the program, needed both to read
/// back a solution and to rebuild the program with C4 dropped when
/// diagnosing an infeasible result.
struct Vars {
    index_keys: Vec<String>,
    x_vars: BTreeMap<String, VarId>,
    y_vars: Vec<Vec<VarId>>,
}

/// Registers x_i, y_{q,p}, u_{m,i} and constraints C1-C3 (always) plus C4
/// (the storage budget, only when `include_budget`), and sets the weighted
/// objective, against `backend`.
fn build_program(
    backend: &mut dyn SolverBackend,
    model: &Model,
    workload: &Workload,
    candidates: &BTreeMap<String, Index>,
    query_plans: &[QueryPlans<'_>],
    include_budget: bool,
) -> Vars {
    // Deterministic variable order: sorted index keys (§5).
    let index_keys: Vec<String> = candidates.keys().cloned().collect();
    let mut x_vars: BTreeMap<String, VarId> = BTreeMap::new();
    for key in &index_keys {
        x_vars.insert(key.clone(), backend.add_binary_var(&format!("x_{key}")));
    }

    // y_{q,p}: one binary var per (query, plan), plans ordered as produced
    // by the planner (best-first, already deterministic).
    let mut y_vars: Vec<Vec<VarId>> = Vec::with_capacity(query_plans.len());
    for (qi, qp) in query_plans.iter().enumerate() {
        let mut row = Vec::with_capacity(qp.plans.len());
        for pi in 0..qp.plans.len() {
            row.push(backend.add_binary_var(&format!("y_{qi}_{pi}")));
        }
        y_vars.push(row);

        // C1: exactly one plan chosen per query.
        let expr = LinExpr {
            constant: 0.0,
            terms: y_vars[qi].iter().map(|&v| (v, 1.0)).collect(),
        };
        backend.add_constraint(expr, ConstraintOp::Eq, 1.0);

        // C2: a plan is usable only if every index it uses is materialized.
        for (pi, plan) in qp.plans.iter().enumerate() {
            for used_key in plan_index_keys(plan) {
                if let Some(&xi) = x_vars.get(&used_key) {
                    let c = LinExpr::default().add_term(y_vars[qi][pi], 1.0).add_term(xi, -1.0);
                    backend.add_constraint(c, ConstraintOp::Le, 0.0);
                }
            }
        }
    }

    // u_{m,i} = x_i for every (mutation, affected index) pair (C3); kept as
    // its own variable per §4.5's statement of the program even though it
    // is fully determined by x_i, so the objective reads the same as the
    // design's formula.
    let mut mutation_terms: Vec<(f64, VarId)> = Vec::new();
    for (statement, weight) in workload.mutating_statements() {
        for key in &index_keys {
            let index = &candidates[key];
            if !update_planner::modifies(model, statement, index) {
                continue;
            }
            let xi = x_vars[key];
            let u = backend.add_binary_var(&format!("u_{key}"));
            let c = LinExpr::default().add_term(u, 1.0).add_term(xi, -1.0);
            backend.add_constraint(c, ConstraintOp::Eq, 0.0);
            mutation_terms.push((weight * update_cost(model, statement, index), u));
        }
    }

    // C4: storage budget. Dropped on the diagnostic retry so an infeasible
    // result can be attributed to the budget rather than to coverage.
    if include_budget {
        let size_expr = LinExpr {
            constant: 0.0,
            terms: index_keys
                .iter()
                .map(|k| (x_vars[k], candidates[k].size(model)))
                .collect(),
        };
        backend.add_constraint(size_expr, ConstraintOp::Le, workload.storage_budget());
    }

    // Objective: weighted plan cost plus weighted update cost.
    let mut objective = LinExpr::default();
    for (qi, qp) in query_plans.iter().enumerate() {
        for (pi, plan) in qp.plans.iter().enumerate() {
            objective = objective.add_term(y_vars[qi][pi], qp.weight * plan.cost);
        }
    }
    for (coeff, u) in mutation_terms {
        objective = objective.add_term(u, coeff);
    }
    backend.set_objective_minimize(objective);

    Vars { index_keys, x_vars, y_vars }
}

/// Builds and solves the MILP of §4.5 over `candidates` and the per-query
/// plans in `query_plans`, returning the chosen schema. `make_backend` is
/// called once per solver invocation (possibly twice: once for the real
/// program, and once more, without the budget constraint, to distinguish a
/// budget shortfall from unsatisfiable coverage when the first is
/// infeasible).
pub fn solve_schema(
    model: &Model,
    workload: &Workload,
    candidates: &BTreeMap<String, Index>,
    query_plans: &[QueryPlans<'_>],
    make_backend: impl Fn() -> Box<dyn SolverBackend>,
    deadline: Option<Instant>,
) -> Result<Schema> {
    let mut backend = make_backend();
    let vars = build_program(backend.as_mut(), model, workload, candidates, query_plans, true);

    let values = match backend.solve(deadline) {
        Ok(values) => values,
        Err(AdvisorError::NoSolution(NoSolutionKind::Coverage)) => {
            // Retry without C4: if the program becomes feasible, the budget
            // was the binding constraint; otherwise coverage itself (C1-C3)
            // is unsatisfiable regardless of budget.
            let mut probe = make_backend();
            build_program(probe.as_mut(), model, workload, candidates, query_plans, false);
            return match probe.solve(deadline) {
                Ok(_) => Err(AdvisorError::NoSolution(NoSolutionKind::Budget)),
                Err(_) => Err(AdvisorError::NoSolution(NoSolutionKind::Coverage)),
            };
        }
        Err(e) => return Err(e),
    };

    let chosen_indexes: BTreeSet<String> = vars
        .index_keys
        .iter()
        .filter(|k| values.get(&vars.x_vars[*k]).copied().unwrap_or(false))
        .cloned()
        .collect();

    let mut chosen_plans = Vec::with_capacity(query_plans.len());
    for (qi, qp) in query_plans.iter().enumerate() {
        let chosen = vars.y_vars[qi]
            .iter()
            .enumerate()
            .find(|(_, v)| values.get(v).copied().unwrap_or(false))
            .map(|(pi, _)| qp.plans[pi].clone());
        match chosen {
            Some(plan) => chosen_plans.push((qi, plan)),
            None => {
                return Err(AdvisorError::NoSolution(NoSolutionKind::Coverage));
            }
        }
    }

    Ok(Schema { chosen_indexes, chosen_plans })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::EntryCountCost;
    use crate::enumerator::IndexEnumerator;
    use crate::model::{FieldKind, ModelBuilder, Path};
    use crate::planner::Planner;
    use crate::statement::{Condition, Literal, Operator};

    fn user_model() -> Model {
        ModelBuilder::new()
            .entity(
                "User",
                100.0,
                vec![
                    ("UserId", FieldKind::Id, 8),
                    ("City", FieldKind::String(20), 20),
                    ("Username", FieldKind::String(30), 30),
                ],
            )
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn solves_single_query_schema_within_budget() {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let city = model.field_by_name(user, "City").unwrap();
        let username = model.field_by_name(user, "Username").unwrap();

        let q = Query::new(
            &model,
            vec![username],
            Path::single(user),
            vec![Condition {
                field: city,
                op: Operator::Eq,
                value: Literal::Placeholder,
            }],
            vec![],
            None,
        )
        .unwrap();

        let enumerator = IndexEnumerator::new(&model);
        let candidates: BTreeMap<String, Index> = enumerator.indexes_for_query(&q).unwrap().into_iter().collect();

        let cost_model = EntryCountCost;
        let planner = Planner::new(&model, &cost_model);
        let all_indexes: Vec<Index> = candidates.values().cloned().collect();
        let plans = planner.plan(&q, &all_indexes).unwrap();

        let workload = Workload::new(model.clone(), 1_000_000.0, "default")
            .with_statement(Statement::Query(q.clone()), 1.0)
            .unwrap();

        let query_plans = vec![QueryPlans { query: &q, weight: 1.0, plans }];
        let schema = solve_schema(
            &model,
            &workload,
            &candidates,
            &query_plans,
            || Box::new(GoodLpBackend::new()),
            None,
        )
        .unwrap();
        assert!(!schema.chosen_indexes.is_empty());
        assert_eq!(schema.chosen_plans.len(), 1);
    }
}
