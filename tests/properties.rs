//! Property-based tests for the invariants of §8 (P1-P3, P6, P7). Each test
//! fixes a small User/Tweet model (mirroring the scenarios in §8) and lets
//! `proptest` vary which fields are selected, filtered on, and ordered by,
//! rather than generating arbitrary models — the invariants are about the
//! enumerator/planner/MILP's behavior on a model, not about model shape.

use std::collections::BTreeSet;

use proptest::prelude::*;

use nose::cost::EntryCountCost;
use nose::enumerator::IndexEnumerator;
use nose::index::Index;
use nose::milp::{solve_schema, GoodLpBackend, QueryPlans};
use nose::model::{FieldId, FieldKind, Model, ModelBuilder};
use nose::planner::Planner;
use nose::statement::{Condition, Literal, Operator, Query, Setting, Statement, Update};
use nose::update_planner;
use nose::workload::Workload;

fn user_model() -> Model {
    ModelBuilder::new()
        .entity(
            "User",
            100.0,
            vec![
                ("UserId", FieldKind::Id, 8),
                ("City", FieldKind::String(20), 20),
                ("Username", FieldKind::String(30), 30),
                ("Age", FieldKind::Integer, 4),
            ],
        )
        .unwrap()
        .build()
        .unwrap()
}

fn scalar_field_names() -> Vec<&'static str> {
    vec!["City", "Username", "Age"]
}

proptest! {
    // P1: every produced candidate's hash_fields (plus any equality field
    // folded into extra) covers every equality field of q on that index's path.
    #[test]
    fn p1_equality_fields_covered_by_hash_or_extra(eq_idx in 0..3usize, select_idx in 0..3usize) {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let names = scalar_field_names();
        prop_assume!(eq_idx != select_idx);
        let eq_field = model.field_by_name(user, names[eq_idx]).unwrap();
        let select_field = model.field_by_name(user, names[select_idx]).unwrap();

        let q = Query::new(
            &model,
            vec![select_field],
            nose::model::Path::single(user),
            vec![Condition { field: eq_field, op: Operator::Eq, value: Literal::Placeholder }],
            vec![],
            None,
        ).unwrap();

        let enumerator = IndexEnumerator::new(&model);
        let candidates = enumerator.indexes_for_query(&q).unwrap();
        for index in candidates.values() {
            let covered: BTreeSet<FieldId> = index.hash_fields.union(&index.extra).copied().collect();
            prop_assert!(covered.contains(&eq_field) || !index.path.contains(model.field(eq_field).entity));
        }
    }

    // P2: no produced index has empty hash_fields, and none has both O and X empty.
    #[test]
    fn p2_no_produced_index_is_degenerate(eq_idx in 0..3usize, select_idx in 0..3usize) {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let names = scalar_field_names();
        prop_assume!(eq_idx != select_idx);
        let eq_field = model.field_by_name(user, names[eq_idx]).unwrap();
        let select_field = model.field_by_name(user, names[select_idx]).unwrap();

        let q = Query::new(
            &model,
            vec![select_field],
            nose::model::Path::single(user),
            vec![Condition { field: eq_field, op: Operator::Eq, value: Literal::Placeholder }],
            vec![],
            None,
        ).unwrap();

        let enumerator = IndexEnumerator::new(&model);
        let candidates = enumerator.indexes_for_query(&q).unwrap();
        for index in candidates.values() {
            prop_assert!(!index.hash_fields.is_empty());
            prop_assert!(!index.order_fields.is_empty() || !index.extra.is_empty());
        }
    }

    // P3: the materialized view of q is always among its own candidates.
    #[test]
    fn p3_materialized_view_always_present(eq_idx in 0..3usize, select_idx in 0..3usize) {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let names = scalar_field_names();
        prop_assume!(eq_idx != select_idx);
        let eq_field = model.field_by_name(user, names[eq_idx]).unwrap();
        let select_field = model.field_by_name(user, names[select_idx]).unwrap();

        let q = Query::new(
            &model,
            vec![select_field],
            nose::model::Path::single(user),
            vec![Condition { field: eq_field, op: Operator::Eq, value: Literal::Placeholder }],
            vec![],
            None,
        ).unwrap();

        let hash_fields: BTreeSet<FieldId> = q.equality_fields().into_iter().collect();
        let id = model.identifier(user);
        let mut order_fields = vec![];
        if !hash_fields.contains(&id) { order_fields.push(id); }
        let extra: BTreeSet<FieldId> = q.referenced_fields().into_iter()
            .filter(|f| !hash_fields.contains(f) && !order_fields.contains(f))
            .collect();
        let view = Index::new(&model, hash_fields, order_fields, extra, nose::model::Path::single(user)).unwrap();

        let enumerator = IndexEnumerator::new(&model);
        let candidates = enumerator.indexes_for_query(&q).unwrap();
        prop_assert!(candidates.contains_key(&view.key()));
    }

    // P7: an Update whose settings touch no field of a materialized index
    // derives no support query against it.
    #[test]
    fn p7_disjoint_update_adds_no_support_query(setting_idx in 0..3usize) {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let names = scalar_field_names();
        let setting_field = model.field_by_name(user, names[setting_idx]).unwrap();
        let id = model.identifier(user);

        // An index covering only the identifier and a field disjoint from the setting.
        let other_idx = (setting_idx + 1) % names.len();
        let other_field = model.field_by_name(user, names[other_idx]).unwrap();
        prop_assume!(other_field != setting_field);

        let index = Index::new(
            &model,
            BTreeSet::from([id]),
            vec![],
            BTreeSet::from([other_field]),
            nose::model::Path::single(user),
        ).unwrap();

        let update = Statement::Update(Update::new(
            &model,
            user,
            nose::model::Path::single(user),
            vec![Setting { field: setting_field, value: Literal::Placeholder }],
            vec![Condition { field: id, op: Operator::Eq, value: Literal::Placeholder }],
        ).unwrap());

        prop_assert!(!update_planner::modifies(&model, &update, &index));
        prop_assert!(update_planner::support_query_for(&model, &update, &index).unwrap().is_none());
    }
}

// P6: whenever SearchMILP returns a solution, its total chosen size does
// not exceed the storage budget. Not a proptest (the MILP call is
// expensive per-case); exercised across a small fixed set of budgets.
#[test]
fn p6_milp_solution_respects_storage_budget() {
    let model = user_model();
    let user = model.entity_by_name("User").unwrap();
    let city = model.field_by_name(user, "City").unwrap();
    let username = model.field_by_name(user, "Username").unwrap();

    let q = Query::new(
        &model,
        vec![username],
        nose::model::Path::single(user),
        vec![Condition { field: city, op: Operator::Eq, value: Literal::Placeholder }],
        vec![],
        None,
    )
    .unwrap();

    for budget in [1_000.0, 10_000.0, 1_000_000.0] {
        let enumerator = IndexEnumerator::new(&model);
        let candidates: std::collections::BTreeMap<String, Index> =
            enumerator.indexes_for_query(&q).unwrap().into_iter().collect();
        let all_indexes: Vec<Index> = candidates.values().cloned().collect();

        let cost_model = EntryCountCost;
        let planner = Planner::new(&model, &cost_model);
        let plans = planner.plan(&q, &all_indexes).unwrap();

        let workload = Workload::new(model.clone(), budget, "default")
            .with_statement(Statement::Query(q.clone()), 1.0)
            .unwrap();
        let query_plans = vec![QueryPlans { query: &q, weight: 1.0, plans }];

        if let Ok(schema) = solve_schema(&model, &workload, &candidates, &query_plans, || Box::new(GoodLpBackend::new()), None) {
            let total_size: f64 = schema
                .chosen_indexes
                .iter()
                .map(|k| candidates[k].size(&model))
                .sum();
            assert!(total_size <= budget + 1e-6, "chosen schema exceeds budget {budget}: {total_size}");
        }
    }
}
