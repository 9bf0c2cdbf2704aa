//! IndexEnumerator (§4.1): candidate index generation from a query, and the
//! union of per-query and per-support-query candidates for a workload.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::Result;
use crate::index::Index;
use crate::model::{FieldId, Model, Path};
use crate::statement::Query;
use crate::update_planner;
use crate::workload::Workload;

pub struct IndexEnumerator<'m> {
    model: &'m Model,
}

impl<'m> IndexEnumerator<'m> {
    pub fn new(model: &'m Model) -> Self {
        IndexEnumerator { model }
    }

    /// All candidate indexes for a single query (§4.1).
    pub fn indexes_for_query(&self, q: &Query) -> Result<HashMap<String, Index>> {
        let mut out = HashMap::new();

        for path in self.orientations(&q.path) {
            for subpath in path.contiguous_subpaths() {
                self.candidates_on_subpath(q, &subpath, &mut out);
            }
        }

        // Step 4: the materialized view, over the full (unreversed) path.
        if let Some(idx) = self.materialized_view(q) {
            out.insert(idx.key(), idx);
        }

        // Step 5: the simple index of every entity on the query's path.
        for &entity in q.path.entities() {
            if let Some(idx) = self.simple_index(entity) {
                out.insert(idx.key(), idx);
            }
        }

        Ok(out)
    }

    /// Every query's candidates, plus every mutation's support-query
    /// candidates derived against the read-query candidate set (§2 data
    /// flow, §4.3).
    pub fn indexes_for_workload(&self, workload: &Workload) -> Result<HashMap<String, Index>> {
        let mut out = HashMap::new();

        for (statement, _weight) in workload.statements() {
            if let crate::statement::Statement::Query(q) = statement {
                for (key, idx) in self.indexes_for_query(q)? {
                    out.insert(key, idx);
                }
            }
        }

        let base: HashMap<String, Index> = out.clone();
        for (statement, _weight) in workload.statements() {
            if statement.is_mutating() {
                for support in update_planner::support_queries(self.model, statement, &base)? {
                    for (key, idx) in self.indexes_for_query(&support)? {
                        out.insert(key, idx);
                    }
                }
            }
        }

        Ok(out)
    }

    /// A subpath and its reverse — orientation is not fixed by how the
    /// statement spelled its FROM path, since the hash side must start at
    /// the entity carrying the equality predicates and the extra side must
    /// end at the entity carrying the select fields (§3 S2).
    fn orientations(&self, path: &Path) -> Vec<Path> {
        if path.len() == 1 {
            return vec![path.clone()];
        }
        let reversed = Path::new(
            self.model,
            path.entities().iter().rev().copied().collect(),
        );
        match reversed {
            Ok(r) => vec![path.clone(), r],
            Err(_) => vec![path.clone()],
        }
    }

    fn candidates_on_subpath(&self, q: &Query, subpath: &Path, out: &mut HashMap<String, Index>) {
        let on_subpath = |f: &FieldId| subpath.contains(self.model.field(*f).entity);

        let eq_on_p: Vec<FieldId> = q.equality_fields().into_iter().filter(|f| on_subpath(f)).collect();
        if eq_on_p.is_empty() {
            return;
        }
        let range_on_p = q.range_field().filter(on_subpath);
        let mut order_list: Vec<FieldId> = Vec::new();
        if let Some(r) = range_on_p {
            order_list.push(r);
        }
        for &f in &q.order_by {
            if on_subpath(&f) && !order_list.contains(&f) {
                order_list.push(f);
            }
        }
        let referenced_on_p: HashSet<FieldId> =
            q.referenced_fields().into_iter().filter(|f| on_subpath(f)).collect();

        let identifier = self.model.identifier(subpath.first());
        let mut hash_pool: Vec<FieldId> = eq_on_p.clone();
        if on_subpath(&identifier) && !hash_pool.contains(&identifier) {
            hash_pool.push(identifier);
        }

        for h in non_empty_subsets(&hash_pool) {
            let hash_fields: BTreeSet<FieldId> = h.iter().copied().collect();

            let mut order_fields: Vec<FieldId> =
                order_list.iter().copied().filter(|f| !hash_fields.contains(f)).collect();
            let extra_logical: BTreeSet<FieldId> = referenced_on_p
                .iter()
                .copied()
                .filter(|f| !hash_fields.contains(f) && !order_fields.contains(f))
                .collect();

            if !hash_fields.contains(&identifier) && !order_fields.contains(&identifier) {
                order_fields.push(identifier);
            }
            if subpath.len() > 1 {
                let last_id = self.model.identifier(subpath.last());
                if !hash_fields.contains(&last_id) && !order_fields.contains(&last_id) {
                    order_fields.push(last_id);
                }
            }

            let extra: BTreeSet<FieldId> = extra_logical
                .into_iter()
                .filter(|f| !order_fields.contains(f))
                .collect();

            if order_fields.is_empty() && extra.is_empty() {
                continue; // step 3: reject empty candidates
            }

            if let Ok(idx) = Index::new(self.model, hash_fields, order_fields, extra, subpath.clone()) {
                out.insert(idx.key(), idx);
            }
        }
    }

    fn materialized_view(&self, q: &Query) -> Option<Index> {
        let hash_fields: BTreeSet<FieldId> = q.equality_fields().into_iter().collect();
        let mut order_fields: Vec<FieldId> = Vec::new();
        if let Some(r) = q.range_field() {
            order_fields.push(r);
        }
        for &f in &q.order_by {
            if !hash_fields.contains(&f) && !order_fields.contains(&f) {
                order_fields.push(f);
            }
        }
        let identifier = self.model.identifier(q.path.first());
        if !hash_fields.contains(&identifier) && !order_fields.contains(&identifier) {
            order_fields.push(identifier);
        }
        if q.path.len() > 1 {
            let last_id = self.model.identifier(q.path.last());
            if !hash_fields.contains(&last_id) && !order_fields.contains(&last_id) {
                order_fields.push(last_id);
            }
        }
        let extra: BTreeSet<FieldId> = q
            .referenced_fields()
            .into_iter()
            .filter(|f| !hash_fields.contains(f) && !order_fields.contains(f))
            .collect();

        Index::new(self.model, hash_fields, order_fields, extra, q.path.clone()).ok()
    }

    fn simple_index(&self, entity: crate::model::EntityId) -> Option<Index> {
        let identifier = self.model.identifier(entity);
        let scalars = self.model.scalar_fields(entity);
        if scalars.is_empty() {
            return None;
        }
        let hash_fields = BTreeSet::from([identifier]);
        let extra: BTreeSet<FieldId> = scalars.into_iter().collect();
        Index::new(self.model, hash_fields, vec![], extra, Path::single(entity)).ok()
    }
}

fn non_empty_subsets(items: &[FieldId]) -> Vec<Vec<FieldId>> {
    let n = items.len();
    let mut subsets = Vec::with_capacity((1 << n).saturating_sub(1));
    for mask in 1..(1u32 << n) {
        let mut subset = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if mask & (1 << i) != 0 {
                subset.push(*item);
            }
        }
        subsets.push(subset);
    }
    subsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, ModelBuilder};
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

    fn user_tweet_model() -> Model {
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
            .entity(
                "Tweet",
                1000.0,
                vec![
                    ("TweetId", FieldKind::Id, 8),
                    ("Body", FieldKind::String(140), 140),
                    (
                        "User",
                        FieldKind::ForeignKey {
                            target: crate::model::EntityId(0),
                            many: false,
                        },
                        8,
                    ),
                ],
            )
            .unwrap()
            .build()
            .unwrap()
    }

    // S1: SELECT Username FROM User WHERE User.City = ?
    #[test]
    fn s1_candidate_set_includes_city_index_and_simple_index() {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let city = model.field_by_name(user, "City").unwrap();
        let username = model.field_by_name(user, "Username").unwrap();
        let id = model.identifier(user);

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
        let candidates = enumerator.indexes_for_query(&q).unwrap();

        let expected = Index::new(
            &model,
            BTreeSet::from([city]),
            vec![id],
            BTreeSet::from([username]),
            Path::single(user),
        )
        .unwrap();
        assert!(candidates.contains_key(&expected.key()));

        let simple = Index::new(
            &model,
            BTreeSet::from([id]),
            vec![],
            BTreeSet::from([city, username]),
            Path::single(user),
        )
        .unwrap();
        assert!(candidates.contains_key(&simple.key()));
    }

    // S2: SELECT Body FROM Tweet.User WHERE User.City = ?
    #[test]
    fn s2_candidate_set_includes_correct_orientation_and_excludes_bad_prefix() {
        let model = user_tweet_model();
        let user = model.entity_by_name("User").unwrap();
        let tweet = model.entity_by_name("Tweet").unwrap();
        let city = model.field_by_name(user, "City").unwrap();
        let body = model.field_by_name(tweet, "Body").unwrap();
        let user_id = model.identifier(user);
        let tweet_id = model.identifier(tweet);

        let path = Path::new(&model, vec![tweet, user]).unwrap();
        let q = Query::new(
            &model,
            vec![body],
            path,
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
        let candidates = enumerator.indexes_for_query(&q).unwrap();

        let expected_path = Path::new(&model, vec![user, tweet]).unwrap();
        let expected = Index::new(
            &model,
            BTreeSet::from([city]),
            vec![user_id, tweet_id],
            BTreeSet::from([body]),
            expected_path.clone(),
        )
        .unwrap();
        assert!(candidates.contains_key(&expected.key()));

        // H={City}, O=[TweetId] (missing UserId) violates the
        // identifier-of-P[0]-in-H-or-O invariant and must never be built.
        let bad = Index::new(
            &model,
            BTreeSet::from([city]),
            vec![tweet_id],
            BTreeSet::from([body]),
            expected_path,
        );
        assert!(bad.is_err());
    }

    // S3: workload with only an UPDATE and no queries yields no candidates.
    #[test]
    fn s3_mutation_only_workload_has_no_candidates() {
        use crate::statement::{Setting, Statement, Update};
        use crate::workload::Workload;

        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let city = model.field_by_name(user, "City").unwrap();
        let username = model.field_by_name(user, "Username").unwrap();

        let update = Statement::Update(
            Update::new(
                &model,
                user,
                Path::single(user),
                vec![Setting {
                    field: username,
                    value: Literal::Placeholder,
                }],
                vec![Condition {
                    field: city,
                    op: Operator::Eq,
                    value: Literal::Placeholder,
                }],
            )
            .unwrap(),
        );

        let workload = Workload::new(model.clone(), 1_000_000.0, "default")
            .with_statement(update, 1.0)
            .unwrap();

        let enumerator = IndexEnumerator::new(&model);
        let candidates = enumerator.indexes_for_workload(&workload).unwrap();
        assert!(candidates.is_empty());
    }

    // S4: the UPDATE plus a query on Username yields the City support index.
    #[test]
    fn s4_update_plus_query_yields_support_index() {
        use crate::statement::{Setting, Statement, Update};
        use crate::workload::Workload;

        let model = user_tweet_model();
        let user = model.entity_by_name("User").unwrap();
        let tweet = model.entity_by_name("Tweet").unwrap();
        let city = model.field_by_name(user, "City").unwrap();
        let username = model.field_by_name(user, "Username").unwrap();
        let body = model.field_by_name(tweet, "Body").unwrap();
        let id = model.identifier(user);

        let update = Statement::Update(
            Update::new(
                &model,
                user,
                Path::single(user),
                vec![Setting {
                    field: username,
                    value: Literal::Placeholder,
                }],
                vec![Condition {
                    field: city,
                    op: Operator::Eq,
                    value: Literal::Placeholder,
                }],
            )
            .unwrap(),
        );

        let path = Path::new(&model, vec![tweet, user]).unwrap();
        let query = Statement::Query(
            Query::new(
                &model,
                vec![body],
                path,
                vec![Condition {
                    field: username,
                    op: Operator::Eq,
                    value: Literal::Placeholder,
                }],
                vec![],
                None,
            )
            .unwrap(),
        );

        let workload = Workload::new(model.clone(), 1_000_000.0, "default")
            .with_statement(update, 1.0)
            .unwrap()
            .with_statement(query, 1.0)
            .unwrap();

        let enumerator = IndexEnumerator::new(&model);
        let candidates = enumerator.indexes_for_workload(&workload).unwrap();

        let support_index = Index::new(
            &model,
            BTreeSet::from([city]),
            vec![id],
            BTreeSet::from([username]),
            Path::single(user),
        )
        .unwrap();
        assert!(candidates.contains_key(&support_index.key()));
    }
}
