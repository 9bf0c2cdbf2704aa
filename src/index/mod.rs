//! Indexes (column families), §3: a hash/order/extra field layout over a
//! path, with derived size and a stable identity key. Indexes are
//! first-class immutable values produced by the [`enumerator`](crate::enumerator)
//! and consumed by the [`planner`](crate::planner) and
//! [`milp`](crate::milp).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::error::{AdvisorError, Result};
use crate::model::{FieldId, Model, Path};

/// `(hash_fields, order_fields, extra, path)` — a materialized view over a
/// path. `hash_fields` and `extra` are unordered sets; `order_fields` is a
/// significant, deduplicated list (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub hash_fields: BTreeSet<FieldId>,
    pub order_fields: Vec<FieldId>,
    pub extra: BTreeSet<FieldId>,
    pub path: Path,
}

impl Index {
    /// Validates the invariants of §3 and constructs an `Index`.
    pub fn new(
        model: &Model,
        hash_fields: BTreeSet<FieldId>,
        order_fields: Vec<FieldId>,
        extra: BTreeSet<FieldId>,
        path: Path,
    ) -> Result<Index> {
        if hash_fields.is_empty() {
            return Err(AdvisorError::InvalidIndex("hash_fields must not be empty".into()));
        }
        if order_fields.is_empty() && extra.is_empty() {
            return Err(AdvisorError::InvalidIndex(
                "an index needs at least one of order_fields or extra".into(),
            ));
        }

        let all_on_path = |f: &FieldId| path.contains(model.field(*f).entity);
        if !hash_fields.iter().all(all_on_path)
            || !order_fields.iter().all(all_on_path)
            || !extra.iter().all(all_on_path)
        {
            return Err(AdvisorError::InvalidIndex(
                "every field of an index must belong to an entity on its path".into(),
            ));
        }

        if !hash_fields.iter().any(|f| model.field(*f).entity == path.first()) {
            return Err(AdvisorError::InvalidIndex(
                "hash_fields must include at least one field of the path's first entity".into(),
            ));
        }
        if !extra.is_empty() && !extra.iter().any(|f| model.field(*f).entity == path.last()) {
            return Err(AdvisorError::InvalidIndex(
                "extra must include at least one field of the path's last entity".into(),
            ));
        }

        let identifier = model.identifier(path.first());
        if !hash_fields.contains(&identifier) && !order_fields.contains(&identifier) {
            return Err(AdvisorError::InvalidIndex(format!(
                "the identifier of {} must be present in hash_fields or order_fields",
                model.entity(path.first()).name
            )));
        }

        // A path longer than one hop carries extra/select data scoped to its
        // last entity; without that entity's identifier in the clustering
        // key, rows for distinct last-entity instances would collide.
        if path.len() > 1 && !extra.is_empty() {
            let last_id = model.identifier(path.last());
            if !hash_fields.contains(&last_id) && !order_fields.contains(&last_id) {
                return Err(AdvisorError::InvalidIndex(format!(
                    "the identifier of {} must be present in hash_fields or order_fields",
                    model.entity(path.last()).name
                )));
            }
        }

        Ok(Index {
            hash_fields,
            order_fields,
            extra,
            path,
        })
    }

    /// All fields covered by this index.
    pub fn all_fields(&self) -> BTreeSet<FieldId> {
        let mut fields: BTreeSet<FieldId> = self.hash_fields.clone();
        fields.extend(self.order_fields.iter().copied());
        fields.extend(self.extra.iter().copied());
        fields
    }

    /// Bytes per row.
    pub fn entry_size(&self, model: &Model) -> usize {
        self.all_fields().iter().map(|f| model.field(*f).size).sum()
    }

    /// The per-hop join-selectivity ratio along this index's path (§3, §4.2):
    /// the factor by which traversing from `path.first()` to `path.last()`
    /// multiplies row count. A hop whose foreign key field lives on the
    /// source entity is many-to-one and contributes a ratio of 1 (each source
    /// row still maps to exactly one target row); a hop whose foreign key
    /// lives on the target entity is one-to-many and contributes
    /// `count(target)/count(source)`.
    pub fn join_selectivity(&self, model: &Model) -> f64 {
        let mut ratio = 1.0;
        for pair in self.path.entities().windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let fk = model
                .foreign_key_between(a, b)
                .expect("path hops are verified FK-linked at construction");
            if model.field(fk).entity != a {
                ratio *= model.entity(b).count / model.entity(a).count;
            }
        }
        ratio
    }

    /// Expected number of rows: `path.first()`'s count scaled by the
    /// cumulative join-selectivity ratio to `path.last()` (§3).
    pub fn expected_entries(&self, model: &Model) -> f64 {
        model.entity(self.path.first()).count * self.join_selectivity(model)
    }

    /// `entry_size * expected_entries`, used by the storage constraint (§4.5 C4).
    pub fn size(&self, model: &Model) -> f64 {
        self.entry_size(model) as f64 * self.expected_entries(model)
    }

    /// A stable hash-derived identity: two indexes with equal
    /// `(hash_fields, order_fields, extra, path)` share the same key (§3, S6).
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        for f in &self.hash_fields {
            hasher.update(f.0.to_le_bytes());
        }
        hasher.update(b"|");
        for f in &self.order_fields {
            hasher.update(f.0.to_le_bytes());
        }
        hasher.update(b"|");
        for f in &self.extra {
            hasher.update(f.0.to_le_bytes());
        }
        hasher.update(b"|");
        for e in self.path.entities() {
            hasher.update(e.0.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Whether this index can serve `eq_fields` as a hash lookup.
    pub fn satisfies_hash(&self, eq_fields: &BTreeSet<FieldId>) -> bool {
        self.hash_fields.is_subset(eq_fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, ModelBuilder};

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
    fn rejects_empty_hash_fields() {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let path = Path::single(user);
        let username = model.field_by_name(user, "Username").unwrap();
        let result = Index::new(
            &model,
            BTreeSet::new(),
            vec![],
            BTreeSet::from([username]),
            path,
        );
        assert!(matches!(result, Err(AdvisorError::InvalidIndex(_))));
    }

    #[test]
    fn identical_layout_shares_key() {
        let model = user_model();
        let user = model.entity_by_name("User").unwrap();
        let city = model.field_by_name(user, "City").unwrap();
        let id = model.identifier(user);
        let username = model.field_by_name(user, "Username").unwrap();
        let path = Path::single(user);

        let a = Index::new(
            &model,
            BTreeSet::from([city]),
            vec![id],
            BTreeSet::from([username]),
            path.clone(),
        )
        .unwrap();
        let b = Index::new(
            &model,
            BTreeSet::from([city]),
            vec![id],
            BTreeSet::from([username]),
            path,
        )
        .unwrap();
        assert_eq!(a.key(), b.key());
    }
}
