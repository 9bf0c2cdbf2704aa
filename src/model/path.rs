use serde::{Deserialize, Serialize};

use super::{EntityId, Model};
use crate::error::{AdvisorError, Result};

/// A non-empty ordered sequence of entities linked end-to-end by foreign
/// keys (in either direction). Paths are the backbone of every query and
/// every index (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<EntityId>);

impl Path {
    /// Builds a path from a sequence of entities, verifying that every
    /// adjacent pair is connected by a foreign key.
    pub fn new(model: &Model, entities: Vec<EntityId>) -> Result<Path> {
        if entities.is_empty() {
            return Err(AdvisorError::InvalidStatement(
                "path must contain at least one entity".into(),
            ));
        }
        for pair in entities.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if model.foreign_key_between(a, b).is_none() {
                return Err(AdvisorError::InvalidStatement(format!(
                    "no foreign key links {} and {}",
                    model.entity(a).name,
                    model.entity(b).name
                )));
            }
        }
        Ok(Path(entities))
    }

    pub fn single(entity: EntityId) -> Path {
        Path(vec![entity])
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.0
    }

    pub fn first(&self) -> EntityId {
        self.0[0]
    }

    pub fn last(&self) -> EntityId {
        *self.0.last().unwrap()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.0.contains(&entity)
    }

    pub fn position(&self, entity: EntityId) -> Option<usize> {
        self.0.iter().position(|&e| e == entity)
    }

    /// Every contiguous subpath `P'` of `self`, longest first then by start
    /// index, as required by IndexEnumerator step 1 (§4.1).
    pub fn contiguous_subpaths(&self) -> Vec<Path> {
        let n = self.0.len();
        let mut subpaths = Vec::new();
        for len in (1..=n).rev() {
            for start in 0..=(n - len) {
                subpaths.push(Path(self.0[start..start + len].to_vec()));
            }
        }
        subpaths
    }

    /// Splices `self` onto `other` at `other`'s last entity, used when a
    /// support query's path must continue from an index's path to a
    /// mutating statement's target entity (§4.3).
    pub fn splice(&self, other: &Path) -> Path {
        let mut entities = self.0.clone();
        entities.extend(other.0.iter().skip(1));
        Path(entities)
    }
}
