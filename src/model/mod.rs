//! The conceptual entity-relationship model (§3): entities, fields, foreign
//! keys, and the paths that stitch them together. Built once through
//! [`ModelBuilder`] and frozen; every downstream component (statements,
//! indexes, the planner) borrows it read-only.

mod field;
mod path;

pub use field::{Field, FieldId, FieldKind};
pub use path::Path;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AdvisorError, Result};

/// Arena handle for an [`Entity`], an index into [`Model::entities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

/// A named record type with a positive expected cardinality (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub count: f64,
    pub fields: Vec<FieldId>,
}

impl Entity {
    pub fn field_names<'m>(&self, model: &'m Model) -> impl Iterator<Item = &'m str> {
        self.fields.iter().map(move |id| model.field(*id).name.as_str())
    }
}

/// The frozen conceptual model: entities, their fields, and the foreign
/// keys between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    entities: Vec<Entity>,
    fields: Vec<Field>,
    name_to_entity: HashMap<String, EntityId>,
}

impl Model {
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_by_name(&self, name: &str) -> Result<EntityId> {
        self.name_to_entity
            .get(name)
            .copied()
            .ok_or_else(|| AdvisorError::EntityNotFound(name.to_string()))
    }

    pub fn field_by_name(&self, entity: EntityId, name: &str) -> Result<FieldId> {
        self.entity(entity)
            .fields
            .iter()
            .copied()
            .find(|&fid| self.field(fid).name == name)
            .ok_or_else(|| {
                AdvisorError::FieldNotFound(format!("{}.{}", self.entity(entity).name, name))
            })
    }

    pub fn identifier(&self, entity: EntityId) -> FieldId {
        self.entity(entity)
            .fields
            .iter()
            .copied()
            .find(|&fid| self.field(fid).is_id())
            .expect("every entity has exactly one identifier field (invariant enforced at build)")
    }

    /// The scalar (non-foreign-key, non-id) fields of an entity, used to
    /// build the "simple index" of §4.1 step 5.
    pub fn scalar_fields(&self, entity: EntityId) -> Vec<FieldId> {
        self.entity(entity)
            .fields
            .iter()
            .copied()
            .filter(|&fid| {
                let f = self.field(fid);
                !f.is_id() && !f.is_foreign_key()
            })
            .collect()
    }

    /// Whether a foreign key links `a` and `b`, in either direction.
    pub fn foreign_key_between(&self, a: EntityId, b: EntityId) -> Option<FieldId> {
        self.entity(a)
            .fields
            .iter()
            .copied()
            .find(|&fid| self.field(fid).kind.foreign_key_target() == Some(b))
            .or_else(|| {
                self.entity(b)
                    .fields
                    .iter()
                    .copied()
                    .find(|&fid| self.field(fid).kind.foreign_key_target() == Some(a))
            })
    }
}

/// Declares an entity and its fields before wiring up foreign keys, then
/// produces an immutable [`Model`] (mirrors the teacher's
/// `Catalog::create_table` builder-then-freeze shape).
#[derive(Default)]
pub struct ModelBuilder {
    entities: Vec<Entity>,
    fields: Vec<Field>,
    name_to_entity: HashMap<String, EntityId>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity named `name` with expected cardinality `count`.
    /// `fields` is `(name, kind, size)`; exactly one must be `FieldKind::Id`.
    pub fn entity(
        mut self,
        name: &str,
        count: f64,
        fields: Vec<(&str, FieldKind, usize)>,
    ) -> Result<Self> {
        if self.name_to_entity.contains_key(name) {
            return Err(AdvisorError::InvalidWorkload(format!(
                "duplicate entity {name}"
            )));
        }
        if count <= 0.0 {
            return Err(AdvisorError::InvalidWorkload(format!(
                "entity {name} must have a positive count"
            )));
        }

        let entity_id = EntityId(self.entities.len());
        let mut field_ids = Vec::with_capacity(fields.len());
        let mut seen_names = std::collections::HashSet::new();
        let mut id_count = 0usize;

        for (fname, kind, size) in fields {
            if !seen_names.insert(fname.to_string()) {
                return Err(AdvisorError::InvalidWorkload(format!(
                    "duplicate field {name}.{fname}"
                )));
            }
            if matches!(kind, FieldKind::Id) {
                id_count += 1;
            }
            let fid = FieldId(self.fields.len());
            self.fields.push(Field {
                id: fid,
                entity: entity_id,
                name: fname.to_string(),
                kind,
                size,
            });
            field_ids.push(fid);
        }

        if id_count != 1 {
            return Err(AdvisorError::InvalidWorkload(format!(
                "entity {name} must declare exactly one identifier field, found {id_count}"
            )));
        }

        self.entities.push(Entity {
            id: entity_id,
            name: name.to_string(),
            count,
            fields: field_ids,
        });
        self.name_to_entity.insert(name.to_string(), entity_id);
        Ok(self)
    }

    /// Validates that every `ForeignKey` field's target entity exists and
    /// freezes the model.
    pub fn build(self) -> Result<Model> {
        for field in &self.fields {
            if let FieldKind::ForeignKey { target, .. } = &field.kind {
                if target.0 >= self.entities.len() {
                    return Err(AdvisorError::InvalidWorkload(format!(
                        "foreign key {}.{} targets an unknown entity",
                        self.entities[field.entity.0].name, field.name
                    )));
                }
            }
        }
        Ok(Model {
            entities: self.entities,
            fields: self.fields,
            name_to_entity: self.name_to_entity,
        })
    }
}
