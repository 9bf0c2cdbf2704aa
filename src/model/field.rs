use serde::{Deserialize, Serialize};

use super::EntityId;

/// Arena handle for a [`Field`], unique across the whole [`Model`](super::Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub usize);

/// The scalar/relationship shape of a field. `Id` marks the single identifier
/// field every entity must carry; `ForeignKey` links to another entity with
/// a cardinality of one (`many: false`) or many (`many: true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Id,
    Integer,
    Float,
    String(usize),
    Date,
    ForeignKey { target: EntityId, many: bool },
}

impl FieldKind {
    pub fn is_foreign_key(&self) -> bool {
        matches!(self, FieldKind::ForeignKey { .. })
    }

    pub fn foreign_key_target(&self) -> Option<EntityId> {
        match self {
            FieldKind::ForeignKey { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// A typed attribute of an [`Entity`](super::Entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub entity: EntityId,
    pub name: String,
    pub kind: FieldKind,
    /// Bytes occupied by one value of this field, used by §3 size/cost formulas.
    pub size: usize,
}

impl Field {
    pub fn is_id(&self) -> bool {
        matches!(self.kind, FieldKind::Id)
    }

    pub fn is_foreign_key(&self) -> bool {
        self.kind.is_foreign_key()
    }
}
