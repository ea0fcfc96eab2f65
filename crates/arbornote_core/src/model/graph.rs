//! Persisted note-graph records.
//!
//! # Responsibility
//! - Define the canonical Note / Branch / Attribute records.
//! - Derive structural identifiers shared by all replicas.
//! - Provide lifecycle helpers for soft-delete semantics.
//!
//! # Invariants
//! - `note_id` is stable and never reused for another note.
//! - `attribute_id` is `{note_id}_{kind initial}{name}`, so at most one
//!   attribute exists per `(note, kind, name)` triple.
//! - `branch_id` is `{parent_note_id}_{note_id}`, so at most one branch
//!   exists per parent/child pair.
//! - `is_deleted` is the source of truth for tombstone state.

use serde::{Deserialize, Serialize};

/// Attribute category: plain key/value label or a typed link to a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Label,
    Relation,
}

impl AttributeKind {
    /// Wire name stored in the `attributes.type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Relation => "relation",
        }
    }

    /// One-character initial embedded in derived attribute ids.
    pub fn initial(self) -> char {
        match self {
            Self::Label => 'l',
            Self::Relation => 'r',
        }
    }

    /// Parses the persisted wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "label" => Some(Self::Label),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }
}

/// Derives the stable attribute identifier for a `(note, kind, name)` triple.
///
/// Two replicas deriving ids for the same triple always produce the same
/// string, which is what makes attribute reconciliation convergent without
/// coordination.
pub fn attribute_id(note_id: &str, kind: AttributeKind, name: &str) -> String {
    format!("{note_id}_{}{name}", kind.initial())
}

/// Derives the stable branch identifier for a parent/child edge.
pub fn branch_id(parent_note_id: &str, note_id: &str) -> String {
    format!("{parent_note_id}_{note_id}")
}

/// Persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable note id. Caller-chosen for namespace notes, generated otherwise.
    pub note_id: String,
    pub title: String,
    /// Serialized as `type` to match the storage schema naming.
    #[serde(rename = "type")]
    pub note_type: String,
    pub content: String,
    /// Soft delete tombstone.
    pub is_deleted: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// Persisted parent→child edge. A note may carry several branches; only the
/// ones whose parent lies inside the reserved namespace are ever reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub branch_id: String,
    pub note_id: String,
    pub parent_note_id: String,
    pub note_position: i64,
    pub is_expanded: bool,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Persisted key-value attribute owned by one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_id: String,
    pub note_id: String,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    pub name: String,
    pub value: String,
    pub is_inheritable: bool,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Attribute {
    /// Creates an attribute with its derived identity.
    ///
    /// # Invariants
    /// - `attribute_id` is always derived, never assigned.
    pub fn new(
        note_id: impl Into<String>,
        kind: AttributeKind,
        name: impl Into<String>,
        value: impl Into<String>,
        is_inheritable: bool,
    ) -> Self {
        let note_id = note_id.into();
        let name = name.into();
        Self {
            attribute_id: attribute_id(&note_id, kind, &name),
            note_id,
            kind,
            name,
            value: value.into(),
            is_inheritable,
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

impl Branch {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

impl Note {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::{attribute_id, branch_id, Attribute, AttributeKind};

    #[test]
    fn attribute_id_embeds_kind_initial() {
        assert_eq!(
            attribute_id("_lbSearch", AttributeKind::Label, "iconClass"),
            "_lbSearch_liconClass"
        );
        assert_eq!(
            attribute_id("_lbSearch", AttributeKind::Relation, "template"),
            "_lbSearch_rtemplate"
        );
    }

    #[test]
    fn attribute_id_is_deterministic_across_constructions() {
        let first = Attribute::new("_system", AttributeKind::Label, "iconClass", "bx bx-cog", false);
        let second =
            Attribute::new("_system", AttributeKind::Label, "iconClass", "bx bx-hide", true);
        assert_eq!(first.attribute_id, second.attribute_id);
    }

    #[test]
    fn branch_id_joins_parent_and_child() {
        assert_eq!(branch_id("root", "_system"), "root__system");
    }

    #[test]
    fn attribute_kind_round_trips_wire_names() {
        for kind in [AttributeKind::Label, AttributeKind::Relation] {
            assert_eq!(AttributeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AttributeKind::parse("unknown"), None);
    }
}
