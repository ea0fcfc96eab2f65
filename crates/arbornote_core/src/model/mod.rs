//! Domain model for the Arbornote note graph.

pub mod definition;
pub mod graph;
pub mod namespace;
pub mod system_subtree;

pub use definition::{
    AttributeSpec, BuiltinWidget, DefinitionError, DefinitionItem, ItemKind, LauncherAction,
};
pub use graph::{attribute_id, branch_id, Attribute, AttributeKind, Branch, Note};
pub use namespace::{in_namespace, NamespacePolicy, MAX_NOTE_POSITION, NAMESPACE_SENTINEL};
pub use system_subtree::{system_subtree, NoTranslation, SubtreeProvider, Translator};
