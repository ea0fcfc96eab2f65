//! Core domain logic for Arbornote.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::definition::{
    AttributeSpec, BuiltinWidget, DefinitionError, DefinitionItem, ItemKind, LauncherAction,
};
pub use model::graph::{attribute_id, branch_id, Attribute, AttributeKind, Branch, Note};
pub use model::system_subtree::{
    system_subtree, DefaultSubtreeProvider, NoTranslation, SubtreeProvider, Translator,
    MOUNT_NOTE_ID, SYSTEM_ROOT_ID,
};
pub use repo::graph_repo::{
    GraphRepoError, GraphRepoResult, GraphRepository, NewNote, SqliteGraphRepository,
};
pub use service::subtree_service::{
    ReconcileError, ReconcileOptions, ReconcilerState, SubtreeCheckOutcome, SubtreeService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
