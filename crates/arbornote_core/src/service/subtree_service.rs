//! Declarative subtree reconciliation engine.
//!
//! # Responsibility
//! - Converge the live note graph to a static definition tree: create what
//!   is missing, correct what drifted, prune what the definition no longer
//!   implies.
//! - Gate the whole pass behind the storage schema version.
//!
//! # Invariants
//! - Reconciliation is idempotent: a second pass over unchanged inputs
//!   performs no further mutations.
//! - Destructive operations (branch/attribute tombstoning) only ever touch
//!   entities whose relevant id lies inside the reserved namespace.
//! - Items are reconciled depth-first, parent before children, so a parent
//!   note exists before any child branch references it.
//! - Definition flaws abort the run; persisted-state drift never does.

use crate::model::definition::{
    derived_attributes, expected_parent_ids, validate_item, AttributeSpec, DefinitionError,
    DefinitionItem, DOC_NAME_LABEL, ICON_LABEL,
};
use crate::model::graph::{attribute_id, Attribute};
use crate::model::namespace::{in_namespace, policy_for};
use crate::model::system_subtree::{system_subtree, SubtreeProvider, Translator, MOUNT_NOTE_ID};
use crate::repo::graph_repo::{GraphRepoError, GraphRepository, NewNote};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Options for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Restore every declared title, not only the always-restored
    /// sub-namespaces.
    pub restore_names: bool,
}

/// Result of one `check_subtree` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeCheckOutcome {
    /// The definition was reconciled against the live graph.
    Reconciled,
    /// The schema is not current; the pass was deferred.
    SkippedPendingMigrations,
}

/// Errors from subtree reconciliation.
#[derive(Debug)]
pub enum ReconcileError {
    /// Fatal flaw in the static definition tree.
    Definition(DefinitionError),
    /// Persistence-layer failure; the ambient transaction is expected to
    /// roll back, so retrying the whole call is safe.
    Repo(GraphRepoError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Definition(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Definition(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<DefinitionError> for ReconcileError {
    fn from(value: DefinitionError) -> Self {
        Self::Definition(value)
    }
}

impl From<GraphRepoError> for ReconcileError {
    fn from(value: GraphRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Caller-owned cache of the resolved Definition Model.
///
/// Building the model splices in provider sub-trees, so it is done once and
/// reused until the caller forces a rebuild or invalidates the cache.
#[derive(Default)]
pub struct ReconcilerState {
    cached: Option<DefinitionItem>,
}

impl ReconcilerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached model, rebuilding it first when forced or empty.
    pub fn rebuild(
        &mut self,
        force: bool,
        provider: &dyn SubtreeProvider,
        translator: &dyn Translator,
    ) -> &DefinitionItem {
        if force {
            self.cached = None;
        }
        self.cached
            .get_or_insert_with(|| system_subtree(provider, translator))
    }

    /// Drops the cached model so the next rebuild re-splices providers.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

/// Subtree reconciliation facade over a graph repository.
pub struct SubtreeService<R: GraphRepository> {
    repo: R,
}

impl<R: GraphRepository> SubtreeService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Entry point: ensures the system subtree matches its definition.
    ///
    /// Skips entirely while schema migrations are pending, unless `force`.
    /// The resolved model is cached in `state`; `force` also rebuilds it.
    pub fn check_subtree(
        &self,
        state: &mut ReconcilerState,
        force: bool,
        opts: ReconcileOptions,
        provider: &dyn SubtreeProvider,
        translator: &dyn Translator,
    ) -> Result<SubtreeCheckOutcome, ReconcileError> {
        if !force && !self.repo.schema_is_current()? {
            info!("event=subtree_check module=subtree status=skipped reason=pending_migrations");
            return Ok(SubtreeCheckOutcome::SkippedPendingMigrations);
        }

        let root = state.rebuild(force, provider, translator);
        self.reconcile(MOUNT_NOTE_ID, root, opts)?;
        info!("event=subtree_check module=subtree status=ok root_id={}", root.id);
        Ok(SubtreeCheckOutcome::Reconciled)
    }

    /// Reconciles one definition tree under the given parent note.
    ///
    /// Idempotent: N calls with the same inputs leave the same persisted
    /// state as one call, absent out-of-band mutation between them.
    pub fn reconcile(
        &self,
        parent_note_id: &str,
        item: &DefinitionItem,
        opts: ReconcileOptions,
    ) -> Result<(), ReconcileError> {
        self.reconcile_item(item, parent_note_id, item, opts)
    }

    fn reconcile_item(
        &self,
        model_root: &DefinitionItem,
        parent_note_id: &str,
        item: &DefinitionItem,
        opts: ReconcileOptions,
    ) -> Result<(), ReconcileError> {
        // Definition flaws are fatal before any side effect on this item.
        validate_item(item)?;
        let attribute_specs = derived_attributes(item)?;

        let policy = policy_for(&item.id);
        let enforce_branches =
            item.enforce_branches || policy.is_some_and(|p| p.enforce_branches);

        let (mut note, branch) = match self.repo.get_note(&item.id, false)? {
            None => {
                // The namespace is privileged: creation bypasses normal
                // parent restrictions.
                let (note, branch) = self.repo.create_note(&NewNote {
                    note_id: Some(item.id.clone()),
                    parent_note_id: parent_note_id.to_string(),
                    title: item.title.clone(),
                    note_type: item.kind.note_type().to_string(),
                    content: item.content.clone().unwrap_or_default(),
                    note_position: item.note_position,
                    is_expanded: item.is_expanded,
                    ignore_forbidden_parents: true,
                })?;
                info!(
                    "event=subtree_note_created module=subtree note_id={} parent_id={parent_note_id}",
                    note.note_id
                );
                (note, Some(branch))
            }
            Some(mut note) => {
                if let Some(content) = &item.content {
                    if &note.content != content {
                        note.content = content.clone();
                        self.repo.save_note(&note)?;
                        info!(
                            "event=subtree_drift_corrected module=subtree note_id={} field=content",
                            note.note_id
                        );
                    }
                }

                let branches = self.repo.parent_branches(&item.id, false)?;
                let mut branch = branches
                    .iter()
                    .find(|branch| branch.parent_note_id == parent_note_id)
                    .cloned();

                if enforce_branches {
                    if branch.is_none() {
                        branch = Some(self.repo.create_branch(
                            &item.id,
                            parent_note_id,
                            item.note_position.unwrap_or(0),
                            item.is_expanded,
                        )?);
                        info!(
                            "event=subtree_drift_corrected module=subtree note_id={} field=missing_branch parent_id={parent_note_id}",
                            item.id
                        );
                    }

                    // A live branch is stray when the model implies no such
                    // placement. Parents outside the namespace are user
                    // organization and are never touched.
                    let expected = expected_parent_ids(model_root, &item.id);
                    for live in &branches {
                        if live.parent_note_id == parent_note_id {
                            continue;
                        }
                        if expected.contains(&live.parent_note_id) {
                            continue;
                        }
                        if !in_namespace(&live.parent_note_id) {
                            continue;
                        }
                        self.repo.mark_branch_deleted(&live.branch_id)?;
                        info!(
                            "event=subtree_drift_corrected module=subtree note_id={} field=stray_branch parent_id={}",
                            item.id, live.parent_note_id
                        );
                    }
                }

                (note, branch)
            }
        };

        self.reconcile_attributes(item, &attribute_specs)?;

        let restore_name = opts.restore_names || policy.is_some_and(|p| p.restore_names);
        let mut note_dirty = false;
        if restore_name && note.title != item.title {
            note.title = item.title.clone();
            note_dirty = true;
        }
        let declared_type = item.kind.note_type();
        if note.note_type != declared_type {
            note.note_type = declared_type.to_string();
            note_dirty = true;
        }
        if note_dirty {
            self.repo.save_note(&note)?;
            info!(
                "event=subtree_drift_corrected module=subtree note_id={} field=note_fields",
                note.note_id
            );
        }

        if let Some(mut branch) = branch {
            let mut branch_dirty = false;
            if let Some(position) = item.note_position {
                if branch.note_position != position {
                    branch.note_position = position;
                    branch_dirty = true;
                }
            }
            if branch.is_expanded != item.is_expanded {
                branch.is_expanded = item.is_expanded;
                branch_dirty = true;
            }
            if branch_dirty {
                self.repo.save_branch(&branch)?;
                info!(
                    "event=subtree_drift_corrected module=subtree note_id={} field=branch_fields",
                    item.id
                );
            }
        }

        for child in &item.children {
            self.reconcile_item(model_root, &item.id, child, opts)?;
        }

        Ok(())
    }

    fn reconcile_attributes(
        &self,
        item: &DefinitionItem,
        specs: &[AttributeSpec],
    ) -> Result<(), ReconcileError> {
        let live = self.repo.note_attributes(&item.id, false)?;

        if item.enforce_attributes {
            for attribute in &live {
                if !specs.iter().any(|spec| spec.name == attribute.name) {
                    self.repo.mark_attribute_deleted(&attribute.attribute_id)?;
                    info!(
                        "event=subtree_drift_corrected module=subtree note_id={} field=stray_attribute name={}",
                        item.id, attribute.name
                    );
                }
            }
        }

        for spec in specs {
            let derived_id = attribute_id(&item.id, spec.kind, &spec.name);
            match live
                .iter()
                .find(|attribute| attribute.attribute_id == derived_id)
            {
                None => {
                    self.repo.create_attribute(&Attribute::new(
                        item.id.clone(),
                        spec.kind,
                        spec.name.clone(),
                        spec.value.clone(),
                        spec.is_inheritable,
                    ))?;
                }
                Some(existing) => {
                    // Only the authoritative set overwrites live values, so
                    // user customization of ordinary declared attributes
                    // survives repeated passes.
                    if authoritative_to_overwrite(&item.id, &spec.name)
                        && existing.value != spec.value
                    {
                        let mut updated = existing.clone();
                        updated.value = spec.value.clone();
                        self.repo.save_attribute(&updated)?;
                        info!(
                            "event=subtree_drift_corrected module=subtree note_id={} field=attribute_value name={}",
                            item.id, spec.name
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

/// The small set of attributes whose live value the definition always wins.
fn authoritative_to_overwrite(note_id: &str, attribute_name: &str) -> bool {
    if attribute_name == DOC_NAME_LABEL {
        return true;
    }
    attribute_name == ICON_LABEL && policy_for(note_id).is_some_and(|p| p.authoritative_icon)
}

#[cfg(test)]
mod tests {
    use super::authoritative_to_overwrite;

    #[test]
    fn doc_name_label_is_authoritative_everywhere() {
        assert!(authoritative_to_overwrite("_help_intro", "docName"));
        assert!(authoritative_to_overwrite("_system", "docName"));
    }

    #[test]
    fn icon_label_is_authoritative_only_on_launcher_bar() {
        assert!(authoritative_to_overwrite("_lbSearch", "iconClass"));
        assert!(!authoritative_to_overwrite("_search", "iconClass"));
        assert!(!authoritative_to_overwrite("_help_intro", "iconClass"));
    }

    #[test]
    fn ordinary_attributes_are_not_authoritative() {
        assert!(!authoritative_to_overwrite("_lbSearch", "command"));
        assert!(!authoritative_to_overwrite("_system", "color"));
    }
}
