//! Declarative definition model for reconciled subtrees.
//!
//! # Responsibility
//! - Define the immutable item tree the reconciler converges the graph to.
//! - Validate items before any persistence side effect.
//! - Expand per-item implicit attributes (icons, launcher behavior).
//!
//! # Invariants
//! - Every item id starts with the namespace sentinel.
//! - A launcher item declares exactly one action; an action-less launcher is
//!   a definition bug and is rejected up front.
//! - Item kinds form a closed set; adding one forces every match site to be
//!   updated.

use crate::model::namespace::is_valid_definition_id;
use crate::model::AttributeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Label carrying a note icon.
pub const ICON_LABEL: &str = "iconClass";
/// Structural bookkeeping label tying a generated doc to its source page.
pub const DOC_NAME_LABEL: &str = "docName";
/// Label naming the action a command launcher triggers.
pub const COMMAND_LABEL: &str = "command";
/// Label naming the widget a widget launcher renders.
pub const BUILTIN_WIDGET_LABEL: &str = "builtinWidget";
pub const BASE_SIZE_LABEL: &str = "baseSize";
pub const GROWTH_FACTOR_LABEL: &str = "growthFactor";
/// Relation pointing at the template a launcher instantiates.
pub const TEMPLATE_RELATION: &str = "template";
/// Relation pointing at the note a note launcher navigates to.
pub const TARGET_RELATION: &str = "target";

/// Template notes the launcher synthesis links to.
pub const TPL_COMMAND_LAUNCHER: &str = "_lbTplCommand";
pub const TPL_WIDGET_LAUNCHER: &str = "_lbTplWidget";
pub const TPL_SPACER_LAUNCHER: &str = "_lbTplSpacer";
pub const TPL_NOTE_LAUNCHER: &str = "_lbTplNote";

const SPACER_DEFAULT_BASE_SIZE: i64 = 40;
const SPACER_DEFAULT_GROWTH_FACTOR: i64 = 0;

/// Declared attribute on a definition item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSpec {
    pub kind: AttributeKind,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_inheritable: bool,
}

impl AttributeSpec {
    pub fn label(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: AttributeKind::Label,
            name: name.into(),
            value: value.into(),
            is_inheritable: false,
        }
    }

    pub fn relation(name: impl Into<String>, target_note_id: impl Into<String>) -> Self {
        Self {
            kind: AttributeKind::Relation,
            name: name.into(),
            value: target_note_id.into(),
            is_inheritable: false,
        }
    }

    pub fn inheritable(mut self) -> Self {
        self.is_inheritable = true;
        self
    }
}

/// Closed set of widgets a widget launcher may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuiltinWidget {
    Calendar,
    Spacer,
    Bookmarks,
    SyncStatus,
}

impl BuiltinWidget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Spacer => "spacer",
            Self::Bookmarks => "bookmarks",
            Self::SyncStatus => "syncStatus",
        }
    }
}

/// The one behavior a launcher item declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LauncherAction {
    /// Triggers a registered UI command by name.
    Command(String),
    /// Renders a built-in widget; spacers carry layout sizing.
    #[serde(rename_all = "camelCase")]
    Widget {
        widget: BuiltinWidget,
        #[serde(default)]
        base_size: Option<i64>,
        #[serde(default)]
        growth_factor: Option<i64>,
    },
    /// Navigates to an existing note.
    TargetNote(String),
}

impl LauncherAction {
    pub fn widget(widget: BuiltinWidget) -> Self {
        Self::Widget {
            widget,
            base_size: None,
            growth_factor: None,
        }
    }

    pub fn spacer(base_size: i64, growth_factor: i64) -> Self {
        Self::Widget {
            widget: BuiltinWidget::Spacer,
            base_size: Some(base_size),
            growth_factor: Some(growth_factor),
        }
    }
}

/// Closed set of item kinds understood by the reconciler.
///
/// The launcher action stays optional so that a definition bug (a launcher
/// declaring no behavior) is representable and rejected by validation rather
/// than silently unconstructible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Doc,
    Book,
    Search,
    NoteMap,
    ContentWidget,
    Launcher(Option<LauncherAction>),
}

impl ItemKind {
    /// Note type persisted for this kind.
    pub fn note_type(&self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Book => "book",
            Self::Search => "search",
            Self::NoteMap => "noteMap",
            Self::ContentWidget => "contentWidget",
            Self::Launcher(_) => "launcher",
        }
    }
}

/// One node of the declarative definition tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub note_position: Option<i64>,
    #[serde(default)]
    pub is_expanded: bool,
    /// Live attributes not named by this item are pruned.
    #[serde(default)]
    pub enforce_attributes: bool,
    /// Live in-namespace branches not implied by the model are pruned.
    #[serde(default)]
    pub enforce_branches: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub children: Vec<DefinitionItem>,
}

impl DefinitionItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            icon: None,
            content: None,
            note_position: None,
            is_expanded: false,
            enforce_attributes: false,
            enforce_branches: false,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn doc(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, ItemKind::Doc, title)
    }

    pub fn book(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, ItemKind::Book, title)
    }

    pub fn content_widget(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, ItemKind::ContentWidget, title)
    }

    pub fn note_map(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, ItemKind::NoteMap, title)
    }

    pub fn launcher(
        id: impl Into<String>,
        title: impl Into<String>,
        action: LauncherAction,
    ) -> Self {
        Self::new(id, ItemKind::Launcher(Some(action)), title)
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    pub fn with_child(mut self, child: DefinitionItem) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<DefinitionItem>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn at_position(mut self, note_position: i64) -> Self {
        self.note_position = Some(note_position);
        self
    }

    pub fn expanded(mut self) -> Self {
        self.is_expanded = true;
        self
    }

    pub fn enforcing_attributes(mut self) -> Self {
        self.enforce_attributes = true;
        self
    }

    pub fn enforcing_branches(mut self) -> Self {
        self.enforce_branches = true;
        self
    }
}

/// Fatal flaws in the static definition tree.
///
/// These are programmer errors, not runtime drift: the whole reconciliation
/// run aborts, and whatever completed before the error persists (re-running
/// after the fix is idempotent and completes the rest).
#[derive(Debug, PartialEq, Eq)]
pub enum DefinitionError {
    /// Id is empty, outside the reserved namespace, or uses a bad charset.
    InvalidId { id: String },
    /// Title is blank after trim.
    EmptyTitle { id: String },
    /// A launcher item declares no behavior.
    LauncherMissingAction { id: String },
}

impl Display for DefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId { id } => {
                write!(f, "definition item id `{id}` is not a valid namespace id")
            }
            Self::EmptyTitle { id } => {
                write!(f, "definition item `{id}` has a blank title")
            }
            Self::LauncherMissingAction { id } => write!(
                f,
                "launcher item `{id}` declares none of command/widget/target behaviors"
            ),
        }
    }
}

impl Error for DefinitionError {}

/// Validates one item's mandatory fields before any side effect.
pub fn validate_item(item: &DefinitionItem) -> Result<(), DefinitionError> {
    if !is_valid_definition_id(&item.id) {
        return Err(DefinitionError::InvalidId {
            id: item.id.clone(),
        });
    }
    if item.title.trim().is_empty() {
        return Err(DefinitionError::EmptyTitle {
            id: item.id.clone(),
        });
    }
    if matches!(item.kind, ItemKind::Launcher(None)) {
        return Err(DefinitionError::LauncherMissingAction {
            id: item.id.clone(),
        });
    }
    Ok(())
}

/// Returns the full attribute list the item implies: declared specs, the
/// synthesized icon label, and launcher behavior expansion.
pub fn derived_attributes(item: &DefinitionItem) -> Result<Vec<AttributeSpec>, DefinitionError> {
    let mut attributes = item.attributes.clone();

    if let Some(icon) = &item.icon {
        attributes.push(AttributeSpec::label(ICON_LABEL, icon.clone()));
    }

    if let ItemKind::Launcher(action) = &item.kind {
        match action {
            Some(action) => attributes.extend(launcher_attributes(action)),
            None => {
                return Err(DefinitionError::LauncherMissingAction {
                    id: item.id.clone(),
                })
            }
        }
    }

    Ok(attributes)
}

/// Pure expansion of a launcher behavior into template/behavior attributes.
pub fn launcher_attributes(action: &LauncherAction) -> Vec<AttributeSpec> {
    match action {
        LauncherAction::Command(command) => vec![
            AttributeSpec::relation(TEMPLATE_RELATION, TPL_COMMAND_LAUNCHER),
            AttributeSpec::label(COMMAND_LABEL, command.clone()),
        ],
        LauncherAction::Widget {
            widget: BuiltinWidget::Spacer,
            base_size,
            growth_factor,
        } => vec![
            AttributeSpec::relation(TEMPLATE_RELATION, TPL_SPACER_LAUNCHER),
            AttributeSpec::label(BUILTIN_WIDGET_LABEL, BuiltinWidget::Spacer.as_str()),
            AttributeSpec::label(
                BASE_SIZE_LABEL,
                base_size.unwrap_or(SPACER_DEFAULT_BASE_SIZE).to_string(),
            ),
            AttributeSpec::label(
                GROWTH_FACTOR_LABEL,
                growth_factor
                    .unwrap_or(SPACER_DEFAULT_GROWTH_FACTOR)
                    .to_string(),
            ),
        ],
        LauncherAction::Widget { widget, .. } => vec![
            AttributeSpec::relation(TEMPLATE_RELATION, TPL_WIDGET_LAUNCHER),
            AttributeSpec::label(BUILTIN_WIDGET_LABEL, widget.as_str()),
        ],
        LauncherAction::TargetNote(target) => vec![
            AttributeSpec::relation(TEMPLATE_RELATION, TPL_NOTE_LAUNCHER),
            AttributeSpec::relation(TARGET_RELATION, target.clone()),
        ],
    }
}

/// Collects every parent id under which `child_id` appears in the model.
///
/// An id may legitimately occur under more than one parent (shared
/// templates); branch enforcement converges live branches to exactly this
/// set. Recomputed per item; the model is small and in memory.
pub fn expected_parent_ids(root: &DefinitionItem, child_id: &str) -> BTreeSet<String> {
    let mut parents = BTreeSet::new();
    collect_parents(root, child_id, &mut parents);
    parents
}

fn collect_parents(item: &DefinitionItem, child_id: &str, parents: &mut BTreeSet<String>) {
    for child in &item.children {
        if child.id == child_id {
            parents.insert(item.id.clone());
        }
        collect_parents(child, child_id, parents);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        derived_attributes, expected_parent_ids, launcher_attributes, validate_item,
        AttributeSpec, BuiltinWidget, DefinitionError, DefinitionItem, ItemKind, LauncherAction,
        BASE_SIZE_LABEL, GROWTH_FACTOR_LABEL, ICON_LABEL, TEMPLATE_RELATION, TPL_NOTE_LAUNCHER,
        TPL_SPACER_LAUNCHER,
    };
    use crate::model::AttributeKind;

    #[test]
    fn validate_rejects_id_outside_namespace() {
        let item = DefinitionItem::doc("stray", "Stray");
        assert_eq!(
            validate_item(&item),
            Err(DefinitionError::InvalidId {
                id: "stray".to_string()
            })
        );
    }

    #[test]
    fn validate_rejects_blank_title() {
        let item = DefinitionItem::doc("_blank", "   ");
        assert_eq!(
            validate_item(&item),
            Err(DefinitionError::EmptyTitle {
                id: "_blank".to_string()
            })
        );
    }

    #[test]
    fn validate_rejects_launcher_without_action() {
        let item = DefinitionItem::new("_lbBroken", ItemKind::Launcher(None), "Broken");
        assert_eq!(
            validate_item(&item),
            Err(DefinitionError::LauncherMissingAction {
                id: "_lbBroken".to_string()
            })
        );
    }

    #[test]
    fn derived_attributes_appends_icon_label() {
        let item = DefinitionItem::doc("_search", "Search History").with_icon("bx bx-search");
        let attributes = derived_attributes(&item).unwrap();
        assert!(attributes
            .iter()
            .any(|spec| spec.name == ICON_LABEL && spec.value == "bx bx-search"));
    }

    #[test]
    fn spacer_launcher_expands_template_and_sizing_labels() {
        let attributes = launcher_attributes(&LauncherAction::spacer(50, 100));
        assert!(attributes.iter().any(|spec| {
            spec.kind == AttributeKind::Relation
                && spec.name == TEMPLATE_RELATION
                && spec.value == TPL_SPACER_LAUNCHER
        }));
        assert!(attributes
            .iter()
            .any(|spec| spec.name == BASE_SIZE_LABEL && spec.value == "50"));
        assert!(attributes
            .iter()
            .any(|spec| spec.name == GROWTH_FACTOR_LABEL && spec.value == "100"));
    }

    #[test]
    fn spacer_launcher_defaults_sizing_when_unset() {
        let attributes = launcher_attributes(&LauncherAction::widget(BuiltinWidget::Spacer));
        assert!(attributes
            .iter()
            .any(|spec| spec.name == BASE_SIZE_LABEL && spec.value == "40"));
        assert!(attributes
            .iter()
            .any(|spec| spec.name == GROWTH_FACTOR_LABEL && spec.value == "0"));
    }

    #[test]
    fn note_launcher_expands_target_relation() {
        let attributes = launcher_attributes(&LauncherAction::TargetNote("_system".to_string()));
        assert!(attributes.iter().any(|spec| {
            spec.kind == AttributeKind::Relation
                && spec.name == TEMPLATE_RELATION
                && spec.value == TPL_NOTE_LAUNCHER
        }));
        assert!(attributes
            .iter()
            .any(|spec| spec.kind == AttributeKind::Relation && spec.name == "target"));
    }

    #[test]
    fn note_type_covers_every_kind() {
        let cases = [
            (ItemKind::Doc, "doc"),
            (ItemKind::Book, "book"),
            (ItemKind::Search, "search"),
            (ItemKind::NoteMap, "noteMap"),
            (ItemKind::ContentWidget, "contentWidget"),
            (ItemKind::Launcher(None), "launcher"),
        ];
        for (kind, expected) in cases {
            assert_eq!(kind.note_type(), expected);
        }
    }

    #[test]
    fn expected_parents_collects_every_occurrence() {
        let root = DefinitionItem::doc("_root", "Root")
            .with_child(
                DefinitionItem::doc("_a", "A")
                    .with_child(DefinitionItem::doc("_shared", "Shared")),
            )
            .with_child(
                DefinitionItem::doc("_b", "B")
                    .with_child(DefinitionItem::doc("_shared", "Shared")),
            );

        let parents = expected_parent_ids(&root, "_shared");
        assert_eq!(
            parents.into_iter().collect::<Vec<_>>(),
            vec!["_a".to_string(), "_b".to_string()]
        );
        assert!(expected_parent_ids(&root, "_missing").is_empty());
    }

    #[test]
    fn definition_items_deserialize_from_json() {
        let json = r#"{
            "id": "_help_intro",
            "type": "doc",
            "title": "Introduction",
            "icon": "bx bx-book-open",
            "attributes": [
                { "kind": "label", "name": "docName", "value": "intro" }
            ],
            "children": []
        }"#;
        let item: DefinitionItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, ItemKind::Doc);
        assert_eq!(
            item.attributes,
            vec![AttributeSpec::label("docName", "intro")]
        );
        assert!(!item.enforce_attributes);
    }
}
