//! Built-in system subtree definition and splice points.
//!
//! # Responsibility
//! - Declare the static subtree every Arbornote database carries: search
//!   history, note map, SQL console, options pages, user guide, launcher bar.
//! - Splice externally supplied sub-trees (help docs, visible launchers)
//!   into the definition before reconciliation.
//!
//! # Invariants
//! - The subtree root sorts last among the mount point's children.
//! - Template notes referenced by launcher synthesis are declared here, so a
//!   reconciled database always contains them.

use crate::model::definition::{
    AttributeSpec, BuiltinWidget, DefinitionItem, LauncherAction, DOC_NAME_LABEL,
    TPL_COMMAND_LAUNCHER, TPL_NOTE_LAUNCHER, TPL_SPACER_LAUNCHER, TPL_WIDGET_LAUNCHER,
};
use crate::model::namespace::MAX_NOTE_POSITION;

/// Id of the system subtree root note.
pub const SYSTEM_ROOT_ID: &str = "_system";
/// Id of the note every subtree check mounts the system root under.
pub const MOUNT_NOTE_ID: &str = "root";

/// Localization seam. The real provider lives outside this crate; core only
/// needs key-plus-default lookup for built-in titles.
pub trait Translator {
    fn translate(&self, key: &str, default: &str) -> String;
}

/// Identity translator returning the built-in English titles.
pub struct NoTranslation;

impl Translator for NoTranslation {
    fn translate(&self, _key: &str, default: &str) -> String {
        default.to_string()
    }
}

/// External sub-trees spliced into the system subtree on rebuild.
///
/// Defaults keep the subtree self-contained: no help docs, the standard
/// launcher set.
pub trait SubtreeProvider {
    /// Children of the `_help` book (typically JSON-derived doc items).
    fn help_subtree(&self) -> Vec<DefinitionItem> {
        Vec::new()
    }

    /// Children of the visible-launchers group.
    fn launcher_subtree(&self) -> Vec<DefinitionItem> {
        default_visible_launchers()
    }
}

/// Provider with both defaults.
pub struct DefaultSubtreeProvider;

impl SubtreeProvider for DefaultSubtreeProvider {}

/// Builds the full system subtree with external sub-trees spliced in.
pub fn system_subtree(provider: &dyn SubtreeProvider, tr: &dyn Translator) -> DefinitionItem {
    DefinitionItem::doc(
        SYSTEM_ROOT_ID,
        tr.translate("system-subtree.root-title", "System"),
    )
    .with_icon("bx bx-hide")
    .at_position(MAX_NOTE_POSITION)
    .with_child(
        DefinitionItem::doc(
            "_search",
            tr.translate("system-subtree.search-title", "Search History"),
        )
        .with_icon("bx bx-search"),
    )
    .with_child(
        DefinitionItem::note_map(
            "_globalNoteMap",
            tr.translate("system-subtree.note-map-title", "Note Map"),
        )
        .with_icon("bx bxs-network-chart"),
    )
    .with_child(
        DefinitionItem::doc(
            "_sqlConsole",
            tr.translate("system-subtree.sql-console-title", "SQL Console History"),
        )
        .with_icon("bx bx-data"),
    )
    .with_child(
        DefinitionItem::doc(
            "_bulkAction",
            tr.translate("system-subtree.bulk-action-title", "Bulk Action"),
        )
        .with_icon("bx bx-list-plus"),
    )
    .with_child(
        DefinitionItem::content_widget(
            "_backendLog",
            tr.translate("system-subtree.backend-log-title", "Backend Log"),
        )
        .with_icon("bx bx-terminal"),
    )
    .with_child(options_subtree(tr))
    .with_child(
        DefinitionItem::book(
            "_help",
            tr.translate("system-subtree.help-title", "User Guide"),
        )
        .with_icon("bx bx-help-circle")
        .with_children(provider.help_subtree()),
    )
    .with_child(launcher_bar_subtree(provider, tr))
}

fn options_subtree(tr: &dyn Translator) -> DefinitionItem {
    DefinitionItem::book(
        "_options",
        tr.translate("system-subtree.options-title", "Options"),
    )
    .with_icon("bx bx-cog")
    .with_child(DefinitionItem::content_widget(
        "_optionsAppearance",
        tr.translate("system-subtree.options-appearance-title", "Appearance"),
    ))
    .with_child(DefinitionItem::content_widget(
        "_optionsShortcuts",
        tr.translate("system-subtree.options-shortcuts-title", "Shortcuts"),
    ))
    .with_child(DefinitionItem::content_widget(
        "_optionsAdvanced",
        tr.translate("system-subtree.options-advanced-title", "Advanced"),
    ))
}

fn launcher_bar_subtree(provider: &dyn SubtreeProvider, tr: &dyn Translator) -> DefinitionItem {
    DefinitionItem::doc(
        "_lbRoot",
        tr.translate("system-subtree.launcher-bar-title", "Launcher Bar"),
    )
    .with_icon("bx bx-sidebar")
    .with_child(
        DefinitionItem::doc(
            "_lbTemplates",
            tr.translate("system-subtree.launcher-templates-title", "Launcher Templates"),
        )
        .with_child(
            DefinitionItem::doc(
                TPL_COMMAND_LAUNCHER,
                tr.translate("system-subtree.tpl-command-title", "Command Launcher"),
            )
            .enforcing_attributes(),
        )
        .with_child(
            DefinitionItem::doc(
                TPL_WIDGET_LAUNCHER,
                tr.translate("system-subtree.tpl-widget-title", "Widget Launcher"),
            )
            .enforcing_attributes(),
        )
        .with_child(
            DefinitionItem::doc(
                TPL_SPACER_LAUNCHER,
                tr.translate("system-subtree.tpl-spacer-title", "Spacer"),
            )
            .enforcing_attributes(),
        )
        .with_child(
            DefinitionItem::doc(
                TPL_NOTE_LAUNCHER,
                tr.translate("system-subtree.tpl-note-title", "Note Launcher"),
            )
            .enforcing_attributes(),
        ),
    )
    .with_child(
        DefinitionItem::doc(
            "_lbAvailableLaunchers",
            tr.translate("system-subtree.available-launchers-title", "Available Launchers"),
        )
        .with_icon("bx bx-hide")
        .expanded()
        .with_children(default_available_launchers()),
    )
    .with_child(
        DefinitionItem::doc(
            "_lbVisibleLaunchers",
            tr.translate("system-subtree.visible-launchers-title", "Visible Launchers"),
        )
        .with_icon("bx bx-show")
        .expanded()
        .with_children(provider.launcher_subtree()),
    )
}

/// Launchers shipped but not shown until the user moves them.
pub fn default_available_launchers() -> Vec<DefinitionItem> {
    vec![
        DefinitionItem::launcher(
            "_lbBackInHistory",
            "Back in History",
            LauncherAction::Command("backInNoteHistory".to_string()),
        )
        .with_icon("bx bx-left-arrow-circle"),
        DefinitionItem::launcher(
            "_lbForwardInHistory",
            "Forward in History",
            LauncherAction::Command("forwardInNoteHistory".to_string()),
        )
        .with_icon("bx bx-right-arrow-circle"),
        DefinitionItem::launcher(
            "_lbCalendar",
            "Calendar",
            LauncherAction::widget(BuiltinWidget::Calendar),
        )
        .with_icon("bx bx-calendar"),
    ]
}

/// The standard visible launcher set.
pub fn default_visible_launchers() -> Vec<DefinitionItem> {
    vec![
        DefinitionItem::launcher(
            "_lbNewNote",
            "New Note",
            LauncherAction::Command("createNoteIntoInbox".to_string()),
        )
        .with_icon("bx bx-file-blank"),
        DefinitionItem::launcher(
            "_lbSearch",
            "Search Notes",
            LauncherAction::Command("searchNotes".to_string()),
        )
        .with_icon("bx bx-search"),
        DefinitionItem::launcher(
            "_lbBookmarks",
            "Bookmarks",
            LauncherAction::widget(BuiltinWidget::Bookmarks),
        )
        .with_icon("bx bx-bookmark"),
        DefinitionItem::launcher("_lbSpacer1", "Spacer", LauncherAction::spacer(50, 100)),
        DefinitionItem::launcher(
            "_lbSyncStatus",
            "Sync Status",
            LauncherAction::widget(BuiltinWidget::SyncStatus),
        )
        .with_icon("bx bx-refresh"),
    ]
}

/// Builds a help doc item carrying the structural bookkeeping label.
pub fn help_doc(id: impl Into<String>, title: impl Into<String>, doc_name: &str) -> DefinitionItem {
    DefinitionItem::doc(id, title).with_attribute(AttributeSpec::label(DOC_NAME_LABEL, doc_name))
}
