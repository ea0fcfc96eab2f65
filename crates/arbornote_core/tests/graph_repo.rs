use arbornote_core::db::open_db_in_memory;
use arbornote_core::{
    branch_id, Attribute, AttributeKind, GraphRepoError, GraphRepository, NewNote,
    SqliteGraphRepository,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn new_note(note_id: Option<&str>, parent: &str, title: &str, note_type: &str) -> NewNote {
    NewNote {
        note_id: note_id.map(str::to_string),
        parent_note_id: parent.to_string(),
        title: title.to_string(),
        note_type: note_type.to_string(),
        content: String::new(),
        note_position: None,
        is_expanded: false,
        ignore_forbidden_parents: false,
    }
}

#[test]
fn create_note_honors_caller_supplied_id_verbatim() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    let (note, branch) = repo
        .create_note(&new_note(Some("_system"), "root", "System", "doc"))
        .unwrap();

    assert_eq!(note.note_id, "_system");
    assert_eq!(branch.branch_id, branch_id("root", "_system"));
    assert_eq!(branch.parent_note_id, "root");
}

#[test]
fn create_note_generates_id_when_absent() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    let (note, _branch) = repo
        .create_note(&new_note(None, "root", "Scratch", "doc"))
        .unwrap();

    assert!(!note.note_id.is_empty());
    assert!(!note.note_id.starts_with('_'));
    assert_eq!(repo.get_note(&note.note_id, false).unwrap(), Some(note));
}

#[test]
fn create_note_rejects_unknown_parent() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    let err = repo
        .create_note(&new_note(Some("_x"), "missingParent", "X", "doc"))
        .unwrap_err();
    assert!(matches!(err, GraphRepoError::NoteNotFound(id) if id == "missingParent"));
}

#[test]
fn non_container_parent_rejects_children_without_privileged_flag() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    repo.create_note(&new_note(Some("_lbSearch"), "root", "Search", "launcher"))
        .unwrap();

    let err = repo
        .create_note(&new_note(Some("_under"), "_lbSearch", "Under", "doc"))
        .unwrap_err();
    assert!(matches!(
        err,
        GraphRepoError::ForbiddenParent { parent_note_id, parent_type }
            if parent_note_id == "_lbSearch" && parent_type == "launcher"
    ));

    let mut privileged = new_note(Some("_under"), "_lbSearch", "Under", "doc");
    privileged.ignore_forbidden_parents = true;
    repo.create_note(&privileged).unwrap();
    assert!(repo.get_note("_under", false).unwrap().is_some());
}

#[test]
fn create_note_restores_tombstoned_row_instead_of_failing() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    let (mut note, _branch) = repo
        .create_note(&new_note(Some("_revive"), "root", "Original", "doc"))
        .unwrap();
    note.is_deleted = true;
    repo.save_note(&note).unwrap();
    assert!(repo.get_note("_revive", false).unwrap().is_none());

    let (restored, _branch) = repo
        .create_note(&new_note(Some("_revive"), "root", "Restored", "book"))
        .unwrap();
    assert_eq!(restored.note_id, "_revive");
    assert_eq!(restored.title, "Restored");
    assert_eq!(restored.note_type, "book");

    let row_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM notes WHERE note_id = '_revive';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(row_count, 1);
}

#[test]
fn create_branch_is_upsert_for_the_same_parent_child_pair() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    repo.create_note(&new_note(Some("_a"), "root", "A", "doc"))
        .unwrap();
    let first = repo.create_branch("_a", "root", 10, false).unwrap();
    let second = repo.create_branch("_a", "root", 20, true).unwrap();

    assert_eq!(first.branch_id, second.branch_id);
    assert_eq!(second.note_position, 20);
    assert!(second.is_expanded);

    let row_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM branches WHERE note_id = '_a';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(row_count, 1);
}

#[test]
fn mark_branch_deleted_leaves_a_tombstone_row() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    let (_note, branch) = repo
        .create_note(&new_note(Some("_t"), "root", "T", "doc"))
        .unwrap();
    repo.mark_branch_deleted(&branch.branch_id).unwrap();

    assert!(repo.parent_branches("_t", false).unwrap().is_empty());
    let deleted = repo.parent_branches("_t", true).unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(!deleted[0].is_active());
}

#[test]
fn attribute_create_is_upsert_and_delete_is_tombstone() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    repo.create_note(&new_note(Some("_attrs"), "root", "Attrs", "doc"))
        .unwrap();

    let attribute = Attribute::new("_attrs", AttributeKind::Label, "iconClass", "bx bx-cog", false);
    repo.create_attribute(&attribute).unwrap();
    repo.create_attribute(&Attribute::new(
        "_attrs",
        AttributeKind::Label,
        "iconClass",
        "bx bx-hide",
        false,
    ))
    .unwrap();

    let live = repo.note_attributes("_attrs", false).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].attribute_id, attribute.attribute_id);
    assert_eq!(live[0].value, "bx bx-hide");

    repo.mark_attribute_deleted(&attribute.attribute_id).unwrap();
    assert!(repo.note_attributes("_attrs", false).unwrap().is_empty());
    let deleted = repo.note_attributes("_attrs", true).unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(!deleted[0].is_active());
}

#[test]
fn create_attribute_rejects_non_derived_id() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    repo.create_note(&new_note(Some("_attrs"), "root", "Attrs", "doc"))
        .unwrap();

    let mut attribute =
        Attribute::new("_attrs", AttributeKind::Label, "iconClass", "bx bx-cog", false);
    attribute.attribute_id = "handAssigned".to_string();
    let err = repo.create_attribute(&attribute).unwrap_err();
    assert!(matches!(err, GraphRepoError::InvalidData(_)));
}

#[test]
fn schema_is_current_tracks_user_version() {
    let conn = setup();
    let repo = SqliteGraphRepository::try_new(&conn).unwrap();

    assert!(repo.schema_is_current().unwrap());

    conn.execute_batch("PRAGMA user_version = 0;").unwrap();
    assert!(!repo.schema_is_current().unwrap());
}
