//! Note-graph repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide lookup/create/save APIs for notes, branches, and attributes.
//! - Keep SQL details and tombstone discipline inside the repository
//!   boundary.
//!
//! # Invariants
//! - Caller-supplied ids are honored verbatim, never rewritten.
//! - Deleting anything sets `is_deleted = 1`; rows are never removed.
//! - Re-creating an entity whose tombstoned row exists restores that row
//!   instead of failing, so identity is stable across delete/recreate.
//! - Non-container parents (launcher, search) reject children unless the
//!   caller passes `ignore_forbidden_parents`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::graph::{attribute_id, branch_id, Attribute, AttributeKind, Branch, Note};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Note types that cannot take children without the privileged flag.
const NON_CONTAINER_NOTE_TYPES: &[&str] = &["launcher", "search"];

/// Result type used by graph repository operations.
pub type GraphRepoResult<T> = Result<T, GraphRepoError>;

/// Errors from graph repository operations.
#[derive(Debug)]
pub enum GraphRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Referenced note does not exist or is soft-deleted.
    NoteNotFound(String),
    /// Parent cannot take children and the privileged flag was not passed.
    ForbiddenParent {
        parent_note_id: String,
        parent_type: String,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for GraphRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NoteNotFound(note_id) => write!(f, "note not found: {note_id}"),
            Self::ForbiddenParent {
                parent_note_id,
                parent_type,
            } => write!(
                f,
                "note `{parent_note_id}` of type `{parent_type}` cannot take children"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "graph repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid graph data: {message}"),
        }
    }
}

impl Error for GraphRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GraphRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GraphRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Creation request for one note plus its placement branch.
#[derive(Debug, Clone)]
pub struct NewNote {
    /// Stable id to honor verbatim; generated when absent.
    pub note_id: Option<String>,
    pub parent_note_id: String,
    pub title: String,
    pub note_type: String,
    pub content: String,
    /// Position within the parent; appended after existing siblings when
    /// absent.
    pub note_position: Option<i64>,
    pub is_expanded: bool,
    /// Permits creation under normally-restricted parents.
    pub ignore_forbidden_parents: bool,
}

/// Repository interface for note-graph operations.
///
/// A capability object: the reconciler only ever touches storage through
/// this trait, so tests can substitute any implementation.
pub trait GraphRepository {
    /// Reports whether the storage schema is at the version this binary
    /// expects. Reconciliation is deferred while migrations are pending.
    fn schema_is_current(&self) -> GraphRepoResult<bool>;
    /// Loads one note by id.
    fn get_note(&self, note_id: &str, include_deleted: bool) -> GraphRepoResult<Option<Note>>;
    /// Creates one note and its placement branch.
    fn create_note(&self, spec: &NewNote) -> GraphRepoResult<(Note, Branch)>;
    /// Persists mutated note fields.
    fn save_note(&self, note: &Note) -> GraphRepoResult<()>;
    /// Lists branches whose child is the given note.
    fn parent_branches(&self, note_id: &str, include_deleted: bool)
        -> GraphRepoResult<Vec<Branch>>;
    /// Creates one branch with its derived id.
    fn create_branch(
        &self,
        note_id: &str,
        parent_note_id: &str,
        note_position: i64,
        is_expanded: bool,
    ) -> GraphRepoResult<Branch>;
    /// Persists mutated branch fields.
    fn save_branch(&self, branch: &Branch) -> GraphRepoResult<()>;
    /// Tombstones one branch.
    fn mark_branch_deleted(&self, branch_id: &str) -> GraphRepoResult<()>;
    /// Lists attributes owned by the given note.
    fn note_attributes(
        &self,
        note_id: &str,
        include_deleted: bool,
    ) -> GraphRepoResult<Vec<Attribute>>;
    /// Creates one attribute with its derived id.
    fn create_attribute(&self, attribute: &Attribute) -> GraphRepoResult<()>;
    /// Persists mutated attribute fields.
    fn save_attribute(&self, attribute: &Attribute) -> GraphRepoResult<()>;
    /// Tombstones one attribute.
    fn mark_attribute_deleted(&self, attribute_id: &str) -> GraphRepoResult<()>;
}

/// SQLite-backed graph repository.
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    /// Creates a repository after verifying required storage structure.
    ///
    /// Structure checks fail fast; the schema *version* is deliberately not
    /// checked here so callers can consult `schema_is_current` and skip work
    /// instead of failing.
    pub fn try_new(conn: &'conn Connection) -> GraphRepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn schema_is_current(&self) -> GraphRepoResult<bool> {
        let actual_version: u32 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        Ok(actual_version == latest_version())
    }

    fn get_note(&self, note_id: &str, include_deleted: bool) -> GraphRepoResult<Option<Note>> {
        let sql = if include_deleted {
            "SELECT note_id, title, type, content, is_deleted, created_at, updated_at
             FROM notes
             WHERE note_id = ?1;"
        } else {
            "SELECT note_id, title, type, content, is_deleted, created_at, updated_at
             FROM notes
             WHERE note_id = ?1
               AND is_deleted = 0;"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([note_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }
        Ok(None)
    }

    fn create_note(&self, spec: &NewNote) -> GraphRepoResult<(Note, Branch)> {
        let parent = self
            .get_note(&spec.parent_note_id, false)?
            .ok_or_else(|| GraphRepoError::NoteNotFound(spec.parent_note_id.clone()))?;
        if !spec.ignore_forbidden_parents
            && NON_CONTAINER_NOTE_TYPES.contains(&parent.note_type.as_str())
        {
            return Err(GraphRepoError::ForbiddenParent {
                parent_note_id: parent.note_id,
                parent_type: parent.note_type,
            });
        }

        let note_id = spec
            .note_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        // A tombstoned row with the same id is restored rather than
        // re-inserted; note identity is stable across delete/recreate.
        self.conn.execute(
            "INSERT INTO notes (note_id, title, type, content, is_deleted)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT (note_id) DO UPDATE SET
                title = excluded.title,
                type = excluded.type,
                content = excluded.content,
                is_deleted = 0,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![note_id, spec.title, spec.note_type, spec.content],
        )?;

        let note_position = match spec.note_position {
            Some(position) => position,
            None => next_note_position(self.conn, &spec.parent_note_id)?,
        };
        let branch = self.create_branch(
            &note_id,
            &spec.parent_note_id,
            note_position,
            spec.is_expanded,
        )?;

        let note = self
            .get_note(&note_id, false)?
            .ok_or_else(|| GraphRepoError::InvalidData(format!(
                "created note `{note_id}` missing on read-back"
            )))?;
        Ok((note, branch))
    }

    fn save_note(&self, note: &Note) -> GraphRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET title = ?2,
                 type = ?3,
                 content = ?4,
                 is_deleted = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE note_id = ?1;",
            params![
                note.note_id,
                note.title,
                note.note_type,
                note.content,
                note.is_deleted as i64,
            ],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::NoteNotFound(note.note_id.clone()));
        }
        Ok(())
    }

    fn parent_branches(
        &self,
        note_id: &str,
        include_deleted: bool,
    ) -> GraphRepoResult<Vec<Branch>> {
        let sql = if include_deleted {
            "SELECT branch_id, note_id, parent_note_id, note_position, is_expanded,
                    is_deleted, created_at, updated_at
             FROM branches
             WHERE note_id = ?1
             ORDER BY branch_id ASC;"
        } else {
            "SELECT branch_id, note_id, parent_note_id, note_position, is_expanded,
                    is_deleted, created_at, updated_at
             FROM branches
             WHERE note_id = ?1
               AND is_deleted = 0
             ORDER BY branch_id ASC;"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([note_id])?;
        let mut branches = Vec::new();
        while let Some(row) = rows.next()? {
            branches.push(parse_branch_row(row)?);
        }
        Ok(branches)
    }

    fn create_branch(
        &self,
        note_id: &str,
        parent_note_id: &str,
        note_position: i64,
        is_expanded: bool,
    ) -> GraphRepoResult<Branch> {
        let branch_id = branch_id(parent_note_id, note_id);
        self.conn.execute(
            "INSERT INTO branches (branch_id, note_id, parent_note_id, note_position,
                                   is_expanded, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)
             ON CONFLICT (branch_id) DO UPDATE SET
                note_position = excluded.note_position,
                is_expanded = excluded.is_expanded,
                is_deleted = 0,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                branch_id,
                note_id,
                parent_note_id,
                note_position,
                is_expanded as i64,
            ],
        )?;
        load_required_branch(self.conn, &branch_id)
    }

    fn save_branch(&self, branch: &Branch) -> GraphRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE branches
             SET note_position = ?2,
                 is_expanded = ?3,
                 is_deleted = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE branch_id = ?1;",
            params![
                branch.branch_id,
                branch.note_position,
                branch.is_expanded as i64,
                branch.is_deleted as i64,
            ],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::InvalidData(format!(
                "branch `{}` missing on save",
                branch.branch_id
            )));
        }
        Ok(())
    }

    fn mark_branch_deleted(&self, branch_id: &str) -> GraphRepoResult<()> {
        self.conn.execute(
            "UPDATE branches
             SET is_deleted = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE branch_id = ?1
               AND is_deleted = 0;",
            [branch_id],
        )?;
        Ok(())
    }

    fn note_attributes(
        &self,
        note_id: &str,
        include_deleted: bool,
    ) -> GraphRepoResult<Vec<Attribute>> {
        let sql = if include_deleted {
            "SELECT attribute_id, note_id, type, name, value, is_inheritable,
                    is_deleted, created_at, updated_at
             FROM attributes
             WHERE note_id = ?1
             ORDER BY attribute_id ASC;"
        } else {
            "SELECT attribute_id, note_id, type, name, value, is_inheritable,
                    is_deleted, created_at, updated_at
             FROM attributes
             WHERE note_id = ?1
               AND is_deleted = 0
             ORDER BY attribute_id ASC;"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([note_id])?;
        let mut attributes = Vec::new();
        while let Some(row) = rows.next()? {
            attributes.push(parse_attribute_row(row)?);
        }
        Ok(attributes)
    }

    fn create_attribute(&self, attribute: &Attribute) -> GraphRepoResult<()> {
        let derived = attribute_id(&attribute.note_id, attribute.kind, &attribute.name);
        if attribute.attribute_id != derived {
            return Err(GraphRepoError::InvalidData(format!(
                "attribute id `{}` does not match derived id `{derived}`",
                attribute.attribute_id
            )));
        }
        self.conn.execute(
            "INSERT INTO attributes (attribute_id, note_id, type, name, value,
                                     is_inheritable, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
             ON CONFLICT (attribute_id) DO UPDATE SET
                value = excluded.value,
                is_inheritable = excluded.is_inheritable,
                is_deleted = 0,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                attribute.attribute_id,
                attribute.note_id,
                attribute.kind.as_str(),
                attribute.name,
                attribute.value,
                attribute.is_inheritable as i64,
            ],
        )?;
        Ok(())
    }

    fn save_attribute(&self, attribute: &Attribute) -> GraphRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE attributes
             SET value = ?2,
                 is_inheritable = ?3,
                 is_deleted = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE attribute_id = ?1;",
            params![
                attribute.attribute_id,
                attribute.value,
                attribute.is_inheritable as i64,
                attribute.is_deleted as i64,
            ],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::InvalidData(format!(
                "attribute `{}` missing on save",
                attribute.attribute_id
            )));
        }
        Ok(())
    }

    fn mark_attribute_deleted(&self, attribute_id: &str) -> GraphRepoResult<()> {
        self.conn.execute(
            "UPDATE attributes
             SET is_deleted = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE attribute_id = ?1
               AND is_deleted = 0;",
            [attribute_id],
        )?;
        Ok(())
    }
}

fn next_note_position(conn: &Connection, parent_note_id: &str) -> GraphRepoResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(note_position), -10) + 10
         FROM branches
         WHERE parent_note_id = ?1
           AND is_deleted = 0;",
        [parent_note_id],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn load_required_branch(conn: &Connection, branch_id: &str) -> GraphRepoResult<Branch> {
    let mut stmt = conn.prepare(
        "SELECT branch_id, note_id, parent_note_id, note_position, is_expanded,
                is_deleted, created_at, updated_at
         FROM branches
         WHERE branch_id = ?1
           AND is_deleted = 0;",
    )?;
    let mut rows = stmt.query([branch_id])?;
    if let Some(row) = rows.next()? {
        return parse_branch_row(row);
    }
    Err(GraphRepoError::InvalidData(format!(
        "created branch `{branch_id}` missing on read-back"
    )))
}

fn parse_note_row(row: &Row<'_>) -> GraphRepoResult<Note> {
    Ok(Note {
        note_id: row.get("note_id")?,
        title: row.get("title")?,
        note_type: row.get("type")?,
        content: row.get("content")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "notes.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_branch_row(row: &Row<'_>) -> GraphRepoResult<Branch> {
    Ok(Branch {
        branch_id: row.get("branch_id")?,
        note_id: row.get("note_id")?,
        parent_note_id: row.get("parent_note_id")?,
        note_position: row.get("note_position")?,
        is_expanded: parse_flag(row.get("is_expanded")?, "branches.is_expanded")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "branches.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_attribute_row(row: &Row<'_>) -> GraphRepoResult<Attribute> {
    let kind_text: String = row.get("type")?;
    let kind = AttributeKind::parse(&kind_text).ok_or_else(|| {
        GraphRepoError::InvalidData(format!(
            "invalid attribute kind `{kind_text}` in attributes.type"
        ))
    })?;
    Ok(Attribute {
        attribute_id: row.get("attribute_id")?,
        note_id: row.get("note_id")?,
        kind,
        name: row.get("name")?,
        value: row.get("value")?,
        is_inheritable: parse_flag(row.get("is_inheritable")?, "attributes.is_inheritable")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "attributes.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_flag(value: i64, column: &'static str) -> GraphRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(GraphRepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn ensure_graph_connection_ready(conn: &Connection) -> GraphRepoResult<()> {
    for table in ["notes", "branches", "attributes"] {
        if !table_exists(conn, table)? {
            return Err(GraphRepoError::MissingRequiredTable(table));
        }
    }

    for column in ["note_id", "title", "type", "content", "is_deleted"] {
        if !table_has_column(conn, "notes", column)? {
            return Err(GraphRepoError::MissingRequiredColumn {
                table: "notes",
                column,
            });
        }
    }

    for column in [
        "branch_id",
        "note_id",
        "parent_note_id",
        "note_position",
        "is_expanded",
        "is_deleted",
    ] {
        if !table_has_column(conn, "branches", column)? {
            return Err(GraphRepoError::MissingRequiredColumn {
                table: "branches",
                column,
            });
        }
    }

    for column in ["attribute_id", "note_id", "type", "name", "value", "is_deleted"] {
        if !table_has_column(conn, "attributes", column)? {
            return Err(GraphRepoError::MissingRequiredColumn {
                table: "attributes",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> GraphRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> GraphRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
