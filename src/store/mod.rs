//! SQLite persistence for rule trees.
//!
//! The `rules` table is the source of truth; every in-memory forest is a
//! projection rebuilt by one recursive query. Each row points at its parent
//! through `parent_id`. Mutations run inside a single transaction and leave
//! no `parent_id` referencing a missing row.

mod error;
mod tree;

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

pub use error::StoreError;
pub use tree::StoredRule;

use tree::{Forest, RuleRow};

use crate::RuleNode;

const CREATE_RULES_SQL: &str = "
CREATE TABLE IF NOT EXISTS rules (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    conditions  TEXT NOT NULL,
    prompt      TEXT NOT NULL,
    page        INTEGER NOT NULL,
    salience    INTEGER NOT NULL,
    parent_id   INTEGER REFERENCES rules(id),
    created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS rules_parent_id ON rules(parent_id);
";

const TREE_FROM_ROOTS_SQL: &str = "
WITH RECURSIVE rule_tree AS (
    SELECT id, name, conditions, prompt, page, salience, parent_id
    FROM rules WHERE parent_id IS NULL
    UNION ALL
    SELECT r.id, r.name, r.conditions, r.prompt, r.page, r.salience, r.parent_id
    FROM rules r
    JOIN rule_tree rt ON r.parent_id = rt.id
)
SELECT id, name, conditions, prompt, page, salience, parent_id FROM rule_tree ORDER BY id
";

const TREE_FROM_SEED_SQL: &str = "
WITH RECURSIVE rule_tree AS (
    SELECT id, name, conditions, prompt, page, salience, parent_id
    FROM rules WHERE id = ?1
    UNION ALL
    SELECT r.id, r.name, r.conditions, r.prompt, r.page, r.salience, r.parent_id
    FROM rules r
    JOIN rule_tree rt ON r.parent_id = rt.id
)
SELECT id, name, conditions, prompt, page, salience, parent_id FROM rule_tree ORDER BY id
";

const IN_SUBTREE_SQL: &str = "
WITH RECURSIVE subtree(id) AS (
    SELECT id FROM rules WHERE id = ?1
    UNION ALL
    SELECT r.id FROM rules r JOIN subtree s ON r.parent_id = s.id
)
SELECT EXISTS (SELECT 1 FROM subtree WHERE id = ?2)
";

/// Connection settings applied when a store is opened.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    busy_timeout: Duration,
    foreign_keys: bool,
    wal: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
            wal: true,
        }
    }
}

impl StoreOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enforce `parent_id` references in SQLite itself. On by default.
    #[must_use]
    pub fn foreign_keys(mut self, on: bool) -> Self {
        self.foreign_keys = on;
        self
    }

    /// Use write-ahead logging for file databases. On by default.
    #[must_use]
    pub fn wal(mut self, on: bool) -> Self {
        self.wal = on;
        self
    }

    fn apply(&self, conn: &Connection, in_memory: bool) -> Result<(), StoreError> {
        conn.busy_timeout(self.busy_timeout)?;
        let fk = if self.foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!("PRAGMA foreign_keys = {fk};"))?;
        if self.wal && !in_memory {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        Ok(())
    }
}

/// The rule table behind an explicitly owned connection.
///
/// Reads take `&self`; every mutation takes `&mut self` and runs in its own
/// transaction, so a failed operation leaves the table as it was and returns
/// the error that caused it.
#[derive(Debug)]
pub struct RuleStore {
    conn: Connection,
}

impl RuleStore {
    /// Open (or create) a database file with default options and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or configured.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with(path, &StoreOptions::default())
    }

    /// Open a database file with explicit options and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or configured.
    pub fn open_with(path: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        options.apply(&conn, false)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// A private in-memory database, schema included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        StoreOptions::default().apply(&conn, true)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Wrap a connection the caller already opened. The schema is not touched;
    /// call [`init_schema`](Self::init_schema) if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the options cannot be applied.
    pub fn from_connection(conn: Connection, options: &StoreOptions) -> Result<Self, StoreError> {
        options.apply(&conn, conn.path().map_or(true, str::is_empty))?;
        Ok(Self { conn })
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Create the `rules` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the DDL fails.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_RULES_SQL)?;
        Ok(())
    }

    /// Number of stored rules.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Every rule reachable from a root, in id order, each with its subtree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row's conditions do not decode.
    pub fn load_all(&self) -> Result<Vec<StoredRule>, StoreError> {
        let rows = self.read_rows(TREE_FROM_ROOTS_SQL, [])?;
        Ok(Forest::assemble(rows, None)?.entries())
    }

    /// The forest of root rules with their subtrees, ready for a
    /// [`RulesEngine`](crate::RulesEngine).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row's conditions do not decode.
    pub fn load_roots(&self) -> Result<Vec<RuleNode>, StoreError> {
        let rows = self.read_rows(TREE_FROM_ROOTS_SQL, [])?;
        Ok(Forest::assemble(rows, None)?.roots())
    }

    /// The rule `id` and everything below it, in id order. Empty if `id` is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row's conditions do not decode.
    pub fn load_subtree(&self, id: i64) -> Result<Vec<StoredRule>, StoreError> {
        let rows = self.read_rows(TREE_FROM_SEED_SQL, params![id])?;
        Ok(Forest::assemble(rows, Some(id))?.entries())
    }

    /// Store `node` and its whole subtree as a new root. Returns the root's id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails; nothing is written then.
    pub fn insert_root(&mut self, node: &RuleNode) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let id = insert_tree(&tx, node, None)?;
        tx.commit()?;
        tracing::debug!(rule = id, nodes = 1 + node.descendant_count(), "inserted root rule");
        Ok(id)
    }

    /// Store `node` and its whole subtree under `parent_id`. Each descendant
    /// keeps its place under its own parent. Returns the new node's id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails (for example an unknown
    /// `parent_id`); nothing is written then.
    pub fn insert_child(&mut self, node: &RuleNode, parent_id: i64) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let id = insert_tree(&tx, node, Some(parent_id))?;
        tx.commit()?;
        tracing::debug!(rule = id, parent = parent_id, nodes = 1 + node.descendant_count(), "inserted child rule");
        Ok(id)
    }

    /// Overwrite the stored fields of rule `id` with those of `fields` and
    /// set its parent: `Some(p)` moves it under `p`, `None` makes it a root.
    /// Children of `fields` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` does not exist,
    /// [`StoreError::Cycle`] if `parent` is `id` or below it, and any SQLite
    /// failure. The row is unchanged on error.
    pub fn update(&mut self, id: i64, fields: &RuleNode, parent: Option<i64>) -> Result<(), StoreError> {
        let conditions = serde_json::to_string(&fields.conditions)?;
        let tx = self.conn.transaction()?;
        if let Some(parent) = parent {
            reject_cycle(&tx, id, parent)?;
        }
        let changed = tx.execute(
            "UPDATE rules SET name = ?1, conditions = ?2, prompt = ?3, page = ?4, salience = ?5,
                 parent_id = ?6
             WHERE id = ?7",
            params![
                fields.name,
                conditions,
                fields.outcome.prompt.as_deref().unwrap_or(""),
                i64::from(fields.outcome.page.unwrap_or(0)),
                fields.salience,
                parent,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        tx.commit()?;
        tracing::debug!(rule = id, parent, "updated rule");
        Ok(())
    }

    /// Delete rule `id`, first moving its children under `parent` (or to
    /// root level for `None`). Descendants are never deleted. Returns how
    /// many children were moved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` does not exist,
    /// [`StoreError::Cycle`] if `parent` is `id` or below it, and any SQLite
    /// failure. The table is unchanged on error.
    pub fn remove(&mut self, id: i64, parent: Option<i64>) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let moved = remove_in(&tx, id, parent)?;
        tx.commit()?;
        tracing::debug!(rule = id, parent, moved, "removed rule");
        Ok(moved)
    }

    /// Delete rule `id`, promoting its children to its own stored parent.
    ///
    /// # Errors
    ///
    /// Same as [`remove`](Self::remove).
    pub fn delete(&mut self, id: i64) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let parent: Option<i64> = tx
            .query_row("SELECT parent_id FROM rules WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or(StoreError::NotFound { id })?;
        let moved = remove_in(&tx, id, parent)?;
        tx.commit()?;
        tracing::debug!(rule = id, parent, moved, "deleted rule");
        Ok(moved)
    }

    /// Move rule `id` (with its subtree) to root level.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` does not exist.
    pub fn detach(&mut self, id: i64) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute("UPDATE rules SET parent_id = NULL WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        tx.commit()?;
        tracing::debug!(rule = id, "detached rule");
        Ok(())
    }

    /// Drop every rule and recreate the empty table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the DDL fails.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch("DROP TABLE IF EXISTS rules;")?;
        tx.execute_batch(CREATE_RULES_SQL)?;
        tx.commit()?;
        tracing::debug!("cleared rule table");
        Ok(())
    }

    fn read_rows<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<RuleRow>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(RuleRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    conditions: row.get(2)?,
                    prompt: row.get(3)?,
                    page: row.get(4)?,
                    salience: row.get(5)?,
                    parent_id: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Parents are written before their children so every `parent_id` refers
/// to an existing row at each step.
fn insert_tree(tx: &Transaction<'_>, node: &RuleNode, parent: Option<i64>) -> Result<i64, StoreError> {
    let conditions = serde_json::to_string(&node.conditions)?;
    tx.execute(
        "INSERT INTO rules (name, conditions, prompt, page, salience, parent_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            node.name,
            conditions,
            node.outcome.prompt.as_deref().unwrap_or(""),
            i64::from(node.outcome.page.unwrap_or(0)),
            node.salience,
            parent,
        ],
    )?;
    let id = tx.last_insert_rowid();
    for child in node.children() {
        insert_tree(tx, child, Some(id))?;
    }
    Ok(id)
}

fn reject_cycle(tx: &Transaction<'_>, id: i64, parent: i64) -> Result<(), StoreError> {
    let inside: bool = tx.query_row(IN_SUBTREE_SQL, params![id, parent], |row| row.get(0))?;
    if inside {
        return Err(StoreError::Cycle { id, parent });
    }
    Ok(())
}

/// Reassign before delete: no row may be left pointing at `id`.
fn remove_in(tx: &Transaction<'_>, id: i64, parent: Option<i64>) -> Result<usize, StoreError> {
    if let Some(parent) = parent {
        reject_cycle(tx, id, parent)?;
    }
    let moved = tx.execute(
        "UPDATE rules SET parent_id = ?1 WHERE parent_id = ?2",
        params![parent, id],
    )?;
    let deleted = tx.execute("DELETE FROM rules WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(moved)
}
