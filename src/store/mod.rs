pub mod attachments;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::errors::StoreError;
use crate::models::*;
use crate::workflow::{self, TransitionRequest};

type Result<T> = std::result::Result<T, StoreError>;

/// Async-safe handle to the workflow database.
///
/// Wraps `WorkflowDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads. The mutex also serializes the
/// read-check-write sequences behind workflow guards.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<WorkflowDb>>,
}

impl DbHandle {
    pub fn new(db: WorkflowDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&WorkflowDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| StoreError::Other(anyhow::anyhow!("DB lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?;
        result
    }

    /// Acquire the database mutex synchronously. For startup seeding and
    /// tests only; must not be called from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, WorkflowDb>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Other(anyhow::anyhow!("DB lock poisoned: {}", e)))
    }
}

pub struct WorkflowDb {
    conn: Connection,
}

/// Fields accepted when creating a file. New files always start as drafts.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub title: String,
    pub body: String,
    pub kind: FileKind,
    pub priority: Priority,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
}

/// Partial update applied to a draft or returned file.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub kind: Option<FileKind>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Option<i64>>,
}

/// Filters for the file listing. `None` means no constraint.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub status: Option<FileStatus>,
    pub kind: Option<FileKind>,
    pub created_by: Option<i64>,
    pub assigned_to: Option<i64>,
    /// Substring match against title or file number.
    pub q: Option<String>,
}

impl WorkflowDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    designation TEXT NOT NULL DEFAULT '',
                    office TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS files (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    file_number TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    body TEXT NOT NULL DEFAULT '',
                    kind TEXT NOT NULL DEFAULT 'letter',
                    priority TEXT NOT NULL DEFAULT 'routine',
                    status TEXT NOT NULL DEFAULT 'draft',
                    created_by INTEGER NOT NULL REFERENCES users(id),
                    assigned_to INTEGER REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                    action TEXT NOT NULL,
                    actor_id INTEGER NOT NULL REFERENCES users(id),
                    from_status TEXT NOT NULL,
                    to_status TEXT NOT NULL,
                    remarks TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                    author_id INTEGER NOT NULL REFERENCES users(id),
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS attachments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                    file_name TEXT NOT NULL,
                    content_type TEXT NOT NULL DEFAULT 'application/octet-stream',
                    byte_size INTEGER NOT NULL,
                    sha256 TEXT NOT NULL,
                    rel_path TEXT NOT NULL,
                    uploaded_by INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS file_counters (
                    period TEXT PRIMARY KEY,
                    next_seq INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_files_status ON files(status);
                CREATE INDEX IF NOT EXISTS idx_files_created_by ON files(created_by);
                CREATE INDEX IF NOT EXISTS idx_files_assigned_to ON files(assigned_to);
                CREATE INDEX IF NOT EXISTS idx_history_file ON history(file_id);
                CREATE INDEX IF NOT EXISTS idx_comments_file ON comments(file_id);
                CREATE INDEX IF NOT EXISTS idx_attachments_file ON attachments(file_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── User CRUD ─────────────────────────────────────────────────────

    pub fn create_user(&self, name: &str, designation: &str, office: &str) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (name, designation, office) VALUES (?1, ?2, ?3)",
                params![name, designation, office],
            )
            .context("Failed to insert user")?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, designation, office, created_at FROM users ORDER BY id")
            .context("Failed to prepare list_users")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    designation: row.get(2)?,
                    office: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to query users")?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row.context("Failed to read user row")?);
        }
        Ok(users)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, designation, office, created_at FROM users WHERE id = ?1")
            .context("Failed to prepare get_user")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    designation: row.get(2)?,
                    office: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to query user")?;
        match rows.next() {
            Some(row) => Ok(row.context("Failed to read user row")?),
            None => Err(StoreError::UserNotFound { id }),
        }
    }

    // ── File CRUD ─────────────────────────────────────────────────────

    pub fn create_file(&self, new: &NewFile) -> Result<File> {
        self.get_user(new.created_by)?;
        if let Some(assignee) = new.assigned_to {
            self.get_user(assignee)?;
        }

        // Number allocation and insert must agree, so both run in one
        // transaction. DbHandle's Mutex guarantees single-threaded access,
        // which makes unchecked_transaction safe here.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let period = Utc::now().format("%Y%m").to_string();
        tx.execute(
            "INSERT INTO file_counters (period, next_seq) VALUES (?1, 2)
             ON CONFLICT(period) DO UPDATE SET next_seq = next_seq + 1",
            params![period],
        )
        .context("Failed to bump file counter")?;
        let seq: i64 = tx
            .query_row(
                "SELECT next_seq - 1 FROM file_counters WHERE period = ?1",
                params![period],
                |row| row.get(0),
            )
            .context("Failed to read file counter")?;
        let file_number = format!("F-{}-{:04}", period, seq);

        tx.execute(
            "INSERT INTO files (file_number, title, body, kind, priority, status, created_by, assigned_to)
             VALUES (?1, ?2, ?3, ?4, ?5, 'draft', ?6, ?7)",
            params![
                file_number,
                new.title,
                new.body,
                new.kind.as_str(),
                new.priority.as_str(),
                new.created_by,
                new.assigned_to
            ],
        )
        .context("Failed to insert file")?;
        let id = self.conn.last_insert_rowid();
        tx.commit().context("Failed to commit file insert")?;

        self.get_file(id)
    }

    pub fn get_file(&self, id: i64) -> Result<File> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_number, title, body, kind, priority, status, created_by, assigned_to, created_at, updated_at
                 FROM files WHERE id = ?1",
            )
            .context("Failed to prepare get_file")?;
        let mut rows = stmt
            .query_map(params![id], Self::read_file_row)
            .context("Failed to query file")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read file row")?;
                Ok(r.into_file()?)
            }
            None => Err(StoreError::FileNotFound { id }),
        }
    }

    pub fn list_files(&self, filter: &FileFilter) -> Result<Vec<File>> {
        // Filters are optional, so the WHERE clause is assembled from the
        // ones actually set. Values are still bound as parameters.
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(kind) = filter.kind {
            clauses.push("kind = ?");
            values.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(creator) = filter.created_by {
            clauses.push("created_by = ?");
            values.push(Box::new(creator));
        }
        if let Some(assignee) = filter.assigned_to {
            clauses.push("assigned_to = ?");
            values.push(Box::new(assignee));
        }
        if let Some(ref q) = filter.q {
            clauses.push("(title LIKE ? OR file_number LIKE ?)");
            let pattern = format!("%{}%", q);
            values.push(Box::new(pattern.clone()));
            values.push(Box::new(pattern));
        }

        let mut sql = String::from(
            "SELECT id, file_number, title, body, kind, priority, status, created_by, assigned_to, created_at, updated_at FROM files",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC");

        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_files")?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), Self::read_file_row)
            .context("Failed to query files")?;
        let mut files = Vec::new();
        for row in rows {
            let r = row.context("Failed to read file row")?;
            files.push(r.into_file()?);
        }
        Ok(files)
    }

    /// Update fields on a draft or returned file.
    pub fn update_file(&self, id: i64, update: &FileUpdate) -> Result<File> {
        let file = self.get_file(id)?;
        workflow::check_editable(&file)?;

        if let Some(Some(assignee)) = update.assigned_to {
            self.get_user(assignee)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(ref t) = update.title {
            tx.execute(
                "UPDATE files SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![t, id],
            )
            .context("Failed to update file title")?;
        }
        if let Some(ref b) = update.body {
            tx.execute(
                "UPDATE files SET body = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![b, id],
            )
            .context("Failed to update file body")?;
        }
        if let Some(kind) = update.kind {
            tx.execute(
                "UPDATE files SET kind = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![kind.as_str(), id],
            )
            .context("Failed to update file kind")?;
        }
        if let Some(priority) = update.priority {
            tx.execute(
                "UPDATE files SET priority = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![priority.as_str(), id],
            )
            .context("Failed to update file priority")?;
        }
        if let Some(assigned_to) = update.assigned_to {
            tx.execute(
                "UPDATE files SET assigned_to = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![assigned_to, id],
            )
            .context("Failed to update file assignee")?;
        }
        tx.commit().context("Failed to commit file update")?;

        self.get_file(id)
    }

    /// Delete a draft file. Returns its attachment records so the caller
    /// can remove the blobs from disk.
    pub fn delete_file(&self, id: i64) -> Result<Vec<Attachment>> {
        let file = self.get_file(id)?;
        workflow::check_deletable(&file)?;

        let attachments = self.list_attachments(id)?;
        self.conn
            .execute("DELETE FROM files WHERE id = ?1", params![id])
            .context("Failed to delete file")?;
        Ok(attachments)
    }

    // ── Workflow transitions ──────────────────────────────────────────

    /// Validate and apply a workflow transition, recording exactly one
    /// history entry. Guard checks and the write happen under the same
    /// lock, so a file can never skip a state.
    pub fn apply_transition(
        &self,
        id: i64,
        req: &TransitionRequest,
    ) -> Result<(File, HistoryEntry)> {
        let file = self.get_file(id)?;
        self.get_user(req.actor_id)?;
        if let Some(assignee) = req.assign_to {
            self.get_user(assignee)?;
        }

        let t = workflow::plan_transition(&file, req)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE files SET status = ?1, assigned_to = ?2, updated_at = datetime('now') WHERE id = ?3",
            params![t.to.as_str(), t.assigned_to, id],
        )
        .context("Failed to update file status")?;
        tx.execute(
            "INSERT INTO history (file_id, action, actor_id, from_status, to_status, remarks)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                t.action.as_str(),
                t.actor_id,
                t.from.as_str(),
                t.to.as_str(),
                t.remarks
            ],
        )
        .context("Failed to insert history entry")?;
        let history_id = self.conn.last_insert_rowid();
        tx.commit().context("Failed to commit transition")?;

        let file = self.get_file(id)?;
        let entry = self.get_history_entry(history_id)?;
        Ok((file, entry))
    }

    /// History for a file, newest entry first.
    pub fn list_history(&self, file_id: i64) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_id, action, actor_id, from_status, to_status, remarks, created_at
                 FROM history WHERE file_id = ?1 ORDER BY id DESC",
            )
            .context("Failed to prepare list_history")?;
        let rows = stmt
            .query_map(params![file_id], Self::read_history_row)
            .context("Failed to query history")?;
        let mut entries = Vec::new();
        for row in rows {
            let r = row.context("Failed to read history row")?;
            entries.push(r.into_entry()?);
        }
        Ok(entries)
    }

    fn get_history_entry(&self, id: i64) -> Result<HistoryEntry> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_id, action, actor_id, from_status, to_status, remarks, created_at
                 FROM history WHERE id = ?1",
            )
            .context("Failed to prepare get_history_entry")?;
        let mut rows = stmt
            .query_map(params![id], Self::read_history_row)
            .context("Failed to query history entry")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read history row")?;
                Ok(r.into_entry()?)
            }
            None => Err(StoreError::Other(anyhow::anyhow!(
                "History entry {} missing after insert",
                id
            ))),
        }
    }

    // ── Comments ──────────────────────────────────────────────────────

    pub fn add_comment(&self, file_id: i64, author_id: i64, body: &str) -> Result<Comment> {
        self.get_file(file_id)?;
        self.get_user(author_id)?;
        self.conn
            .execute(
                "INSERT INTO comments (file_id, author_id, body) VALUES (?1, ?2, ?3)",
                params![file_id, author_id, body],
            )
            .context("Failed to insert comment")?;
        let id = self.conn.last_insert_rowid();
        let comment = self
            .conn
            .query_row(
                "SELECT id, file_id, author_id, body, created_at FROM comments WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Comment {
                        id: row.get(0)?,
                        file_id: row.get(1)?,
                        author_id: row.get(2)?,
                        body: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .context("Comment not found after insert")?;
        Ok(comment)
    }

    /// Comments for a file in the order they were made.
    pub fn list_comments(&self, file_id: i64) -> Result<Vec<Comment>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_id, author_id, body, created_at FROM comments WHERE file_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_comments")?;
        let rows = stmt
            .query_map(params![file_id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    file_id: row.get(1)?,
                    author_id: row.get(2)?,
                    body: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to query comments")?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row.context("Failed to read comment row")?);
        }
        Ok(comments)
    }

    // ── Attachment metadata ───────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn insert_attachment(
        &self,
        file_id: i64,
        file_name: &str,
        content_type: &str,
        byte_size: i64,
        sha256: &str,
        rel_path: &str,
        uploaded_by: i64,
    ) -> Result<Attachment> {
        self.get_file(file_id)?;
        self.get_user(uploaded_by)?;
        self.conn
            .execute(
                "INSERT INTO attachments (file_id, file_name, content_type, byte_size, sha256, rel_path, uploaded_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![file_id, file_name, content_type, byte_size, sha256, rel_path, uploaded_by],
            )
            .context("Failed to insert attachment")?;
        let id = self.conn.last_insert_rowid();
        self.get_attachment(id)
    }

    pub fn get_attachment(&self, id: i64) -> Result<Attachment> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_id, file_name, content_type, byte_size, sha256, rel_path, uploaded_by, created_at
                 FROM attachments WHERE id = ?1",
            )
            .context("Failed to prepare get_attachment")?;
        let mut rows = stmt
            .query_map(params![id], Self::read_attachment_row)
            .context("Failed to query attachment")?;
        match rows.next() {
            Some(row) => Ok(row.context("Failed to read attachment row")?),
            None => Err(StoreError::AttachmentNotFound { id }),
        }
    }

    /// Remove an attachment record, returning it so the caller can
    /// delete the blob.
    pub fn delete_attachment(&self, id: i64) -> Result<Attachment> {
        let attachment = self.get_attachment(id)?;
        self.conn
            .execute("DELETE FROM attachments WHERE id = ?1", params![id])
            .context("Failed to delete attachment")?;
        Ok(attachment)
    }

    pub fn list_attachments(&self, file_id: i64) -> Result<Vec<Attachment>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_id, file_name, content_type, byte_size, sha256, rel_path, uploaded_by, created_at
                 FROM attachments WHERE file_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_attachments")?;
        let rows = stmt
            .query_map(params![file_id], Self::read_attachment_row)
            .context("Failed to query attachments")?;
        let mut attachments = Vec::new();
        for row in rows {
            attachments.push(row.context("Failed to read attachment row")?);
        }
        Ok(attachments)
    }

    // ── Views ─────────────────────────────────────────────────────────

    pub fn get_file_detail(&self, id: i64) -> Result<FileDetail> {
        let file = self.get_file(id)?;
        let history = self.list_history(id)?;
        let comments = self.list_comments(id)?;
        let attachments = self.list_attachments(id)?;
        Ok(FileDetail {
            file,
            history,
            comments,
            attachments,
        })
    }

    pub fn get_dashboard(&self, recent_limit: i64) -> Result<DashboardSummary> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            .context("Failed to count files")?;

        let mut by_status = Vec::new();
        for status in FileStatus::ALL {
            let count: i64 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM files WHERE status = ?1",
                    params![status.as_str()],
                    |row| row.get(0),
                )
                .context("Failed to count files by status")?;
            by_status.push(StatusCount { status, count });
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT h.file_id, f.file_number, h.action, h.actor_id, h.to_status, h.created_at
                 FROM history h JOIN files f ON f.id = h.file_id
                 ORDER BY h.id DESC LIMIT ?1",
            )
            .context("Failed to prepare recent activity")?;
        let rows = stmt
            .query_map(params![recent_limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("Failed to query recent activity")?;
        let mut recent = Vec::new();
        for row in rows {
            let (file_id, file_number, action_str, actor_id, to_status_str, created_at) =
                row.context("Failed to read activity row")?;
            recent.push(ActivityRow {
                file_id,
                file_number,
                action: parse_stored(&action_str, "action")?,
                actor_id,
                to_status: parse_stored(&to_status_str, "status")?,
                created_at,
            });
        }

        Ok(DashboardSummary {
            total,
            by_status,
            recent,
        })
    }

    // ── Row readers ───────────────────────────────────────────────────

    fn read_file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
        Ok(FileRow {
            id: row.get(0)?,
            file_number: row.get(1)?,
            title: row.get(2)?,
            body: row.get(3)?,
            kind: row.get(4)?,
            priority: row.get(5)?,
            status: row.get(6)?,
            created_by: row.get(7)?,
            assigned_to: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn read_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
        Ok(HistoryRow {
            id: row.get(0)?,
            file_id: row.get(1)?,
            action: row.get(2)?,
            actor_id: row.get(3)?,
            from_status: row.get(4)?,
            to_status: row.get(5)?,
            remarks: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn read_attachment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
        Ok(Attachment {
            id: row.get(0)?,
            file_id: row.get(1)?,
            file_name: row.get(2)?,
            content_type: row.get(3)?,
            byte_size: row.get(4)?,
            sha256: row.get(5)?,
            rel_path: row.get(6)?,
            uploaded_by: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

fn parse_stored<T: FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| StoreError::Other(anyhow::anyhow!("invalid {} in database: '{}'", what, value)))
}

// ── Internal row helpers ──────────────────────────────────────────────

/// Intermediate row struct for reading files from SQLite before converting
/// kind / priority / status strings into typed values.
struct FileRow {
    id: i64,
    file_number: String,
    title: String,
    body: String,
    kind: String,
    priority: String,
    status: String,
    created_by: i64,
    assigned_to: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl FileRow {
    fn into_file(self) -> Result<File> {
        Ok(File {
            id: self.id,
            file_number: self.file_number,
            title: self.title,
            body: self.body,
            kind: parse_stored(&self.kind, "kind")?,
            priority: parse_stored(&self.priority, "priority")?,
            status: parse_stored(&self.status, "status")?,
            created_by: self.created_by,
            assigned_to: self.assigned_to,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Intermediate row struct for history entries.
struct HistoryRow {
    id: i64,
    file_id: i64,
    action: String,
    actor_id: i64,
    from_status: String,
    to_status: String,
    remarks: String,
    created_at: String,
}

impl HistoryRow {
    fn into_entry(self) -> Result<HistoryEntry> {
        Ok(HistoryEntry {
            id: self.id,
            file_id: self.file_id,
            action: parse_stored(&self.action, "action")?,
            actor_id: self.actor_id,
            from_status: parse_stored(&self.from_status, "status")?,
            to_status: parse_stored(&self.to_status, "status")?,
            remarks: self.remarks,
            created_at: self.created_at,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
