//! Media index backed by a directory tree and a `SQLite` catalog.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{SecondsFormat, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, trace, warn};

use super::{
    DEFAULT_COLLECTION, MediaQuery, MediaRecord, MediaStore, MediaValues, RecordHandle,
};
use crate::error::{Result, SaverError};

const INDEX_FILE: &str = ".media-index.sqlite";

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS media (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    display_name  TEXT NOT NULL,
    mime_type     TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    file_name     TEXT NOT NULL,
    is_pending    INTEGER NOT NULL DEFAULT 0,
    date_added    TEXT NOT NULL,
    date_modified TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_media_pending ON media (is_pending, date_added);
";

struct Row {
    id: i64,
    display_name: String,
    mime_type: String,
    relative_path: String,
    file_name: String,
    is_pending: bool,
    date_added: String,
}

impl Row {
    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            display_name: row.get(1)?,
            mime_type: row.get(2)?,
            relative_path: row.get(3)?,
            file_name: row.get(4)?,
            is_pending: row.get(5)?,
            date_added: row.get(6)?,
        })
    }
}

const ROW_COLUMNS: &str =
    "id, display_name, mime_type, relative_path, file_name, is_pending, date_added";

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reject collection paths that would leave the store root.
fn check_relative_path(path: &str) -> Result<()> {
    let ok = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(SaverError::MediaIndex(format!(
            "Collection path must be relative and stay inside the store: {path}"
        )))
    }
}

/// Pick a visible file name in `dir` that no existing file uses.
fn unique_file_name(dir: &Path, display_name: &str) -> String {
    if !dir.join(display_name).exists() {
        return display_name.to_string();
    }
    let name = Path::new(display_name);
    let stem = name
        .file_stem()
        .map_or_else(|| display_name.to_string(), |s| s.to_string_lossy().into_owned());
    let ext = name.extension().map(|e| e.to_string_lossy().into_owned());

    (1..)
        .map(|n| match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        })
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or_else(|| display_name.to_string())
}

/// Media index persisted under a root directory.
///
/// Record bytes live at `<root>/<relative_path>/<file_name>`. Pending records
/// use a hidden `.pending-<id>-<name>` file that is renamed to a unique
/// visible name when the pending flag is cleared.
pub struct DirectoryMediaStore {
    root: PathBuf,
    conn: Mutex<Connection>,
}

impl DirectoryMediaStore {
    /// Opens or creates a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let conn = Connection::open(root.join(INDEX_FILE))
            .map_err(|e| SaverError::MediaIndex(format!("Failed to open media index: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| SaverError::MediaIndex(format!("Failed to initialize schema: {e}")))?;

        debug!(root = %root.display(), "Opened media index");
        Ok(Self {
            root,
            conn: Mutex::new(conn),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn file_path(&self, row: &Row) -> PathBuf {
        self.root.join(&row.relative_path).join(&row.file_name)
    }

    fn find(&self, conn: &Connection, id: i64) -> Result<Option<Row>> {
        let row = conn
            .query_row(
                &format!("SELECT {ROW_COLUMNS} FROM media WHERE id = ?1"),
                params![id],
                Row::from_sql,
            )
            .optional()?;
        Ok(row)
    }

    /// Location of a record's bytes on disk.
    pub fn record_path(&self, handle: &RecordHandle) -> Result<PathBuf> {
        let conn = self.conn();
        let row = self
            .find(&conn, handle.id()?)?
            .ok_or_else(|| SaverError::RecordNotFound {
                handle: handle.to_string(),
            })?;
        Ok(self.file_path(&row))
    }

    /// Delete pending records older than `max_age`, with their files.
    ///
    /// Returns how many records were removed.
    pub fn purge_stale_pending(&self, max_age: Duration) -> Result<usize> {
        let Some(cutoff) = TimeDelta::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            debug!(?max_age, "Pending max age predates any record, nothing to purge");
            return Ok(0);
        };
        let cutoff = cutoff.to_rfc3339_opts(SecondsFormat::Millis, true);

        let conn = self.conn();
        let stale = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROW_COLUMNS} FROM media WHERE is_pending = 1 AND date_added < ?1"
            ))?;
            stmt.query_map(params![cutoff], Row::from_sql)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        for row in &stale {
            let path = self.file_path(row);
            match fs::remove_file(&path) {
                Ok(()) => trace!(path = %path.display(), "Removed stale pending file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Could not remove pending file"),
            }
            conn.execute("DELETE FROM media WHERE id = ?1", params![row.id])?;
        }

        if !stale.is_empty() {
            info!(count = stale.len(), cutoff = %cutoff, "Purged stale pending records");
        }
        Ok(stale.len())
    }

    /// Point a pending record at a unique visible name.
    ///
    /// Returns the current and new file locations; the caller renames the
    /// file before committing.
    fn plan_publish(&self, conn: &Connection, row: &Row) -> Result<(PathBuf, PathBuf)> {
        let dir = self.root.join(&row.relative_path);
        let visible = unique_file_name(&dir, &row.display_name);
        conn.execute(
            "UPDATE media SET file_name = ?1 WHERE id = ?2",
            params![visible, row.id],
        )?;
        debug!(id = row.id, file = %visible, "Publishing pending record");
        Ok((dir.join(&row.file_name), dir.join(visible)))
    }
}

impl MediaStore for DirectoryMediaStore {
    fn insert(&self, values: &MediaValues) -> Result<Option<RecordHandle>> {
        let Some(display_name) = values.display_name.as_deref().filter(|n| !n.is_empty()) else {
            warn!("Refusing media record without a display name");
            return Ok(None);
        };
        let Some(mime_type) = values
            .mime_type
            .as_deref()
            .filter(|m| m.starts_with("image/"))
        else {
            warn!(mime = ?values.mime_type, "Refusing media record with a non-image MIME type");
            return Ok(None);
        };
        if Path::new(display_name).components().count() != 1 {
            warn!(display_name, "Refusing media record with a path-like display name");
            return Ok(None);
        }
        let relative_path = values.relative_path.as_deref().unwrap_or(DEFAULT_COLLECTION);
        check_relative_path(relative_path)?;
        let pending = values.is_pending.unwrap_or(false);

        let dir = self.root.join(relative_path);
        fs::create_dir_all(&dir)?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stamp = now_stamp();
        tx.execute(
            "INSERT INTO media (display_name, mime_type, relative_path, file_name, is_pending, date_added, date_modified)
             VALUES (?1, ?2, ?3, '', ?4, ?5, ?5)",
            params![display_name, mime_type, relative_path, pending, stamp],
        )?;
        let id = tx.last_insert_rowid();

        let file_name = if pending {
            format!(".pending-{id}-{display_name}")
        } else {
            unique_file_name(&dir, display_name)
        };
        tx.execute(
            "UPDATE media SET file_name = ?1 WHERE id = ?2",
            params![file_name, id],
        )?;
        // Commit only once the file exists.
        let path = dir.join(&file_name);
        File::create(&path)?;
        if let Err(e) = tx.commit() {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        let handle = RecordHandle::from_id(id);
        debug!(%handle, display_name, relative_path, pending, "Inserted media record");
        Ok(Some(handle))
    }

    fn open_writer(&self, handle: &RecordHandle) -> Result<Box<dyn Write + Send>> {
        let path = self.record_path(handle)?;
        trace!(%handle, path = %path.display(), "Opening record for writing");
        let file = OpenOptions::new().write(true).truncate(true).open(&path)?;
        Ok(Box::new(file))
    }

    fn update(&self, handle: &RecordHandle, values: &MediaValues) -> Result<usize> {
        let id = handle.id()?;
        if values.relative_path.is_some() {
            return Err(SaverError::MediaIndex(
                "Moving records between collections is not supported".to_string(),
            ));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let Some(row) = self.find(&tx, id)? else {
            return Ok(0);
        };

        if let Some(name) = values.display_name.as_deref() {
            tx.execute(
                "UPDATE media SET display_name = ?1 WHERE id = ?2",
                params![name, id],
            )?;
        }
        if let Some(mime) = values.mime_type.as_deref() {
            tx.execute(
                "UPDATE media SET mime_type = ?1 WHERE id = ?2",
                params![mime, id],
            )?;
        }
        let mut moved = None;
        if let Some(pending) = values.is_pending {
            if row.is_pending && !pending {
                // Re-read so a renamed display name is honoured.
                let current = self.find(&tx, id)?.unwrap_or(row);
                moved = Some(self.plan_publish(&tx, &current)?);
            }
            tx.execute(
                "UPDATE media SET is_pending = ?1 WHERE id = ?2",
                params![pending, id],
            )?;
        }
        tx.execute(
            "UPDATE media SET date_modified = ?1 WHERE id = ?2",
            params![now_stamp(), id],
        )?;

        // A failed rename drops the transaction, leaving the row as it was.
        if let Some((from, to)) = &moved {
            fs::rename(from, to)?;
        }
        if let Err(e) = tx.commit() {
            if let Some((from, to)) = &moved {
                let _ = fs::rename(to, from);
            }
            return Err(e.into());
        }
        Ok(1)
    }

    fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRecord>> {
        let conn = self.conn();
        let sql = if query.include_pending {
            format!("SELECT {ROW_COLUMNS} FROM media ORDER BY id")
        } else {
            format!("SELECT {ROW_COLUMNS} FROM media WHERE is_pending = 0 ORDER BY id")
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Row::from_sql)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let location = self.file_path(&row);
                let size = fs::metadata(&location).map(|m| m.len()).unwrap_or(0);
                MediaRecord {
                    handle: RecordHandle::from_id(row.id),
                    display_name: row.display_name,
                    mime_type: row.mime_type,
                    relative_path: row.relative_path,
                    is_pending: row.is_pending,
                    size,
                    date_added: row.date_added,
                    location: Some(location),
                }
            })
            .collect())
    }
}
