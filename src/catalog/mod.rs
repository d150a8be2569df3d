//! SQLite-backed catalog of entries and the commands that open them.
//!
//! One `Catalog` is one connection. It is `Send` but not `Sync`: a connection
//! is opened by the thread that runs queries on it and is never shared.
//! Queries take `&mut self`, so only one query callback can be live on a
//! connection at a time. Other threads reach a running query only through
//! an [`InterruptHandle`].

mod interrupt;
mod schema;

pub use interrupt::InterruptHandle;

use crate::model::{CatalogEntry, Command, DEFAULT_COMMAND, SearchResult, Timestamp};
use log::{debug, warn};
use rusqlite::{
    Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior, params,
    params_from_iter,
};
use std::collections::HashSet;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Confidence reported for every row; the catalog does no ranking.
pub const CATALOG_CONFIDENCE: f32 = 0.5;

/// Longest single wait for another connection to release the store.
const BUSY_WAIT: Duration = Duration::from_millis(100);

/// Lock timeout for writes and point lookups, which are not interruptible.
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Virtual machine steps between two checks of the stop flag.
const PROGRESS_OPS: i32 = 64;

const UPSERT_ENTRY: &str = "INSERT INTO entries (path, display_name, command_id) \
     VALUES (?1, ?2, ?3) \
     ON CONFLICT(path) DO UPDATE SET display_name = excluded.display_name, \
                                     command_id = excluded.command_id";
const ENTRY_ID: &str = "SELECT id FROM entries WHERE path = ?1";
const UPSERT_COMMAND: &str = "INSERT INTO command (display_name, execute) \
     VALUES (?1, ?2) \
     ON CONFLICT(display_name) DO UPDATE SET execute = excluded.execute";
const COMMAND_ID: &str = "SELECT id FROM command WHERE display_name = ?1";
const ENTRY_COLUMNS: &str = "SELECT id, path, display_name, command_id, lastuse FROM entries";
const FIND_RESULT: &str = "SELECT e.id, e.path, e.display_name, c.execute \
     FROM entries e LEFT JOIN command c ON c.id = e.command_id \
     WHERE e.path = ?1";
const FIND_COMMAND: &str = "SELECT id, display_name, execute FROM command WHERE display_name = ?1";
const TOUCH_ENTRY: &str = "UPDATE entries SET lastuse = ?1 WHERE id = ?2";
const REMOVE_ENTRY: &str = "DELETE FROM entries WHERE path = ?1";
const COUNT_ENTRIES: &str = "SELECT COUNT(*) FROM entries";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("opening catalog {} failed: {source}", .path.display())]
    Connection {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("initialization of catalog {} failed: {source}", .path.display())]
    Schema {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("{source} (SQL: {sql})")]
    Execution {
        sql: String,
        source: rusqlite::Error,
    },
}

/// How a query ended. Neither case is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Every matching row was handed to the callback.
    Completed,
    /// The query was interrupted or the callback asked to stop.
    Stopped,
}

pub struct Catalog {
    conn: Connection,
    path: PathBuf,
    interrupt: InterruptHandle,
    error: Option<String>,
}

impl Catalog {
    /// Opens the catalog at `path`, creating the file and its tables if
    /// needed. A file whose tables cannot be created is removed again.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let new_db = !exists(&path);

        let mut conn = Connection::open(&path).map_err(|source| CatalogError::Connection {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|source| CatalogError::Connection {
                path: path.clone(),
                source,
            })?;

        if new_db {
            debug!("Catalog: creating tables in {:?}", path);
            if let Err(source) = schema::create_tables(&mut conn) {
                drop(conn);
                discard(&path);
                return Err(CatalogError::Schema { path, source });
            }
        }

        Ok(Self {
            conn,
            path,
            interrupt: InterruptHandle::default(),
            error: None,
        })
    }

    pub fn disconnect(self) {
        if let Err((_, e)) = self.conn.close() {
            warn!("Catalog: closing {:?} failed: {}", self.path, e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle for stopping queries on this connection from other threads.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    pub fn restart(&self) {
        self.interrupt.restart();
    }

    /// Message and SQL of the last failed call, cleared by the next call.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Streams every entry whose display name contains all the
    /// whitespace-separated tokens of `query`, most recently used first.
    ///
    /// Matching is case-sensitive; quote characters are ignored. The
    /// callback receives ownership of each result and returns
    /// `ControlFlow::Break` to end the query early.
    ///
    /// An interrupted query returns `Ok(QueryOutcome::Stopped)`. If another
    /// connection holds the store, the query waits and retries until it
    /// gets through or is interrupted.
    pub fn search<F>(&mut self, query: &str, mut callback: F) -> Result<QueryOutcome, CatalogError>
    where
        F: FnMut(f32, SearchResult) -> ControlFlow<()>,
    {
        self.error = None;
        if self.interrupt.is_interrupted() {
            return Ok(QueryOutcome::Stopped);
        }

        let tokens = tokens(query);
        let sql = search_sql(tokens.len());

        if let Err(source) = self.conn.busy_timeout(Duration::ZERO) {
            return self.record(Err(CatalogError::Execution {
                sql: "PRAGMA busy_timeout".to_string(),
                source,
            }));
        }
        self.conn
            .progress_handler(PROGRESS_OPS, Some(self.interrupt.progress_hook()));

        let mut delivered = HashSet::new();
        let result = loop {
            if self.interrupt.is_interrupted() {
                break Ok(QueryOutcome::Stopped);
            }
            match stream_rows(
                &self.conn,
                &self.interrupt,
                &self.path,
                &sql,
                &tokens,
                &mut delivered,
                &mut callback,
            ) {
                Ok(outcome) => break Ok(outcome),
                Err(e) if is_code(&e, ErrorCode::OperationInterrupted) => {
                    break Ok(QueryOutcome::Stopped);
                }
                Err(e) if is_busy(&e) => {
                    debug!("Catalog: {:?} is busy, waiting", self.path);
                    self.interrupt.wait_busy(BUSY_WAIT);
                }
                Err(source) => {
                    break Err(CatalogError::Execution {
                        sql: sql.clone(),
                        source,
                    });
                }
            }
        };

        self.conn.progress_handler(0, None::<fn() -> bool>);
        self.record(result)
    }

    /// Inserts an entry, or updates the name and command of the entry that
    /// already has this path. Returns the entry id, which never changes.
    pub fn upsert_entry(
        &mut self,
        path: &str,
        display_name: &str,
        command_id: Option<i64>,
    ) -> Result<i64, CatalogError> {
        self.write(|tx| {
            tx.execute(UPSERT_ENTRY, params![path, display_name, command_id])
                .map_err(failed(UPSERT_ENTRY))?;
            tx.query_row(ENTRY_ID, [path], |row| row.get(0))
                .map_err(failed(ENTRY_ID))
        })
    }

    /// Inserts a command, or updates the template of the command with this
    /// display name. Returns the command id.
    pub fn upsert_command(
        &mut self,
        display_name: &str,
        execute_template: &str,
    ) -> Result<i64, CatalogError> {
        self.write(|tx| {
            tx.execute(UPSERT_COMMAND, params![display_name, execute_template])
                .map_err(failed(UPSERT_COMMAND))?;
            tx.query_row(COMMAND_ID, [display_name], |row| row.get(0))
                .map_err(failed(COMMAND_ID))
        })
    }

    pub fn find_entry(&mut self, path: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        let sql = format!("{ENTRY_COLUMNS} WHERE path = ?1");
        self.read(|conn| {
            conn.query_row(&sql, [path], entry_from_row)
                .optional()
                .map_err(failed(&sql))
        })
    }

    pub fn find_entry_by_id(&mut self, id: i64) -> Result<Option<CatalogEntry>, CatalogError> {
        let sql = format!("{ENTRY_COLUMNS} WHERE id = ?1");
        self.read(|conn| {
            conn.query_row(&sql, [id], entry_from_row)
                .optional()
                .map_err(failed(&sql))
        })
    }

    /// The entry with this path, as a search would report it.
    pub fn find_result(&mut self, path: &str) -> Result<Option<SearchResult>, CatalogError> {
        let catalog_path = self.path.clone();
        self.read(|conn| {
            conn.query_row(FIND_RESULT, [path], |row| result_from_row(row, &catalog_path))
                .optional()
                .map_err(failed(FIND_RESULT))
        })
    }

    pub fn find_command(&mut self, display_name: &str) -> Result<Option<Command>, CatalogError> {
        self.read(|conn| {
            conn.query_row(FIND_COMMAND, [display_name], |row| {
                Ok(Command {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    execute_template: row.get(2)?,
                })
            })
            .optional()
            .map_err(failed(FIND_COMMAND))
        })
    }

    /// All entries, most recently used first.
    pub fn list_entries(&mut self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let sql = format!("{ENTRY_COLUMNS} ORDER BY lastuse DESC, id ASC");
        self.read(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(failed(&sql))?;
            let rows = stmt.query_map([], entry_from_row).map_err(failed(&sql))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(failed(&sql))
        })
    }

    pub fn entry_count(&mut self) -> Result<usize, CatalogError> {
        self.read(|conn| {
            conn.query_row(COUNT_ENTRIES, [], |row| row.get::<_, i64>(0))
                .map(|count| count as usize)
                .map_err(failed(COUNT_ENTRIES))
        })
    }

    /// Marks an entry as used now. Returns false if no entry has this id.
    pub fn update_entry_timestamp(&mut self, entry_id: i64) -> Result<bool, CatalogError> {
        let now = Timestamp::now();
        self.write(|tx| {
            tx.execute(TOUCH_ENTRY, params![now.as_str(), entry_id])
                .map(|changed| changed > 0)
                .map_err(failed(TOUCH_ENTRY))
        })
    }

    /// Returns false if no entry has this path.
    pub fn remove_entry(&mut self, path: &str) -> Result<bool, CatalogError> {
        self.write(|tx| {
            tx.execute(REMOVE_ENTRY, [path])
                .map(|changed| changed > 0)
                .map_err(failed(REMOVE_ENTRY))
        })
    }

    /// Deletes the entries pointing at local files that no longer exist.
    /// Entries whose path is not absolute (URLs, window ids) are kept.
    pub fn remove_stale_entries(&mut self) -> Result<usize, CatalogError> {
        let stale: Vec<String> = self
            .list_entries()?
            .into_iter()
            .map(|entry| entry.path)
            .filter(|path| path.starts_with('/') && !Path::new(path).exists())
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        self.write(|tx| {
            let mut removed = 0;
            for path in &stale {
                removed += tx.execute(REMOVE_ENTRY, [path]).map_err(failed(REMOVE_ENTRY))?;
            }
            Ok(removed)
        })
    }

    fn write<T>(
        &mut self,
        op: impl FnOnce(&Transaction<'_>) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        self.error = None;
        let result = (|| {
            self.conn
                .busy_timeout(LOCK_TIMEOUT)
                .map_err(failed("PRAGMA busy_timeout"))?;
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(failed("BEGIN IMMEDIATE"))?;
            // Dropping the transaction on error rolls it back.
            let value = op(&tx)?;
            tx.commit().map_err(failed("COMMIT"))?;
            Ok(value)
        })();
        self.record(result)
    }

    fn read<T>(
        &mut self,
        op: impl FnOnce(&Connection) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        self.error = None;
        let result = self
            .conn
            .busy_timeout(LOCK_TIMEOUT)
            .map_err(failed("PRAGMA busy_timeout"))
            .and_then(|_| op(&self.conn));
        self.record(result)
    }

    fn record<T>(&mut self, result: Result<T, CatalogError>) -> Result<T, CatalogError> {
        if let Err(e) = &result {
            self.error = Some(e.to_string());
        }
        result
    }
}

/// Splits a query into the tokens the SQL filter requires, dropping quotes.
fn tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| token.chars().filter(|c| !matches!(c, '\'' | '"')).collect::<String>())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Column order must match `stream_rows`.
fn search_sql(token_count: usize) -> String {
    let mut sql = String::from(
        "SELECT e.id, e.path, e.display_name, c.execute \
         FROM entries e LEFT JOIN command c ON c.id = e.command_id \
         WHERE 1",
    );
    for i in 1..=token_count {
        sql.push_str(&format!(" AND instr(e.display_name, ?{i}) > 0"));
    }
    sql.push_str(" ORDER BY e.lastuse DESC, e.id ASC");
    sql
}

/// Runs one attempt of a search. Rows whose id is in `delivered` were
/// handed out by an earlier attempt and are skipped; ids are used rather
/// than a row count because a write between attempts can reorder rows.
fn stream_rows<F>(
    conn: &Connection,
    interrupt: &InterruptHandle,
    catalog_path: &Path,
    sql: &str,
    tokens: &[String],
    delivered: &mut HashSet<i64>,
    callback: &mut F,
) -> rusqlite::Result<QueryOutcome>
where
    F: FnMut(f32, SearchResult) -> ControlFlow<()>,
{
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(params_from_iter(tokens))?;
    while let Some(row) = rows.next()? {
        if interrupt.is_interrupted() {
            return Ok(QueryOutcome::Stopped);
        }
        if !delivered.insert(row.get(0)?) {
            continue;
        }
        let result = result_from_row(row, catalog_path)?;
        if callback(CATALOG_CONFIDENCE, result).is_break() || interrupt.is_interrupted() {
            return Ok(QueryOutcome::Stopped);
        }
    }
    Ok(QueryOutcome::Completed)
}

/// Reads `id, path, display_name, execute`.
fn result_from_row(row: &Row<'_>, catalog_path: &Path) -> rusqlite::Result<SearchResult> {
    Ok(SearchResult {
        entry_id: row.get(0)?,
        path: row.get(1)?,
        display_name: row.get(2)?,
        execute_template: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
        catalog_path: catalog_path.to_path_buf(),
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        path: row.get(1)?,
        display_name: row.get(2)?,
        command_id: row.get(3)?,
        last_use: row
            .get::<_, Option<String>>(4)?
            .and_then(|text| Timestamp::parse(&text)),
    })
}

fn failed(sql: &str) -> impl FnOnce(rusqlite::Error) -> CatalogError + '_ {
    move |source| CatalogError::Execution {
        sql: sql.to_string(),
        source,
    }
}

fn is_code(e: &rusqlite::Error, code: ErrorCode) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == code)
}

fn is_busy(e: &rusqlite::Error) -> bool {
    is_code(e, ErrorCode::DatabaseBusy) || is_code(e, ErrorCode::DatabaseLocked)
}

fn exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn discard(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = fs::remove_file(file);
    }
}
