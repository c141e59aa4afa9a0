//! Database layer for the memo tracker.

pub mod attachments;
pub mod memos;
pub mod repository;
pub mod stats;
pub mod subtasks;
pub mod templates;

use crate::error::{MemoError, MemoResult};
use crate::time::TimeNormalizer;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use repository::{MemoRepository, NewMemo, NewSubtask, SqliteRepository};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Reject blank titles on memos and templates.
pub(crate) fn require_title(title: &str) -> MemoResult<()> {
    if title.trim().is_empty() {
        return Err(MemoError::invalid_value("title", "title must not be empty"));
    }
    Ok(())
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    time: TimeNormalizer,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> MemoResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            time: TimeNormalizer::default(),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> MemoResult<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            time: TimeNormalizer::default(),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Use a different canonical zone for all timestamp handling.
    pub fn with_time_normalizer(mut self, time: TimeNormalizer) -> Self {
        self.time = time;
        self
    }

    /// The normalizer applied to every incoming and outgoing timestamp.
    pub fn time(&self) -> &TimeNormalizer {
        &self.time
    }

    fn lock(&self) -> MemoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MemoError::LockPoisoned)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> MemoResult<()> {
        let mut conn = self.lock()?;
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> MemoResult<T>
    where
        F: FnOnce(&Connection) -> MemoResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function inside one transaction.
    ///
    /// Commits when `f` returns `Ok`; any error drops the transaction, which
    /// rolls back every write made inside it.
    pub fn with_tx<F, T>(&self, f: F) -> MemoResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> MemoResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Repository view over a connection or transaction, sharing this handle's zone.
    pub(crate) fn repo<'c>(&self, conn: &'c Connection) -> SqliteRepository<'c> {
        SqliteRepository::new(conn, self.time)
    }
}
