//! Data source seam used by backend sequences and the reference store.

use crate::db::{open_db, open_db_in_memory, DbResult};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// Minimal statement executor a backend sequence needs.
///
/// Implementations are external (pooled JDBC-style sources, test doubles);
/// `SqliteDataSource` is the bundled one.
pub trait SqlExecutor: Send + Sync {
    /// Runs one or more statements that return no rows.
    fn execute(&self, sql: &str) -> DbResult<()>;
    /// Runs a statement and reads column 0 of its first row.
    ///
    /// Returns `None` when the statement yields no row.
    fn query_i64(&self, sql: &str) -> DbResult<Option<i64>>;
}

/// Shared SQLite connection guarded by a mutex.
///
/// Cloning shares the same connection, so the store and the sequence
/// allocator observe the same database.
#[derive(Clone)]
pub struct SqliteDataSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDataSource {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already bootstrapped connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Locks the connection for the guard's lifetime.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

impl SqlExecutor for SqliteDataSource {
    fn execute(&self, sql: &str) -> DbResult<()> {
        self.connection().execute_batch(sql)?;
        Ok(())
    }

    fn query_i64(&self, sql: &str) -> DbResult<Option<i64>> {
        let conn = self.connection();
        let value = conn
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{SqlExecutor, SqliteDataSource};

    #[test]
    fn query_i64_returns_none_for_empty_result() {
        let source = SqliteDataSource::in_memory().unwrap();
        source
            .execute("CREATE TABLE counters (value INTEGER NOT NULL);")
            .unwrap();
        assert_eq!(source.query_i64("SELECT value FROM counters").unwrap(), None);

        source.execute("INSERT INTO counters VALUES (41);").unwrap();
        assert_eq!(
            source.query_i64("SELECT value + 1 FROM counters").unwrap(),
            Some(42)
        );
    }

    #[test]
    fn clones_share_one_connection() {
        let source = SqliteDataSource::in_memory().unwrap();
        let clone = source.clone();
        source.execute("CREATE TABLE shared (x INTEGER);").unwrap();
        clone.execute("INSERT INTO shared VALUES (1);").unwrap();
        assert_eq!(
            source.query_i64("SELECT COUNT(*) FROM shared").unwrap(),
            Some(1)
        );
    }
}
