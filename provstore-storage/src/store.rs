//! The document store engine
//!
//! One [`DocumentStore`] exclusively owns one SQLite connection. All writes
//! go through [`DocumentStore::with_tx`], which wraps the closure in a
//! single immediate transaction: a failing step rolls the whole operation
//! back, so no caller ever observes a partially applied mutation. Reads run
//! against the same connection at WAL snapshot isolation.

use std::path::{Path, PathBuf};
use std::sync::Once;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use tracing::{debug, info};

use provstore_core::error::{Result, StoreError};

use crate::manager::StorageConfig;
use crate::schema::{self, migrations};
use crate::sqlutil::map_sql_err;

/// Register the vec0 extension for every subsequently opened connection.
/// sqlite3_auto_extension is process-global, so this runs exactly once.
#[allow(unsafe_code)]
fn register_vector_extension() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| unsafe {
        #[allow(clippy::missing_transmute_annotations)]
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

/// Single-writer handle to one database
#[derive(Debug)]
pub struct DocumentStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    schema_version: i64,
}

impl DocumentStore {
    /// Open (creating if needed) the database at `path`, applying pragmas,
    /// pending migrations, and schema verification
    pub fn open_at(path: &Path, config: &StorageConfig) -> Result<Self> {
        register_vector_extension();

        let mut conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| map_sql_err(&format!("open {}", path.display()), e))?;

        configure_connection(&conn, config)?;
        confirm_vector_extension(&conn)?;

        let schema_version = migrations::ensure_schema(&mut conn)?;
        schema::verify_schema(&conn)?;

        info!(path = %path.display(), schema_version, "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            schema_version,
        })
    }

    /// In-memory store, migrated and verified. Test constructor.
    pub fn in_memory() -> Result<Self> {
        register_vector_extension();
        let mut conn = Connection::open_in_memory()
            .map_err(|e| map_sql_err("open in-memory database", e))?;
        let config = StorageConfig::default();
        configure_connection(&conn, &config)?;
        confirm_vector_extension(&conn)?;
        let schema_version = migrations::ensure_schema(&mut conn)?;
        schema::verify_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
            schema_version,
        })
    }

    /// Path of the backing database file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version the store was migrated to at open
    #[must_use]
    pub fn schema_version(&self) -> i64 {
        self.schema_version
    }

    /// Run a read-only closure against the connection
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a write closure inside one immediate transaction.
    ///
    /// Commits on `Ok`, rolls back on `Err`; the error is returned
    /// unchanged.
    pub(crate) fn with_tx<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| map_sql_err("begin transaction", e))?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| map_sql_err("commit", e))?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "transaction rolled back");
                // Drop rolls back; make it explicit.
                let _ = tx.rollback();
                Err(err)
            }
        }
    }
}

fn configure_connection(conn: &Connection, config: &StorageConfig) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| map_sql_err("set journal_mode", e))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| map_sql_err("set foreign_keys", e))?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| map_sql_err("set synchronous", e))?;
    conn.pragma_update(None, "cache_size", -config.cache_size_kib)
        .map_err(|e| map_sql_err("set cache_size", e))?;
    conn.pragma_update(None, "busy_timeout", config.busy_timeout_ms as i64)
        .map_err(|e| map_sql_err("set busy_timeout", e))?;
    Ok(())
}

/// The engine is useless without vector search; refuse to run rather than
/// degrade.
fn confirm_vector_extension(conn: &Connection) -> Result<()> {
    let loaded: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_module_list WHERE name = 'vec0'",
            [],
            |r| r.get(0),
        )
        .map_err(|e| map_sql_err("probe vector extension", e))?;
    if loaded {
        Ok(())
    } else {
        Err(StoreError::SchemaMismatch(
            "vec0 vector extension is not loaded".to_string(),
        ))
    }
}
