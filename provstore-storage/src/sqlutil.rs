//! SQLite error mapping and cross-version tolerance helpers

use provstore_core::error::{Result, StoreError};
use rusqlite::ffi::ErrorCode;
use tracing::warn;

/// Map a rusqlite error into the store taxonomy.
///
/// `context` names the operation and the reference involved so constraint
/// failures read as "insert chunk: FOREIGN KEY constraint failed
/// (chunks.document_id)" rather than a bare SQLite message.
pub(crate) fn map_sql_err(context: &str, err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(code, message) => {
            let detail = message.clone().unwrap_or_else(|| code.to_string());
            match code.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    StoreError::DatabaseLocked(format!("{context}: {detail}"))
                }
                ErrorCode::ConstraintViolation => classify_constraint(context, &detail),
                ErrorCode::PermissionDenied => {
                    StoreError::PermissionDenied(format!("{context}: {detail}"))
                }
                _ => StoreError::Storage(format!("{context}: {detail}")),
            }
        }
        rusqlite::Error::QueryReturnedNoRows => {
            StoreError::Storage(format!("{context}: no rows returned"))
        }
        other => StoreError::Storage(format!("{context}: {other}")),
    }
}

fn classify_constraint(context: &str, detail: &str) -> StoreError {
    if detail.contains("FOREIGN KEY") {
        StoreError::ForeignKeyViolation(format!("{context}: {detail}"))
    } else if detail.contains("UNIQUE") || detail.contains("PRIMARY KEY") {
        StoreError::UniqueViolation(format!("{context}: {detail}"))
    } else if detail.contains("CHECK") {
        StoreError::CheckConstraintViolation(format!("{context}: {detail}"))
    } else {
        StoreError::CheckConstraintViolation(format!("{context}: {detail}"))
    }
}

/// Run `op`, tolerating only "no such table" failures.
///
/// Older databases legitimately lack tables introduced by later migrations;
/// any other failure re-raises. The tolerated case logs a warning so a
/// structurally broken database is never silently papered over.
pub(crate) fn tolerate_missing_table<T: Default>(
    table: &str,
    context: &str,
    op: impl FnOnce() -> std::result::Result<T, rusqlite::Error>,
) -> Result<T> {
    match op() {
        Ok(v) => Ok(v),
        Err(err) => {
            if is_missing_table(&err, table) {
                warn!(table, context, "table absent on this schema version; skipping");
                Ok(T::default())
            } else {
                Err(map_sql_err(context, err))
            }
        }
    }
}

fn is_missing_table(err: &rusqlite::Error, table: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("no such table") && message.contains(table)
        }
        _ => false,
    }
}
