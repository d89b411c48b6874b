// sqlx error mapping
//
// Orphan rules keep `From<sqlx::Error>` out of core, so adapters map explicitly.

use tenantq_core::error::AppError;
use tenantq_core::port::PersistenceError;

/// Convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite extended result codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some("2067") | Some("1555") => AppError::Database(format!(
                    "Unique constraint violation: {}",
                    db_err.message()
                )),
                Some("787") | Some("3850") => AppError::Database(format!(
                    "Foreign key constraint violation: {}",
                    db_err.message()
                )),
                // SQLITE_BUSY / SQLITE_LOCKED: another writer holds the database
                Some("5") | Some("6") => {
                    AppError::StoreUnavailable(format!("Database locked: {}", db_err.message()))
                }
                Some(code) => AppError::Database(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => AppError::Database(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        // Connection, pool and IO failures
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::StoreUnavailable(err.to_string()),
        _ => AppError::Database(err.to_string()),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("2067") | Some("1555"))
        }
        _ => false,
    }
}

/// Same mapping for the persistence collaborator used inside handlers
pub(crate) fn map_persistence_error(err: sqlx::Error) -> PersistenceError {
    if is_unique_violation(&err) {
        return PersistenceError::Conflict(err.to_string());
    }
    match map_sqlx_error(err) {
        AppError::StoreUnavailable(msg) => PersistenceError::Unavailable(msg),
        other => PersistenceError::Rejected(other.to_string()),
    }
}
