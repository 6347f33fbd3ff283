/// Rowscope Error Module
///
/// This module defines the error type shared by every layer of the crate.
/// Library code propagates these errors; only the binary decides how to
/// report them.
use rusqlite::ErrorCode;
use thiserror::Error;

/// Error type for all rowscope operations.
///
/// Covers:
/// - Driver failures (connect, prepare, step, commit)
/// - Configuration resolution and settings files
/// - CSV seeding input
/// - Value normalization and nested-map lookups
#[derive(Error, Debug)]
pub enum RowscopeError {
    /// Errors reported by SQLite while running a statement
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The data source could not be opened
    #[error("Connection error ({source_name}): {error}")]
    Connection {
        source_name: String,
        #[source]
        error: rusqlite::Error,
    },

    /// Query execution errors with added context
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid configuration values or unreadable settings files
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed CSV input, with the 1-based line number
    #[error("CSV error at line {line}: {message}")]
    Csv { line: usize, message: String },

    /// A column value that cannot be normalized to the expected type
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A key path segment that is absent; displays as the key alone
    #[error("{0}")]
    MissingKey(String),

    /// Caller supplied an out-of-range argument (zero batch size, etc.)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A worker thread panicked or disappeared before reporting
    #[error("Worker error: {0}")]
    Worker(String),
}

impl RowscopeError {
    /// Whether retrying the operation may succeed.
    ///
    /// Busy and locked databases clear up once the competing writer
    /// finishes; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            RowscopeError::Database(err) | RowscopeError::Connection { error: err, .. } => {
                is_busy(err)
            }
            _ => false,
        }
    }

    /// The missing key, if this is a [`RowscopeError::MissingKey`].
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            RowscopeError::MissingKey(key) => Some(key),
            _ => None,
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}

/// Type alias for Result to use RowscopeError as the error type.
pub type Result<T> = std::result::Result<T, RowscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_error_display() {
        let db_err = RowscopeError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let query_err = RowscopeError::Query("Syntax error".to_string());
        assert!(query_err.to_string().contains("Query error"));

        let csv_err = RowscopeError::Csv {
            line: 4,
            message: "missing field".to_string(),
        };
        assert_eq!(csv_err.to_string(), "CSV error at line 4: missing field");
    }

    #[test]
    fn test_missing_key_displays_bare_key() {
        let err = RowscopeError::MissingKey("b".to_string());
        assert_eq!(err.to_string(), "b");
        assert_eq!(err.missing_key(), Some("b"));
    }

    #[test]
    fn test_busy_and_locked_are_transient() {
        // SQLITE_BUSY = 5, SQLITE_LOCKED = 6
        assert!(RowscopeError::Database(sqlite_failure(5)).is_transient());
        assert!(RowscopeError::Database(sqlite_failure(6)).is_transient());
        assert!(RowscopeError::Connection {
            source_name: "test.db".to_string(),
            error: sqlite_failure(5),
        }
        .is_transient());
    }

    #[test]
    fn test_permanent_errors_are_not_transient() {
        // SQLITE_CONSTRAINT = 19
        assert!(!RowscopeError::Database(sqlite_failure(19)).is_transient());
        assert!(!RowscopeError::Query("boom".to_string()).is_transient());
        assert!(!RowscopeError::Database(rusqlite::Error::QueryReturnedNoRows).is_transient());
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RowscopeError = io_err.into();
        match err {
            RowscopeError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{ invalid json }");
        let err: RowscopeError = json_err.unwrap_err().into();
        match err {
            RowscopeError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }
}
