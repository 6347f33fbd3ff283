use crate::core::db::StatementType;
use chrono::Local;
use tracing::info;

/// Timestamp format used in query log lines
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Logs the query text with a timestamp, then runs `f` unchanged
pub fn log_queries<T, F>(sql: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let timestamp = Local::now().format(LOG_TIMESTAMP_FORMAT);
    info!(
        %timestamp,
        kind = ?StatementType::from_sql(sql),
        "Executing SQL query: {}",
        sql
    );
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Result, RowscopeError};

    #[test]
    fn test_passes_result_through() {
        let value = log_queries("SELECT 1", || 41 + 1);
        assert_eq!(value, 42);

        let failed: Result<()> = log_queries("SELECT nope", || {
            Err(RowscopeError::Query("nope".to_string()))
        });
        assert!(failed.is_err());
    }

    #[test]
    fn test_timestamp_format() {
        let rendered = Local::now().format(LOG_TIMESTAMP_FORMAT).to_string();
        // e.g. 2024-05-01 13:45:09
        assert_eq!(rendered.len(), 19);
        assert_eq!(&rendered[4..5], "-");
        assert_eq!(&rendered[10..11], " ");
    }
}
