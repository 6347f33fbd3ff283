use crate::core::db::{with_connection, DataSource};
use crate::core::Result;
use rusqlite::Connection;

/// Opens a scoped connection, passes it to `f` as its first argument and
/// releases it afterwards, whatever `f` returns.
pub fn with_db_connection<T, F>(source: &DataSource, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    with_connection(source, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::UserFixture;
    use crate::users::get_user_by_id;

    #[test]
    fn test_injects_connection() {
        let fixture = UserFixture::with_users(&[("Alice", "alice@example.com", 30)]);

        let user = with_db_connection(&fixture.source, |conn| get_user_by_id(conn, "user-0000"))
            .unwrap()
            .unwrap();
        assert_eq!(user.name, "Alice");
    }

    #[test]
    fn test_connection_failure_propagates() {
        let source = DataSource::file("/nonexistent/dir/users.db");
        let mut called = false;
        let result = with_db_connection(&source, |_| {
            called = true;
            Ok(())
        });
        assert!(result.is_err());
        assert!(!called);
    }
}
