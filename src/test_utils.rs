/// # Test Utilities Module
///
/// Fixtures shared by the unit tests: a file-backed `user_data` database in a
/// temporary directory, plus helpers to seed it and to write CSV input.

use crate::core::db::{ensure_user_table, open, DataSource};
use rusqlite::{params, Connection};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A temporary database file holding the `user_data` table.
///
/// Every test gets its own directory, so tests never share state.
pub struct UserFixture {
    dir: TempDir,
    pub source: DataSource,
}

impl UserFixture {
    /// Creates the table and inserts `(name, email, age)` rows in order
    pub fn with_users(users: &[(&str, &str, i64)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource::file(dir.path().join("users.db"));
        let fixture = UserFixture { dir, source };

        let conn = fixture.connect();
        ensure_user_table(&conn, false).unwrap();
        for (i, (name, email, age)) in users.iter().enumerate() {
            conn.execute(
                "INSERT INTO user_data (user_id, name, email, age) VALUES (?1, ?2, ?3, ?4)",
                params![format!("user-{:04}", i), name, email, age],
            )
            .unwrap();
        }
        fixture
    }

    /// Creates `count` generated users; ages cycle through 18..=67
    pub fn with_count(count: usize) -> Self {
        let rows: Vec<(String, String, i64)> = (0..count)
            .map(|i| {
                (
                    format!("User {}", i),
                    format!("user{}@example.com", i),
                    18 + (i as i64 % 50),
                )
            })
            .collect();
        let borrowed: Vec<(&str, &str, i64)> = rows
            .iter()
            .map(|(n, e, a)| (n.as_str(), e.as_str(), *a))
            .collect();
        Self::with_users(&borrowed)
    }

    /// A fresh connection to the fixture database
    pub fn connect(&self) -> Connection {
        open(&self.source).unwrap()
    }

    /// Writes a file next to the database and returns its path
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }
}
