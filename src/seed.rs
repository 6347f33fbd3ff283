//! One-time database setup and CSV-driven population of `user_data`.
use crate::core::db::{ensure_user_table, open, DataSource};
use crate::core::Result;
use crate::csv_input::{read_users, CsvUser};
use crate::users::email_exists;
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// How seeding keeps emails unique
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupStrategy {
    /// Look the email up before each insert. Safe for a single writer only:
    /// two concurrent seeders can both pass the check.
    #[default]
    Application,
    /// Add a UNIQUE index on `email` and let SQLite drop duplicates.
    /// Race-free, but fails on a table that already holds duplicates.
    Constraint,
}

impl std::str::FromStr for DedupStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "application" => Ok(DedupStrategy::Application),
            "constraint" => Ok(DedupStrategy::Constraint),
            other => Err(format!(
                "unknown dedup strategy '{}' (expected 'application' or 'constraint')",
                other
            )),
        }
    }
}

/// Rows inserted and rows skipped as duplicates by one seeding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Opens the database, creating the file and its parent directory if needed
pub fn create_database(source: &DataSource) -> Result<Connection> {
    if let Some(parent) = source.path().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating directory {:?}", parent);
            fs::create_dir_all(parent)?;
        }
    }
    open(source)
}

/// Creates `user_data` and the indexes the strategy needs
pub fn create_table(conn: &Connection, strategy: DedupStrategy) -> Result<()> {
    ensure_user_table(conn, strategy == DedupStrategy::Constraint)?;
    info!("Table user_data is ready");
    Ok(())
}

/// Inserts the CSV rows whose email is not stored yet, in one transaction
pub fn insert_data(conn: &mut Connection, csv_path: &Path, strategy: DedupStrategy) -> Result<SeedReport> {
    let users = read_users(csv_path)?;
    insert_users(conn, &users, strategy)
}

/// Inserts `users`, suppressing duplicate emails per `strategy`
pub fn insert_users(conn: &mut Connection, users: &[CsvUser], strategy: DedupStrategy) -> Result<SeedReport> {
    let tx = conn.transaction()?;
    let mut report = SeedReport::default();

    {
        let insert_sql = match strategy {
            DedupStrategy::Application => {
                "INSERT INTO user_data (user_id, name, email, age) VALUES (?1, ?2, ?3, ?4)"
            }
            DedupStrategy::Constraint => {
                "INSERT OR IGNORE INTO user_data (user_id, name, email, age) VALUES (?1, ?2, ?3, ?4)"
            }
        };
        let mut insert = tx.prepare(insert_sql)?;

        for user in users {
            if strategy == DedupStrategy::Application && email_exists(&tx, &user.email)? {
                report.skipped += 1;
                continue;
            }

            let user_id = Uuid::new_v4().to_string();
            let changed = insert.execute(params![user_id, user.name, user.email, user.age])?;
            if changed == 0 {
                report.skipped += 1;
            } else {
                report.inserted += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        "Seeded user_data: {} inserted, {} skipped",
        report.inserted, report.skipped
    );
    Ok(report)
}

/// Creates the database and table, then loads the CSV
pub fn seed(source: &DataSource, csv_path: &Path, strategy: DedupStrategy) -> Result<SeedReport> {
    let mut conn = create_database(source)?;
    create_table(&conn, strategy)?;
    insert_data(&mut conn, csv_path, strategy)
}
