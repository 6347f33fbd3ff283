/// Schema Module
///
/// Owns the `user_data` table definition and the introspection helpers used
/// to verify it.

use crate::core::Result;
use rusqlite::{Connection, OptionalExtension, Row};

/// Name of the table every user-facing operation reads from
pub const USER_TABLE: &str = "user_data";

const USER_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user_data (
    user_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    age DECIMAL NOT NULL
)"#;

const USER_ID_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_user_data_user_id ON user_data (user_id)";

const EMAIL_UNIQUE_INDEX_SQL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_data_email ON user_data (email)";

/// Represents a database column with its metadata
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type name (e.g., "TEXT", "DECIMAL")
    pub type_name: String,
    /// Whether the column allows NULL values
    pub notnull: bool,
    /// Whether this column is part of the primary key
    pub pk: bool,
}

impl Column {
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Column {
            name: row.get(0)?,
            type_name: row.get(1)?,
            notnull: row.get(2)?,
            pk: row.get(3)?,
        })
    }
}

/// Represents a database index
#[derive(Debug, Clone)]
pub struct Index {
    /// Index name
    pub name: String,
    /// Whether this is a UNIQUE index
    pub unique: bool,
    /// Column names that make up this index
    pub columns: Vec<String>,
}

impl Index {
    fn from_pragma_info(conn: &Connection, name: String, unique: bool) -> Result<Self> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_index_info(?1)")?;
        let columns = stmt
            .query_map([&name], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Index {
            name,
            unique,
            columns,
        })
    }
}

/// Structure of one table
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<Column>,
    /// Indexes defined on this table, including automatic ones
    pub indexes: Vec<Index>,
}

impl Table {
    /// Introspects the named table; `None` if it does not exist
    pub fn from_database(conn: &Connection, table_name: &str) -> Result<Option<Self>> {
        if !table_exists(conn, table_name)? {
            return Ok(None);
        }

        let mut stmt =
            conn.prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table_name], Column::from_pragma_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare("SELECT name, \"unique\" FROM pragma_index_list(?1)")?;
        let index_heads = stmt
            .query_map([table_name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut indexes = Vec::with_capacity(index_heads.len());
        for (name, unique) in index_heads {
            indexes.push(Index::from_pragma_info(conn, name, unique)?);
        }

        Ok(Some(Table {
            name: table_name.to_string(),
            columns,
            indexes,
        }))
    }

    /// Whether some UNIQUE index covers exactly the given column
    pub fn has_unique_index_on(&self, column: &str) -> bool {
        self.indexes
            .iter()
            .any(|idx| idx.unique && idx.columns.len() == 1 && idx.columns[0] == column)
    }
}

/// Checks whether a table with the given name exists
pub fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table_name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Creates `user_data` and its indexes if they are absent
///
/// With `unique_email` the table also gets a UNIQUE index on `email`, which
/// lets inserts rely on the database for duplicate suppression.
pub fn ensure_user_table(conn: &Connection, unique_email: bool) -> Result<()> {
    conn.execute(USER_TABLE_SQL, [])?;
    conn.execute(USER_ID_INDEX_SQL, [])?;
    if unique_email {
        conn.execute(EMAIL_UNIQUE_INDEX_SQL, [])?;
    }
    Ok(())
}
