//! The `user_data` record type and the named queries built on it.
use crate::core::db::query::Param;
use crate::core::{Result, RowscopeError};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

pub(crate) const SELECT_USERS_SQL: &str = "SELECT user_id, name, email, age FROM user_data";

/// One row of `user_data`, with `age` already normalized to an integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub age: i64,
}

impl UserRecord {
    /// Builds a record from a row carrying `user_id`, `name`, `email` and `age`
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(UserRecord {
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            age: normalize_age(row.get_ref("age")?)?,
        })
    }
}

/// Normalizes a stored `DECIMAL` age to an integer.
///
/// SQLite hands NUMERIC-affinity values back as INTEGER, REAL or TEXT
/// depending on how they were written. Fractions are truncated toward zero.
pub fn normalize_age(value: ValueRef) -> Result<i64> {
    match value {
        ValueRef::Integer(i) => Ok(i),
        ValueRef::Real(f) if f.is_finite() => Ok(f.trunc() as i64),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| RowscopeError::Conversion(format!("age is not UTF-8: {}", e)))?;
            parse_decimal(text)
        }
        other => Err(RowscopeError::Conversion(format!(
            "age must be numeric, got {:?}",
            other.data_type()
        ))),
    }
}

/// Parses a decimal string such as `"42"` or `"42.9"` into a truncated integer
pub(crate) fn parse_decimal(text: &str) -> Result<i64> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Ok(i);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(f.trunc() as i64),
        _ => Err(RowscopeError::Conversion(format!(
            "'{}' is not a decimal number",
            text
        ))),
    }
}

/// Fetches every user in insertion order
pub fn fetch_all_users(conn: &Connection) -> Result<Vec<UserRecord>> {
    query_users(conn, &format!("{} ORDER BY rowid", SELECT_USERS_SQL), &[])
}

/// Looks up one user by id
pub fn get_user_by_id(conn: &Connection, user_id: &str) -> Result<Option<UserRecord>> {
    let mut stmt = conn.prepare(&format!("{} WHERE user_id = ?1", SELECT_USERS_SQL))?;
    let mut rows = stmt.query([user_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(UserRecord::from_row(row)?)),
        None => Ok(None),
    }
}

/// Users strictly older than `age`
pub fn users_older_than(conn: &Connection, age: i64) -> Result<Vec<UserRecord>> {
    query_users(
        conn,
        &format!("{} WHERE age > ?1 ORDER BY rowid", SELECT_USERS_SQL),
        &[Param::Integer(age)],
    )
}

/// Number of rows in `user_data`
pub fn count_users(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM user_data", [], |row| row.get(0))?)
}

/// Whether a user with this email is already stored
pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM user_data WHERE email = ?1", [email], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn query_users(conn: &Connection, sql: &str, params: &[Param]) -> Result<Vec<UserRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut users = Vec::new();
    while let Some(row) = rows.next()? {
        users.push(UserRecord::from_row(row)?);
    }
    Ok(users)
}
