//! Two independent read queries run side by side, each on its own connection.
use crate::core::db::{with_connection, DataSource, QueryExecutor, QueryResult};
use crate::core::{Result, RowscopeError};
use crate::users::SELECT_USERS_SQL;
use rusqlite::types::Value;
use std::any::Any;
use std::thread;
use tracing::{debug, info};

/// Age threshold used by [`fetch_users_and_older`] when none is given
pub const DEFAULT_MIN_AGE: i64 = 40;

const NO_PARAMS: &[Value] = &[];

/// Runs `first_sql` and `second_sql` concurrently and returns both results in
/// that order. Both queries are awaited even if one fails; the first error
/// (in argument order) wins.
pub fn fetch_concurrently(
    source: &DataSource,
    first_sql: &str,
    second_sql: &str,
) -> Result<(QueryResult, QueryResult)> {
    fetch_pair(source, (first_sql, NO_PARAMS), (second_sql, NO_PARAMS))
}

/// All users, and the users strictly older than `min_age`
pub fn fetch_users_and_older(source: &DataSource, min_age: Option<i64>) -> Result<(QueryResult, QueryResult)> {
    let min_age = min_age.unwrap_or(DEFAULT_MIN_AGE);
    let all = format!("{} ORDER BY rowid", SELECT_USERS_SQL);
    let older = format!("{} WHERE age > ?1 ORDER BY rowid", SELECT_USERS_SQL);
    let older_params = [Value::Integer(min_age)];
    fetch_pair(source, (all.as_str(), NO_PARAMS), (older.as_str(), &older_params[..]))
}

fn fetch_pair(
    source: &DataSource,
    first: (&str, &[Value]),
    second: (&str, &[Value]),
) -> Result<(QueryResult, QueryResult)> {
    let (first, second) = thread::scope(|scope| {
        let first_worker = scope.spawn(move || run_query(source, first));
        let second_worker = scope.spawn(move || run_query(source, second));
        (joined(first_worker.join()), joined(second_worker.join()))
    });

    let pair = (first?, second?);
    info!(
        "Concurrent fetch returned {} and {} rows",
        pair.0.row_count, pair.1.row_count
    );
    Ok(pair)
}

fn run_query(source: &DataSource, (sql, params): (&str, &[Value])) -> Result<QueryResult> {
    debug!("Worker running query: {}", sql);
    with_connection(source, |conn| QueryExecutor::new(conn).query(sql, params))
}

fn joined<T>(outcome: std::thread::Result<Result<T>>) -> Result<T> {
    outcome.map_err(|payload| RowscopeError::Worker(panic_message(payload)))?
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("query worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("query worker panicked: {}", message)
    } else {
        "query worker panicked".to_string()
    }
}
