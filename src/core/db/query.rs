/// Query Execution Module
///
/// Executes SQL with bound parameters and classifies the outcome as rows
/// (reads) or an affected-row count (writes).

use super::connection::{with_connection, DataSource};
use crate::core::{Result, RowscopeError};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Statement};
use tracing::debug;

/// A bound query parameter
pub type Param = Value;

/// Rows returned by a read statement
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Row values in column order
    pub rows: Vec<Vec<Value>>,
    /// Number of rows returned
    pub row_count: usize,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
        }
    }

    /// Index of the named column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Renders each row as a tuple on its own line, e.g. `(1, 'Alice', 30)`
    pub fn render(&self) -> String {
        let mut output = String::new();
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|v| format_value(v.into())).collect();
            output.push('(');
            output.push_str(&cells.join(", "));
            output.push_str(")\n");
        }
        output
    }
}

/// Outcome of executing a single statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The statement produced a result set
    Rows(QueryResult),
    /// The statement modified data; carries the number of affected rows
    Affected(usize),
}

impl QueryOutcome {
    /// Returns the rows, or an empty result for writes
    pub fn into_rows(self) -> QueryResult {
        match self {
            QueryOutcome::Rows(result) => result,
            QueryOutcome::Affected(_) => QueryResult::new(Vec::new(), Vec::new()),
        }
    }
}

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor { connection }
    }

    /// Executes one statement with bound parameters
    ///
    /// Statements that produce result columns are reads and return
    /// `QueryOutcome::Rows`. Everything else is a write: it runs in
    /// autocommit mode (or inside the caller's transaction) and returns the
    /// affected row count.
    ///
    /// # Errors
    ///
    /// Driver failures are returned as `RowscopeError::Database`.
    pub fn execute(&self, sql: &str, params: &[Param]) -> Result<QueryOutcome> {
        self.run(sql, params).map(|execution| execution.outcome)
    }

    /// Like [`execute`](Self::execute), also reporting whether SQLite judged
    /// the prepared statement read-only
    pub fn run(&self, sql: &str, params: &[Param]) -> Result<Execution> {
        let mut stmt = self.connection.prepare(sql)?;
        let read_only = stmt.readonly();

        let outcome = if stmt.column_count() == 0 {
            let affected = stmt.execute(params_from_iter(params.iter()))?;
            debug!("{:?} statement affected {} rows", StatementType::from_sql(sql), affected);
            QueryOutcome::Affected(affected)
        } else {
            QueryOutcome::Rows(collect_rows(&mut stmt, params)?)
        };

        Ok(Execution { outcome, read_only })
    }

    /// Executes a read-only statement and returns its rows
    ///
    /// The statement is checked before it is stepped, so a write is never
    /// run.
    ///
    /// # Errors
    ///
    /// Returns `RowscopeError::Query` if the statement could modify the
    /// database or does not produce a result set.
    pub fn query(&self, sql: &str, params: &[Param]) -> Result<QueryResult> {
        let mut stmt = self.connection.prepare(sql)?;
        if !stmt.readonly() || stmt.column_count() == 0 {
            return Err(RowscopeError::Query(format!(
                "not a read-only query: {}",
                sql
            )));
        }
        collect_rows(&mut stmt, params)
    }
}

/// Outcome of [`QueryExecutor::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub outcome: QueryOutcome,
    /// SQLite's `sqlite3_stmt_readonly` verdict for the statement
    pub read_only: bool,
}

fn collect_rows(stmt: &mut Statement<'_>, params: &[Param]) -> Result<QueryResult> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = columns.len();

    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get::<_, Value>(i)?);
            }
            Ok(values)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(QueryResult::new(columns, rows))
}

/// Opens the data source, executes one statement and releases the connection
///
/// The connection is released whether or not the statement succeeds.
pub fn execute_query(source: &DataSource, sql: &str, params: &[Param]) -> Result<QueryOutcome> {
    with_connection(source, |conn| QueryExecutor::new(conn).execute(sql, params))
}

/// Formats a SQLite value for display
///
/// Text is single-quoted so rendered rows read like tuples.
pub fn format_value(value: ValueRef) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    /// SELECT statement
    Select,
    /// WITH (common table expression) statement
    With,
    /// PRAGMA statement
    Pragma,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// CREATE statement
    Create,
    /// DROP statement
    Drop,
    /// ALTER statement
    Alter,
    /// BEGIN/COMMIT/ROLLBACK transaction commands
    Transaction,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from a SQL string
    pub fn from_sql(sql: &str) -> Self {
        let sql_upper = sql.trim_start().to_uppercase();
        let keyword = sql_upper
            .split(|c: char| c.is_whitespace() || c == ';' || c == '(')
            .next()
            .unwrap_or("");

        match keyword {
            "SELECT" => StatementType::Select,
            "WITH" => StatementType::With,
            "PRAGMA" => StatementType::Pragma,
            "INSERT" | "REPLACE" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" => StatementType::Create,
            "DROP" => StatementType::Drop,
            "ALTER" => StatementType::Alter,
            "BEGIN" | "COMMIT" | "END" | "ROLLBACK" => StatementType::Transaction,
            _ => StatementType::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_test_table(conn: &Connection) {
        conn.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT,
                age INTEGER
            );
            INSERT INTO users (name, age) VALUES ('Alice', 30);
            INSERT INTO users (name, age) VALUES ('Bob', 22);
            INSERT INTO users (name, age) VALUES ('Charlie', 28);
        ",
        )
        .unwrap();
    }

    #[test]
    fn test_select_returns_rows() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let executor = QueryExecutor::new(&conn);
        let result = executor
            .query("SELECT * FROM users WHERE age > ? ORDER BY id", &[Value::Integer(25)])
            .unwrap();

        assert_eq!(result.columns, vec!["id", "name", "age"]);
        assert_eq!(result.row_count, 2);
        assert_eq!(
            result.rows[0],
            vec![Value::Integer(1), Value::Text("Alice".into()), Value::Integer(30)]
        );
        assert_eq!(result.column_index("age"), Some(2));
    }

    #[test]
    fn test_write_returns_affected_count() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let executor = QueryExecutor::new(&conn);
        let outcome = executor
            .execute("UPDATE users SET age = age + 1 WHERE age < ?", &[Value::Integer(29)])
            .unwrap();
        assert_eq!(outcome, QueryOutcome::Affected(2));
    }

    #[test]
    fn test_parameters_are_bound_not_interpolated() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let executor = QueryExecutor::new(&conn);
        let hostile = Value::Text("x' OR '1'='1".into());
        let result = executor
            .query("SELECT * FROM users WHERE name = ?", &[hostile])
            .unwrap();
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_query_error_is_not_masked() {
        let conn = Connection::open_in_memory().unwrap();

        let executor = QueryExecutor::new(&conn);
        match executor.execute("SELECT * FROM nonexistent_table", &[]) {
            Err(RowscopeError::Database(err)) => {
                assert!(err.to_string().contains("no such table"))
            }
            other => panic!("Expected Database error, got {:?}", other),
        }
    }

    #[test]
    fn test_query_rejects_writes() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let executor = QueryExecutor::new(&conn);
        for sql in [
            "DELETE FROM users",
            "WITH doomed AS (SELECT 1) DELETE FROM users",
            "DELETE FROM users RETURNING id",
        ] {
            let result = executor.query(sql, &[]);
            assert!(matches!(result, Err(RowscopeError::Query(_))), "{}", sql);
        }

        // Rejected before stepping, so nothing was deleted.
        let count = executor.query("SELECT COUNT(*) FROM users", &[]).unwrap();
        assert_eq!(count.rows[0][0], Value::Integer(3));
    }

    #[test]
    fn test_run_reports_read_only() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let executor = QueryExecutor::new(&conn);
        assert!(executor.run("WITH x AS (SELECT 1) SELECT * FROM x", &[]).unwrap().read_only);

        let write = executor
            .run("WITH doomed AS (SELECT 1) DELETE FROM users WHERE age < 25", &[])
            .unwrap();
        assert!(!write.read_only);
        assert_eq!(write.outcome, QueryOutcome::Affected(1));
    }

    #[test]
    fn test_execute_query_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource::file(dir.path().join("exec.db"));

        execute_query(&source, "CREATE TABLE t (x INTEGER)", &[]).unwrap();
        let outcome = execute_query(&source, "INSERT INTO t VALUES (?1)", &[Value::Integer(7)]).unwrap();
        assert_eq!(outcome, QueryOutcome::Affected(1));

        let rows = execute_query(&source, "SELECT x FROM t", &[]).unwrap().into_rows();
        assert_eq!(rows.rows, vec![vec![Value::Integer(7)]]);
    }

    #[test]
    fn test_render_rows() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let result = QueryExecutor::new(&conn)
            .query("SELECT id, name, age FROM users ORDER BY id LIMIT 2", &[])
            .unwrap();
        insta::assert_snapshot!(result.render(), @r###"
        (1, 'Alice', 30)
        (2, 'Bob', 22)
        "###);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(ValueRef::Null), "NULL");
        assert_eq!(format_value(ValueRef::Real(1.5)), "1.5");
        assert_eq!(format_value(ValueRef::Blob(b"Hello")), "<BLOB: 5 bytes>");
    }

    #[test]
    fn test_statement_type_classification() {
        assert_eq!(StatementType::from_sql("SELECT * FROM users"), StatementType::Select);
        assert_eq!(StatementType::from_sql("  select 1"), StatementType::Select);
        assert_eq!(StatementType::from_sql("WITH x AS (SELECT 1) SELECT * FROM x"), StatementType::With);
        assert_eq!(StatementType::from_sql("INSERT INTO users VALUES (1, 'test')"), StatementType::Insert);
        assert_eq!(StatementType::from_sql("UPDATE users SET name = 'new'"), StatementType::Update);
        assert_eq!(StatementType::from_sql("DELETE FROM users WHERE id = 1"), StatementType::Delete);
        assert_eq!(StatementType::from_sql("CREATE TABLE test (id INTEGER)"), StatementType::Create);
        assert_eq!(StatementType::from_sql("DROP TABLE test"), StatementType::Drop);
        assert_eq!(StatementType::from_sql("BEGIN"), StatementType::Transaction);
        assert_eq!(StatementType::from_sql("COMMIT;"), StatementType::Transaction);
        assert_eq!(StatementType::from_sql("PRAGMA foreign_keys = ON"), StatementType::Pragma);
        assert_eq!(StatementType::from_sql("VACUUM"), StatementType::Other);
    }
}
