/// Connection Management Module
///
/// Opens SQLite data sources and ties each connection to a scope that
/// releases it exactly once, on every exit path.

use crate::core::{Result, RowscopeError};
use rusqlite::Connection;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// How long SQLite waits on a locked database before reporting `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where connections come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A database file, created on first open
    File(PathBuf),
    /// A private in-memory database; every open yields a fresh, empty one
    Memory,
}

impl DataSource {
    /// Creates a file-backed data source
    pub fn file(path: impl Into<PathBuf>) -> Self {
        DataSource::File(path.into())
    }

    /// Returns the file path for file-backed sources
    pub fn path(&self) -> Option<&Path> {
        match self {
            DataSource::File(path) => Some(path),
            DataSource::Memory => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Memory => f.write_str(":memory:"),
        }
    }
}

/// Opens a connection to the given data source
///
/// # Errors
///
/// Returns `RowscopeError::Connection` if SQLite cannot open the source, or
/// `RowscopeError::Database` if the connection pragmas fail.
pub fn open(source: &DataSource) -> Result<Connection> {
    let opened = match source {
        DataSource::File(path) => Connection::open(path),
        DataSource::Memory => Connection::open_in_memory(),
    };
    let conn = opened.map_err(|error| RowscopeError::Connection {
        source_name: source.to_string(),
        error,
    })?;

    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    Ok(conn)
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A connection held for the duration of one unit of work.
///
/// The connection is released exactly once: by [`ConnectionScope::close`],
/// or by `Drop` on any other exit path (early return, `?`, unwinding).
/// Statements prepared from the connection borrow it, so they are always
/// finalized before the connection itself goes away.
pub struct ConnectionScope {
    connection: Option<Connection>,
    label: String,
    on_release: Option<ReleaseHook>,
}

impl ConnectionScope {
    /// Opens a new scope on the data source
    pub fn open(source: &DataSource) -> Result<Self> {
        let connection = open(source)?;
        debug!("Opened connection to {}", source);
        Ok(ConnectionScope {
            connection: Some(connection),
            label: source.to_string(),
            on_release: None,
        })
    }

    /// Registers a callback that runs once, when the connection is released
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Closes the connection, surfacing any error SQLite reports on close
    pub fn close(mut self) -> Result<()> {
        let result = match self.connection.take() {
            Some(conn) => conn.close().map_err(|(_, err)| RowscopeError::Database(err)),
            None => Ok(()),
        };
        debug!("Closed connection to {}", self.label);
        self.fire_release_hook();
        result
    }

    fn fire_release_hook(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl Deref for ConnectionScope {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
            .as_ref()
            .expect("connection is present until the scope is released")
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Err((_, err)) = conn.close() {
                warn!("Failed to close connection to {}: {}", self.label, err);
            } else {
                debug!("Released connection to {}", self.label);
            }
        }
        self.fire_release_hook();
    }
}

impl fmt::Debug for ConnectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionScope")
            .field("label", &self.label)
            .field("open", &self.connection.is_some())
            .finish()
    }
}

/// Runs `f` with a freshly opened connection and releases it afterwards
///
/// The error from `f` is returned untouched; the connection is still
/// released before it reaches the caller.
pub fn with_connection<T, F>(source: &DataSource, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let scope = ConnectionScope::open(source)?;
    let value = f(&scope)?;
    scope.close()?;
    Ok(value)
}
