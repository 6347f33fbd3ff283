/// Core Module for rowscope
///
/// Shared infrastructure for the rest of the crate: connection scopes,
/// query execution, schema helpers and the error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, RowscopeError};
