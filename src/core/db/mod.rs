/// Database Module
///
/// The database layer is split into three concerns:
/// - **Connection scopes** (`connection.rs`): opening data sources and releasing them exactly once
/// - **Schema** (`schema.rs`): the `user_data` table definition and introspection helpers
/// - **Query execution** (`query.rs`): bound-parameter execution and result formatting
///
/// All operations return the crate-wide `RowscopeError`.
pub mod connection;
pub mod query;
pub mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;
