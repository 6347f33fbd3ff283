//! Cross-cutting behaviors composed around query execution.
//!
//! Each layer is an ordinary higher-order function (or, for the cache, an
//! owned object) that can be used on its own. [`pipeline::QueryPipeline`]
//! stacks them in a fixed order.
pub mod cache;
pub mod inject;
pub mod logging;
pub mod pipeline;
pub mod retry;

pub use cache::{CacheStats, QueryCache};
pub use inject::with_db_connection;
pub use logging::log_queries;
pub use pipeline::QueryPipeline;
pub use retry::{retry_on_failure, RetryPolicy};
