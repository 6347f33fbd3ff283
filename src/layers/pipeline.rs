use super::cache::QueryCache;
use super::inject::with_db_connection;
use super::logging::log_queries;
use super::retry::{retry_on_failure, RetryPolicy};
use crate::core::db::query::{Execution, Param, QueryExecutor, QueryResult};
use crate::core::db::DataSource;
use crate::core::Result;
use std::sync::Arc;

/// Query execution with optional layers stacked in a fixed order.
///
/// From the outside in: logging, result cache, retry, connection
/// injection, then the executor itself. A cache hit therefore never opens a
/// connection, and every retry attempt gets a fresh one. A result is stored
/// only when SQLite reports its prepared statement read-only, so writes
/// always reach the database.
pub struct QueryPipeline<'c> {
    source: DataSource,
    logging: bool,
    retry: Option<RetryPolicy>,
    cache: Option<&'c QueryCache>,
}

impl<'c> QueryPipeline<'c> {
    /// A pipeline with no layers enabled
    pub fn new(source: DataSource) -> Self {
        QueryPipeline {
            source,
            logging: false,
            retry: None,
            cache: None,
        }
    }

    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_cache(mut self, cache: &'c QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Runs `sql` with bound `params` through the enabled layers.
    ///
    /// Writes return an empty result.
    pub fn fetch(&self, sql: &str, params: &[Param]) -> Result<Arc<QueryResult>> {
        if self.logging {
            log_queries(sql, || self.cached(sql, params))
        } else {
            self.cached(sql, params)
        }
    }

    fn cached(&self, sql: &str, params: &[Param]) -> Result<Arc<QueryResult>> {
        match self.cache {
            Some(cache) => cache.get_or_try_insert_if(sql, params, || {
                let execution = self.retried(sql, params)?;
                Ok((execution.outcome.into_rows(), execution.read_only))
            }),
            None => Ok(Arc::new(self.retried(sql, params)?.outcome.into_rows())),
        }
    }

    fn retried(&self, sql: &str, params: &[Param]) -> Result<Execution> {
        match &self.retry {
            Some(policy) => retry_on_failure(policy, || self.execute(sql, params)),
            None => self.execute(sql, params),
        }
    }

    fn execute(&self, sql: &str, params: &[Param]) -> Result<Execution> {
        with_db_connection(&self.source, |conn| QueryExecutor::new(conn).run(sql, params))
    }
}
