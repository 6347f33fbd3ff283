//! Result cache for read queries.
//!
//! Entries are keyed by the query text together with its bound parameters,
//! so the same statement with different arguments never shares a result.
//! The cache is bounded by an [`LruCache`]: once full, the least recently
//! used entry is evicted. Entries can also expire after a fixed time-to-live.
use crate::core::db::query::{Param, QueryResult};
use crate::core::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Hashable form of a bound parameter. Reals are compared bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ParamKey {
    Null,
    Integer(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&Param> for ParamKey {
    fn from(value: &Param) -> Self {
        match value {
            Param::Null => ParamKey::Null,
            Param::Integer(i) => ParamKey::Integer(*i),
            Param::Real(f) => ParamKey::Real(f.to_bits()),
            Param::Text(t) => ParamKey::Text(t.clone()),
            Param::Blob(b) => ParamKey::Blob(b.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    sql: String,
    params: Vec<ParamKey>,
}

impl CacheKey {
    fn new(sql: &str, params: &[Param]) -> Self {
        CacheKey {
            sql: sql.to_string(),
            params: params.iter().map(ParamKey::from).collect(),
        }
    }
}

struct CacheEntry {
    result: Arc<QueryResult>,
    inserted_at: Instant,
}

struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Hit/miss counters and current size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// An owned, thread-safe cache of query results
pub struct QueryCache {
    state: Mutex<CacheState>,
    ttl: Option<Duration>,
}

impl QueryCache {
    /// Creates an empty cache holding at most `capacity` results (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
            ttl: None,
        }
    }

    /// Expires entries `ttl` after they were stored
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Returns the cached result for `(sql, params)`, or runs `f` and caches
    /// what it returns.
    ///
    /// On a hit `f` is not called and the very same `Arc` is returned. Errors
    /// from `f` are passed through and nothing is stored. The lock is not held
    /// while `f` runs.
    pub fn get_or_try_insert_with<F>(&self, sql: &str, params: &[Param], f: F) -> Result<Arc<QueryResult>>
    where
        F: FnOnce() -> Result<QueryResult>,
    {
        self.get_or_try_insert_if(sql, params, || f().map(|result| (result, true)))
    }

    /// Like [`get_or_try_insert_with`](Self::get_or_try_insert_with), but
    /// `f` also says whether its result may be stored. Results it marks
    /// uncacheable are returned and forgotten.
    pub fn get_or_try_insert_if<F>(&self, sql: &str, params: &[Param], f: F) -> Result<Arc<QueryResult>>
    where
        F: FnOnce() -> Result<(QueryResult, bool)>,
    {
        let key = CacheKey::new(sql, params);

        if let Some(hit) = self.lookup(&key) {
            debug!("Using cached result for query: {}", sql);
            return Ok(hit);
        }

        let (result, cacheable) = f()?;
        let result = Arc::new(result);
        if cacheable {
            self.store(key, Arc::clone(&result));
            debug!("Caching result for query: {}", sql);
        }
        Ok(result)
    }

    /// Drops every entry for this query text, whatever its parameters
    pub fn invalidate(&self, sql: &str) -> usize {
        let mut state = self.lock();
        let stale: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(key, _)| key.sql == sql)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            state.entries.pop(key);
        }
        stale.len()
    }

    /// Drops all entries; counters are kept
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<QueryResult>> {
        let mut state = self.lock();

        // `get` also marks the entry as most recently used.
        let found = state
            .entries
            .get(key)
            .map(|entry| (Arc::clone(&entry.result), self.is_expired(entry)));

        match found {
            Some((result, false)) => {
                state.hits += 1;
                Some(result)
            }
            Some((_, true)) => {
                state.entries.pop(key);
                state.misses += 1;
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    fn store(&self, key: CacheKey, result: Arc<QueryResult>) {
        let entry = CacheEntry {
            result,
            inserted_at: Instant::now(),
        };
        if let Some((evicted, _)) = self.lock().entries.push(key.clone(), entry) {
            if evicted != key {
                debug!("Evicting cached result for query: {}", evicted.sql);
            }
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .map(|ttl| entry.inserted_at.elapsed() >= ttl)
            .unwrap_or(false)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        QueryCache::new(128)
    }
}
