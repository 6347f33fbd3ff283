use crate::core::db::DataSource;
use crate::core::{Result, RowscopeError};
use crate::layers::cache::QueryCache;
use crate::layers::retry::RetryPolicy;
use crate::seed::DedupStrategy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_HOST: &str = "DB_HOST";
pub const ENV_USER: &str = "DB_USER";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_NAME: &str = "DB_NAME";
pub const ENV_PORT: &str = "DB_PORT";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_USER: &str = "root";
const DEFAULT_DATABASE: &str = "ALX_prodev";
const DEFAULT_PORT: u16 = 3306;

/// Connection parameters, resolved once and then immutable.
///
/// Host, user, password and port are carried for parity with server-backed
/// drivers; the SQLite data source is derived from `database` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            host: DEFAULT_HOST.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl DbConfig {
    /// Resolves the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration from an arbitrary key lookup.
    ///
    /// Missing keys fall back to their defaults; a `DB_PORT` that is not a
    /// valid port number is a configuration error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay(lookup)
    }

    fn overlay<F>(self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup(ENV_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                RowscopeError::Config(format!("{} is not a valid port: '{}'", ENV_PORT, raw))
            })?,
            None => self.port,
        };

        Ok(DbConfig {
            host: lookup(ENV_HOST).unwrap_or(self.host),
            user: lookup(ENV_USER).unwrap_or(self.user),
            password: lookup(ENV_PASSWORD).unwrap_or(self.password),
            database: lookup(ENV_NAME).unwrap_or(self.database),
            port,
        })
    }

    /// Maps the database name onto a SQLite data source.
    ///
    /// `:memory:` is an in-memory database. A name that already looks like a
    /// path (has a separator or a SQLite extension) is used as given; any
    /// other name becomes `<name>.db` in the working directory.
    pub fn data_source(&self) -> DataSource {
        let name = self.database.as_str();
        if name == ":memory:" {
            return DataSource::Memory;
        }

        let path = Path::new(name);
        let has_extension = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("db") | Some("sqlite") | Some("sqlite3")
        );
        if has_extension || name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            DataSource::file(path)
        } else {
            DataSource::file(format!("{}.db", name))
        }
    }
}

/// Optional overrides for the connection parameters
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub port: Option<u16>,
}

/// Retry layer settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        RetrySection {
            attempts: 3,
            delay_ms: 1000,
        }
    }
}

/// Result cache settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub capacity: usize,
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            capacity: 128,
            ttl_secs: None,
        }
    }
}

/// Seeding settings
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedSection {
    pub dedup: DedupStrategy,
}

/// Top-level settings parsed from a TOML file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSection,
    pub retry: RetrySection,
    pub cache: CacheSection,
    pub seed: SeedSection,
}

impl Settings {
    /// Loads settings from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing file at the default location
    /// yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => load_settings(path),
            None => match default_settings_path() {
                Some(path) if path.exists() => load_settings(&path),
                _ => Ok(Settings::default()),
            },
        }
    }

    /// Resolves connection parameters: defaults, then this file, then the environment
    pub fn db_config(&self) -> Result<DbConfig> {
        self.db_config_with(|key| std::env::var(key).ok())
    }

    /// Like [`Settings::db_config`], reading variables through `lookup`
    pub fn db_config_with<F>(&self, lookup: F) -> Result<DbConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::default();
        let file = &self.database;
        let base = DbConfig {
            host: file.host.clone().unwrap_or(defaults.host),
            user: file.user.clone().unwrap_or(defaults.user),
            password: file.password.clone().unwrap_or(defaults.password),
            database: file.database.clone().unwrap_or(defaults.database),
            port: file.port.unwrap_or(defaults.port),
        };
        base.overlay(lookup)
    }

    /// Builds the retry policy described by the `[retry]` section
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.attempts, Duration::from_millis(self.retry.delay_ms))
    }

    /// Builds an empty cache sized by the `[cache]` section
    pub fn query_cache(&self) -> QueryCache {
        let cache = QueryCache::new(self.cache.capacity);
        match self.cache.ttl_secs {
            Some(secs) => cache.with_ttl(Duration::from_secs(secs)),
            None => cache,
        }
    }
}

/// `<config dir>/rowscope/config.toml`, if the platform has a config dir
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rowscope").join("config.toml"))
}

fn load_settings(path: &Path) -> Result<Settings> {
    debug!("Loading settings from {:?}", path);
    let content = fs::read_to_string(path).map_err(|e| {
        RowscopeError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| RowscopeError::Config(format!("invalid {}: {}", path.display(), e)))
}
