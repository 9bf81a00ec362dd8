//! Application configuration
//!
//! Config files are JSON. The profile file (`~/.reviewhub/reviewhub.json`)
//! is read first, then either the `--config` path or `./reviewhub.json`.
//! Later files are deep-merged over earlier ones as raw JSON and the result
//! is deserialized once; CLI flags and env vars win over both.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CACHE_TTL_REVIEWS, CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES,
    DEFAULT_EVENTS_CHANNEL_PREFIX, DEFAULT_HOST, DEFAULT_PORT, ENV_POSTGRES_URL,
    IDEMPOTENCY_TTL_SECS, POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS, POSTGRES_DEFAULT_MAX_CONNECTIONS,
    POSTGRES_DEFAULT_MAX_LIFETIME_SECS, POSTGRES_DEFAULT_MIN_CONNECTIONS,
    POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Backend Enums
// =============================================================================

/// Where products and reviews are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionalBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl TransactionalBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionalBackend::Sqlite => "sqlite",
            TransactionalBackend::Postgres => "postgres",
        }
    }
}

impl FromStr for TransactionalBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(invalid_choice("transactional backend", s, "sqlite, postgres")),
        }
    }
}

/// Cache backend type
///
/// `None` disables caching entirely: every read goes to the database and
/// idempotency keys are never remembered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
    None,
}

impl CacheBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackendType::Memory => "memory",
            CacheBackendType::Redis => "redis",
            CacheBackendType::None => "none",
        }
    }
}

impl FromStr for CacheBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "none" | "off" => Ok(Self::None),
            _ => Err(invalid_choice("cache backend", s, "memory, redis, none")),
        }
    }
}

/// Where review change events are published
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventsBackend {
    #[default]
    None,
    Memory,
    Redis,
}

impl EventsBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventsBackend::None => "none",
            EventsBackend::Memory => "memory",
            EventsBackend::Redis => "redis",
        }
    }
}

impl FromStr for EventsBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err(invalid_choice("events backend", s, "none, memory, redis")),
        }
    }
}

fn invalid_choice(what: &str, value: &str, options: &str) -> String {
    format!("Invalid {what} '{value}'. Valid options: {options}")
}

macro_rules! display_as_str {
    ($($ty:ty),+) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })+
    };
}

display_as_str!(TransactionalBackend, CacheBackendType, EventsBackend);

// =============================================================================
// File Config (merged JSON, deserialized once)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqliteFileConfig {
    /// Database file; defaults to `<data dir>/sqlite/reviewhub.db`
    pub path: Option<String>,
}

/// Pool tuning; every unset field takes its `POSTGRES_DEFAULT_*` value
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostgresFileConfig {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
    /// 0 disables the server-side statement timeout
    pub statement_timeout_secs: Option<u64>,
}

impl PostgresFileConfig {
    fn resolve(self, url: String) -> PostgresConfig {
        PostgresConfig {
            url,
            max_connections: self
                .max_connections
                .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
            min_connections: self
                .min_connections
                .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: self
                .acquire_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout_secs: self
                .idle_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime_secs: self
                .max_lifetime_secs
                .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
            statement_timeout_secs: self
                .statement_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisFileConfig {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryCacheFileConfig {
    pub max_entries: Option<u64>,
}

/// `database` section: the transactional store and the cache store
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseFileConfig {
    pub transactional: Option<TransactionalBackend>,
    pub cache: Option<CacheBackendType>,
    pub sqlite: SqliteFileConfig,
    pub postgres: PostgresFileConfig,
    pub redis: RedisFileConfig,
    pub memory_cache: MemoryCacheFileConfig,
}

/// Shared shape of the `cache` and `idempotency` sections
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TtlFileConfig {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsFileConfig {
    pub backend: Option<EventsBackend>,
    /// Falls back to `database.redis.url` when unset
    pub redis_url: Option<String>,
    pub channel_prefix: Option<String>,
}

/// Merged config files
///
/// Unknown top-level keys only warn. Unknown keys inside a known section are
/// an error, so a misspelt or retired option never passes silently.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerFileConfig,
    pub database: DatabaseFileConfig,
    pub cache: TtlFileConfig,
    pub idempotency: TtlFileConfig,
    pub events: EventsFileConfig,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FileConfig {
    fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value).context("Invalid configuration")?;
        if !config.extra.is_empty() {
            let keys: Vec<&str> = config.extra.keys().map(String::as_str).collect();
            tracing::warn!(
                fields = %keys.join(", "),
                "Unknown fields in config file (possible typos)"
            );
        }
        Ok(config)
    }
}

fn read_config_file(path: &Path) -> Result<Value> {
    tracing::debug!(path = %path.display(), "Loading config file");
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Deep merge: objects merge key by key, anything else in `overlay` replaces
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Config files in the order they are applied
fn config_file_paths(cli: &CliConfig) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = get_profile_config_path()
        .filter(|p| p.exists())
        .into_iter()
        .collect();

    match &cli.config {
        Some(path) => {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            paths.push(expanded);
        }
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                paths.push(local);
            }
        }
    }

    Ok(paths)
}

// =============================================================================
// Runtime Config
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Cache store selection, consumed by `CacheService::new`
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendType,
    /// Entry bound for the memory backend
    pub max_entries: u64,
    /// Required by the redis backend
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// 0 = disabled
    pub statement_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub transactional: TransactionalBackend,
    /// Explicit SQLite file; the storage directory is used otherwise
    pub sqlite_path: Option<PathBuf>,
    /// Set only for the postgres backend
    pub postgres: Option<PostgresConfig>,
    pub cache: CacheConfig,
}

/// TTL for cached review pages and average ratings
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    pub ttl_secs: u64,
}

/// TTL for stored idempotent responses
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub backend: EventsBackend,
    pub redis_url: Option<String>,
    pub channel_prefix: String,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: QueryCacheConfig,
    pub idempotency: IdempotencyConfig,
    pub events: EventsConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.reviewhub/reviewhub.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::trace!(cli = ?cli, "CLI config");

        let paths = config_file_paths(cli)?;
        let mut merged = Value::Object(Default::default());
        for path in &paths {
            merge_json(&mut merged, read_config_file(path)?);
        }
        tracing::debug!(configs = ?paths, "Config files loaded");

        Self::from_sources(cli, FileConfig::from_value(merged)?)
    }

    /// Layer defaults, merged file config and CLI/env values
    fn from_sources(cli: &CliConfig, file: FileConfig) -> Result<Self> {
        let FileConfig {
            server,
            database,
            cache,
            idempotency,
            events,
            ..
        } = file;

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(server.port).unwrap_or(DEFAULT_PORT),
        };

        // One Redis URL serves the cache and, unless overridden, the event publisher
        let redis_url = cli.cache_redis_url.clone().or(database.redis.url);

        let transactional = cli
            .transactional_backend
            .or(database.transactional)
            .unwrap_or_default();
        let postgres = (transactional == TransactionalBackend::Postgres).then(|| {
            let url = cli
                .postgres_url
                .clone()
                .or_else(|| std::env::var(ENV_POSTGRES_URL).ok())
                .or(database.postgres.url.clone())
                .unwrap_or_default();
            database.postgres.resolve(url)
        });

        let database = DatabaseConfig {
            transactional,
            sqlite_path: cli
                .sqlite_path
                .clone()
                .or_else(|| database.sqlite.path.map(|p| expand_path(&p))),
            postgres,
            cache: CacheConfig {
                backend: cli.cache_backend.or(database.cache).unwrap_or_default(),
                max_entries: cli
                    .cache_max_entries
                    .or(database.memory_cache.max_entries)
                    .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
                redis_url: redis_url.clone(),
            },
        };

        let events = EventsConfig {
            backend: cli.events_backend.or(events.backend).unwrap_or_default(),
            redis_url: cli
                .events_redis_url
                .clone()
                .or(events.redis_url)
                .or(redis_url),
            channel_prefix: events
                .channel_prefix
                .unwrap_or_else(|| DEFAULT_EVENTS_CHANNEL_PREFIX.to_string()),
        };

        let config = Self {
            server,
            database,
            cache: QueryCacheConfig {
                ttl_secs: cli
                    .cache_ttl_secs
                    .or(cache.ttl_secs)
                    .unwrap_or(CACHE_TTL_REVIEWS),
            },
            idempotency: IdempotencyConfig {
                ttl_secs: cli
                    .idempotency_ttl_secs
                    .or(idempotency.ttl_secs)
                    .unwrap_or(IDEMPOTENCY_TTL_SECS),
            },
            events,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            transactional_backend = %config.database.transactional,
            cache_backend = %config.database.cache.backend,
            cache_max_entries = config.database.cache.max_entries,
            cache_ttl_secs = config.cache.ttl_secs,
            idempotency_ttl_secs = config.idempotency.ttl_secs,
            events_backend = %config.events.backend,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        let cache = &self.database.cache;
        if cache.backend == CacheBackendType::Redis
            && cache.redis_url.as_deref().is_none_or(str::is_empty)
        {
            anyhow::bail!(
                "Configuration error: database.redis.url is required when database.cache is 'redis'"
            );
        }

        if self
            .database
            .postgres
            .as_ref()
            .is_some_and(|p| p.url.is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when database.transactional is 'postgres'"
            );
        }

        if self.events.backend == EventsBackend::Redis
            && self.events.redis_url.as_deref().is_none_or(str::is_empty)
        {
            anyhow::bail!(
                "Configuration error: events.redis_url (or database.redis.url) is required when events.backend is 'redis'"
            );
        }

        for (name, ttl) in [
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("idempotency.ttl_secs", self.idempotency.ttl_secs),
        ] {
            if ttl == 0 {
                anyhow::bail!("Configuration error: {name} must be greater than 0");
            }
        }

        if cache.backend == CacheBackendType::None {
            tracing::warn!(
                "database.cache is 'none': reads always hit the database and idempotency keys are ignored"
            );
        }

        if is_all_interfaces(&self.server.host) {
            tracing::warn!(host = %self.server.host, "Server is listening on all interfaces");
        }

        Ok(())
    }
}

/// ~/.reviewhub/reviewhub.json
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

pub(crate) fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}
