use clap::{Parser, Subcommand};

use std::path::PathBuf;
use std::str::FromStr;

use super::config::{CacheBackendType, EventsBackend, TransactionalBackend};
use super::constants::{
    ENV_CACHE_BACKEND, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_REDIS_URL, ENV_CACHE_TTL_SECS, ENV_CONFIG,
    ENV_EVENTS_BACKEND, ENV_EVENTS_REDIS_URL, ENV_HOST, ENV_IDEMPOTENCY_TTL_SECS, ENV_PORT,
    ENV_POSTGRES_URL, ENV_TRANSACTIONAL_BACKEND,
};

#[derive(Parser)]
#[command(name = "reviewhub")]
#[command(version, about = "Product reviews service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    // Cache options
    /// Cache backend (memory, redis or none)
    #[arg(long, global = true, env = ENV_CACHE_BACKEND, value_parser = CacheBackendType::from_str)]
    pub cache_backend: Option<CacheBackendType>,

    /// Maximum number of cache entries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Redis-compatible cache URL, e.g. redis://host:port/db
    #[arg(long, global = true, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,

    /// TTL in seconds for cached review pages and ratings
    #[arg(long, global = true, env = ENV_CACHE_TTL_SECS)]
    pub cache_ttl_secs: Option<u64>,

    /// TTL in seconds for stored idempotent responses
    #[arg(long, global = true, env = ENV_IDEMPOTENCY_TTL_SECS)]
    pub idempotency_ttl_secs: Option<u64>,

    // Event options
    /// Review event publisher (none, memory or redis)
    #[arg(long, global = true, env = ENV_EVENTS_BACKEND, value_parser = EventsBackend::from_str)]
    pub events_backend: Option<EventsBackend>,

    /// Redis URL for event publishing (defaults to the cache Redis URL)
    #[arg(long, global = true, env = ENV_EVENTS_REDIS_URL)]
    pub events_redis_url: Option<String>,

    // Database options
    /// Transactional database backend (sqlite or postgres)
    #[arg(long, global = true, env = ENV_TRANSACTIONAL_BACKEND, value_parser = TransactionalBackend::from_str)]
    pub transactional_backend: Option<TransactionalBackend>,

    /// SQLite database file (when using sqlite backend)
    #[arg(long, global = true)]
    pub sqlite_path: Option<PathBuf>,

    /// PostgreSQL connection URL (when using postgres backend)
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_max_entries: Option<u64>,
    pub cache_redis_url: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub idempotency_ttl_secs: Option<u64>,
    pub events_backend: Option<EventsBackend>,
    pub events_redis_url: Option<String>,
    pub transactional_backend: Option<TransactionalBackend>,
    pub sqlite_path: Option<PathBuf>,
    pub postgres_url: Option<String>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            config: cli.config,
            cache_backend: cli.cache_backend,
            cache_max_entries: cli.cache_max_entries,
            cache_redis_url: cli.cache_redis_url,
            cache_ttl_secs: cli.cache_ttl_secs,
            idempotency_ttl_secs: cli.idempotency_ttl_secs,
            events_backend: cli.events_backend,
            events_redis_url: cli.events_redis_url,
            transactional_backend: cli.transactional_backend,
            sqlite_path: cli.sqlite_path,
            postgres_url: cli.postgres_url,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (CliConfig::from(cli), command)
}
