// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "ReviewHub";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "reviewhub";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".reviewhub";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "reviewhub.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "REVIEWHUB_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "REVIEWHUB_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "REVIEWHUB_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "REVIEWHUB_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "REVIEWHUB_DATA_DIR";

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "reviewhub.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Pagination
// =============================================================================

/// Page size used when the client sends no `limit`
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page size a client may request
pub const MAX_PAGE_LIMIT: i64 = 100;

// =============================================================================
// Cache
// =============================================================================

/// Environment variable for cache backend
pub const ENV_CACHE_BACKEND: &str = "REVIEWHUB_CACHE_BACKEND";

/// Environment variable for cache max entries
pub const ENV_CACHE_MAX_ENTRIES: &str = "REVIEWHUB_CACHE_MAX_ENTRIES";

/// Environment variable for Redis-compatible cache URL (redis:// or rediss://)
pub const ENV_CACHE_REDIS_URL: &str = "REVIEWHUB_CACHE_REDIS_URL";

/// Environment variable for the review/rating cache TTL (seconds)
pub const ENV_CACHE_TTL_SECS: &str = "REVIEWHUB_CACHE_TTL_SECS";

/// Default cache max entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Cache key version (bump on schema changes to invalidate all cached data)
pub const CACHE_KEY_VERSION: &str = "v1";

/// Cache TTL for review pages and average ratings (5 min)
pub const CACHE_TTL_REVIEWS: u64 = 300;

/// Number of keys requested per SCAN round trip during pattern invalidation
pub const CACHE_SCAN_BATCH: usize = 100;

/// Deadline for one Redis command, pool checkout included
pub const REDIS_COMMAND_TIMEOUT_MS: u64 = 2000;

/// Pool wait/create/recycle timeout for Redis connections
pub const REDIS_POOL_TIMEOUT_SECS: u64 = 5;

/// Max pooled Redis connections for the cache
pub const REDIS_CACHE_POOL_SIZE: usize = 32;

/// Max pooled Redis connections for the event publisher
pub const REDIS_EVENTS_POOL_SIZE: usize = 16;

// =============================================================================
// Idempotency
// =============================================================================

/// Request header carrying the client's idempotency token
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Key namespace for stored responses, separate from query-result keys
pub const IDEMPOTENCY_KEY_PREFIX: &str = "idempotency";

/// Environment variable for the stored-response TTL (seconds)
pub const ENV_IDEMPOTENCY_TTL_SECS: &str = "REVIEWHUB_IDEMPOTENCY_TTL_SECS";

/// Stored response TTL (1 min)
pub const IDEMPOTENCY_TTL_SECS: u64 = 60;

// =============================================================================
// Events
// =============================================================================

/// Environment variable for event publisher backend (none, memory or redis)
pub const ENV_EVENTS_BACKEND: &str = "REVIEWHUB_EVENTS_BACKEND";

/// Environment variable for the event publisher Redis URL
pub const ENV_EVENTS_REDIS_URL: &str = "REVIEWHUB_EVENTS_REDIS_URL";

/// Default channel prefix; events go to `{prefix}:{event_type}`
pub const DEFAULT_EVENTS_CHANNEL_PREFIX: &str = "reviewhub:events";

/// Capacity of the in-process broadcast channel
pub const EVENTS_MEMORY_CAPACITY: usize = 1024;

// =============================================================================
// Database Backends
// =============================================================================

/// Environment variable for transactional database backend (sqlite or postgres)
pub const ENV_TRANSACTIONAL_BACKEND: &str = "REVIEWHUB_TRANSACTIONAL_BACKEND";

/// Environment variable for PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "REVIEWHUB_POSTGRES_URL";

// =============================================================================
// PostgreSQL Database
// =============================================================================

/// PostgreSQL default max connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL default min connections (keep warm for low latency)
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// PostgreSQL default connection acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// PostgreSQL idle connection timeout in seconds (release unused connections)
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// PostgreSQL max connection lifetime in seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// PostgreSQL statement timeout in seconds (0 = disabled)
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;
