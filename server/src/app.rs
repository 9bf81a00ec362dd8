//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::cli;
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;
use crate::data::events::EventService;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<TransactionalService>,
    pub cache: Arc<CacheService>,
    pub events: EventService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let config = AppConfig::load(&cli_config)?;
        let storage = AppStorage::init().await?;
        let app = Self::from_config(config, storage).await?;
        Self::start_server(app).await
    }

    /// Connect the cache, database and event publisher named by `config`
    pub async fn from_config(config: AppConfig, storage: AppStorage) -> Result<Self> {
        let cache = Arc::new(
            CacheService::new(&config.database.cache)
                .await
                .context("Failed to initialize cache service")?,
        );

        let database = Arc::new(
            TransactionalService::init(&config.database, &storage)
                .await
                .context("Failed to initialize database")?,
        );

        let events = EventService::init(&config.events)
            .await
            .context("Failed to initialize event publisher")?;

        tracing::debug!(
            cache = cache.backend_name(),
            database = %database.backend(),
            events = events.backend_name(),
            "Backends initialized"
        );

        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            cache,
            events,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        tracing::info!(
            host = %app.config.server.host,
            port = app.config.server.port,
            data_dir = %app.storage.data_dir().display(),
            "ReviewHub starting"
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        tracing::debug!("Background tasks started");
    }
}
