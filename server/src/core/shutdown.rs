//! Graceful shutdown
//!
//! One watch channel fans the stop signal out to the HTTP server and the
//! background tasks. `shutdown()` joins the registered tasks (bounded by
//! `SHUTDOWN_TIMEOUT_SECS`) and only then checkpoints and closes the database.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::constants::SHUTDOWN_TIMEOUT_SECS;
use crate::data::TransactionalService;

#[derive(Clone)]
pub struct ShutdownService {
    signal: Arc<watch::Sender<bool>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    database: Arc<TransactionalService>,
}

impl ShutdownService {
    pub fn new(database: Arc<TransactionalService>) -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
            tasks: Arc::new(Mutex::new(Vec::new())),
            database,
        }
    }

    /// Track a background task so `shutdown()` waits for it
    pub async fn register(&self, task: JoinHandle<()>) {
        self.tasks.lock().await.push(task);
    }

    /// Receiver that flips to `true` once shutdown starts
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }

    pub fn trigger(&self) {
        self.signal.send_replace(true);
    }

    /// Owned future for `axum::serve(...).with_graceful_shutdown`
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            let _ = rx.wait_for(|stopping| *stopping).await;
        }
    }

    pub async fn shutdown(&self) {
        self.trigger();

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        let count = tasks.len();
        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        if tokio::time::timeout(timeout, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            tracing::warn!(
                count,
                timeout_secs = timeout.as_secs(),
                "Background tasks still running at shutdown"
            );
        }

        if let Err(e) = self.database.checkpoint().await {
            tracing::warn!(error = %e, "Database checkpoint failed");
        }
        self.database.close().await;

        tracing::debug!(count, "Shutdown complete");
    }

    /// Trigger shutdown on Ctrl+C or SIGTERM
    pub fn install_signal_handlers(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            tracing::info!(signal, "Shutting down");
            service.trigger();
        });
    }
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
