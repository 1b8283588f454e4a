use anyhow::{Context, Result};
use restwise_storage::Database;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{get_data_dir, Config},
    ipc::{bind, serve, DaemonIpcHandler, SOCKET_NAME},
    orchestrator::Orchestrator,
};

const HEARTBEAT: Duration = Duration::from_secs(60);
const RETENTION_SWEEP: Duration = Duration::from_secs(3600);

pub struct Daemon {
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
    sock_path: PathBuf,
}

impl Daemon {
    /// Build the daemon with platform collaborators
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the data directory is unknown.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let orchestrator = Orchestrator::from_config(config, Arc::new(db))?;
        Ok(Self::with_orchestrator(
            Arc::new(orchestrator),
            get_data_dir()?.join(SOCKET_NAME),
        ))
    }

    #[must_use]
    pub fn with_orchestrator(orchestrator: Arc<Orchestrator>, sock_path: PathBuf) -> Self {
        Self {
            orchestrator,
            shutdown: CancellationToken::new(),
            sock_path,
        }
    }

    /// Token that stops [`Daemon::run_with_signals`] when cancelled
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until Ctrl-C, SIGTERM or an IPC shutdown request
    ///
    /// # Errors
    ///
    /// Returns an error if monitoring cannot start or the socket cannot be bound.
    pub async fn run_with_signals(&self) -> Result<()> {
        self.orchestrator.start().await?;

        let listener = match bind(&self.sock_path) {
            Ok(listener) => listener,
            Err(e) => {
                self.orchestrator.stop().await;
                return Err(e).with_context(|| {
                    format!("Failed to bind IPC socket {}", self.sock_path.display())
                });
            }
        };
        let handler = Arc::new(DaemonIpcHandler::new(
            self.orchestrator.clone(),
            self.shutdown.clone(),
        ));
        let server = tokio::spawn(serve(handler, listener));

        let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        let mut heartbeat = interval(HEARTBEAT);
        let mut retention = interval(RETENTION_SWEEP);
        log::info!("Daemon started with signal handling and IPC");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    log::info!("Shutdown requested over IPC");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl-C, shutting down...");
                    break;
                }
                _ = sigterm.recv() => {
                    log::info!("Received SIGTERM, shutting down...");
                    break;
                }
                _ = heartbeat.tick() => {
                    let status = self.orchestrator.status();
                    log::debug!(
                        "Heartbeat: tracker {}, fatigue {:.2} ({}), break {}",
                        status.tracker_mode,
                        status.fatigue.fatigue_score,
                        status.fatigue_level,
                        status.break_session.state
                    );
                }
                _ = retention.tick() => {
                    self.orchestrator.prune_history();
                }
            }
        }

        server.abort();
        self.orchestrator.stop().await;
        if self.sock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.sock_path) {
                log::warn!("Failed to remove {}: {e}", self.sock_path.display());
            }
        }
        log::info!("Daemon shut down gracefully.");
        Ok(())
    }
}
