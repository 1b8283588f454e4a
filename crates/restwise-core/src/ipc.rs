use anyhow::Result;
use restwise_ai::Recommendation;
use restwise_storage::{BreakType, ComplianceRecord};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
};
use tokio_util::sync::CancellationToken;

use crate::breaks::{BreakRequest, BreakSession};
use crate::orchestrator::{Orchestrator, StatusSnapshot};

/// File name of the daemon socket inside the data directory
pub const SOCKET_NAME: &str = "restwise.sock";

/// IPC request from CLI to daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum IpcRequest {
    Status,
    RequestBreak {
        duration_secs: u64,
        break_type: BreakType,
        /// Countdown before enforcement; the configured lead time when absent
        lead_secs: Option<u64>,
        lock_screen: bool,
        mute_input: bool,
    },
    CancelBreak,
    Recommend {
        available_minutes: Option<u32>,
    },
    Shutdown,
}

/// IPC response from daemon to CLI
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum IpcResponse {
    Status(Box<StatusSnapshot>),
    BreakScheduled(Box<BreakSession>),
    BreakCancelled(Option<ComplianceRecord>),
    Recommendation(Box<Recommendation>),
    Error(String),
    Shutdown,
}

#[derive(Debug)]
pub struct IpcClient {
    sock_path: PathBuf,
}

impl IpcClient {
    #[must_use]
    pub fn new(sock_path: &Path) -> Self {
        Self {
            sock_path: sock_path.to_path_buf(),
        }
    }

    /// Send one request and wait for the reply
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is not reachable or the reply cannot be decoded.
    pub async fn send_command(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.sock_path).await?;

        let encoded = bincode::serialize(&request)?;
        stream.write_all(&encoded).await?;
        stream.shutdown().await?;

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await?;
        let response: IpcResponse = bincode::deserialize(&buffer)?;

        Ok(response)
    }
}

pub struct DaemonIpcHandler {
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
}

impl DaemonIpcHandler {
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }

    /// Compute the reply for a request. Caller errors become `IpcResponse::Error`.
    pub async fn respond(&self, request: &IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Status => IpcResponse::Status(Box::new(self.orchestrator.status())),
            IpcRequest::RequestBreak {
                duration_secs,
                break_type,
                lead_secs,
                lock_screen,
                mute_input,
            } => {
                let lead = lead_secs.map_or_else(
                    || self.orchestrator.config().breaks.lead_time(),
                    Duration::from_secs,
                );
                let request = BreakRequest::new(Duration::from_secs(*duration_secs), *break_type)
                    .with_lead_time(lead)
                    .with_lock_screen(*lock_screen)
                    .with_mute_input(*mute_input);
                match self.orchestrator.request_break(request) {
                    Ok(session) => IpcResponse::BreakScheduled(Box::new(session)),
                    Err(e) => IpcResponse::Error(e.to_string()),
                }
            }
            IpcRequest::CancelBreak => match self.orchestrator.cancel_break().await {
                Ok(record) => IpcResponse::BreakCancelled(record),
                Err(e) => IpcResponse::Error(e.to_string()),
            },
            IpcRequest::Recommend { available_minutes } => IpcResponse::Recommendation(Box::new(
                self.orchestrator.recommend(*available_minutes).await,
            )),
            IpcRequest::Shutdown => IpcResponse::Shutdown,
        }
    }

    /// Reply on `stream`; a shutdown request fires the shutdown signal once
    /// the reply is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply cannot be encoded or written.
    pub async fn handle(&self, stream: &mut UnixStream, request: IpcRequest) -> Result<()> {
        log::debug!("IPC request: {request:?}");
        let response = self.respond(&request).await;

        let encoded = bincode::serialize(&response)?;
        stream.write_all(&encoded).await?;
        stream.shutdown().await?;

        if request == IpcRequest::Shutdown {
            self.shutdown.cancel();
        }
        Ok(())
    }
}

/// Bind the daemon socket, replacing a stale one
///
/// # Errors
///
/// Returns an error if the stale socket cannot be removed or the bind fails.
pub fn bind(sock_path: &Path) -> io::Result<UnixListener> {
    if sock_path.exists() {
        fs::remove_file(sock_path)?;
    }
    UnixListener::bind(sock_path)
}

/// Accept connections forever, one task per request
pub async fn serve(handler: Arc<DaemonIpcHandler>, listener: UnixListener) {
    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    match stream.read_to_end(&mut buf).await {
                        Ok(0) => {} // Connection closed
                        Ok(_) => match bincode::deserialize::<IpcRequest>(&buf) {
                            Ok(request) => {
                                if let Err(e) = handler.handle(&mut stream, request).await {
                                    log::error!("IPC handle error: {e}");
                                }
                            }
                            Err(e) => {
                                log::error!("IPC deserialize error: {e}");
                            }
                        },
                        Err(e) => {
                            log::error!("IPC read error: {e}");
                        }
                    }
                });
            }
            Err(e) => {
                log::error!("IPC accept error: {e}");
            }
        }
    }
}
