//! Control channel.
//!
//! A localhost TCP listener speaking line-delimited JSON-RPC. This is the
//! daemon's only control surface: `toggle`, `status` and `shutdown`.

use crate::controller::{ControllerError, ModeController, StatusReport};
use crate::protocol::{codes, methods, Request, Response, RpcError};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Accepts control connections until shutdown.
pub struct ControlServer {
    listener: TcpListener,
    controller: Arc<ModeController>,
    shutdown: CancellationToken,
}

impl ControlServer {
    pub async fn bind(
        addr: SocketAddr,
        controller: Arc<ModeController>,
        shutdown: CancellationToken,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            controller,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) {
        if let Ok(addr) = self.local_addr() {
            info!("Control channel listening on {}", addr);
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Control connection from {}", peer);
                        let controller = self.controller.clone();
                        let shutdown = self.shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, controller, shutdown).await {
                                debug!("Control connection from {} ended: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
                _ = self.shutdown.cancelled() => {
                    debug!("Control channel shutting down");
                    break;
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    controller: Arc<ModeController>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(request, &controller, &shutdown).await,
            Err(e) => {
                debug!("Unparseable control message: {}", e);
                Response::parse_error()
            }
        };

        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Handles one request.
pub async fn dispatch(
    request: Request,
    controller: &ModeController,
    shutdown: &CancellationToken,
) -> Response {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return Response::invalid_request(id);
    }

    match request.method.as_str() {
        methods::STATUS => Response::success(id, controller.status()),
        methods::TOGGLE => match controller.toggle().await {
            Ok(mode) => {
                info!("Toggled to '{}'", mode);
                Response::success(id, controller.status())
            }
            Err(ControllerError::Busy) => {
                Response::error(id, codes::BUSY, ControllerError::Busy.to_string())
            }
            Err(e) => {
                warn!("Toggle failed: {}", e);
                Response::error(id, codes::TRANSITION_FAILED, e.to_string())
            }
        },
        methods::SHUTDOWN => {
            info!("Shutdown requested over control channel");
            shutdown.cancel();
            Response::success(id, json!({ "stopping": true }))
        }
        method => Response::method_not_found(id, method),
    }
}

/// Problems talking to a running daemon.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("no daemon listening on {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("control channel error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed daemon response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon closed the connection without answering")]
    Closed,

    #[error("{} (code {})", .0.message, .0.code)]
    Rpc(RpcError),
}

/// Sends single requests to a daemon.
#[derive(Debug, Clone)]
pub struct ControlClient {
    addr: SocketAddr,
}

impl ControlClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Client for the daemon on `127.0.0.1:<port>`.
    pub fn localhost(port: u16) -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    /// Calls `method` and returns its result.
    pub async fn call(&self, method: &str) -> Result<Value, ClientError> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr,
                source,
            })?;
        let (reader, mut writer) = stream.into_split();

        let mut line = serde_json::to_string(&Request::new(1, method))?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        let mut lines = BufReader::new(reader).lines();
        let reply = lines.next_line().await?.ok_or(ClientError::Closed)?;
        let response: Response = serde_json::from_str(&reply)?;

        match (response.result, response.error) {
            (_, Some(error)) => Err(ClientError::Rpc(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    pub async fn status(&self) -> Result<StatusReport, ClientError> {
        Ok(serde_json::from_value(self.call(methods::STATUS).await?)?)
    }

    pub async fn toggle(&self) -> Result<StatusReport, ClientError> {
        Ok(serde_json::from_value(self.call(methods::TOGGLE).await?)?)
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.call(methods::SHUTDOWN).await.map(|_| ())
    }
}
