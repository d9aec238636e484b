// ABOUTME: WebSocket console server.
// ABOUTME: Routes /hosts/{name}/console upgrades to one terminal bridge per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::relay::{BridgeError, PtyRequested, TerminalBridge, websocket};
use crate::ssh::{ConnectionSpec, PtyRequest};

const ROUTE_PREFIX: &str = "/hosts/";
const ROUTE_SUFFIX: &str = "/console";

/// Serves browser terminals for the hosts in a [`Config`].
pub struct ConsoleServer {
    config: Arc<Config>,
    pty: PtyRequest,
}

impl ConsoleServer {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            pty: PtyRequest::default(),
        }
    }

    /// Pty parameters for every shell this server starts.
    pub fn pty(mut self, pty: PtyRequest) -> Self {
        self.pty = pty;
        self
    }

    /// Bind `addr` and serve until Ctrl-C.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(listen = %listener.local_addr()?, "console server listening");

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept connections on `listener` until `shutdown` completes.
    ///
    /// Relays already running are left to finish on their own.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("console server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!("accept failed: {}", e);
                            continue;
                        }
                    };
                    let config = Arc::clone(&self.config);
                    let pty = self.pty.clone();
                    tokio::spawn(async move {
                        handle_connection(config, pty, stream, peer).await;
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    config: Arc<Config>,
    pty: PtyRequest,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let mut route = None;
    let callback = |request: &Request, response: Response| {
        resolve_route(&config, request.uri().path()).map(|spec| {
            route = Some(spec);
            response
        })
    };

    let mut ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %peer, "websocket handshake failed: {}", e);
            return;
        }
    };
    let Some(spec) = route else {
        return;
    };

    tracing::info!(peer = %peer, target = %spec.target(), "console session opened");

    let bridge = match open_terminal(spec, &pty).await {
        Ok(bridge) => bridge,
        Err(e) => {
            if let Err(send_err) = websocket::send_error(&mut ws, &e.to_string()).await {
                tracing::debug!(peer = %peer, "failed to report error to client: {}", send_err);
            }
            return;
        }
    };

    let (client_in, mut client_out) = websocket::client_endpoint(ws);
    match bridge.start_and_bridge(client_in, &mut client_out).await {
        Ok(termination) => {
            tracing::info!(peer = %peer, ?termination, "console session closed");
        }
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "console session failed");
        }
    }

    if let Err(e) = client_out.shutdown().await {
        tracing::debug!(peer = %peer, "closing client connection failed: {}", e);
    }
}

async fn open_terminal(
    spec: ConnectionSpec,
    pty: &PtyRequest,
) -> std::result::Result<TerminalBridge<PtyRequested>, BridgeError> {
    TerminalBridge::new(spec).dial().await?.request_pty(pty).await
}

/// Map a request path to the connection for its host, or the handshake rejection.
#[allow(clippy::result_large_err)]
fn resolve_route(
    config: &Config,
    path: &str,
) -> std::result::Result<ConnectionSpec, ErrorResponse> {
    let name = host_segment(path).ok_or_else(|| reject(StatusCode::NOT_FOUND, "not found"))?;

    match config.connection_spec(&name) {
        Ok(spec) => Ok(spec),
        Err(Error::UnknownHost(_)) => {
            tracing::warn!(host = %name, "console requested for unknown host");
            Err(reject(StatusCode::NOT_FOUND, "unknown host"))
        }
        Err(e) => {
            tracing::warn!(host = %name, error = %e, "cannot resolve host connection");
            Err(reject(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
        }
    }
}

/// The percent-decoded `{name}` of `/hosts/{name}/console`.
fn host_segment(path: &str) -> Option<String> {
    let encoded = path.strip_prefix(ROUTE_PREFIX)?.strip_suffix(ROUTE_SUFFIX)?;
    if encoded.is_empty() || encoded.contains('/') {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|name| name.into_owned())
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}
