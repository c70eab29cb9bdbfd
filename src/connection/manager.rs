//! Connection Manager Implementation

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::relay::{create_router, RelayEngine};
use crate::Result;

/// Owns the listener and hands every accepted connection to its own task
pub struct ConnectionManager {
    listener: Option<TcpListener>,
    config: Arc<Config>,
    engine: Arc<RelayEngine>,
    tls_acceptor: Option<TlsAcceptor>,
    app: Router,
}

impl ConnectionManager {
    /// Create a new ConnectionManager.
    ///
    /// Loads the TLS material and the outbound connector up front so that a
    /// bad certificate fails startup before anything is bound.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let tls_acceptor = match &config.tls {
            Some(tls) => Some(crate::tls::load_tls_acceptor(tls)?),
            None => None,
        };
        let engine = Arc::new(RelayEngine::from_config(Arc::clone(&config))?);
        let app = create_router(Arc::clone(&engine));

        Ok(Self {
            listener: None,
            config,
            engine,
            tls_acceptor,
            app,
        })
    }

    /// The relay engine shared by every session
    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// Bind the listener without accepting yet; returns the bound address
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let bind_addr = self.config.server.bind_addr;

        info!("Binding TCP listener to {}", bind_addr);
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind listen address {}", bind_addr))?;

        let local_addr = listener.local_addr()?;
        info!(
            "WebSocket relay ({}) listening on {}",
            if self.tls_acceptor.is_some() { "WSS" } else { "WS" },
            local_addr
        );
        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Get the bound address, if any
    pub fn get_bind_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Bind (if not already bound) and accept connections until the listener fails
    pub async fn start(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }

        info!("Relaying to {}", self.engine.target_url());
        self.accept_connections().await
    }

    /// Main connection acceptance loop
    async fn accept_connections(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .ok_or_else(|| anyhow!("Listener not initialized"))?;

        info!("Starting connection acceptance loop");

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {}", addr);

                    let tls_acceptor = self.tls_acceptor.clone();
                    let app = self.app.clone();

                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, addr, tls_acceptor, app).await {
                            debug!("Connection from {} ended with error: {:#}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    // Continue accepting connections even if one fails
                }
            }
        }
    }

    /// Terminate TLS when enabled, then serve HTTP on the connection
    #[instrument(skip(stream, tls_acceptor, app), fields(addr = %addr))]
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        tls_acceptor: Option<TlsAcceptor>,
        app: Router,
    ) -> Result<()> {
        match tls_acceptor {
            Some(acceptor) => {
                let tls_stream = match acceptor.accept(stream).await {
                    Ok(tls_stream) => tls_stream,
                    Err(e) => {
                        warn!("TLS handshake with {} failed: {}", addr, e);
                        return Ok(());
                    }
                };
                serve_connection(tls_stream, addr, app).await
            }
            None => serve_connection(stream, addr, app).await,
        }
    }
}

/// Serve HTTP/1.1 with upgrades on one connection, exposing the peer address
/// to handlers as [`ConnectInfo`]
async fn serve_connection<S>(stream: S, addr: SocketAddr, app: Router) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(addr));
        app.clone().oneshot(request)
    });

    http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
        .with_context(|| format!("HTTP connection with {} failed", addr))
}
