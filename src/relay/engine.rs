//! Relay Engine

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::{ConnectionStats, Direction, Frame, RelaySession};
use crate::config::Config;
use crate::error::{BoxError, SessionError};
use crate::Result;

/// Outbound connection to the target
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on flushing a Close frame during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Dials the configured target and pairs it with each upgraded client
pub struct RelayEngine {
    config: Arc<Config>,
    target_url: String,
    connector: Option<Connector>,
    active_sessions: AtomicUsize,
}

impl RelayEngine {
    /// Create a relay engine from configuration, building the `wss` connector
    /// when TLS is enabled
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let connector = crate::tls::connector_for(&config)?;
        Ok(Self::with_connector(config, connector))
    }

    /// Create a relay engine with an explicit outbound connector
    pub fn with_connector(config: Arc<Config>, connector: Option<Connector>) -> Self {
        let target_url = config.target_url();
        Self {
            config,
            target_url,
            connector,
            active_sessions: AtomicUsize::new(0),
        }
    }

    /// URL dialed for every session
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Sessions whose handler is still running
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Open the outbound connection to the target. No retry.
    pub async fn dial_upstream(&self) -> std::result::Result<UpstreamSocket, SessionError> {
        let dial_timeout = self.config.target.dial_timeout;
        debug!(target_url = %self.target_url, "Dialing target server");

        let result = timeout(
            dial_timeout,
            connect_async_tls_with_config(
                self.target_url.as_str(),
                Some(unlimited_ws_config()),
                false,
                self.connector.clone(),
            ),
        )
        .await;

        match result {
            Ok(Ok((socket, response))) => {
                debug!(status = %response.status(), "Target accepted upgrade");
                Ok(socket)
            }
            Ok(Err(source)) => Err(SessionError::Dial {
                url: self.target_url.clone(),
                source,
            }),
            Err(_) => Err(SessionError::DialTimeout {
                url: self.target_url.clone(),
                timeout: dial_timeout,
            }),
        }
    }

    /// Run one session for an upgraded client: dial, relay, tear down.
    ///
    /// Returns once both connections are closed. A dial failure closes the
    /// client connection before returning the error.
    pub async fn run_session(
        &self,
        session_id: String,
        mut downstream: WebSocket,
        client_addr: SocketAddr,
    ) -> std::result::Result<ConnectionStats, SessionError> {
        let _active = ActiveSession::enter(&self.active_sessions);
        info!(active_sessions = self.active_sessions(), "Client connected");

        let upstream = match self.dial_upstream().await {
            Ok(upstream) => upstream,
            Err(e) => {
                if let Ok(Err(close_err)) = timeout(CLOSE_TIMEOUT, SinkExt::close(&mut downstream)).await {
                    debug!("Client connection already gone: {}", close_err);
                }
                return Err(e);
            }
        };

        info!(target_url = %self.target_url, "Connected to target server");

        let session = Arc::new(RelaySession::new(session_id, client_addr, self.target_url.clone()));
        relay_frames(&session, downstream, upstream).await;
        session.log_stats();

        Ok(session.to_stats())
    }
}

/// Copy frames between two connections until either side ends.
///
/// The target->client direction runs on a spawned task, the client->target
/// direction on the caller's task. Whichever finishes first, both sinks are
/// closed and the spawned task is aborted before this returns.
pub async fn relay_frames<D, U, DM, UM, DE, UE>(session: &Arc<RelaySession>, downstream: D, upstream: U)
where
    D: Stream<Item = std::result::Result<DM, DE>> + Sink<DM, Error = DE> + Send + 'static,
    U: Stream<Item = std::result::Result<UM, UE>> + Sink<UM, Error = UE> + Send + 'static,
    DM: Into<Frame> + From<Frame> + Send + 'static,
    UM: Into<Frame> + From<Frame> + Send + 'static,
    DE: Into<BoxError> + Send + 'static,
    UE: Into<BoxError> + Send + 'static,
{
    let (mut down_tx, mut down_rx) = downstream.split();
    let (mut up_tx, mut up_rx) = upstream.split();

    let reverse_session = Arc::clone(session);
    let mut reverse = tokio::spawn(async move {
        let result = forward(&mut up_rx, &mut down_tx, Direction::Downstream, &reverse_session).await;
        close_sink::<_, DM>(&mut down_tx).await;
        result
    });
    let _reverse_guard = AbortOnDrop(reverse.abort_handle());

    let outcome = tokio::select! {
        result = forward(&mut down_rx, &mut up_tx, Direction::Upstream, session) => result,
        joined = &mut reverse => match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("Forwarding task ended abnormally: {}", e);
                Ok(())
            }
        },
    };

    close_sink::<_, UM>(&mut up_tx).await;

    match outcome {
        Ok(()) => debug!("Session closed by peer"),
        Err(e) => debug!(phase = e.phase(), "Session ended: {}", e),
    }
}

/// Forward frames from `source` to `sink` in order, unmodified.
///
/// Text, Binary and Close frames cross the relay. Ping and Pong stay on
/// their own hop, where the WebSocket layer answers pings as it reads.
/// Ends cleanly when the source is exhausted or after forwarding a Close
/// frame; any read or write failure ends it with an error.
pub async fn forward<S, K, M, N, E, F>(
    source: &mut S,
    sink: &mut K,
    direction: Direction,
    session: &RelaySession,
) -> std::result::Result<(), SessionError>
where
    S: Stream<Item = std::result::Result<M, E>> + Unpin,
    K: Sink<N, Error = F> + Unpin,
    M: Into<Frame>,
    N: From<Frame>,
    E: Into<BoxError>,
    F: Into<BoxError>,
{
    while let Some(message) = source.next().await {
        let frame: Frame = message
            .map_err(|e| SessionError::Read {
                direction,
                source: e.into(),
            })?
            .into();

        if frame.is_control() {
            trace!(%direction, kind = frame.kind(), "Answered on this hop, not forwarded");
            continue;
        }

        let is_close = frame.is_close();
        let len = frame.len();
        trace!(%direction, kind = frame.kind(), len, "Forwarding frame");

        sink.send(N::from(frame))
            .await
            .map_err(|e| SessionError::Write {
                direction,
                source: e.into(),
            })?;
        session.record(direction, len);

        if is_close {
            break;
        }
    }

    Ok(())
}

async fn close_sink<K, N>(sink: &mut K)
where
    K: Sink<N> + Unpin,
{
    match timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => trace!("Connection already closed"),
        Err(_) => debug!("Timed out closing connection after {:?}", CLOSE_TIMEOUT),
    }
}

fn unlimited_ws_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = None;
    config.max_frame_size = None;
    config
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct ActiveSession<'a>(&'a AtomicUsize);

impl<'a> ActiveSession<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
