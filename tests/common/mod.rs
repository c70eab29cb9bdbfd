//! Shared helpers for the relay integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};

use wsrelay::{Config, ConnectionManager, RelayEngine};

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a recording target observed on one of its connections
#[derive(Debug, Clone, PartialEq)]
pub enum TargetEvent {
    Connected(usize),
    Frame(usize, Message),
    Closed(usize),
}

/// Relay configuration pointing at `target`, listening on an ephemeral local port
pub fn relay_config(target: SocketAddr) -> Config {
    let mut config = Config::default();
    config.target.host = target.ip().to_string();
    config.target.port = target.port();
    config.target.dial_timeout = Duration::from_secs(5);
    config.server.bind_addr = "127.0.0.1:0".parse().unwrap();
    config
}

/// Start a relay and return its address together with its engine
pub async fn spawn_relay(config: Config) -> (SocketAddr, Arc<RelayEngine>) {
    let mut manager = ConnectionManager::new(Arc::new(config)).unwrap();
    let addr = manager.bind().await.unwrap();
    let engine = Arc::clone(manager.engine());

    tokio::spawn(async move {
        if let Err(e) = manager.start().await {
            eprintln!("Relay error: {}", e);
        }
    });

    (addr, engine)
}

/// Echo every text and binary frame back on the same connection
pub async fn echo<S>(mut ws: WebSocketStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(Ok(message)) = ws.next().await {
        if message.is_text() || message.is_binary() {
            if ws.send(message).await.is_err() {
                break;
            }
        } else if message.is_close() {
            break;
        }
    }
}

/// Plain WebSocket echo target
pub async fn spawn_echo_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(ws) = accept_async(stream).await {
                    echo(ws).await;
                }
            });
        }
    });

    addr
}

/// Target that reports every connection, frame and disconnect it sees
pub async fn spawn_recording_target() -> (SocketAddr, mpsc::UnboundedReceiver<TargetEvent>) {
    recording_target(None).await
}

/// Recording target that sends `greeting` as soon as a connection is up
pub async fn spawn_greeting_target(
    greeting: Message,
) -> (SocketAddr, mpsc::UnboundedReceiver<TargetEvent>) {
    recording_target(Some(greeting)).await
}

async fn recording_target(
    greeting: Option<Message>,
) -> (SocketAddr, mpsc::UnboundedReceiver<TargetEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut next_id = 0;
        while let Ok((stream, _)) = listener.accept().await {
            let id = next_id;
            next_id += 1;
            let events = events_tx.clone();
            let greeting = greeting.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                let _ = events.send(TargetEvent::Connected(id));
                if let Some(greeting) = greeting {
                    let _ = ws.send(greeting).await;
                }
                while let Some(Ok(message)) = ws.next().await {
                    let _ = events.send(TargetEvent::Frame(id, message));
                }
                let _ = events.send(TargetEvent::Closed(id));
            });
        }
    });

    (addr, events_rx)
}

/// Target that hangs up as soon as it has read one frame
pub async fn spawn_hangup_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(mut ws) = accept_async(stream).await {
                    let _ = ws.next().await;
                    let _ = ws.close(None).await;
                }
            });
        }
    });

    addr
}

/// Target that accepts TCP but never answers the WebSocket handshake
pub async fn spawn_silent_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub async fn connect_client(relay: SocketAddr) -> ClientSocket {
    let (ws, _) = connect_async(format!("ws://{}/", relay)).await.unwrap();
    ws
}

/// Next text or binary frame, skipping control frames; `None` once closed
pub async fn next_data_frame(ws: &mut ClientSocket) -> Option<Message> {
    let read = timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(message)) if message.is_text() || message.is_binary() => {
                    return Some(message)
                }
                Some(Ok(message)) if message.is_close() => return None,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await;
    read.expect("timed out waiting for a frame")
}

/// Next event the recording target reported
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<TargetEvent>) -> TargetEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for target event")
        .expect("target event channel closed")
}

/// Wait until the engine reports `expected` active sessions
pub async fn wait_for_sessions(engine: &RelayEngine, expected: usize) -> bool {
    timeout(Duration::from_secs(5), async {
        while engine.active_sessions() != expected {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}
