//! Relay Frames
//!
//! The downstream side speaks axum's WebSocket message type and the upstream
//! side speaks tungstenite's. [`Frame`] sits between them so every forwarded
//! message crosses the relay with its type tag and payload unchanged.

use axum::extract::ws::{self as downstream, Message as DownstreamMessage};
use std::borrow::Cow;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// Close code and reason carried by a Close frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

/// One WebSocket message as seen by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<CloseReason>),
}

impl Frame {
    pub fn is_close(&self) -> bool {
        matches!(self, Frame::Close(_))
    }

    /// Ping or Pong
    pub fn is_control(&self) -> bool {
        matches!(self, Frame::Ping(_) | Frame::Pong(_))
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) | Frame::Ping(data) | Frame::Pong(data) => data.len(),
            Frame::Close(Some(close)) => 2 + close.reason.len(),
            Frame::Close(None) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type tag, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
            Frame::Ping(_) => "ping",
            Frame::Pong(_) => "pong",
            Frame::Close(_) => "close",
        }
    }
}

impl From<DownstreamMessage> for Frame {
    fn from(message: DownstreamMessage) -> Self {
        match message {
            DownstreamMessage::Text(text) => Frame::Text(text),
            DownstreamMessage::Binary(data) => Frame::Binary(data),
            DownstreamMessage::Ping(data) => Frame::Ping(data),
            DownstreamMessage::Pong(data) => Frame::Pong(data),
            DownstreamMessage::Close(close) => Frame::Close(close.map(|c| CloseReason {
                code: c.code,
                reason: c.reason.into_owned(),
            })),
        }
    }
}

impl From<Frame> for DownstreamMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => DownstreamMessage::Text(text),
            Frame::Binary(data) => DownstreamMessage::Binary(data),
            Frame::Ping(data) => DownstreamMessage::Ping(data),
            Frame::Pong(data) => DownstreamMessage::Pong(data),
            Frame::Close(close) => DownstreamMessage::Close(close.map(|c| downstream::CloseFrame {
                code: c.code,
                reason: Cow::Owned(c.reason),
            })),
        }
    }
}

impl From<UpstreamMessage> for Frame {
    fn from(message: UpstreamMessage) -> Self {
        match message {
            UpstreamMessage::Text(text) => Frame::Text(text),
            UpstreamMessage::Binary(data) => Frame::Binary(data),
            UpstreamMessage::Ping(data) => Frame::Ping(data),
            UpstreamMessage::Pong(data) => Frame::Pong(data),
            UpstreamMessage::Close(close) => Frame::Close(close.map(|c| CloseReason {
                code: c.code.into(),
                reason: c.reason.into_owned(),
            })),
            // Raw frames only exist on the write path
            UpstreamMessage::Frame(raw) => Frame::Binary(raw.into_data()),
        }
    }
}

impl From<Frame> for UpstreamMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => UpstreamMessage::Text(text),
            Frame::Binary(data) => UpstreamMessage::Binary(data),
            Frame::Ping(data) => UpstreamMessage::Ping(data),
            Frame::Pong(data) => UpstreamMessage::Pong(data),
            Frame::Close(close) => UpstreamMessage::Close(close.map(|c| CloseFrame {
                code: CloseCode::from(c.code),
                reason: Cow::Owned(c.reason),
            })),
        }
    }
}
