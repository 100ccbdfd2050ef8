//! Error type for the realtime model channel.

/// Top-level realtime-client error.
#[derive(thiserror::Error, Debug)]
pub enum RealtimeClientError {
    #[error("websocket: {0}")]
    WebSocket(String),
    #[error("handshake: {0}")]
    Handshake(String),
    #[error("session-ready timeout")]
    SessionReadyTimeout,
    #[error("channel closed")]
    ChannelClosed,
}
