//! Realtime Client: a thin, non-reconnecting wrapper over the WebSocket
//! connection to the realtime model, per §4.2.
//!
//! # Connection flow
//!
//! 1. Connect WS to the model endpoint.
//! 2. Caller sends `session.update` (greeting phase), then awaits
//!    `session.updated` via [`client::await_session_ready`].
//! 3. Caller drives the event loop: forward carrier audio in, forward
//!    model audio/tool-calls out to the Playback Tracker / Finalizer.
//! 4. On any model-socket error or carrier close: tear down, do not
//!    reconnect (spec §4.1 — a retry would violate audio ordering for a
//!    short-lived call).

pub mod client;
pub mod types;

pub use client::{await_session_ready, RealtimeClient, RealtimeInboundStream};
pub use types::RealtimeClientError;

// Re-export the wire types so callers never need to import bridge-protocol directly.
pub use bridge_protocol::realtime::{
    is_benign_error_code, is_budget_error_code, ConversationItem, OutputItem, RealtimeErrorPayload,
    ResponseDonePayload, ResponseItem, SessionConfig, ToolDef, TurnDetection,
};
pub use bridge_protocol::{RealtimeInbound, RealtimeOutbound};
