//! Wire envelopes for the two sockets a call bridges: the carrier media
//! stream and the realtime model channel. Each is a serde
//! internally-tagged enum, one variant per event/message type, in the
//! style of a `#[serde(tag = "...")]` `WsMessage` enum.

pub mod carrier;
pub mod realtime;

pub use carrier::{CarrierInbound, CarrierOutbound};
pub use realtime::{RealtimeInbound, RealtimeOutbound};
