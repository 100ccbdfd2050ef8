//! Call-scoped state: the process-wide call registry, the per-call NDJSON
//! event log, the playback tracker, and the barge-in controller.
//!
//! None of these types talk to a socket directly — the gateway crate wires
//! them to the carrier/model WebSocket tasks. Keeping them socket-free
//! makes the invariants in spec §8 unit-testable without a network stack.

pub mod barge_in;
pub mod event_log;
pub mod playback;
pub mod registry;

pub use barge_in::{BargeInController, BargeInOutcome};
pub use event_log::EventLogSink;
pub use playback::{MarkAck, PlaybackTracker};
pub use registry::{CallHandle, CallRegistry};
