//! Composition root and carrier-facing transport for the voice-agent
//! bridge: wires the domain/calls/tenant-config/reservations/realtime-client
//! crates into one running server.

pub mod cli;
pub mod orchestrator;
pub mod state;
pub mod ws;
