use serde::Serialize;

/// Structured trace events emitted across the bridge crates.
///
/// Each variant name matches one of the `event` values recognized by the
/// NDJSON call log (see the `calls` crate's event log writer); `emit`
/// additionally mirrors the event to `tracing` so it shows up in the
/// process's structured log stream regardless of whether a call log is
/// open for the call in question.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    Start {
        stream_id: String,
        call_id: String,
        tenant_id: String,
    },
    Stop {
        stream_id: String,
        call_id: String,
    },
    UserUtterance {
        stream_id: String,
        call_id: String,
        text: String,
    },
    AssistantResponse {
        stream_id: String,
        call_id: String,
        text: String,
    },
    ToolCall {
        stream_id: String,
        call_id: String,
        tool_name: String,
        ok: bool,
        arguments: String,
        result: serde_json::Value,
    },
    RealtimeError {
        stream_id: String,
        call_id: String,
        message: String,
    },
    SessionUpdateSent {
        stream_id: String,
        call_id: String,
        phase: String,
    },
    SessionUpdatedReceived {
        stream_id: String,
        call_id: String,
    },
    SessionUpdateTimeout {
        stream_id: String,
        call_id: String,
    },
    ResponseCreateSent {
        stream_id: String,
        call_id: String,
        phase: String,
    },
    BargeInIgnored {
        stream_id: String,
        call_id: String,
        reason: String,
    },
    BargeInCancelled {
        stream_id: String,
        call_id: String,
        reason: String,
    },
    BargeInConfirmed {
        stream_id: String,
        call_id: String,
        played_ms: u64,
    },
    ReservationNotCreated {
        stream_id: String,
        call_id: String,
    },
    TimingSummary {
        stream_id: String,
        call_id: String,
        session_ready_ms: Option<i64>,
        first_audio_ms: Option<i64>,
        first_text_ms: Option<i64>,
        reservation_called_ms: Option<i64>,
        reservation_committed_ms: Option<i64>,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "bridge_event");
    }
}
