//! The realtime model channel envelope (§4.2, §6). Message-based,
//! ordering-preserving, JSON over WebSocket text frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages this bridge sends to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeOutbound {
    #[serde(rename = "session.update")]
    SessionUpdate {
        session: SessionConfig,
        /// `false` during the greeting phase so the model does not
        /// self-trigger on the opening utterance.
        create_response: bool,
        interrupt_response: bool,
    },
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
    },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
}

impl RealtimeOutbound {
    pub fn session_update(session: SessionConfig, create_response: bool, interrupt_response: bool) -> Self {
        RealtimeOutbound::SessionUpdate {
            session,
            create_response,
            interrupt_response,
        }
    }

    pub fn response_create(instructions: Option<String>) -> Self {
        RealtimeOutbound::ResponseCreate { instructions }
    }

    pub fn truncate(item_id: impl Into<String>, played_ms: u64) -> Self {
        RealtimeOutbound::ConversationItemTruncate {
            item_id: item_id.into(),
            content_index: 0,
            audio_end_ms: played_ms,
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output_json: impl Into<String>) -> Self {
        RealtimeOutbound::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.into(),
                output: output_json.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    FunctionCallOutput { call_id: String, output: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub instructions: String,
    pub turn_detection: TurnDetection,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub voice: String,
    pub tools: Vec<ToolDef>,
    pub tool_choice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub silence_duration_ms: u64,
    pub threshold: f64,
}

impl TurnDetection {
    pub fn server_vad(silence_duration_ms: u64, threshold: f64) -> Self {
        Self {
            kind: "server_vad".into(),
            silence_duration_ms,
            threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Messages the model sends to this bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeInbound {
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "response.output_item.added")]
    ResponseOutputItemAdded { item: ResponseItem },
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { delta: String },
    #[serde(rename = "response.output_audio.delta")]
    ResponseOutputAudioDelta { delta: String },
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseDonePayload },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted { transcript: String },
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped,
    #[serde(rename = "error")]
    Error { error: RealtimeErrorPayload },
}

impl RealtimeInbound {
    /// Either audio-delta spelling, normalized to a single accessor.
    pub fn audio_delta(&self) -> Option<&str> {
        match self {
            RealtimeInbound::ResponseAudioDelta { delta } => Some(delta),
            RealtimeInbound::ResponseOutputAudioDelta { delta } => Some(delta),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDonePayload {
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        role: String,
        content: Vec<MessageContentPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeErrorPayload {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Error codes classified as benign per §4.2 / §7 (downgraded to debug
/// rather than surfaced).
pub fn is_benign_error_code(code: Option<&str>) -> bool {
    matches!(code, Some("response_cancel_not_active"))
}

/// Error codes classified as budget/billing per §7: "escalated with
/// distinct log markers; call ends."
pub fn is_budget_error_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("insufficient_quota") | Some("rate_limit_exceeded") | Some("rate_limit")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_serializes_with_dotted_type() {
        let msg = RealtimeOutbound::session_update(
            SessionConfig {
                instructions: "hi".into(),
                turn_detection: TurnDetection::server_vad(650, 0.7),
                input_audio_format: "g711_ulaw".into(),
                output_audio_format: "g711_ulaw".into(),
                voice: "alloy".into(),
                tools: vec![],
                tool_choice: "auto".into(),
            },
            false,
            false,
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "session.update");
        assert_eq!(value["create_response"], false);
    }

    #[test]
    fn response_done_extracts_function_call() {
        let json = serde_json::json!({
            "type": "response.done",
            "response": {
                "output": [
                    {"type": "message", "role": "assistant", "content": [{"type": "text", "text": "ok"}]},
                    {"type": "function_call", "call_id": "call_1", "name": "finalize_reservation", "arguments": "{}"}
                ]
            }
        });
        let parsed: RealtimeInbound = serde_json::from_value(json).unwrap();
        match parsed {
            RealtimeInbound::ResponseDone { response } => {
                assert_eq!(response.output.len(), 2);
                let has_call = response
                    .output
                    .iter()
                    .any(|item| matches!(item, OutputItem::FunctionCall { name, .. } if name == "finalize_reservation"));
                assert!(has_call);
            }
            other => panic!("expected ResponseDone, got {other:?}"),
        }
    }

    #[test]
    fn either_audio_delta_spelling_is_recognized() {
        let a: RealtimeInbound = serde_json::from_value(
            serde_json::json!({"type": "response.audio.delta", "delta": "AAAA"}),
        )
        .unwrap();
        let b: RealtimeInbound = serde_json::from_value(
            serde_json::json!({"type": "response.output_audio.delta", "delta": "BBBB"}),
        )
        .unwrap();
        assert_eq!(a.audio_delta(), Some("AAAA"));
        assert_eq!(b.audio_delta(), Some("BBBB"));
    }

    #[test]
    fn benign_error_code_classification() {
        assert!(is_benign_error_code(Some("response_cancel_not_active")));
        assert!(!is_benign_error_code(Some("insufficient_quota")));
        assert!(!is_benign_error_code(None));
    }

    #[test]
    fn budget_error_code_classification() {
        assert!(is_budget_error_code(Some("insufficient_quota")));
        assert!(is_budget_error_code(Some("rate_limit_exceeded")));
        assert!(!is_budget_error_code(Some("response_cancel_not_active")));
        assert!(!is_budget_error_code(None));
    }
}
