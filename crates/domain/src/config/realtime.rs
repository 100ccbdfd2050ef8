use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Realtime model channel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeModelConfig {
    #[serde(default = "d_model_url")]
    pub endpoint_url: String,
    #[serde(default = "d_model_id")]
    pub model: String,
    /// Model used for the best-effort end-of-call summary; distinct from
    /// the realtime conversational model.
    #[serde(default)]
    pub summary_model: Option<String>,
    #[serde(default = "d_voice")]
    pub voice: String,
    /// Milliseconds allowed between opening the model socket and
    /// receiving both `session.updated` and a loaded tenant config.
    #[serde(default = "d_session_ready_deadline_ms")]
    pub session_ready_deadline_ms: u64,
}

impl Default for RealtimeModelConfig {
    fn default() -> Self {
        Self {
            endpoint_url: d_model_url(),
            model: d_model_id(),
            summary_model: None,
            voice: d_voice(),
            session_ready_deadline_ms: d_session_ready_deadline_ms(),
        }
    }
}

fn d_model_url() -> String {
    "wss://realtime.example.invalid/v1/realtime".into()
}
fn d_model_id() -> String {
    "realtime-default".into()
}
fn d_voice() -> String {
    "alloy".into()
}
fn d_session_ready_deadline_ms() -> u64 {
    3_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Feature flags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "d_true")]
    pub base64_passthrough: bool,
    #[serde(default = "d_true")]
    pub smart_cancel: bool,
    #[serde(default = "d_vad_silence_ms")]
    pub vad_silence_ms: u64,
    #[serde(default = "d_vad_threshold")]
    pub vad_threshold: f64,
    #[serde(default = "d_barge_in_debounce_ms")]
    pub barge_in_debounce_ms: u64,
    #[serde(default = "d_barge_in_min_remain_ms")]
    pub barge_in_min_remain_ms: u64,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            base64_passthrough: d_true(),
            smart_cancel: d_true(),
            vad_silence_ms: d_vad_silence_ms(),
            vad_threshold: d_vad_threshold(),
            barge_in_debounce_ms: d_barge_in_debounce_ms(),
            barge_in_min_remain_ms: d_barge_in_min_remain_ms(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_vad_silence_ms() -> u64 {
    650
}
fn d_vad_threshold() -> f64 {
    0.7
}
fn d_barge_in_debounce_ms() -> u64 {
    1_000
}
fn d_barge_in_min_remain_ms() -> u64 {
    2_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Debug / observability toggles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    /// Log every inbound/outbound realtime-model frame verbatim (large).
    #[serde(default)]
    pub log_raw_frames: bool,
    /// Log every carrier media frame's byte accounting (noisy; useful
    /// when chasing a playback-tracker discrepancy).
    #[serde(default)]
    pub log_audio_accounting: bool,
}
