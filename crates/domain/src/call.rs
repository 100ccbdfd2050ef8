use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation phase. Monotonic: `Greeting -> Normal`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallPhase {
    Greeting,
    Normal,
}

impl CallPhase {
    /// Attempt the one legal transition. Returns `false` (no-op) if
    /// already `Normal`, enforcing the monotonic invariant at the call
    /// site instead of trusting callers not to regress the phase.
    pub fn advance_to_normal(&mut self) -> bool {
        match self {
            CallPhase::Greeting => {
                *self = CallPhase::Normal;
                true
            }
            CallPhase::Normal => false,
        }
    }
}

/// A single transcript line, append-only for the lifetime of the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptRole {
    User,
    Assistant,
}

/// Wall-clock timing checkpoints recorded once each, in order, over the
/// life of a call. Used for the `timing_summary` event log record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingCheckpoints {
    pub session_ready: Option<DateTime<Utc>>,
    pub first_audio: Option<DateTime<Utc>>,
    pub first_text: Option<DateTime<Utc>>,
    pub reservation_called: Option<DateTime<Utc>>,
    pub reservation_committed: Option<DateTime<Utc>>,
}

/// In-memory state for one inbound media stream, created on the
/// carrier's `start` event and torn down on `stop` or either socket
/// closing.
#[derive(Debug, Clone)]
pub struct Call {
    pub stream_id: String,
    pub call_id: String,
    pub tenant_id: String,
    pub caller_number: Option<String>,
    pub callee_number: Option<String>,
    pub started_at: DateTime<Utc>,
    pub timing: TimingCheckpoints,
    pub transcript: Vec<TranscriptEntry>,
    pub phase: CallPhase,
    /// Monotonic: false -> true. Never reset for the life of the call.
    pub reservation_committed: bool,
}

impl Call {
    pub fn new(
        stream_id: impl Into<String>,
        call_id: impl Into<String>,
        tenant_id: impl Into<String>,
        caller_number: Option<String>,
        callee_number: Option<String>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            call_id: call_id.into(),
            tenant_id: tenant_id.into(),
            caller_number,
            callee_number,
            started_at: Utc::now(),
            timing: TimingCheckpoints::default(),
            transcript: Vec::new(),
            phase: CallPhase::Greeting,
            reservation_committed: false,
        }
    }

    pub fn push_transcript(&mut self, role: TranscriptRole, text: impl Into<String>) {
        if self.timing.first_text.is_none() {
            self.timing.first_text = Some(Utc::now());
        }
        self.transcript.push(TranscriptEntry {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    /// Set once, on the first audio delta forwarded to the carrier.
    pub fn mark_first_audio(&mut self) {
        if self.timing.first_audio.is_none() {
            self.timing.first_audio = Some(Utc::now());
        }
    }

    /// Monotonic: once committed, stays committed.
    pub fn mark_reservation_committed(&mut self) {
        if !self.reservation_committed {
            self.reservation_committed = true;
            self.timing.reservation_committed = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_advances_once_and_stays() {
        let mut phase = CallPhase::Greeting;
        assert!(phase.advance_to_normal());
        assert_eq!(phase, CallPhase::Normal);
        assert!(!phase.advance_to_normal());
        assert_eq!(phase, CallPhase::Normal);
    }

    #[test]
    fn reservation_flag_is_monotonic() {
        let mut call = Call::new("s1", "c1", "t1", None, None);
        assert!(!call.reservation_committed);
        call.mark_reservation_committed();
        assert!(call.reservation_committed);
        let committed_at = call.timing.reservation_committed;
        call.mark_reservation_committed();
        assert_eq!(call.timing.reservation_committed, committed_at);
    }

    #[test]
    fn transcript_is_append_only() {
        let mut call = Call::new("s1", "c1", "t1", None, None);
        call.push_transcript(TranscriptRole::User, "hello");
        call.push_transcript(TranscriptRole::Assistant, "hi there");
        assert_eq!(call.transcript.len(), 2);
        assert_eq!(call.transcript[0].role, TranscriptRole::User);
        assert_eq!(call.transcript[1].role, TranscriptRole::Assistant);
    }

    #[test]
    fn first_text_checkpoint_is_set_once() {
        let mut call = Call::new("s1", "c1", "t1", None, None);
        assert!(call.timing.first_text.is_none());
        call.push_transcript(TranscriptRole::User, "hello");
        let first = call.timing.first_text;
        assert!(first.is_some());
        call.push_transcript(TranscriptRole::Assistant, "hi there");
        assert_eq!(call.timing.first_text, first);
    }

    #[test]
    fn first_audio_checkpoint_is_set_once() {
        let mut call = Call::new("s1", "c1", "t1", None, None);
        call.mark_first_audio();
        let first = call.timing.first_audio;
        assert!(first.is_some());
        call.mark_first_audio();
        assert_eq!(call.timing.first_audio, first);
    }
}
