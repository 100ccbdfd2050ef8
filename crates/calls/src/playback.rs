//! Playback Tracker (spec §3, §4.4).
//!
//! One instance per assistant utterance. Tracks how many milliseconds of
//! audio have been forwarded to the carrier (`sent_ms`) versus how many the
//! carrier has confirmed were actually rendered (`played_ms`), via mark
//! acknowledgements. `played_ms` is the only sound basis for the truncation
//! value sent on a barge-in: forwarded audio sits in the carrier's jitter
//! buffer, so without marks the server has no signal for what was heard.

use std::collections::BTreeMap;

use bridge_domain::codec::bytes_to_ms;

/// Minimum spacing between emitted marks, in milliseconds of forwarded audio.
pub const MARK_SPACING_MS: u64 = 300;

/// Outcome of acknowledging a mark: whether (and by how much) `played_ms`
/// advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkAck {
    pub played_ms: u64,
    pub advanced: bool,
}

#[derive(Debug, Clone)]
pub struct PlaybackTracker {
    assistant_item_id: Option<String>,
    sent_ms: u64,
    played_ms: u64,
    last_mark_sent_ms: u64,
    next_seq: u64,
    marks: BTreeMap<String, u64>,
    clearing: bool,
}

impl Default for PlaybackTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self {
            assistant_item_id: None,
            sent_ms: 0,
            played_ms: 0,
            last_mark_sent_ms: 0,
            next_seq: 0,
            marks: BTreeMap::new(),
            clearing: false,
        }
    }

    pub fn sent_ms(&self) -> u64 {
        self.sent_ms
    }

    pub fn played_ms(&self) -> u64 {
        self.played_ms
    }

    pub fn clearing(&self) -> bool {
        self.clearing
    }

    pub fn assistant_item_id(&self) -> Option<&str> {
        self.assistant_item_id.as_deref()
    }

    pub fn remaining_ms(&self) -> u64 {
        self.sent_ms.saturating_sub(self.played_ms)
    }

    /// `response.output_item.added` for a new assistant message: reset
    /// every counter and drop the outstanding mark map. Clears `clearing`
    /// so marks for the new utterance are honoured again.
    pub fn reset_for_item(&mut self, assistant_item_id: impl Into<String>) {
        self.assistant_item_id = Some(assistant_item_id.into());
        self.sent_ms = 0;
        self.played_ms = 0;
        self.last_mark_sent_ms = 0;
        self.next_seq = 0;
        self.marks.clear();
        self.clearing = false;
    }

    /// Account `decoded_bytes` of forwarded audio and return a mark name
    /// to emit, if the 300ms spacing threshold was crossed.
    ///
    /// Per the audio byte-count law, `sent_ms` always advances by exactly
    /// `round(decoded_bytes * 1000 / 8000)`, regardless of how the caller
    /// chunks the run of deltas.
    pub fn account_delta(&mut self, decoded_bytes: u64) -> Option<String> {
        self.sent_ms += bytes_to_ms(decoded_bytes);

        if self.sent_ms.saturating_sub(self.last_mark_sent_ms) < MARK_SPACING_MS {
            return None;
        }

        let item = self.assistant_item_id.as_deref().unwrap_or("unknown");
        let seq = self.next_seq;
        self.next_seq += 1;
        let name = format!("a:{item}:ms:{}:seq:{seq}", self.sent_ms);
        self.marks.insert(name.clone(), self.sent_ms);
        self.last_mark_sent_ms = self.sent_ms;
        Some(name)
    }

    /// Set once a confirmed barge-in has issued a `clear` to the carrier.
    /// Held until the next assistant item resets the tracker.
    pub fn begin_clearing(&mut self) {
        self.clearing = true;
    }

    /// Carrier acknowledgement of a previously emitted mark. Ignored (but
    /// still removed from the map, since the carrier won't ack it twice)
    /// if `clearing` is set.
    pub fn ack_mark(&mut self, name: &str) -> Option<MarkAck> {
        let sent_at = self.marks.remove(name)?;
        if self.clearing {
            return Some(MarkAck {
                played_ms: self.played_ms,
                advanced: false,
            });
        }
        let before = self.played_ms;
        self.played_ms = self.played_ms.max(sent_at);
        Some(MarkAck {
            played_ms: self.played_ms,
            advanced: self.played_ms > before,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_delta_follows_byte_count_law() {
        let mut t = PlaybackTracker::new();
        t.reset_for_item("item1");
        t.account_delta(160); // 20ms frame
        assert_eq!(t.sent_ms(), 20);
        t.account_delta(160);
        assert_eq!(t.sent_ms(), 40);
    }

    #[test]
    fn mark_emitted_after_300ms_spacing() {
        let mut t = PlaybackTracker::new();
        t.reset_for_item("item1");
        // 14 frames of 20ms = 280ms: below threshold.
        let mut last = None;
        for _ in 0..14 {
            last = t.account_delta(160);
        }
        assert!(last.is_none());
        assert_eq!(t.sent_ms(), 280);

        // One more frame crosses 300ms.
        let mark = t.account_delta(160).expect("mark at >=300ms");
        assert!(mark.starts_with("a:item1:ms:300:seq:0"));
        assert_eq!(t.sent_ms(), 300);
    }

    #[test]
    fn ack_advances_played_ms_when_not_clearing() {
        let mut t = PlaybackTracker::new();
        t.reset_for_item("item1");
        for _ in 0..15 {
            t.account_delta(160);
        }
        let mark = "a:item1:ms:300:seq:0".to_string();
        let ack = t.ack_mark(&mark).expect("mark exists");
        assert!(ack.advanced);
        assert_eq!(t.played_ms(), 300);
        assert!(t.played_ms() <= t.sent_ms());
    }

    #[test]
    fn ack_ignored_while_clearing() {
        let mut t = PlaybackTracker::new();
        t.reset_for_item("item1");
        for _ in 0..15 {
            t.account_delta(160);
        }
        t.begin_clearing();
        let ack = t.ack_mark("a:item1:ms:300:seq:0").expect("mark exists");
        assert!(!ack.advanced);
        assert_eq!(t.played_ms(), 0);
    }

    #[test]
    fn reset_clears_clearing_flag_and_marks() {
        let mut t = PlaybackTracker::new();
        t.reset_for_item("item1");
        t.account_delta(4800); // 600ms, one mark
        t.begin_clearing();
        assert!(t.clearing());

        t.reset_for_item("item2");
        assert!(!t.clearing());
        assert_eq!(t.sent_ms(), 0);
        assert_eq!(t.played_ms(), 0);
        assert_eq!(t.assistant_item_id(), Some("item2"));
    }

    #[test]
    fn unknown_mark_ack_is_none() {
        let mut t = PlaybackTracker::new();
        t.reset_for_item("item1");
        assert!(t.ack_mark("not-a-real-mark").is_none());
    }

    #[test]
    fn played_ms_never_exceeds_sent_ms_over_many_acks() {
        let mut t = PlaybackTracker::new();
        t.reset_for_item("item1");
        let mut marks = Vec::new();
        for _ in 0..40 {
            if let Some(m) = t.account_delta(160) {
                marks.push(m);
            }
        }
        for m in marks {
            t.ack_mark(&m);
            assert!(t.played_ms() <= t.sent_ms());
        }
    }
}
