//! Pure µ-law 8 kHz byte-count <-> millisecond accounting, plus
//! monotonic-timestamp helpers shared by the Playback Tracker and the
//! Barge-in Controller.

/// Bytes per millisecond for 8 kHz, 1-byte-per-sample µ-law audio.
pub const BYTES_PER_MS: u64 = 8;

/// Convert a count of decoded µ-law bytes into whole milliseconds,
/// rounding to the nearest millisecond (half-up), per the audio
/// byte-count law: `ms = round(bytes * 1000 / 8000)`.
pub fn bytes_to_ms(bytes: u64) -> u64 {
    // round(bytes * 1000 / 8000) == round(bytes / 8)
    (bytes + BYTES_PER_MS / 2) / BYTES_PER_MS
}

/// Decode a base64 µ-law payload and return its length in decoded bytes.
/// Callers that also need the decoded bytes themselves (not just the
/// count) should decode once and reuse the slice length rather than
/// calling this a second time.
pub fn decoded_len(base64_payload: &str) -> crate::Result<usize> {
    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(base64_payload)
        .map_err(|e| crate::Error::Protocol(format!("invalid base64 audio payload: {e}")))?;
    Ok(decoded.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_frame_is_twenty_ms() {
        // A 20ms frame at 8kHz mono mu-law is 160 bytes.
        assert_eq!(bytes_to_ms(160), 20);
    }

    #[test]
    fn rounds_to_nearest_ms() {
        assert_eq!(bytes_to_ms(0), 0);
        assert_eq!(bytes_to_ms(4), 1); // 0.5ms rounds up
        assert_eq!(bytes_to_ms(3), 0); // 0.375ms rounds down
        assert_eq!(bytes_to_ms(12), 2); // 1.5ms rounds up (half-up)
    }

    #[test]
    fn accumulates_additively_over_contiguous_runs() {
        // The byte-count law must hold whether bytes are accounted frame
        // by frame or as one contiguous run.
        let frames = [160u64, 160, 160, 80];
        let total: u64 = frames.iter().sum();
        let per_frame: u64 = frames.iter().map(|b| bytes_to_ms(*b)).sum();
        assert_eq!(bytes_to_ms(total), per_frame);
    }
}
