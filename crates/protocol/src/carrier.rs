//! The carrier's framed JSON media-stream envelope (§4.3, §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inbound envelope events from the carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierInbound {
    Connected,
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        #[serde(rename = "callSid")]
        call_sid: String,
        #[serde(rename = "customParameters", default)]
        custom_parameters: HashMap<String, String>,
    },
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
    Stop {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded µ-law 8 kHz mono frame, exactly 20ms (160 bytes decoded).
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Outbound envelope messages sent to the carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierOutbound {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
}

impl CarrierOutbound {
    pub fn media(stream_sid: impl Into<String>, base64_payload: impl Into<String>) -> Self {
        CarrierOutbound::Media {
            stream_sid: stream_sid.into(),
            media: MediaPayload {
                payload: base64_payload.into(),
            },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        CarrierOutbound::Clear {
            stream_sid: stream_sid.into(),
        }
    }

    pub fn mark(stream_sid: impl Into<String>, name: impl Into<String>) -> Self {
        CarrierOutbound::Mark {
            stream_sid: stream_sid.into(),
            mark: MarkPayload { name: name.into() },
        }
    }
}

/// Well-known custom-parameter keys carried on the `start` event.
pub mod custom_param_keys {
    pub const TENANT_ID: &str = "tenantId";
    pub const CALLEE_NUMBER: &str = "calleeNumber";
    pub const CALLER_NUMBER: &str = "callerNumber";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_event_parses_custom_parameters() {
        let json = serde_json::json!({
            "event": "start",
            "streamSid": "MZ123",
            "callSid": "CA456",
            "customParameters": {
                "tenantId": "t1",
                "calleeNumber": "+15550001111",
                "callerNumber": "+15550002222",
            }
        });
        let parsed: CarrierInbound = serde_json::from_value(json).unwrap();
        match parsed {
            CarrierInbound::Start {
                stream_sid,
                call_sid,
                custom_parameters,
            } => {
                assert_eq!(stream_sid, "MZ123");
                assert_eq!(call_sid, "CA456");
                assert_eq!(
                    custom_parameters.get(custom_param_keys::TENANT_ID),
                    Some(&"t1".to_string())
                );
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn media_outbound_serializes_expected_shape() {
        let msg = CarrierOutbound::media("MZ123", "AAAA");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "media");
        assert_eq!(value["streamSid"], "MZ123");
        assert_eq!(value["media"]["payload"], "AAAA");
    }

    #[test]
    fn mark_inbound_roundtrips() {
        let json = serde_json::json!({
            "event": "mark",
            "streamSid": "MZ123",
            "mark": { "name": "a:item1:ms:300:seq:1" }
        });
        let parsed: CarrierInbound = serde_json::from_value(json).unwrap();
        match parsed {
            CarrierInbound::Mark { mark, .. } => {
                assert_eq!(mark.name, "a:item1:ms:300:seq:1");
            }
            other => panic!("expected Mark, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_fails_to_parse_and_is_discarded_by_caller() {
        let json = serde_json::json!({ "event": "transcription", "streamSid": "MZ1" });
        let parsed = serde_json::from_value::<CarrierInbound>(json);
        assert!(parsed.is_err());
    }
}
