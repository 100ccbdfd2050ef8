//! Reservation Finalizer: validates a `finalize_reservation` tool-call
//! argument blob, persists it idempotently, and fires the notification
//! hand-off.
//!
//! Grounded on the teacher's `gateway/src/api/inbound.rs`: a numbered
//! linear pipeline of cheap-to-expensive checks with an early return at
//! each step, and a tagged outcome rather than bare booleans/strings.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

use bridge_domain::reservation::{
    FieldType, ReservationField, ReservationRequest, ReservationSource, ReservationStatus,
};

use crate::notify::{build_notification, NotificationDispatcher};
use crate::store::{InsertOutcome, ReservationStore};

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

fn time_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}:\d{2}$").unwrap())
}

fn digits_only() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9\-]").unwrap())
}

/// Tagged result of a finalize attempt (spec §9 design note): modeled as
/// an enum rather than a bare `{ok, error_type, ...}` struct so the
/// wire serialization happens in exactly one place ([`FinalizeOutcome::to_tool_result`]).
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    Ok { reservation_id: String, deduped: bool },
    NotConfirmed,
    Missing { labels: Vec<String> },
    System { code: &'static str },
}

impl FinalizeOutcome {
    /// The JSON object sent back to the model as `function_call_output`.
    pub fn to_tool_result(&self) -> Value {
        match self {
            FinalizeOutcome::Ok {
                reservation_id,
                deduped,
            } => serde_json::json!({
                "ok": true,
                "reservation_id": reservation_id,
                "deduped": deduped,
            }),
            FinalizeOutcome::NotConfirmed => serde_json::json!({
                "ok": false,
                "error_type": "not_confirmed",
            }),
            FinalizeOutcome::Missing { labels } => serde_json::json!({
                "ok": false,
                "error_type": "missing_fields",
                "missing_fields": labels,
            }),
            FinalizeOutcome::System { code } => serde_json::json!({
                "ok": false,
                "error_type": "system",
                "error_code": code,
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FinalizeOutcome::Ok { .. })
    }
}

#[derive(Debug, Deserialize)]
struct ToolArguments {
    #[serde(default)]
    answers: Value,
    #[serde(default)]
    confirmed: Value,
}

/// Validates, persists and dispatches a notification for one
/// `finalize_reservation` tool call. Does not itself send
/// `function_call_output`/`response.create` — that wire round-trip, and
/// the event-log write, belong to the caller, which already owns the
/// model socket and the call's log stream.
pub struct Finalizer {
    store: Arc<dyn ReservationStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl Finalizer {
    pub fn new(store: Arc<dyn ReservationStore>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub async fn finalize(
        &self,
        tenant_id: &str,
        call_id: &str,
        fields: &[ReservationField],
        raw_arguments: &str,
    ) -> FinalizeOutcome {
        let parsed: ToolArguments = match serde_json::from_str(raw_arguments) {
            Ok(p) => p,
            Err(_) => {
                return FinalizeOutcome::System {
                    code: "PARSE_ERROR",
                }
            }
        };

        let enabled_fields: Vec<&ReservationField> = fields.iter().filter(|f| f.enabled).collect();

        if !enabled_fields.iter().any(|f| f.required) {
            return FinalizeOutcome::System {
                code: "NO_REQUIRED_FIELDS",
            };
        }

        let answers_obj = match parsed.answers.as_object() {
            Some(obj) => obj.clone(),
            None => {
                return FinalizeOutcome::System {
                    code: "INVALID_ANSWERS_FORMAT",
                }
            }
        };

        if parsed.confirmed != Value::Bool(true) {
            return FinalizeOutcome::NotConfirmed;
        }

        let mut missing_fields = Vec::new();
        let mut validated: BTreeMap<String, Value> = BTreeMap::new();

        for field in &enabled_fields {
            let raw_value = answers_obj.get(&field.key).cloned();
            match coerce_field(field, raw_value) {
                Ok(Some(value)) => {
                    validated.insert(field.key.clone(), value);
                }
                Ok(None) => {
                    if field.required {
                        missing_fields.push(field.label.clone());
                    }
                }
                Err(()) => {
                    missing_fields.push(format!("{} ({})", field.label, format_hint(field)));
                }
            }
        }

        // Preserve any answer keys not covered by the tenant's field list
        // unvalidated, per the wire schema's dynamic-object framing.
        for (key, value) in &answers_obj {
            if !enabled_fields.iter().any(|f| &f.key == key) {
                validated.insert(key.clone(), value.clone());
            }
        }

        if !missing_fields.is_empty() {
            return FinalizeOutcome::Missing {
                labels: missing_fields,
            };
        }

        let request = ReservationRequest {
            tenant_id: tenant_id.to_string(),
            call_id: call_id.to_string(),
            customer_name: validated
                .get("customer_name")
                .and_then(|v| v.as_str())
                .map(String::from),
            customer_phone: None,
            party_size: validated.get("party_size").and_then(|v| v.as_i64()),
            requested_date: validated
                .get("requested_date")
                .and_then(|v| v.as_str())
                .map(String::from),
            requested_time: validated
                .get("requested_time")
                .and_then(|v| v.as_str())
                .map(String::from),
            answers: validated,
            status: ReservationStatus::Pending,
            source: ReservationSource::Tool,
            call_log_id: None,
        };

        match self.store.insert(&request).await {
            Ok(InsertOutcome::Inserted { reservation_id }) => {
                let mut field_labels = BTreeMap::new();
                for field in &enabled_fields {
                    field_labels.insert(field.key.clone(), field.label.clone());
                }
                let notification = build_notification(&request, &reservation_id, &field_labels);
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.dispatch(notification).await;
                });

                FinalizeOutcome::Ok {
                    reservation_id,
                    deduped: false,
                }
            }
            Ok(InsertOutcome::Deduped) => FinalizeOutcome::Ok {
                reservation_id: call_id.to_string(),
                deduped: true,
            },
            Err(err) => {
                tracing::error!(call_id, error = %err, "reservation insert failed");
                FinalizeOutcome::System {
                    code: "DB_INSERT_FAILED",
                }
            }
        }
    }
}

/// A short format hint appended to a field's label when its value was
/// present but malformed, so the model can tell "never answered" from
/// "answered in the wrong shape" from the tool result alone.
fn format_hint(field: &ReservationField) -> &str {
    match field.field_type {
        FieldType::Date => field.description.as_deref().unwrap_or("YYYY-MM-DD"),
        FieldType::Time => field.description.as_deref().unwrap_or("HH:mm"),
        FieldType::Number => "digits only",
        FieldType::Text | FieldType::Select => "invalid value",
    }
}

/// Coerce and validate one answer value per its field type. `Ok(None)`
/// means the value is absent/blank (the caller decides whether that is
/// fatal, based on `required`). `Err(())` means present but malformed.
fn coerce_field(field: &ReservationField, raw_value: Option<Value>) -> Result<Option<Value>, ()> {
    let raw_value = match raw_value {
        Some(Value::Null) | None => return Ok(None),
        Some(v) => v,
    };

    match field.field_type {
        FieldType::Number => {
            let as_text = match &raw_value {
                Value::Number(n) => return Ok(Some(Value::Number(n.clone()))),
                Value::String(s) => s.clone(),
                _ => return Err(()),
            };
            let stripped = digits_only().replace_all(&as_text, "");
            if stripped.is_empty() {
                return Ok(None);
            }
            stripped
                .parse::<i64>()
                .map(|n| Some(Value::Number(n.into())))
                .map_err(|_| ())
        }
        FieldType::Date => match raw_value.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) if date_pattern().is_match(s) => Ok(Some(Value::String(s.to_string()))),
            Some(_) => Err(()),
            None => Err(()),
        },
        FieldType::Time => match raw_value.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) if time_pattern().is_match(s) => Ok(Some(Value::String(s.to_string()))),
            Some(_) => Err(()),
            None => Err(()),
        },
        FieldType::Text | FieldType::Select => match raw_value.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(Value::String(s.to_string()))),
            None => Err(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LoggingNotificationDispatcher;
    use crate::store::SqliteReservationStore;

    fn fields() -> Vec<ReservationField> {
        ReservationField::default_fields()
    }

    async fn finalizer() -> Finalizer {
        let store = Arc::new(SqliteReservationStore::connect_in_memory().await.unwrap());
        Finalizer::new(store, Arc::new(LoggingNotificationDispatcher))
    }

    #[tokio::test]
    async fn happy_path_inserts_and_returns_ok() {
        let f = finalizer().await;
        let args = r#"{"answers": {"customer_name": "田中", "party_size": 2, "requested_date": "2025-12-20", "requested_time": "19:00"}, "confirmed": true}"#;

        let outcome = f.finalize("tenant-1", "call-1", &fields(), args).await;
        match outcome {
            FinalizeOutcome::Ok { deduped, .. } => assert!(!deduped),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_required_field_is_reported_by_label() {
        let f = finalizer().await;
        let args = r#"{"answers": {"customer_name": "田中", "party_size": 2, "requested_date": "2025-12-20"}, "confirmed": true}"#;

        let outcome = f.finalize("tenant-1", "call-1", &fields(), args).await;
        match outcome {
            FinalizeOutcome::Missing { labels } => {
                assert_eq!(labels, vec!["希望時間".to_string()]);
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn not_confirmed_when_confirmed_is_not_exactly_true() {
        let f = finalizer().await;
        let args = r#"{"answers": {"customer_name": "田中", "party_size": 2, "requested_date": "2025-12-20", "requested_time": "19:00"}, "confirmed": "yes"}"#;

        let outcome = f.finalize("tenant-1", "call-1", &fields(), args).await;
        assert_eq!(outcome, FinalizeOutcome::NotConfirmed);
    }

    #[tokio::test]
    async fn parse_error_on_malformed_json() {
        let f = finalizer().await;
        let outcome = f.finalize("tenant-1", "call-1", &fields(), "not json").await;
        assert_eq!(
            outcome,
            FinalizeOutcome::System {
                code: "PARSE_ERROR"
            }
        );
    }

    #[tokio::test]
    async fn invalid_answers_format_when_answers_is_not_an_object() {
        let f = finalizer().await;
        let args = r#"{"answers": [], "confirmed": true}"#;
        let outcome = f.finalize("tenant-1", "call-1", &fields(), args).await;
        assert_eq!(
            outcome,
            FinalizeOutcome::System {
                code: "INVALID_ANSWERS_FORMAT"
            }
        );
    }

    #[tokio::test]
    async fn parse_error_takes_precedence_over_no_required_fields_guard() {
        let f = finalizer().await;
        let mut all_optional = fields();
        for field in &mut all_optional {
            field.required = false;
        }
        let outcome = f.finalize("tenant-1", "call-1", &all_optional, "not json").await;
        assert_eq!(
            outcome,
            FinalizeOutcome::System {
                code: "PARSE_ERROR"
            }
        );
    }

    #[tokio::test]
    async fn no_required_fields_guard_fires_when_all_fields_optional() {
        let f = finalizer().await;
        let mut all_optional = fields();
        for field in &mut all_optional {
            field.required = false;
        }
        let args = r#"{"answers": {}, "confirmed": true}"#;
        let outcome = f.finalize("tenant-1", "call-1", &all_optional, args).await;
        assert_eq!(
            outcome,
            FinalizeOutcome::System {
                code: "NO_REQUIRED_FIELDS"
            }
        );
    }

    #[tokio::test]
    async fn number_field_strips_non_digit_characters() {
        let f = finalizer().await;
        let args = r#"{"answers": {"customer_name": "田中", "party_size": "2名", "requested_date": "2025-12-20", "requested_time": "19:00"}, "confirmed": true}"#;
        let outcome = f.finalize("tenant-1", "call-1", &fields(), args).await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn malformed_date_is_reported_as_missing() {
        let f = finalizer().await;
        let args = r#"{"answers": {"customer_name": "田中", "party_size": 2, "requested_date": "12/20/2025", "requested_time": "19:00"}, "confirmed": true}"#;
        let outcome = f.finalize("tenant-1", "call-1", &fields(), args).await;
        match outcome {
            FinalizeOutcome::Missing { labels } => {
                assert!(labels.iter().any(|l| l.starts_with("ご希望日") && l.contains("YYYY-MM-DD")));
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_call_id_dedupes_without_reporting_error() {
        let f = finalizer().await;
        let args = r#"{"answers": {"customer_name": "田中", "party_size": 2, "requested_date": "2025-12-20", "requested_time": "19:00"}, "confirmed": true}"#;

        let first = f.finalize("tenant-1", "call-1", &fields(), args).await;
        assert!(first.is_ok());

        let second = f.finalize("tenant-1", "call-1", &fields(), args).await;
        match second {
            FinalizeOutcome::Ok { deduped, .. } => assert!(deduped),
            other => panic!("expected deduped Ok, got {other:?}"),
        }
    }
}
