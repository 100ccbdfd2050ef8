use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field type for a tenant-configured reservation field. Drives both the
/// generated JSON Schema and the per-field coercion/validation rules in
/// the Finalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Time,
    Select,
}

/// A single reservation form field, as read from the (external) field
/// definition store, ordered by `display_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub options: Option<Vec<String>>,
    pub description: Option<String>,
    pub display_order: i64,
    pub enabled: bool,
}

impl ReservationField {
    /// The four canonical fields used when a tenant has no field rows
    /// configured at all.
    pub fn default_fields() -> Vec<ReservationField> {
        vec![
            ReservationField {
                key: "customer_name".into(),
                label: "お名前".into(),
                field_type: FieldType::Text,
                required: true,
                options: None,
                description: None,
                display_order: 0,
                enabled: true,
            },
            ReservationField {
                key: "party_size".into(),
                label: "人数".into(),
                field_type: FieldType::Number,
                required: true,
                options: None,
                description: None,
                display_order: 1,
                enabled: true,
            },
            ReservationField {
                key: "requested_date".into(),
                label: "ご希望日".into(),
                field_type: FieldType::Date,
                required: true,
                options: None,
                description: Some("YYYY-MM-DD".into()),
                display_order: 2,
                enabled: true,
            },
            ReservationField {
                key: "requested_time".into(),
                label: "希望時間".into(),
                field_type: FieldType::Time,
                required: true,
                options: None,
                description: Some("HH:mm".into()),
                display_order: 3,
                enabled: true,
            },
        ]
    }
}

/// Source of a persisted reservation: a model tool call, vs. a
/// non-tool-call fallback path (none is currently implemented by this
/// crate, but the column is retained per the wire schema in case an
/// embedder adds one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationSource {
    Tool,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
}

/// The persisted reservation record. `call_id` carries the unique index
/// the store enforces; `answers` is keyed by `field_key` (see DESIGN.md
/// open-question decision #2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub tenant_id: String,
    pub call_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub party_size: Option<i64>,
    pub requested_date: Option<String>,
    pub requested_time: Option<String>,
    pub answers: BTreeMap<String, serde_json::Value>,
    pub status: ReservationStatus,
    pub source: ReservationSource,
    pub call_log_id: Option<String>,
}
