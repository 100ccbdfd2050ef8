//! Notification hand-off: fired once, asynchronously, after a fresh
//! reservation insert. Kept behind a trait seam per the same pattern the
//! tenant-config stores use for external collaborators, so the pipeline
//! is exercisable without a real transport wired in.

use std::collections::BTreeMap;

use async_trait::async_trait;

use bridge_domain::reservation::ReservationRequest;

/// A single field label/value pair, the shape a downstream transport
/// (email, chat webhook) actually renders. Keyed by `label`, not
/// `field_key` (see DESIGN.md open-question decision #2) — the
/// notification is a human-facing document, not a wire replay.
#[derive(Debug, Clone)]
pub struct ReservationNotification {
    pub tenant_id: String,
    pub call_id: String,
    pub reservation_id: String,
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: ReservationNotification);
}

/// Logs the dispatch as a tracing line, matching how this crate treats
/// every external transport it does not own: exercisable in tests and
/// local runs without a live webhook.
pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn dispatch(&self, notification: ReservationNotification) {
        tracing::info!(
            tenant_id = %notification.tenant_id,
            call_id = %notification.call_id,
            reservation_id = %notification.reservation_id,
            fields = ?notification.fields,
            "reservation notification dispatched"
        );
    }
}

/// Builds the label-keyed notification payload from a persisted request
/// and the tenant's field list (for key → label lookup).
pub fn build_notification(
    request: &ReservationRequest,
    reservation_id: &str,
    field_labels: &BTreeMap<String, String>,
) -> ReservationNotification {
    let mut fields = BTreeMap::new();
    for (key, value) in &request.answers {
        let label = field_labels.get(key).cloned().unwrap_or_else(|| key.clone());
        fields.insert(label, value.clone());
    }

    ReservationNotification {
        tenant_id: request.tenant_id.clone(),
        call_id: request.call_id.clone(),
        reservation_id: reservation_id.to_string(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_domain::reservation::{ReservationSource, ReservationStatus};
    use serde_json::Value;

    fn sample_request() -> ReservationRequest {
        let mut answers = BTreeMap::new();
        answers.insert("customer_name".to_string(), Value::String("田中".into()));
        ReservationRequest {
            tenant_id: "tenant-1".into(),
            call_id: "call-1".into(),
            customer_name: Some("田中".into()),
            customer_phone: None,
            party_size: None,
            requested_date: None,
            requested_time: None,
            answers,
            status: ReservationStatus::Pending,
            source: ReservationSource::Tool,
            call_log_id: None,
        }
    }

    #[test]
    fn build_notification_maps_keys_to_labels() {
        let mut labels = BTreeMap::new();
        labels.insert("customer_name".to_string(), "お名前".to_string());

        let notification = build_notification(&sample_request(), "res-1", &labels);
        assert!(notification.fields.contains_key("お名前"));
        assert!(!notification.fields.contains_key("customer_name"));
    }

    #[test]
    fn build_notification_falls_back_to_key_when_label_unknown() {
        let labels = BTreeMap::new();
        let notification = build_notification(&sample_request(), "res-1", &labels);
        assert!(notification.fields.contains_key("customer_name"));
    }

    #[tokio::test]
    async fn logging_dispatcher_does_not_panic() {
        let dispatcher = LoggingNotificationDispatcher;
        let labels = BTreeMap::new();
        let notification = build_notification(&sample_request(), "res-1", &labels);
        dispatcher.dispatch(notification).await;
    }
}
