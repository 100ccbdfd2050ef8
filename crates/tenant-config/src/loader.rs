//! Tenant Config Loader (spec §4.6): assembles the instruction string and
//! the `finalize_reservation` JSON Schema a tenant's call session is
//! configured with.
//!
//! Grounded on the teacher's store-then-fallback shape
//! (`gateway/src/api/inbound.rs`'s linear pipeline of cheap checks before
//! the expensive path) for the prompt fallback chain, and on
//! `domain/config/*`'s serde-default pattern for the fixed instruction
//! text's defaults.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{json, Value};

use bridge_domain::reservation::{FieldType, ReservationField};

use crate::store::{FileTenantPromptStore, ReservationFieldStore, TenantPromptStore};

const GENERIC_PROMPT: &str = "You are a friendly phone assistant. Help the caller complete their request.";

/// The name of the single function tool every session is configured with.
pub const FINALIZE_TOOL_NAME: &str = "finalize_reservation";

/// Everything the Realtime Client needs to build a `session.update` for
/// one call: the assembled instructions, the tenant's greeting, and the
/// tool definition (name/description/parameters) for `finalize_reservation`.
#[derive(Debug, Clone)]
pub struct AssembledTenantConfig {
    pub instructions: String,
    pub greeting_message: String,
    /// Enabled fields, in `display_order`. Carried alongside the schema
    /// so the Finalizer can re-derive required/optional without a second
    /// store round-trip.
    pub fields: Vec<ReservationField>,
    pub tool_description: String,
    pub tool_parameters: Value,
}

/// Loads and assembles a tenant's session configuration from the
/// (external) prompt and field-definition stores, per the fallback chain
/// in spec §4.6.
pub struct TenantConfigLoader {
    prompt_store: Arc<dyn TenantPromptStore>,
    field_store: Arc<dyn ReservationFieldStore>,
    fallback_prompt_store: FileTenantPromptStore,
    time_zone: Tz,
}

impl TenantConfigLoader {
    pub fn new(
        prompt_store: Arc<dyn TenantPromptStore>,
        field_store: Arc<dyn ReservationFieldStore>,
        fallback_prompt_path: impl Into<std::path::PathBuf>,
        time_zone: Tz,
    ) -> Self {
        Self {
            prompt_store,
            field_store,
            fallback_prompt_store: FileTenantPromptStore::new(fallback_prompt_path),
            time_zone,
        }
    }

    pub async fn load(&self, tenant_id: &str) -> AssembledTenantConfig {
        let tenant_prompt = self.prompt_store.load_prompt(tenant_id).await;

        let (free_form_prompt, greeting_message) = match tenant_prompt {
            Some(p) => (p.prompt, p.greeting_message.unwrap_or_default()),
            None => {
                let fallback = match self.fallback_prompt_store.read().await {
                    Some(text) => text,
                    None => GENERIC_PROMPT.to_string(),
                };
                (fallback, String::new())
            }
        };

        let mut fields = self.field_store.load_fields(tenant_id).await;
        fields.retain(|f| f.enabled);
        if fields.is_empty() {
            fields = ReservationField::default_fields();
        }
        fields.sort_by_key(|f| f.display_order);

        let instructions = self.build_instructions(&free_form_prompt, &greeting_message, &fields);
        let answers_schema = answers_schema(&fields);
        let tool_parameters = json!({
            "type": "object",
            "properties": {
                "answers": answers_schema,
                "confirmed": { "type": "boolean" },
            },
            "required": ["answers", "confirmed"],
        });

        AssembledTenantConfig {
            instructions,
            greeting_message,
            fields,
            tool_description:
                "Finalize the caller's reservation once every required field has been \
                 collected and explicitly confirmed by the caller."
                    .to_string(),
            tool_parameters,
        }
    }

    fn build_instructions(
        &self,
        free_form_prompt: &str,
        greeting_message: &str,
        fields: &[ReservationField],
    ) -> String {
        let now = Utc::now().with_timezone(&self.time_zone);

        let required: Vec<&str> = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.label.as_str())
            .collect();
        let optional: Vec<&str> = fields
            .iter()
            .filter(|f| !f.required)
            .map(|f| f.label.as_str())
            .collect();

        let mut block = String::new();
        block.push_str(&format!(
            "The current date and time is {} ({}).\n\n",
            now.format("%Y-%m-%d %H:%M"),
            self.time_zone
        ));
        block.push_str(
            "Reservation intake is this call's default mode. This overrides any \
             instruction below that suggests otherwise.\n\n",
        );
        block.push_str(&format!(
            "Required fields, in order: {}.\n",
            if required.is_empty() {
                "none".to_string()
            } else {
                required.join(", ")
            }
        ));
        if !optional.is_empty() {
            block.push_str(&format!("Optional fields: {}.\n", optional.join(", ")));
        }
        block.push_str(
            "\nCollect each field in turn, read back what you collected, and ask for \
             explicit confirmation before calling the `finalize_reservation` tool. \
             Call `finalize_reservation(answers, confirmed)` only after the caller has \
             given an explicit yes. Never tell the caller their reservation is \
             confirmed until the tool result reports `ok: true`. Follow the tool \
             result's branch: if `missing_fields` is returned, ask only for those \
             fields and call the tool again; if `not_confirmed` is returned, ask for \
             confirmation again; if a system error is returned, apologize and do not \
             ask the caller to repeat themselves.\n",
        );
        if !greeting_message.is_empty() {
            block.push_str(&format!("\nOpening greeting: \"{greeting_message}\"\n"));
        }

        block.push_str("\n---\n\n");
        block.push_str(free_form_prompt);
        block
    }
}

fn field_type_schema(field: &ReservationField) -> Value {
    match field.field_type {
        FieldType::Text => json!({ "type": "string" }),
        FieldType::Number => json!({ "type": "integer" }),
        FieldType::Date => json!({
            "type": "string",
            "description": field.description.clone().unwrap_or_else(|| "YYYY-MM-DD".to_string()),
        }),
        FieldType::Time => json!({
            "type": "string",
            "description": field.description.clone().unwrap_or_else(|| "HH:mm".to_string()),
        }),
        FieldType::Select => {
            let options = field.options.clone().unwrap_or_default();
            json!({ "type": "string", "enum": options })
        }
    }
}

/// Build the JSON Schema for `finalize_reservation.answers`: one property
/// per enabled field, typed per §4.6, `required` set to the enabled
/// required keys. Unknown keys are not restricted here — the Finalizer
/// preserves them in `answers` without validating them (spec §9).
fn answers_schema(fields: &[ReservationField]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for field in fields {
        let mut schema = field_type_schema(field);
        if let Value::Object(ref mut obj) = schema {
            obj.insert("title".to_string(), json!(field.label));
        }
        properties.insert(field.key.clone(), schema);
        if field.required {
            required.push(field.key.clone());
        }
    }

    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NullTenantPromptStore;
    use async_trait::async_trait;

    struct FixedFieldStore(Vec<ReservationField>);

    #[async_trait]
    impl ReservationFieldStore for FixedFieldStore {
        async fn load_fields(&self, _tenant_id: &str) -> Vec<ReservationField> {
            self.0.clone()
        }
    }

    fn loader_with_fields(fields: Vec<ReservationField>) -> TenantConfigLoader {
        TenantConfigLoader::new(
            Arc::new(NullTenantPromptStore),
            Arc::new(FixedFieldStore(fields)),
            "/nonexistent/system_prompt.md",
            Tz::UTC,
        )
    }

    #[tokio::test]
    async fn falls_back_to_default_fields_when_store_is_empty() {
        let loader = loader_with_fields(vec![]);
        let config = loader.load("tenant-1").await;
        assert_eq!(config.fields.len(), 4);
        assert_eq!(config.fields[0].key, "customer_name");
    }

    #[tokio::test]
    async fn disabled_fields_are_dropped() {
        let mut fields = ReservationField::default_fields();
        fields[1].enabled = false;
        let loader = loader_with_fields(fields);
        let config = loader.load("tenant-1").await;
        assert!(!config.fields.iter().any(|f| f.key == "party_size"));
    }

    #[tokio::test]
    async fn falls_back_to_generic_prompt_when_no_file_and_no_store_row() {
        let loader = loader_with_fields(ReservationField::default_fields());
        let config = loader.load("tenant-1").await;
        assert!(config.instructions.contains(GENERIC_PROMPT));
    }

    #[tokio::test]
    async fn answers_schema_marks_required_fields() {
        let loader = loader_with_fields(ReservationField::default_fields());
        let config = loader.load("tenant-1").await;
        let required = config.tool_parameters["properties"]["answers"]["required"]
            .as_array()
            .unwrap();
        let required: Vec<&str> = required.iter().map(|v| v.as_str().unwrap()).collect();
        assert!(required.contains(&"customer_name"));
        assert!(required.contains(&"requested_time"));
    }

    #[tokio::test]
    async fn tool_parameters_requires_answers_and_confirmed() {
        let loader = loader_with_fields(ReservationField::default_fields());
        let config = loader.load("tenant-1").await;
        let top_required = config.tool_parameters["required"].as_array().unwrap();
        let top_required: Vec<&str> = top_required.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(top_required, vec!["answers", "confirmed"]);
    }

    #[tokio::test]
    async fn number_field_type_maps_to_integer_schema() {
        let loader = loader_with_fields(ReservationField::default_fields());
        let config = loader.load("tenant-1").await;
        assert_eq!(
            config.tool_parameters["properties"]["answers"]["properties"]["party_size"]["type"],
            "integer"
        );
    }
}
