//! Collaborator traits for the Tenant Config Loader, plus the file-backed
//! fallback implementations this crate ships so the Loader is exercisable
//! without a live tabular service.
//!
//! Grounded on the teacher's pattern of wrapping an external service behind
//! a trait the gateway depends on (`sa-memory`/`sa-providers`), adapted
//! from LLM-provider/skill registries to this crate's narrower prompt and
//! reservation-field lookups.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use bridge_domain::reservation::ReservationField;

/// A tenant's free-form system prompt plus the recognized metadata keys
/// the spec calls out by name.
#[derive(Debug, Clone)]
pub struct TenantPrompt {
    pub prompt: String,
    pub greeting_message: Option<String>,
    pub reservation_gate_question: Option<String>,
}

/// Read-only lookup of a tenant's free-form system prompt. Returns `None`
/// when the tenant has no prompt row, letting the Loader fall through to
/// its file/generic fallback chain.
#[async_trait]
pub trait TenantPromptStore: Send + Sync {
    async fn load_prompt(&self, tenant_id: &str) -> Option<TenantPrompt>;
}

/// Read-only lookup of a tenant's ordered reservation field list.
#[async_trait]
pub trait ReservationFieldStore: Send + Sync {
    async fn load_fields(&self, tenant_id: &str) -> Vec<ReservationField>;
}

/// Reads a single fixed file as every tenant's prompt. Used when no
/// per-tenant prompt backing is wired up; also doubles as the Loader's
/// own fallback path when a real store returns nothing for a tenant.
pub struct FileTenantPromptStore {
    path: PathBuf,
}

impl FileTenantPromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file directly, bypassing the trait, for the Loader's own
    /// fallback step (distinct from a tenant-aware store that happens to
    /// also be file-backed).
    pub async fn read(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if !contents.trim().is_empty() => Some(contents),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "fallback prompt file unreadable");
                None
            }
        }
    }
}

#[async_trait]
impl TenantPromptStore for FileTenantPromptStore {
    async fn load_prompt(&self, _tenant_id: &str) -> Option<TenantPrompt> {
        self.read().await.map(|prompt| TenantPrompt {
            prompt,
            greeting_message: None,
            reservation_gate_question: None,
        })
    }
}

/// A store with no tenant rows at all: every lookup misses, sending the
/// Loader straight to its fallback chain. Useful as a default when no
/// tabular backing is configured.
pub struct NullTenantPromptStore;

#[async_trait]
impl TenantPromptStore for NullTenantPromptStore {
    async fn load_prompt(&self, _tenant_id: &str) -> Option<TenantPrompt> {
        None
    }
}

/// A field store with no rows: every tenant falls back to
/// [`ReservationField::default_fields`].
pub struct NullReservationFieldStore;

#[async_trait]
impl ReservationFieldStore for NullReservationFieldStore {
    async fn load_fields(&self, _tenant_id: &str) -> Vec<ReservationField> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.md");
        std::fs::write(&path, "You are a helpful assistant.").unwrap();

        let store = FileTenantPromptStore::new(&path);
        let prompt = store.load_prompt("tenant-1").await.expect("file exists");
        assert_eq!(prompt.prompt, "You are a helpful assistant.");
    }

    #[tokio::test]
    async fn file_store_misses_on_missing_file() {
        let store = FileTenantPromptStore::new("/nonexistent/path/system_prompt.md");
        assert!(store.load_prompt("tenant-1").await.is_none());
    }

    #[tokio::test]
    async fn file_store_misses_on_blank_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.md");
        std::fs::write(&path, "   \n\t").unwrap();

        let store = FileTenantPromptStore::new(&path);
        assert!(store.load_prompt("tenant-1").await.is_none());
    }

    #[tokio::test]
    async fn null_field_store_always_misses() {
        let store = NullReservationFieldStore;
        assert!(store.load_fields("tenant-1").await.is_empty());
    }
}
