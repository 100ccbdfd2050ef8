//! `sqlx`-backed SQLite persistence for reservations, owning the unique
//! index on `call_id` that the Finalizer's dedupe branch depends on.
//!
//! Grounded on `examples/mmogr-gglib/crates/gglib-db`'s `setup_database`
//! (connect-or-create + `CREATE TABLE IF NOT EXISTS` schema) and
//! `sqlite_chat_history_repository.rs`'s bind-and-map query style, since
//! the teacher's own `sessions/src/store.rs` is JSON-file-backed and has
//! no unique-constraint primitive to dedupe on.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use uuid::Uuid;

use bridge_domain::reservation::{ReservationRequest, ReservationSource, ReservationStatus};
use bridge_domain::{Error, Result};

/// Outcome of [`ReservationStore::insert`]: distinguishes a fresh row
/// from a unique-key conflict, since the two cases drive different
/// notification and tool-result behavior in the Finalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { reservation_id: String },
    Deduped,
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert(&self, request: &ReservationRequest) -> Result<InsertOutcome>;
    async fn attach_call_log(&self, call_id: &str, call_log_id: &str) -> Result<bool>;
    async fn get_by_call_id(&self, call_id: &str) -> Result<Option<ReservationRequest>>;
}

pub struct SqliteReservationStore {
    pool: SqlitePool,
}

impl SqliteReservationStore {
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(Error::Io)?;
            }
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .create_if_missing(true),
        )
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;

        create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        create_schema(&pool).await?;
        Ok(Self { pool })
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reservations (
            id TEXT PRIMARY KEY,
            call_id TEXT NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL,
            customer_name TEXT,
            customer_phone TEXT,
            party_size INTEGER,
            requested_date TEXT,
            requested_time TEXT,
            answers TEXT NOT NULL,
            status TEXT NOT NULL,
            source TEXT NOT NULL,
            call_log_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::Persistence(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reservations_tenant ON reservations (tenant_id)")
        .execute(pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;

    Ok(())
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<ReservationRequest> {
    let answers_text: String = row.get("answers");
    let answers = serde_json::from_str(&answers_text).map_err(Error::Json)?;
    let status_text: String = row.get("status");
    let source_text: String = row.get("source");

    Ok(ReservationRequest {
        tenant_id: row.get("tenant_id"),
        call_id: row.get("call_id"),
        customer_name: row.get("customer_name"),
        customer_phone: row.get("customer_phone"),
        party_size: row.get("party_size"),
        requested_date: row.get("requested_date"),
        requested_time: row.get("requested_time"),
        answers,
        status: match status_text.as_str() {
            "pending" => ReservationStatus::Pending,
            other => return Err(Error::Persistence(format!("unknown status {other}"))),
        },
        source: match source_text.as_str() {
            "tool" => ReservationSource::Tool,
            "fallback" => ReservationSource::Fallback,
            other => return Err(Error::Persistence(format!("unknown source {other}"))),
        },
        call_log_id: row.get("call_log_id"),
    })
}

#[async_trait]
impl ReservationStore for SqliteReservationStore {
    async fn insert(&self, request: &ReservationRequest) -> Result<InsertOutcome> {
        let answers_text = serde_json::to_string(&request.answers).map_err(Error::Json)?;
        let id = Uuid::new_v4().to_string();
        let status_text = match request.status {
            ReservationStatus::Pending => "pending",
        };
        let source_text = match request.source {
            ReservationSource::Tool => "tool",
            ReservationSource::Fallback => "fallback",
        };
        let created_at = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO reservations
                (id, call_id, tenant_id, customer_name, customer_phone, party_size,
                 requested_date, requested_time, answers, status, source, call_log_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.call_id)
        .bind(&request.tenant_id)
        .bind(&request.customer_name)
        .bind(&request.customer_phone)
        .bind(request.party_size)
        .bind(&request.requested_date)
        .bind(&request.requested_time)
        .bind(&answers_text)
        .bind(status_text)
        .bind(source_text)
        .bind(&request.call_log_id)
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted {
                reservation_id: id,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::Deduped)
            }
            Err(err) => Err(Error::Persistence(err.to_string())),
        }
    }

    async fn attach_call_log(&self, call_id: &str, call_log_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE reservations SET call_log_id = ? WHERE call_id = ?")
            .bind(call_log_id)
            .bind(call_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_by_call_id(&self, call_id: &str) -> Result<Option<ReservationRequest>> {
        let row = sqlx::query("SELECT * FROM reservations WHERE call_id = ?")
            .bind(call_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        row.as_ref().map(row_to_request).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_domain::reservation::ReservationRequest;
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn sample_request(call_id: &str) -> ReservationRequest {
        let mut answers = BTreeMap::new();
        answers.insert("customer_name".to_string(), Value::String("田中".into()));
        answers.insert("party_size".to_string(), Value::Number(2.into()));

        ReservationRequest {
            tenant_id: "tenant-1".into(),
            call_id: call_id.into(),
            customer_name: Some("田中".into()),
            customer_phone: None,
            party_size: Some(2),
            requested_date: Some("2025-12-20".into()),
            requested_time: Some("19:00".into()),
            answers,
            status: ReservationStatus::Pending,
            source: ReservationSource::Tool,
            call_log_id: None,
        }
    }

    #[tokio::test]
    async fn insert_then_duplicate_call_id_dedupes() {
        let store = SqliteReservationStore::connect_in_memory().await.unwrap();
        let request = sample_request("call-1");

        let first = store.insert(&request).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted { .. }));

        let second = store.insert(&request).await.unwrap();
        assert_eq!(second, InsertOutcome::Deduped);
    }

    #[tokio::test]
    async fn get_by_call_id_round_trips() {
        let store = SqliteReservationStore::connect_in_memory().await.unwrap();
        let request = sample_request("call-2");
        store.insert(&request).await.unwrap();

        let fetched = store.get_by_call_id("call-2").await.unwrap().unwrap();
        assert_eq!(fetched.customer_name.as_deref(), Some("田中"));
        assert_eq!(fetched.party_size, Some(2));
    }

    #[tokio::test]
    async fn attach_call_log_updates_existing_row() {
        let store = SqliteReservationStore::connect_in_memory().await.unwrap();
        let request = sample_request("call-3");
        store.insert(&request).await.unwrap();

        let updated = store.attach_call_log("call-3", "log-abc").await.unwrap();
        assert!(updated);

        let fetched = store.get_by_call_id("call-3").await.unwrap().unwrap();
        assert_eq!(fetched.call_log_id.as_deref(), Some("log-abc"));
    }

    #[tokio::test]
    async fn attach_call_log_on_missing_call_is_noop() {
        let store = SqliteReservationStore::connect_in_memory().await.unwrap();
        let updated = store.attach_call_log("missing", "log-abc").await.unwrap();
        assert!(!updated);
    }
}
