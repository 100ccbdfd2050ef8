use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reservation store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationStoreConfig {
    /// SQLite database file path, or `:memory:` for ephemeral (tests).
    #[serde(default = "d_db_path")]
    pub database_path: String,
}

impl Default for ReservationStoreConfig {
    fn default() -> Self {
        Self {
            database_path: d_db_path(),
        }
    }
}

fn d_db_path() -> String {
    "reservations.db".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notification transport credentials (all optional: out of scope, but
// the core needs a place to carry the configuration an embedder plugs
// a real NotificationDispatcher implementation into).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub email_webhook_url: Option<String>,
    #[serde(default)]
    pub chat_webhook_url: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tenant config store (prompt + field-definition tabular sources)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfigStoreConfig {
    /// Local fallback prompt file, read when the tenant prompt store is
    /// unreachable or returns no row. Default matches `§4.6`'s
    /// documented fallback order.
    #[serde(default = "d_fallback_prompt_path")]
    pub fallback_prompt_path: String,
    /// IANA time zone name used to stamp the fixed instruction block's
    /// wall-clock time (`§4.6`: "current wall-clock time in the local
    /// time zone").
    #[serde(default = "d_time_zone")]
    pub time_zone: String,
}

impl Default for TenantConfigStoreConfig {
    fn default() -> Self {
        Self {
            fallback_prompt_path: d_fallback_prompt_path(),
            time_zone: d_time_zone(),
        }
    }
}

fn d_fallback_prompt_path() -> String {
    "system_prompt.md".into()
}

fn d_time_zone() -> String {
    "UTC".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRegistryConfig {
    /// Interval between stale-call sweeps.
    #[serde(default = "d_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// A call not `touch`ed within this many seconds is considered
    /// abandoned (sockets died without a clean stop/close) and pruned.
    #[serde(default = "d_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for CallRegistryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: d_sweep_interval_secs(),
            stale_after_secs: d_stale_after_secs(),
        }
    }
}

fn d_sweep_interval_secs() -> u64 {
    30
}
fn d_stale_after_secs() -> u64 {
    120
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridable by
    /// `RUST_LOG`.
    #[serde(default = "d_log_filter")]
    pub filter: String,
    /// Emit JSON-formatted log lines (production) instead of pretty
    /// human-readable ones (local dev).
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: d_log_filter(),
            json: false,
        }
    }
}

fn d_log_filter() -> String {
    "info".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Directory holding one `<callId>.jsonl` file per call.
    #[serde(default = "d_event_log_dir")]
    pub directory: String,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            directory: d_event_log_dir(),
        }
    }
}

fn d_event_log_dir() -> String {
    "call-logs".into()
}
