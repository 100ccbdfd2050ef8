use std::path::PathBuf;
use std::sync::Arc;

use bridge_calls::CallRegistry;
use bridge_domain::config::Config;
use bridge_reservations::{Finalizer, ReservationStore};
use bridge_tenant_config::TenantConfigLoader;

/// Shared application state passed to the carrier WebSocket handler and
/// cloned once per call.
///
/// Fields are grouped by concern:
/// - **Core services** — config
/// - **Call lifecycle** — call registry, event log directory
/// - **Tenant configuration** — prompt/field loader
/// - **Reservation pipeline** — store, finalizer
#[derive(Clone)]
pub struct AppState {
    // ── Core services ────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Call lifecycle ──────────────────────────────────────────────
    pub call_registry: Arc<CallRegistry>,
    /// Directory holding one `<callId>.jsonl` file per call.
    pub event_log_dir: PathBuf,

    // ── Tenant configuration ─────────────────────────────────────────
    pub tenant_config_loader: Arc<TenantConfigLoader>,

    // ── Reservation pipeline ─────────────────────────────────────────
    pub reservation_store: Arc<dyn ReservationStore>,
    pub finalizer: Arc<Finalizer>,
}
