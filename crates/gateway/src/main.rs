use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use bridge_calls::CallRegistry;
use bridge_domain::config::{Config, ConfigSeverity};
use bridge_gateway::cli::{Cli, Command, ConfigCommand};
use bridge_gateway::state::AppState;
use bridge_gateway::ws::carrier_ws;
use bridge_reservations::{Finalizer, LoggingNotificationDispatcher, ReservationStore, SqliteReservationStore};
use bridge_tenant_config::{NullReservationFieldStore, NullTenantPromptStore, TenantConfigLoader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let (config, _config_path) = bridge_gateway::cli::load_config()?;
            init_tracing(&config);
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = bridge_gateway::cli::load_config()?;
            let valid = bridge_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = bridge_gateway::cli::load_config()?;
            bridge_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("voicebridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured tracing, JSON in production or pretty for local dev per
/// `[logging]`; overridable at runtime by `RUST_LOG`.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone()));

    if config.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Start the gateway server with the given configuration: build every
/// collaborator in dependency order, wire the shared [`AppState`], spawn
/// the stale-call sweep, bind, and serve.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("voicebridge starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Call registry ─────────────────────────────────────────────────
    let call_registry = Arc::new(CallRegistry::new());
    tracing::info!("call registry ready");

    // ── Event log directory ──────────────────────────────────────────
    let event_log_dir = std::path::PathBuf::from(&config.event_log.directory);
    std::fs::create_dir_all(&event_log_dir)
        .with_context(|| format!("creating event log directory {}", event_log_dir.display()))?;
    tracing::info!(path = %event_log_dir.display(), "event log directory ready");

    // ── Tenant config loader ─────────────────────────────────────────
    // No tabular prompt/field service is wired up in this standalone
    // binary (spec §1: out of scope); an embedder plugs a real
    // `TenantPromptStore`/`ReservationFieldStore` in here. The loader's
    // own fallback chain (file, then generic prompt; default four
    // fields) keeps the bridge runnable without one.
    let time_zone = chrono_tz::Tz::from_str(&config.tenant_config_store.time_zone)
        .unwrap_or(chrono_tz::UTC);
    let tenant_config_loader = Arc::new(TenantConfigLoader::new(
        Arc::new(NullTenantPromptStore),
        Arc::new(NullReservationFieldStore),
        config.tenant_config_store.fallback_prompt_path.clone(),
        time_zone,
    ));
    tracing::info!(time_zone = %config.tenant_config_store.time_zone, "tenant config loader ready");

    // ── Reservation store + finalizer ────────────────────────────────
    let reservation_store: Arc<dyn ReservationStore> = if config.reservation_store.database_path == ":memory:" {
        Arc::new(
            SqliteReservationStore::connect_in_memory()
                .await
                .context("connecting in-memory reservation store")?,
        )
    } else {
        Arc::new(
            SqliteReservationStore::connect(std::path::Path::new(&config.reservation_store.database_path))
                .await
                .context("connecting reservation store")?,
        )
    };
    tracing::info!(path = %config.reservation_store.database_path, "reservation store ready");

    // Notification transports (email/chat) are out of scope (spec §1);
    // this ships the logging dispatcher so the finalize pipeline is
    // runnable standalone. An embedder swaps in a real
    // `NotificationDispatcher` for the configured webhook URLs.
    if config.notifications.email_webhook_url.is_none() && config.notifications.chat_webhook_url.is_none() {
        tracing::warn!("no notification transport configured; dispatch will only log");
    }
    let finalizer = Arc::new(Finalizer::new(
        reservation_store.clone(),
        Arc::new(LoggingNotificationDispatcher),
    ));
    tracing::info!("reservation finalizer ready");

    let state = AppState {
        config: config.clone(),
        call_registry: call_registry.clone(),
        event_log_dir,
        tenant_config_loader,
        reservation_store,
        finalizer,
    };

    // ── Periodic stale-call pruning (spec §5) ────────────────────────
    {
        let call_registry = call_registry.clone();
        let sweep_interval = Duration::from_secs(config.call_registry.sweep_interval_secs);
        let stale_after = Duration::from_secs(config.call_registry.stale_after_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                let pruned = call_registry.prune_stale(stale_after);
                if !pruned.is_empty() {
                    tracing::warn!(count = pruned.len(), "pruned stale calls from registry");
                }
            }
        });
    }
    tracing::info!(
        interval_secs = config.call_registry.sweep_interval_secs,
        stale_after_secs = config.call_registry.stale_after_secs,
        "stale-call sweep started"
    );

    // ── CORS layer ────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Rate-limit layer (per-IP token bucket via governor) ──────────
    let governor_layer = config.server.rate_limit.as_ref().map(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_second as u64)
            .burst_size(rl.burst_size)
            .finish()
            .expect("rate_limit: requests_per_second and burst_size must be > 0");

        tracing::info!(
            requests_per_second = rl.requests_per_second,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );

        GovernorLayer {
            config: std::sync::Arc::new(gov_config),
        }
    });
    if governor_layer.is_none() {
        tracing::info!("per-IP rate limiting disabled (no [server.rate_limit] in config)");
    }

    // ── Router ────────────────────────────────────────────────────────
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/call/stream", get(carrier_ws))
        .layer(cors_layer);
    let app = if let Some(gov) = governor_layer {
        router.layer(gov).with_state(state)
    } else {
        router.with_state(state)
    };

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "voicebridge listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may contain a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`). These are expanded into a predicate that
/// matches any port on that host. A literal `"*"` allows all origins
/// (not recommended for production).
fn build_cors_layer(cors: &bridge_domain::config::CorsConfig) -> CorsLayer {
    // Special case: if the only entry is "*", use fully permissive CORS.
    // Note: allow_credentials is incompatible with wildcard origins.
    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    // Partition into exact origins and wildcard-port patterns.
    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            // e.g. "http://localhost:*" -> prefix "http://localhost:"
            let prefix = origin.trim_end_matches('*').to_owned();
            wildcard_prefixes.push(prefix);
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            // Validate the remainder is digits only to prevent a
            // prefix-based bypass (e.g. "http://localhost:3000.evil.com").
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
