#![forbid(unsafe_code)]

use forgehub_server::{
    build_router, validate_startup_config_contract, ApiConfig, AppState, IdentityStore as _,
    LocalFsBackend, MemoryActivityLog, MemoryIdentityStore, MemoryProjectStore,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

/// `FORGEHUB_STATIC_TOKENS=tok1=alice,tok2=bob` seeds the identity store.
fn parse_static_tokens(raw: &str) -> Vec<(String, forgehub_model::UserId)> {
    raw.split(',')
        .filter_map(|item| {
            let (token, handle) = item.split_once('=')?;
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            match forgehub_model::UserId::parse(handle) {
                Ok(user) => Some((token.to_string(), user)),
                Err(e) => {
                    warn!("skipping static token for invalid handle {handle:?}: {e}");
                    None
                }
            }
        })
        .collect()
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("FORGEHUB_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env::var("FORGEHUB_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let data_root = PathBuf::from(
        env::var("FORGEHUB_DATA_ROOT").unwrap_or_else(|_| "artifacts/objects".to_string()),
    );

    let api_cfg = ApiConfig {
        max_body_bytes: env_usize("FORGEHUB_MAX_BODY_BYTES", 64 * 1024 * 1024),
        max_file_bytes: env_usize("FORGEHUB_MAX_FILE_BYTES", 16 * 1024 * 1024),
        max_files_per_checkin: env_usize("FORGEHUB_MAX_FILES_PER_CHECKIN", 64),
        max_activity_records: env_usize("FORGEHUB_MAX_ACTIVITY_RECORDS", 10_000),
        activity_feed_limit: env_usize("FORGEHUB_ACTIVITY_FEED_LIMIT", 50),
        slow_request_threshold: env_duration_ms("FORGEHUB_SLOW_REQUEST_THRESHOLD_MS", 500),
    };
    validate_startup_config_contract(&api_cfg)?;

    std::fs::create_dir_all(&data_root)
        .map_err(|e| format!("creating data root {data_root:?} failed: {e}"))?;

    let projects = Arc::new(MemoryProjectStore::new());
    let objects = Arc::new(LocalFsBackend::new(data_root));
    let activity = Arc::new(MemoryActivityLog::new(api_cfg.max_activity_records));
    let identity = Arc::new(MemoryIdentityStore::new());

    let static_tokens = env::var("FORGEHUB_STATIC_TOKENS").unwrap_or_default();
    for (token, user) in parse_static_tokens(&static_tokens) {
        identity
            .register_token(&token, user)
            .await
            .map_err(|e| format!("seeding static token failed: {e}"))?;
    }

    let state = AppState::with_config(projects, objects, activity, identity, api_cfg);
    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("forgehub-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            let drain_ms = env_u64("FORGEHUB_SHUTDOWN_DRAIN_MS", 3000);
            tokio::time::sleep(Duration::from_millis(drain_ms)).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
