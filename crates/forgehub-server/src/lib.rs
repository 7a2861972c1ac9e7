#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

mod config;
mod http;
pub mod lease;
pub mod store;

pub use config::{validate_startup_config_contract, ApiConfig, CONFIG_SCHEMA_VERSION};
pub use lease::{IncomingFile, LeaseError, LeaseManager};
pub use store::activity::MemoryActivityLog;
pub use store::identity::MemoryIdentityStore;
pub use store::memory::MemoryProjectStore;
pub use store::objects::{LocalFsBackend, MemoryObjectStore};
pub use store::{
    ActivityLog, IdentityStore, ObjectStoreBackend, ProjectStore, StoreError,
};

pub const CRATE_NAME: &str = "forgehub-server";

#[derive(Default)]
pub(crate) struct RequestMetrics {
    counts: Mutex<HashMap<(String, u16), u64>>,
}

impl RequestMetrics {
    pub(crate) async fn observe_request(
        &self,
        route: &str,
        status: StatusCode,
        latency: Duration,
        slow_threshold: Duration,
    ) {
        let mut counts = self.counts.lock().await;
        *counts
            .entry((route.to_string(), status.as_u16()))
            .or_insert(0) += 1;
        drop(counts);
        if latency >= slow_threshold {
            warn!(route, status = status.as_u16(), latency_ms = latency.as_millis() as u64, "slow request");
        }
    }

    #[cfg(test)]
    pub(crate) async fn count_for(&self, route: &str, status: u16) -> u64 {
        *self
            .counts
            .lock()
            .await
            .get(&(route.to_string(), status))
            .unwrap_or(&0)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<dyn ProjectStore>,
    pub objects: Arc<dyn ObjectStoreBackend>,
    pub activity: Arc<dyn ActivityLog>,
    pub identity: Arc<dyn IdentityStore>,
    pub lease: LeaseManager,
    pub api: ApiConfig,
    pub ready: Arc<AtomicBool>,
    pub(crate) metrics: Arc<RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        objects: Arc<dyn ObjectStoreBackend>,
        activity: Arc<dyn ActivityLog>,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        Self::with_config(projects, objects, activity, identity, ApiConfig::default())
    }

    #[must_use]
    pub fn with_config(
        projects: Arc<dyn ProjectStore>,
        objects: Arc<dyn ObjectStoreBackend>,
        activity: Arc<dyn ActivityLog>,
        identity: Arc<dyn IdentityStore>,
        api: ApiConfig,
    ) -> Self {
        let lease = LeaseManager::new(
            Arc::clone(&projects),
            Arc::clone(&objects),
            Arc::clone(&activity),
        );
        Self {
            projects,
            objects,
            activity,
            identity,
            lease,
            api,
            ready: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route("/v1/version", get(http::handlers::version_handler))
        .route(
            "/v1/projects",
            get(http::handlers::list_projects_handler)
                .post(http::handlers::create_project_handler),
        )
        .route(
            "/v1/projects/:id",
            get(http::handlers::get_project_handler)
                .patch(http::handlers::update_project_handler)
                .delete(http::handlers::delete_project_handler),
        )
        .route(
            "/v1/projects/:id/collaborators",
            post(http::handlers::add_collaborator_handler),
        )
        .route(
            "/v1/projects/:id/collaborators/:user",
            delete(http::handlers::remove_collaborator_handler),
        )
        .route(
            "/v1/projects/:id/transfer",
            post(http::handlers::transfer_ownership_handler),
        )
        .route(
            "/v1/projects/:id/checkout",
            post(http::handlers::checkout_handler),
        )
        .route(
            "/v1/projects/:id/checkin",
            post(http::handlers::checkin_handler),
        )
        .route(
            "/v1/projects/:id/activity",
            get(http::handlers::project_activity_handler),
        )
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}
