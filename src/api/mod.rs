//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::clock::Clock;
use crate::jobs::CollectionsScheduler;
use crate::store::LedgerStore;

pub use routes::create_router;

/// Shared state handed to every route
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub clock: Arc<dyn Clock>,
    /// Used by the manual collections trigger
    pub collections: CollectionsScheduler,
    /// Users allowed on `/admin` routes
    pub admin_user_ids: Arc<[Uuid]>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        collections: CollectionsScheduler,
    ) -> Self {
        Self {
            store,
            clock,
            collections,
            admin_user_ids: Arc::from(Vec::new()),
        }
    }

    /// Grant `/admin` access to these users
    pub fn with_admins(mut self, admin_user_ids: Vec<Uuid>) -> Self {
        self.admin_user_ids = Arc::from(admin_user_ids);
        self
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: logging -> request user -> handler
    let api_router = create_router()
        .layer(axum_middleware::from_fn(middleware::request_user_middleware))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
