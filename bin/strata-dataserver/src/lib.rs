//! Strata data node
//!
//! Exposes the authenticated `/data/upload` and `/data/download` endpoints
//! over a [`StorageBackend`], streaming file bodies in both directions.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod limit;


use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use strata_common::UploadConfig;
use strata_storage::StorageBackend;
use tower_http::trace::TraceLayer;

pub use auth::{AuthState, TraceId, auth_layer};

/// State shared by the data handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StorageBackend>,
    pub upload: UploadConfig,
}

impl AppState {
    pub fn new(backend: Arc<dyn StorageBackend>, upload: UploadConfig) -> Self {
        Self { backend, upload }
    }
}

/// Build the data node router.
///
/// `/health` is public; everything under `/data` requires a bearer token.
pub fn router(state: AppState, auth: AuthState) -> Router {
    let data = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/download", post(handlers::download))
        .route_layer(middleware::from_fn_with_state(auth, auth_layer))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/data", data)
        // uploads are bounded by the limiting stream, not by axum
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
}
