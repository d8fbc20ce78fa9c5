pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::progress_broadcaster::ProgressBroadcaster;
use crate::services::progress_registry::ProgressRegistry;
use crate::services::storage::StorageService;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_file,
        api::handlers::download::download_file,
        api::handlers::progress::progress_feed,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadResponse,
            api::handlers::upload::UploadForm,
            api::handlers::health::HealthResponse,
            models::UploadRecord,
            models::UploadStatus,
        )
    ),
    tags(
        (name = "files", description = "Upload, download and progress endpoints"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub registry: ProgressRegistry,
    pub upload_service: Arc<UploadService>,
    pub broadcaster: Arc<ProgressBroadcaster>,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the progress components around one shared registry.
    pub fn new(storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        let registry = ProgressRegistry::new();
        let upload_service = Arc::new(UploadService::new(
            storage.clone(),
            registry.clone(),
            config.progress.clone(),
        ));
        let broadcaster = Arc::new(ProgressBroadcaster::new(
            registry.clone(),
            config.progress.clone(),
        ));

        Self {
            storage,
            registry,
            upload_service,
            broadcaster,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health_check))
        .route("/upload", post(api::handlers::upload_file))
        .route("/download/:filename", get(api::handlers::download_file))
        .route("/progress/:id", get(api::handlers::progress_feed))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_request_size,
        ))
        .with_state(state)
}
