pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::services::identity::IdentityProvider;
use crate::services::session_store::SessionStore;
use crate::services::staging_service::StagingService;
use crate::services::storage::StorageService;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::login_page,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::dashboard,
        api::handlers::staging::upload_files,
        api::handlers::staging::list_files,
        api::handlers::staging::remove_file,
        api::handlers::staging::clear_files,
        api::handlers::staging::reorder_files,
        api::handlers::staging::merge_files,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::LoginForm,
            api::handlers::staging::UploadResponse,
            api::handlers::staging::UploadedFile,
            api::handlers::staging::MessageResponse,
            api::handlers::staging::ClearResponse,
            api::handlers::staging::StagedFileEntry,
            api::handlers::staging::ReorderRequest,
            api::handlers::staging::ReorderResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Login, logout and the dashboard page"),
        (name = "staging", description = "Staging, ordering and merging of PDF uploads"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub sessions: Arc<dyn SessionStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub staging: Arc<StagingService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn StorageService>,
        sessions: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
        config: AppConfig,
    ) -> Self {
        let staging = Arc::new(StagingService::new(
            storage.clone(),
            sessions.clone(),
            config.clone(),
        ));
        Self {
            storage,
            sessions,
            identity,
            staging,
            config,
        }
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(format!("Handler panicked: {}", detail)).into_response()
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub fn create_app(state: AppState) -> Router {
    use crate::api::handlers::{auth, health, staging};
    use crate::api::middleware;

    let staging_routes = Router::new()
        .route("/upload", post(staging::upload_files))
        .route("/files", get(staging::list_files))
        .route("/remove/:id", post(staging::remove_file))
        .route("/clear", post(staging::clear_files))
        .route("/reorder", post(staging::reorder_files))
        .route("/merge", post(staging::merge_files))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let page_routes = Router::new()
        .route("/dashboard", get(auth::dashboard))
        .route("/logout", get(auth::logout))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::page_auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/health", get(health::health_check))
        .route("/login", get(auth::login_page).post(auth::login))
        .merge(staging_routes)
        .merge(page_routes)
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_request_size(),
        ))
        .layer(from_fn(middleware::security::security_headers))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(from_fn(middleware::request_id::request_id_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
