//! REST API Routes Module
//!
//! Route handlers organized by entity type:
//! - Files: upload, lookup, delete, sweep
//! - Events and gallery items, which own files
//! - Registrations and payments, including the gateway callback
//! - Cache administration
//! - Health check endpoints (Kubernetes-compatible)

pub mod cache;
pub mod events;
pub mod files;
pub mod gallery;
pub mod health;
pub mod payments;
pub mod registrations;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::constants::{FILE_NAME_HEADER, USER_ID_HEADER};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use cache::create_router as cache_router;
pub use events::create_router as events_router;
pub use files::create_router as files_router;
pub use gallery::create_router as gallery_router;
pub use health::create_router as health_router;
pub use payments::create_router as payments_router;
pub use registrations::create_router as registrations_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Serves the OpenAPI document when Swagger UI (which serves it too) is compiled out.
#[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Entity routes mounted under `/api/v1`.
fn build_entity_routes(state: &Arc<AppState>) -> Router {
    Router::new()
        .nest("/files", files::create_router(Arc::clone(state)))
        .nest("/events", events::create_router(Arc::clone(state)))
        .nest("/gallery", gallery::create_router(Arc::clone(state)))
        .nest("/registrations", registrations::create_router(Arc::clone(state)))
        .nest("/payments", payments::create_router(Arc::clone(state)))
        .nest("/cache", cache::create_router(Arc::clone(state)))
}

/// Create the complete API router.
///
/// - REST routes under /api/v1/*
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI document at /openapi.json (openapi feature)
/// - Swagger UI at /swagger-ui (swagger-ui feature)
///
/// Execution order: CORS -> Observability -> Handler
pub fn create_api_router(state: Arc<AppState>, api_config: &ApiConfig) -> Router {
    let mut router = Router::new()
        .nest("/api/v1", build_entity_routes(&state))
        .nest("/health", health::create_router(Arc::clone(&state)))
        .route("/metrics", get(metrics_handler).with_state(Arc::clone(&state)));

    #[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/openapi.json", crate::openapi::ApiDoc::openapi()),
        );
    }

    let cors = build_cors_layer(api_config);

    router
        .layer(from_fn(observability_middleware))
        .layer(cors)
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        cors.allow_origin(origins).allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(FILE_NAME_HEADER),
            HeaderName::from_static(USER_ID_HEADER),
        ])
    }
}
