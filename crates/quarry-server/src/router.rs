//! Router configuration and route composition.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::require_api_key;
use crate::config::ServerConfig;
use crate::handlers::{health, jobs, recovery, webhooks};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Routes under `/api/v1`, without the outer middleware stack.
pub fn api_routes(state: AppState) -> Router<AppState> {
    // Public routes: providers cannot send bearer tokens
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/webhooks/:provider",
            post(webhooks::receive_webhook)
                .layer(DefaultBodyLimit::max(webhooks::WEBHOOK_BODY_LIMIT)),
        );

    // Protected routes (require Bearer token)
    let protected_routes = Router::new()
        .route("/jobs", post(jobs::launch_job).get(jobs::list_jobs))
        .route("/jobs/recover", post(recovery::recover_jobs))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/jobs/:id/poll", post(jobs::poll_job))
        .layer(middleware::from_fn_with_state(state, require_api_key));

    public_routes.merge(protected_routes)
}

/// Creates the main application router with all routes and middleware.
pub fn create_router(state: AppState, config: &ServerConfig) -> anyhow::Result<Router> {
    // Configure rate limiting (Arc required for cloning in layers)
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_rps.into())
            .burst_size(config.rate_limit_burst)
            .finish()
            .context("Invalid rate limit configuration")?,
    );

    let cors_layer = build_cors_layer(&config.cors_origins);

    Ok(Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware layers (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(GovernorLayer {
            config: governor_config,
        })
        .with_state(state))
}

/// Build CORS layer from configuration.
///
/// If `origins` is "*", allows any origin (for development).
/// Otherwise, parses comma-separated origins.
fn build_cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600));

    if origins == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(allowed)
    }
}
