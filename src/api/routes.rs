use crate::api::{handlers, AppState};
use crate::metrics::track_metrics;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Form UI
        .route("/", get(handlers::index))
        .route("/correlate", post(handlers::correlate_form))
        // JSON API
        .route("/v1/correlate", get(handlers::correlate))
        .route("/v1/recognize", get(handlers::recognize))
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(middleware::from_fn(track_metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
