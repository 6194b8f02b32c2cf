//! HTTP middleware recording request count, latency and in-flight requests
use super::{HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Axum middleware function for metrics collection
///
/// # Example
/// ```no_run
/// use axum::{middleware, Router};
/// use telemetry_correlator::metrics::track_metrics;
///
/// let app: Router = Router::new().layer(middleware::from_fn(track_metrics));
/// ```
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    // Route templates keep label cardinality bounded
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let start = Instant::now();
    let response = next.run(req).await;
    HTTP_REQUESTS_IN_FLIGHT.dec();

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    response
}
