/// Prometheus metrics for the correlator.
///
/// This module provides:
/// - HTTP request tracking for the API surface
/// - Correlation outcome and latency
/// - Metrics backend calls by endpoint and status
/// - Links built per backend
///
/// # Example
/// ```no_run
/// use telemetry_correlator::metrics::CORRELATIONS_TOTAL;
///
/// CORRELATIONS_TOTAL.with_label_values(&["success"]).inc();
/// ```

pub mod middleware;

pub use middleware::track_metrics;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry,
};

const NAMESPACE: &str = "telemetry_correlator";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Number of HTTP requests in flight
    pub static ref HTTP_REQUESTS_IN_FLIGHT: Gauge = Gauge::with_opts(
        Opts::new("http_requests_in_flight", "Number of HTTP requests being served")
            .namespace(NAMESPACE)
    ).expect("Failed to create HTTP_REQUESTS_IN_FLIGHT metric");

    // ============================================================================
    // Correlation Metrics
    // ============================================================================

    /// Total number of correlations
    ///
    /// Labels: outcome (`success` or an error code)
    pub static ref CORRELATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("correlations_total", "Total number of correlations")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create CORRELATIONS_TOTAL metric");

    /// End-to-end correlation duration in seconds
    pub static ref CORRELATION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "correlation_duration_seconds",
            "Correlation duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("Failed to create CORRELATION_DURATION_SECONDS metric");

    /// Calls made to the metrics backend
    ///
    /// Labels: endpoint, status (HTTP status or `transport_error`)
    pub static ref UPSTREAM_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("upstream_requests_total", "Total number of metrics backend requests")
            .namespace(NAMESPACE),
        &["endpoint", "status"]
    ).expect("Failed to create UPSTREAM_REQUESTS_TOTAL metric");

    /// Links rendered per backend
    ///
    /// Labels: backend, outcome
    pub static ref LINKS_BUILT_TOTAL: CounterVec = CounterVec::new(
        Opts::new("links_built_total", "Total number of correlation links built")
            .namespace(NAMESPACE),
        &["backend", "outcome"]
    ).expect("Failed to create LINKS_BUILT_TOTAL metric");

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Build information
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

fn register<C: Collector + Clone + 'static>(collector: &C) -> Result<(), prometheus::Error> {
    match PROMETHEUS_REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    // HTTP metrics
    register(&*HTTP_REQUESTS_TOTAL)?;
    register(&*HTTP_REQUEST_DURATION_SECONDS)?;
    register(&*HTTP_REQUESTS_IN_FLIGHT)?;

    // Correlation metrics
    register(&*CORRELATIONS_TOTAL)?;
    register(&*CORRELATION_DURATION_SECONDS)?;
    register(&*UPSTREAM_REQUESTS_TOTAL)?;
    register(&*LINKS_BUILT_TOTAL)?;

    // System metrics
    register(&*BUILD_INFO)?;
    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Encode the global registry in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_metrics().unwrap();
        init_metrics().unwrap();
    }

    #[test]
    fn test_gather_includes_namespace() {
        init_metrics().unwrap();
        LINKS_BUILT_TOTAL.with_label_values(&["metrics", "success"]).inc();

        let text = gather_metrics();
        assert!(text.contains("telemetry_correlator_links_built_total"));
        assert!(text.contains("telemetry_correlator_build_info"));
    }
}
