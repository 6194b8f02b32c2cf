//! Deep links rendered by a correlation, read back by the recognizers

mod common;

use common::*;
use telemetry_correlator::{
    promql::{extract_selector_groups, parse},
    BackendKind, CorrelationInput, CorrelatorError,
};

#[tokio::test]
async fn test_metrics_link_is_recognized() {
    let mut prometheus = FakePrometheus::start().await;
    let _rules = prometheus.rules(ping_rules()).await;
    let engine = engine(all_sources(&prometheus.url()));

    let result = engine
        .correlate(&CorrelationInput::new(PING_ALERT, false))
        .await
        .unwrap();
    let link = &result.correlations[0].url;

    let view = engine.recognize(link).unwrap().expect("metrics link recognized");
    assert_eq!(view.backend, BackendKind::Metrics);

    let rule_groups = extract_selector_groups(&parse(PING_RULE).unwrap());
    assert_eq!(view.selector_groups, rule_groups);

    let window = view.window.unwrap();
    assert_eq!(window.length(), chrono::Duration::minutes(15));
}

#[tokio::test]
async fn test_trace_link_is_recognized() {
    let prometheus = FakePrometheus::start().await;
    let engine = engine(all_sources(&prometheus.url()));

    let view = engine
        .recognize(&format!("{}/trace/abc123", TRACES_UI))
        .unwrap()
        .expect("trace link recognized");
    assert_eq!(view.backend, BackendKind::Traces);
    assert_eq!(view.pivot_id.as_deref(), Some("abc123"));
    assert!(view.selector_groups.is_empty());
}

#[tokio::test]
async fn test_unrecognized_urls() {
    let prometheus = FakePrometheus::start().await;
    let engine = engine(all_sources(&prometheus.url()));

    assert_eq!(engine.recognize("http://elsewhere.example.com/graph?g0.expr=up").unwrap(), None);
    assert_eq!(engine.recognize(&format!("{}/explore?orgId=1", LOGS_UI)).unwrap(), None);
    assert_eq!(engine.recognize(&format!("{}/search?service=ping", TRACES_UI)).unwrap(), None);
}

#[tokio::test]
async fn test_metrics_url_without_query_is_invalid() {
    let prometheus = FakePrometheus::start().await;
    let engine = engine(all_sources(&prometheus.url()));

    let err = engine.recognize(&format!("{}/graph", METRICS_UI)).unwrap_err();
    assert!(matches!(err, CorrelatorError::InvalidInput(_)));

    let err = engine.recognize("not a url").unwrap_err();
    assert!(matches!(err, CorrelatorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_internal_endpoint_is_recognized_too() {
    let prometheus = FakePrometheus::start().await;
    let engine = engine(all_sources(&prometheus.url()));

    let view = engine
        .recognize("http://jaeger:16686/trace/def456")
        .unwrap()
        .unwrap();
    assert_eq!(view.pivot_id.as_deref(), Some("def456"));
}

#[tokio::test]
async fn test_deeply_nested_query_is_rejected() {
    let prometheus = FakePrometheus::start().await;
    let engine = engine(all_sources(&prometheus.url()));

    let expr = format!("{}up{}", "(".repeat(5_000), ")".repeat(5_000));
    let link = url::Url::parse_with_params(&format!("{}/graph", METRICS_UI), &[("g0.expr", expr)]).unwrap();

    let err = engine.recognize(link.as_str()).unwrap_err();
    assert!(matches!(err, CorrelatorError::InvalidQuery { .. }));
}

#[tokio::test]
async fn test_range_beyond_supported_time_is_rejected() {
    let prometheus = FakePrometheus::start().await;
    let engine = engine(all_sources(&prometheus.url()));

    let err = engine
        .recognize(&format!("{}/graph?g0.expr=up&g0.range_input=1000000y", METRICS_UI))
        .unwrap_err();
    assert!(matches!(err, CorrelatorError::InvalidInput(_)));
}
