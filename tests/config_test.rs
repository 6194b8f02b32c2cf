//! Configuration loading from files on disk

use std::io::Write;
use telemetry_correlator::{config::Config, CorrelationEngine, SourceSet};
use tempfile::Builder;

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_yaml_file() {
    let file = write_config(
        ".yaml",
        r#"
sources:
  metrics:
    internal_endpoint: thanos-query:9090
    external_endpoint: localhost:9090
  logs:
    internal_endpoint: grafana:3000
    external_endpoint: localhost:3000
correlation:
  trace_id_label: trace_id
links:
  logs_datasource: Loki
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.sources.metrics.internal_endpoint, "thanos-query:9090");
    assert_eq!(config.correlation.trace_id_label, "trace_id");
    assert_eq!(config.correlation.pivot_padding_secs, 300);
    assert_eq!(config.links.logs_datasource, "Loki");
    assert_eq!(config.links.metrics_range_secs, 900);

    let kinds: Vec<String> = SourceSet::from_config(&config.sources)
        .iter()
        .map(|s| s.kind.to_string())
        .collect();
    assert_eq!(kinds, vec!["metrics", "logs"]);
}

#[test]
fn test_toml_file() {
    let file = write_config(
        ".toml",
        r#"
[server]
request_timeout_secs = 5

[sources.prometheus]
internal_endpoint = "prometheus:9090"
external_endpoint = "https://prometheus.example.com"

[sources.parca]
internal_endpoint = "parca:7070"
external_endpoint = "https://parca.example.com"
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.server.request_timeout_secs, 5);
    assert_eq!(config.server.http_port, 8080);
    assert_eq!(
        config.sources.profiles.as_ref().map(|s| s.internal_endpoint.as_str()),
        Some("parca:7070")
    );

    assert!(CorrelationEngine::from_config(&config).is_ok());
}

#[test]
fn test_missing_sources_is_an_error() {
    let file = write_config(".yaml", "server:\n  http_port: 9000\n");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::from_file("/nonexistent/correlator.yaml").is_err());
}

#[test]
fn test_inline_yaml_matches_file() {
    let content = r#"
sources:
  thanos:
    internal_endpoint: thanos-query:9090
    external_endpoint: localhost:9090
"#;
    let file = write_config(".yaml", content);

    let from_file = Config::from_file(file.path()).unwrap();
    let inline = Config::from_yaml_str(content).unwrap();
    assert_eq!(from_file.sources.metrics, inline.sources.metrics);
}

#[test]
fn test_unusable_metrics_endpoint_fails_engine_creation() {
    let config = Config::from_yaml_str(
        r#"
sources:
  metrics:
    internal_endpoint: ""
    external_endpoint: localhost:9090
"#,
    )
    .unwrap();

    assert!(CorrelationEngine::from_config(&config).is_err());
}
