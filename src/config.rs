use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Telemetry backends to correlate across
    pub sources: SourcesConfig,

    /// Correlation pipeline tuning
    #[serde(default)]
    pub correlation: CorrelationSettings,

    /// Deep-link rendering options
    #[serde(default)]
    pub links: LinkSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, `CONFIG_PATH` and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/correlator.toml".to_string());

        Self::builder()
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CORRELATOR__)
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a TOML or YAML file, format chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        Self::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from inline YAML content
    pub fn from_yaml_str(content: &str) -> Result<Self, config::ConfigError> {
        Self::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Yaml))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        // Start with default values
        config::Config::builder().add_source(config::File::from_str(
            include_str!("../config/default.toml"),
            config::FileFormat::Toml,
        ))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("CORRELATOR")
            .separator("__")
            .try_parsing(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Deadline for one correlation request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Metrics backend holding alerting rules and exemplars
    #[serde(alias = "thanos", alias = "prometheus")]
    pub metrics: SourceConfig,

    /// Logs backend, rendered through Grafana explore
    #[serde(default, alias = "loki")]
    pub logs: Option<SourceConfig>,

    /// Distributed tracing backend
    #[serde(default, alias = "jaeger")]
    pub traces: Option<SourceConfig>,

    /// Continuous profiling backend
    #[serde(default, alias = "parca")]
    pub profiles: Option<SourceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Address used for calls made by the correlator
    #[serde(default)]
    pub internal_endpoint: String,

    /// Address rendered into user-facing links
    #[serde(default)]
    pub external_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationSettings {
    /// Exemplar lookback window ending now (seconds)
    #[serde(default = "default_exemplar_lookback")]
    pub exemplar_lookback_secs: u64,

    /// Lookback used for links without an exemplar pivot (seconds)
    #[serde(default = "default_lookback")]
    pub default_lookback_secs: u64,

    /// Padding around an exemplar timestamp for pivot links (seconds)
    #[serde(default = "default_pivot_padding")]
    pub pivot_padding_secs: u64,

    /// Exemplar label carrying the trace identifier
    #[serde(default = "default_trace_id_label")]
    pub trace_id_label: String,

    /// Timeout for a single metrics backend call (seconds)
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Labels identifying the entity behind a firing alert
    #[serde(default = "default_identity_labels")]
    pub identity_labels: Vec<String>,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            exemplar_lookback_secs: default_exemplar_lookback(),
            default_lookback_secs: default_lookback(),
            pivot_padding_secs: default_pivot_padding(),
            trace_id_label: default_trace_id_label(),
            upstream_timeout_secs: default_upstream_timeout(),
            identity_labels: default_identity_labels(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Range shown by the metrics view (seconds)
    #[serde(default = "default_metrics_range")]
    pub metrics_range_secs: u64,

    /// Grafana organisation for the logs view
    #[serde(default = "default_grafana_org_id")]
    pub grafana_org_id: u32,

    /// Grafana datasource name of the logs backend
    #[serde(default = "default_logs_datasource")]
    pub logs_datasource: String,

    /// Number of traces requested by the search view
    #[serde(default = "default_trace_search_limit")]
    pub trace_search_limit: u32,

    /// Series label naming the service in the trace search view
    #[serde(default = "default_trace_service_label")]
    pub trace_service_label: String,

    /// Profile type queried by the profiles view
    #[serde(default = "default_profile_type")]
    pub profile_type: String,

    /// Profile label holding the trace identifier
    #[serde(default = "default_profile_trace_label")]
    pub profile_trace_label: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            metrics_range_secs: default_metrics_range(),
            grafana_org_id: default_grafana_org_id(),
            logs_datasource: default_logs_datasource(),
            trace_search_limit: default_trace_search_limit(),
            trace_service_label: default_trace_service_label(),
            profile_type: default_profile_type(),
            profile_trace_label: default_profile_trace_label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_exemplar_lookback() -> u64 {
    300 // 5 minutes
}

fn default_lookback() -> u64 {
    3600
}

fn default_pivot_padding() -> u64 {
    300
}

fn default_trace_id_label() -> String {
    "traceID".to_string()
}

fn default_upstream_timeout() -> u64 {
    10
}

fn default_identity_labels() -> Vec<String> {
    vec!["job".to_string(), "instance".to_string()]
}

fn default_metrics_range() -> u64 {
    900 // 15 minutes
}

fn default_grafana_org_id() -> u32 {
    1
}

fn default_logs_datasource() -> String {
    "Logging".to_string()
}

fn default_trace_search_limit() -> u32 {
    20
}

fn default_trace_service_label() -> String {
    "job".to_string()
}

fn default_profile_type() -> String {
    "process_cpu:cpu:nanoseconds:cpu:nanoseconds:delta".to_string()
}

fn default_profile_trace_label() -> String {
    "profile_label_trace_id".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_exemplar_lookback(), 300);
        assert_eq!(default_trace_id_label(), "traceID");
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_yaml_with_backend_aliases() {
        let cfg = Config::from_yaml_str(
            r#"
sources:
  thanos:
    internal_endpoint: thanos-query:9090
    external_endpoint: localhost:9090
  jaeger:
    internal_endpoint: jaeger:16686
    external_endpoint: localhost:16686
"#,
        )
        .unwrap();

        assert_eq!(cfg.sources.metrics.internal_endpoint, "thanos-query:9090");
        assert_eq!(
            cfg.sources.traces.as_ref().map(|s| s.external_endpoint.as_str()),
            Some("localhost:16686")
        );
        assert!(cfg.sources.logs.is_none());
        assert_eq!(cfg.correlation.identity_labels, vec!["job", "instance"]);
    }
}
