use super::{ApiResponse, ExemplarSeries, MetricsBackend, RuleGroup, RulesData};
use crate::correlation::models::TimeWindow;
use crate::error::{CorrelatorError, Result};
use crate::metrics::UPSTREAM_REQUESTS_TOTAL;
use crate::sources::Source;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const BACKEND: &str = "metrics";

/// Prometheus-compatible HTTP API client (Prometheus, Thanos Querier)
#[derive(Clone)]
pub struct PrometheusClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl PrometheusClient {
    /// Create a client calling the internal endpoint of `source`
    pub fn new(source: &Source, timeout: Duration) -> Result<Self> {
        let base_url = source.internal_url()?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CorrelatorError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn api_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CorrelatorError::Config(format!("{} is not a valid base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "v1", endpoint]);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, url: Url) -> Result<T> {
        debug!(endpoint, url = %url, "Querying metrics backend");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&[endpoint, "transport_error"])
                    .inc();
                let message = if e.is_timeout() {
                    format!("{} request timed out after {:?}", endpoint, self.timeout)
                } else {
                    format!("{} request failed: {}", endpoint, e)
                };
                warn!(endpoint, error = %message, "Metrics backend unreachable");
                return Err(CorrelatorError::upstream(BACKEND, message));
            }
        };

        let status = response.status();
        UPSTREAM_REQUESTS_TOTAL
            .with_label_values(&[endpoint, status.as_str()])
            .inc();

        let body = response.text().await.map_err(|e| {
            CorrelatorError::upstream(BACKEND, format!("reading {} response: {}", endpoint, e))
        })?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(CorrelatorError::upstream(
                    BACKEND,
                    format!("decoding {} response: {}", endpoint, e),
                ))
            }
            Err(_) => {
                return Err(CorrelatorError::upstream(
                    BACKEND,
                    format!("{} returned HTTP {}", endpoint, status),
                ))
            }
        };

        if !status.is_success() || envelope.status != "success" {
            return Err(CorrelatorError::upstream(
                BACKEND,
                format!(
                    "{} returned HTTP {} ({}): {}",
                    endpoint,
                    status.as_u16(),
                    envelope.error_type.as_deref().unwrap_or("unknown"),
                    envelope.error.as_deref().unwrap_or("no error message"),
                ),
            ));
        }

        for warning in &envelope.warnings {
            warn!(endpoint, warning = %warning, "Metrics backend returned a warning");
        }

        envelope.data.ok_or_else(|| {
            CorrelatorError::upstream(BACKEND, format!("{} response carried no data", endpoint))
        })
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)
}

#[async_trait]
impl MetricsBackend for PrometheusClient {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn rules(&self) -> Result<Vec<RuleGroup>> {
        let mut url = self.api_url("rules")?;
        url.query_pairs_mut().append_pair("type", "alert");

        let data: RulesData = self.get("rules", url).await?;
        Ok(data.groups)
    }

    async fn query_exemplars(
        &self,
        query: &str,
        window: &TimeWindow,
    ) -> Result<Vec<ExemplarSeries>> {
        let mut url = self.api_url("query_exemplars")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("start", &format_timestamp(window.start))
            .append_pair("end", &format_timestamp(window.end));

        self.get("query_exemplars", url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::BackendKind;
    use chrono::TimeZone;

    fn client(endpoint: &str) -> PrometheusClient {
        let source = Source::new(BackendKind::Metrics, endpoint, "http://thanos.example.com");
        PrometheusClient::new(&source, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_api_url_keeps_base_path() {
        let prefixed = client("http://thanos:9090/prefix/");
        assert_eq!(
            prefixed.api_url("rules").unwrap().as_str(),
            "http://thanos:9090/prefix/api/v1/rules"
        );

        let bare = client("thanos:9090");
        assert_eq!(
            bare.api_url("query_exemplars").unwrap().as_str(),
            "http://thanos:9090/api/v1/query_exemplars"
        );
    }

    #[test]
    fn test_format_timestamp() {
        let at = Utc.timestamp_millis_opt(1600096945479).unwrap();
        assert_eq!(format_timestamp(at), "1600096945.479");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/rules")
            .match_query(mockito::Matcher::Any)
            .with_status(422)
            .with_body(r#"{"status":"error","errorType":"bad_data","error":"boom"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).rules().await.unwrap_err();
        match err {
            CorrelatorError::Upstream { message, .. } => {
                assert!(message.contains("422"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/rules")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = client(&server.url()).rules().await.unwrap_err();
        assert!(matches!(err, CorrelatorError::Upstream { .. }));
    }
}
