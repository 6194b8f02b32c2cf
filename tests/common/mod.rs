//! Common test utilities: a fake Prometheus HTTP API and correlator fixtures
#![allow(dead_code)]

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::time::Duration;
use telemetry_correlator::{
    config::{CorrelationSettings, LinkSettings},
    BackendKind, CorrelationEngine, Source, SourceSet,
};
use url::Url;

pub const PING_ALERT: &str = "PingTooManyErrors";
pub const PING_RULE: &str = r#"sum(rate(http_requests_total{job="ping"}[1m])) > 0.3"#;

pub const METRICS_UI: &str = "http://localhost:9090";
pub const LOGS_UI: &str = "http://localhost:3000";
pub const TRACES_UI: &str = "http://localhost:16686";
pub const PROFILES_UI: &str = "http://localhost:7070";

/// Fake Prometheus-compatible API backed by mockito
pub struct FakePrometheus {
    pub server: ServerGuard,
}

impl FakePrometheus {
    pub async fn start() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub async fn rules(&mut self, body: Value) -> Mock {
        self.server
            .mock("GET", "/api/v1/rules")
            .match_query(Matcher::UrlEncoded("type".into(), "alert".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    pub async fn exemplars(&mut self, body: Value) -> Mock {
        self.server
            .mock("GET", "/api/v1/query_exemplars")
            .match_query(Matcher::UrlEncoded("query".into(), PING_RULE.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    pub async fn failing(&mut self, path: &str, status: usize) -> Mock {
        self.server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(r#"{"status":"error","errorType":"internal","error":"storage unavailable"}"#)
            .create_async()
            .await
    }
}

/// One alerting rule with instances in the given states
pub fn alerting_rule(name: &str, query: &str, states: &[&str]) -> Value {
    let alerts: Vec<Value> = states
        .iter()
        .map(|state| {
            json!({
                "labels": {
                    "alertname": name,
                    "instance": "ping:8080",
                    "job": "ping",
                    "severity": "page"
                },
                "annotations": {},
                "state": state,
                "activeAt": "2022-05-20T10:00:00Z",
                "value": "4.2e-01"
            })
        })
        .collect();

    json!({
        "type": "alerting",
        "name": name,
        "query": query,
        "duration": 60,
        "labels": {"severity": "page"},
        "annotations": {},
        "alerts": alerts,
        "health": "ok"
    })
}

pub fn rules_response(rules: Vec<Value>) -> Value {
    json!({
        "status": "success",
        "data": {
            "groups": [{
                "name": "ping.rules",
                "file": "/etc/prometheus/rules/ping.yaml",
                "interval": 30,
                "rules": rules
            }]
        }
    })
}

/// The ping alert, firing
pub fn ping_rules() -> Value {
    rules_response(vec![alerting_rule(PING_ALERT, PING_RULE, &["firing"])])
}

/// One exemplar series carrying `traceID`
pub fn exemplars_response(series_labels: Value, trace_id: &str) -> Value {
    exemplars_response_at(series_labels, trace_id, 1653040800.123)
}

pub fn exemplars_response_at(series_labels: Value, trace_id: &str, timestamp: f64) -> Value {
    json!({
        "status": "success",
        "data": [{
            "seriesLabels": series_labels,
            "exemplars": [{
                "labels": {"traceID": trace_id},
                "value": "1",
                "timestamp": timestamp
            }]
        }]
    })
}

/// Every backend kind, metrics calling `metrics_internal`
pub fn all_sources(metrics_internal: &str) -> SourceSet {
    SourceSet::new(Source::new(BackendKind::Metrics, metrics_internal, METRICS_UI))
        .with(Source::new(BackendKind::Logs, "grafana:3000", LOGS_UI))
        .with(Source::new(BackendKind::Traces, "jaeger:16686", TRACES_UI))
        .with(Source::new(BackendKind::Profiles, "parca:7070", PROFILES_UI))
}

pub fn engine(sources: SourceSet) -> CorrelationEngine {
    CorrelationEngine::new(
        sources,
        CorrelationSettings::default(),
        LinkSettings::default(),
        Duration::from_secs(5),
    )
    .expect("engine")
}

/// Path and decoded query of a link, for asserting on embedded values
pub fn decoded(link: &str) -> String {
    let url = Url::parse(link).expect("valid link");
    let mut out = url.path().to_string();
    for (key, value) in url.query_pairs() {
        out.push_str(&format!("&{}={}", key, value));
    }
    out
}
