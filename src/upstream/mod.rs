//! Clients for the backends the correlator queries at request time.
//!
//! Only the metrics backend is ever called. Logs, traces and profiles are
//! reached through the links the correlator renders, never directly.

pub mod prometheus;

use crate::correlation::models::{timestamp_from_secs, TimeWindow};
use crate::error::Result;
use crate::promql::Labels;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use prometheus::PrometheusClient;

/// Operations the correlator needs from a metrics backend
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Backend name used in errors and metrics
    fn name(&self) -> &str;

    /// Current state of every alerting rule, with active instances
    async fn rules(&self) -> Result<Vec<RuleGroup>>;

    /// Exemplars recorded for `query` within `window`
    async fn query_exemplars(&self, query: &str, window: &TimeWindow)
        -> Result<Vec<ExemplarSeries>>;
}

/// Envelope of every Prometheus HTTP API response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesData {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Rule {
    Alerting(AlertingRule),
    Recording(RecordingRule),
}

impl Rule {
    pub fn as_alerting(&self) -> Option<&AlertingRule> {
        match self {
            Rule::Alerting(rule) => Some(rule),
            Rule::Recording(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertingRule {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    #[serde(default)]
    pub alerts: Vec<ActiveAlert>,
}

impl AlertingRule {
    pub fn first_firing(&self) -> Option<&ActiveAlert> {
        self.alerts.iter().find(|a| a.state == AlertState::Firing)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingRule {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Firing,
    Pending,
    Inactive,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveAlert {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    pub state: AlertState,
    #[serde(rename = "activeAt", default)]
    pub active_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExemplarSeries {
    #[serde(rename = "seriesLabels", default)]
    pub series_labels: Labels,
    #[serde(default)]
    pub exemplars: Vec<Exemplar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Exemplar {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub value: String,
    /// Unix seconds with millisecond precision
    pub timestamp: f64,
}

impl Exemplar {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        timestamp_from_secs(self.timestamp)
    }
}
