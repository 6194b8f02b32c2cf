use crate::promql::{Labels, SelectorGroup};
use crate::sources::BackendKind;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to correlate one firing alert
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CorrelationInput {
    /// Name of the alerting rule
    #[validate(length(min = 1))]
    pub alert_name: String,

    /// Resolve an exemplar to pivot into traces, logs and profiles
    #[serde(default)]
    pub include_exemplar_pivot: bool,
}

impl CorrelationInput {
    pub fn new(alert_name: impl Into<String>, include_exemplar_pivot: bool) -> Self {
        Self {
            alert_name: alert_name.into(),
            include_exemplar_pivot,
        }
    }
}

/// Closed time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window of `length` ending at `end`, or `None` if its start is not representable
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Option<Self> {
        let start = end.checked_sub_signed(length)?;
        Some(Self { start, end })
    }

    /// Window of `length` ending now
    pub fn last(length: Duration) -> Option<Self> {
        Self::ending_at(Utc::now(), length)
    }

    /// Window reaching `padding` either side of `at`, or `None` if either edge is not representable
    pub fn around(at: DateTime<Utc>, padding: Duration) -> Option<Self> {
        Some(Self {
            start: at.checked_sub_signed(padding)?,
            end: at.checked_add_signed(padding)?,
        })
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Alert resolved from the live rule state of the metrics backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertQuery {
    pub alert_name: String,
    pub rule_expression: String,
    /// Labels of the selected firing instance
    pub firing_labels: Labels,
    /// Static labels the rule attaches at evaluation time
    pub rule_labels: Labels,
}

impl AlertQuery {
    /// Firing labels without the ones the rule itself attaches
    pub fn series_labels(&self) -> Labels {
        self.firing_labels
            .iter()
            .filter(|(name, _)| name.as_str() != "alertname" && !self.rule_labels.contains_key(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Exemplar chosen to pivot from metrics into other backends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExemplarPivot {
    pub source_series_labels: Labels,
    /// Never empty
    pub external_id: String,
    pub sample_timestamp: DateTime<Utc>,
    /// Sample timestamp padded on both sides
    pub window: TimeWindow,
}

/// One deep link, or the reason it could not be built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub backend: BackendKind,
    pub description: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CorrelationEntry {
    pub fn link(backend: BackendKind, description: impl Into<String>, url: String) -> Self {
        Self {
            backend,
            description: description.into(),
            url,
            error: None,
        }
    }

    pub fn failed(backend: BackendKind, description: impl Into<String>, error: String) -> Self {
        Self {
            backend,
            description: description.into(),
            url: String::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one correlation, returned directly to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub discoveries: Vec<String>,
    pub correlations: Vec<CorrelationEntry>,
}

impl CorrelationResult {
    pub fn entries_for(&self, backend: BackendKind) -> impl Iterator<Item = &CorrelationEntry> {
        self.correlations.iter().filter(move |c| c.backend == backend)
    }
}

/// Logical request recovered from a backend UI URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedView {
    pub backend: BackendKind,
    pub selector_groups: Vec<SelectorGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot_id: Option<String>,
}

/// Render a label set as `{a="b", c="d"}`
pub fn format_labels(labels: &Labels) -> String {
    let pairs: Vec<String> = labels
        .iter()
        .map(|(name, value)| format!("{}={:?}", name, value))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

/// Convert fractional unix seconds to a timestamp
pub fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((secs * 1000.0).round() as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_labels_drop_rule_labels() {
        let alert = AlertQuery {
            alert_name: "PingTooManyErrors".to_string(),
            rule_expression: "up == 0".to_string(),
            firing_labels: [
                ("alertname", "PingTooManyErrors"),
                ("job", "ping"),
                ("severity", "page"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            rule_labels: [("severity".to_string(), "page".to_string())]
                .into_iter()
                .collect(),
        };

        let series = alert.series_labels();
        assert_eq!(series.len(), 1);
        assert_eq!(series.get("job").map(String::as_str), Some("ping"));
    }

    #[test]
    fn test_time_window_helpers() {
        let end = Utc.with_ymd_and_hms(2022, 5, 20, 10, 0, 0).unwrap();
        let window = TimeWindow::ending_at(end, Duration::minutes(5)).unwrap();
        assert_eq!(window.length(), Duration::minutes(5));
        assert!(window.contains(end - Duration::minutes(1)));
        assert!(!window.contains(end + Duration::seconds(1)));

        let around = TimeWindow::around(end, Duration::minutes(5)).unwrap();
        assert_eq!(around.length(), Duration::minutes(10));
    }

    #[test]
    fn test_time_window_out_of_range() {
        let end = Utc.with_ymd_and_hms(2022, 5, 20, 10, 0, 0).unwrap();
        assert!(TimeWindow::ending_at(end, Duration::days(365 * 1_000_000)).is_none());
        assert!(TimeWindow::last(Duration::days(365 * 1_000_000)).is_none());

        // Representable on its own, but the padded end is past the last supported instant
        let late = timestamp_from_secs(8210266876799.0).unwrap();
        assert!(TimeWindow::around(late, Duration::minutes(5)).is_none());
        assert!(TimeWindow::around(late, Duration::zero()).is_some());
    }

    #[test]
    fn test_format_labels() {
        let labels: Labels = [("job".to_string(), "ping".to_string())].into_iter().collect();
        assert_eq!(format_labels(&labels), r#"{job="ping"}"#);
    }

    #[test]
    fn test_timestamp_from_secs() {
        let ts = timestamp_from_secs(1600096945.479).unwrap();
        assert_eq!(ts.timestamp_millis(), 1600096945479);
        assert!(timestamp_from_secs(f64::NAN).is_none());
    }
}
