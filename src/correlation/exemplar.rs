use crate::correlation::models::{format_labels, ExemplarPivot, TimeWindow};
use crate::error::Result;
use crate::promql::SelectorGroup;
use crate::upstream::{ExemplarSeries, MetricsBackend};
use chrono::Duration;
use std::fmt;
use tracing::debug;

/// Why no exemplar pivot is available
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsentReason {
    /// Backend returned no series at all
    NoSeries,
    /// No series satisfies the active matcher group
    NoMatchingSeries,
    /// The selected series carries no exemplars
    NoExemplars,
    /// The first exemplar lacks a non-empty identifier label
    MissingIdentifier(String),
    /// The first exemplar has an unusable timestamp, or one whose padded window is out of range
    InvalidTimestamp,
}

impl fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbsentReason::NoSeries => f.write_str("no exemplar series returned"),
            AbsentReason::NoMatchingSeries => {
                f.write_str("no exemplar series matches the alert's selector")
            }
            AbsentReason::NoExemplars => f.write_str("matching series has no exemplars"),
            AbsentReason::MissingIdentifier(label) => {
                write!(f, "exemplar has no {:?} label", label)
            }
            AbsentReason::InvalidTimestamp => f.write_str("exemplar timestamp is out of range"),
        }
    }
}

/// Outcome of exemplar resolution; absence is not an error
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ExemplarPivot),
    Absent(AbsentReason),
}

/// Picks the exemplar used to pivot out of the metrics backend.
///
/// First match wins at every step: the first series, in response order,
/// whose labels satisfy the matcher group, then that series' first exemplar.
pub struct ExemplarResolver<'a> {
    backend: &'a dyn MetricsBackend,
    id_label: &'a str,
    padding: Duration,
}

impl<'a> ExemplarResolver<'a> {
    pub fn new(backend: &'a dyn MetricsBackend, id_label: &'a str) -> Self {
        Self {
            backend,
            id_label,
            padding: Duration::zero(),
        }
    }

    /// Padding applied either side of the sample for the pivot window
    pub fn with_padding(mut self, padding: Duration) -> Self {
        self.padding = padding;
        self
    }

    /// Query exemplars for `expression` over `window` and select one
    pub async fn resolve(
        &self,
        expression: &str,
        group: &SelectorGroup,
        window: &TimeWindow,
    ) -> Result<Resolution> {
        let series = self.backend.query_exemplars(expression, window).await?;
        debug!(
            series = series.len(),
            start = %window.start,
            end = %window.end,
            "Exemplar series returned"
        );
        Ok(self.select(&series, group))
    }

    pub fn select(&self, series: &[ExemplarSeries], group: &SelectorGroup) -> Resolution {
        if series.is_empty() {
            return Resolution::Absent(AbsentReason::NoSeries);
        }

        let selected = match series.iter().find(|s| group.matches_series(&s.series_labels)) {
            Some(selected) => selected,
            None => return Resolution::Absent(AbsentReason::NoMatchingSeries),
        };
        debug!(labels = %format_labels(&selected.series_labels), "Selected exemplar series");

        let exemplar = match selected.exemplars.first() {
            Some(exemplar) => exemplar,
            None => return Resolution::Absent(AbsentReason::NoExemplars),
        };

        let external_id = match exemplar.labels.get(self.id_label) {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                return Resolution::Absent(AbsentReason::MissingIdentifier(
                    self.id_label.to_string(),
                ))
            }
        };

        let sample_timestamp = match exemplar.time() {
            Some(at) => at,
            None => return Resolution::Absent(AbsentReason::InvalidTimestamp),
        };
        match TimeWindow::around(sample_timestamp, self.padding) {
            Some(window) => Resolution::Found(ExemplarPivot {
                source_series_labels: selected.series_labels.clone(),
                external_id,
                sample_timestamp,
                window,
            }),
            None => Resolution::Absent(AbsentReason::InvalidTimestamp),
        }
    }
}
