//! Deep-link builders and recognizers, one per backend kind.
//!
//! Builders are pure formatters over a [`Source`]'s external endpoint. They
//! never perform I/O and all user-controlled values are percent-encoded by
//! `url`'s serializers.

mod logs;
mod metrics;
mod profiles;
mod traces;

use crate::config::LinkSettings;
use crate::correlation::models::{ExemplarPivot, RecognizedView, TimeWindow};
use crate::error::{CorrelatorError, Result};
use crate::promql::{LabelMatcher, Labels, SelectorGroup};
use crate::sources::{BackendKind, Source};
use url::Url;

/// Everything a builder may render into a link
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    /// Active matcher set of the alert
    pub selector: &'a SelectorGroup,
    /// Rule expression with its alerting threshold removed
    pub rule_expression: &'a str,
    /// Entity labels (job, instance) the link is scoped to
    pub identity: &'a Labels,
    pub window: TimeWindow,
    pub pivot: Option<&'a ExemplarPivot>,
}

impl<'a> LinkContext<'a> {
    pub fn with_window(self, window: TimeWindow) -> Self {
        Self { window, ..self }
    }

    fn pivot_id(&self) -> Option<&'a str> {
        self.pivot.map(|p| p.external_id.as_str())
    }

    /// Identity labels rendered as equality matchers
    fn identity_matchers(&self) -> Vec<String> {
        self.identity
            .iter()
            .map(|(name, value)| LabelMatcher::equal(name.clone(), value.clone()).to_string())
            .collect()
    }
}

impl BackendKind {
    /// Human-readable description of the link this kind produces
    pub fn describe(self, pivot: bool) -> &'static str {
        match (self, pivot) {
            (BackendKind::Metrics, _) => "Metric view for the source of the alert",
            (BackendKind::Logs, true) => "Log lines carrying the exemplar's trace ID",
            (BackendKind::Logs, false) => "Log view for the same job and time",
            (BackendKind::Traces, true) => "Trace view for the exemplar's trace ID",
            (BackendKind::Traces, false) => "Trace search for the same service and time",
            (BackendKind::Profiles, true) => "Profiles view for the exemplar's trace ID",
            (BackendKind::Profiles, false) => "Profiles view for the same job and time",
        }
    }

    /// Render the deep link for this kind against `source`'s external endpoint
    pub fn build_link(
        self,
        source: &Source,
        ctx: &LinkContext<'_>,
        settings: &LinkSettings,
    ) -> Result<String> {
        let base = source.external_url()?;
        let url = match self {
            BackendKind::Metrics => metrics::build(base, ctx, settings)?,
            BackendKind::Logs => logs::build(base, ctx, settings)?,
            BackendKind::Traces => traces::build(base, ctx, settings)?,
            BackendKind::Profiles => profiles::build(base, ctx, settings)?,
        };
        Ok(url.into())
    }

    /// Recover the logical request behind a UI URL of this kind.
    ///
    /// Returns `Ok(None)` when `url` does not point at `source`.
    pub fn recognize(self, source: &Source, url: &Url) -> Result<Option<RecognizedView>> {
        if !source.serves(url) {
            return Ok(None);
        }
        match self {
            BackendKind::Metrics => metrics::recognize(url).map(Some),
            BackendKind::Traces => Ok(traces::recognize(url)),
            BackendKind::Logs | BackendKind::Profiles => Ok(None),
        }
    }
}

/// Append path segments to a base URL, keeping any base path
fn with_path(mut base: Url, segments: &[&str]) -> Result<Url> {
    let display = base.to_string();
    base.path_segments_mut()
        .map_err(|_| CorrelatorError::Config(format!("{} is not a valid base URL", display)))?
        .pop_if_empty()
        .extend(segments);
    Ok(base)
}

fn missing_identity(kind: BackendKind) -> CorrelatorError {
    CorrelatorError::InvalidInput(format!(
        "no identity labels available to scope the {} link",
        kind
    ))
}
