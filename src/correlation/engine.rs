use crate::config::{Config, CorrelationSettings, LinkSettings};
use crate::correlation::exemplar::{ExemplarResolver, Resolution};
use crate::correlation::models::{
    format_labels, AlertQuery, CorrelationEntry, CorrelationInput, CorrelationResult,
    ExemplarPivot, RecognizedView, TimeWindow,
};
use crate::error::{CorrelatorError, Result};
use crate::links::LinkContext;
use crate::metrics::{CORRELATIONS_TOTAL, CORRELATION_DURATION_SECONDS, LINKS_BUILT_TOTAL};
use crate::promql::{extract_selector_groups, parse, strip_alert_threshold, Labels, SelectorGroup};
use crate::sources::{BackendKind, SourceSet};
use crate::upstream::{MetricsBackend, PrometheusClient, Rule};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;
use validator::Validate;

/// Resolves a firing alert into deep links across the configured backends.
///
/// Holds no mutable state; one engine serves any number of concurrent
/// correlations.
pub struct CorrelationEngine {
    sources: Arc<SourceSet>,
    backend: Arc<dyn MetricsBackend>,
    settings: CorrelationSettings,
    links: LinkSettings,
    deadline: Duration,
}

impl CorrelationEngine {
    /// Create an engine talking to the metrics source over HTTP
    pub fn new(
        sources: SourceSet,
        settings: CorrelationSettings,
        links: LinkSettings,
        deadline: Duration,
    ) -> Result<Self> {
        let client = PrometheusClient::new(
            sources.metrics(),
            Duration::from_secs(settings.upstream_timeout_secs),
        )?;
        Ok(Self::with_backend(sources, Arc::new(client), settings, links).with_deadline(deadline))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            SourceSet::from_config(&config.sources),
            config.correlation.clone(),
            config.links.clone(),
            Duration::from_secs(config.server.request_timeout_secs),
        )
    }

    /// Create an engine over any metrics backend implementation
    pub fn with_backend(
        sources: SourceSet,
        backend: Arc<dyn MetricsBackend>,
        settings: CorrelationSettings,
        links: LinkSettings,
    ) -> Self {
        Self {
            sources: Arc::new(sources),
            backend,
            settings,
            links,
            deadline: Duration::from_secs(30),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Correlate one alert, bounded by the engine deadline
    pub async fn correlate(&self, input: &CorrelationInput) -> Result<CorrelationResult> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.deadline, self.run(input)).await {
            Ok(result) => result,
            Err(_) => Err(CorrelatorError::Canceled(format!(
                "correlation exceeded the {:?} deadline",
                self.deadline
            ))),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.error_code(),
        };
        CORRELATIONS_TOTAL.with_label_values(&[outcome]).inc();
        CORRELATION_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        result
    }

    /// Like [`correlate`](Self::correlate), aborting once `cancel` resolves
    pub async fn correlate_until<F>(
        &self,
        input: &CorrelationInput,
        cancel: F,
    ) -> Result<CorrelationResult>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.correlate(input) => result,
            _ = cancel => {
                CORRELATIONS_TOTAL.with_label_values(&["CANCELED"]).inc();
                Err(CorrelatorError::Canceled("correlation canceled by caller".to_string()))
            }
        }
    }

    #[instrument(skip(self, input), fields(alert = %input.alert_name, pivot = input.include_exemplar_pivot))]
    async fn run(&self, input: &CorrelationInput) -> Result<CorrelationResult> {
        input.validate()?;

        let mut result = CorrelationResult::default();

        let alert = self.resolve_alert(&input.alert_name).await?;
        result.discoveries.push(format!(
            "Alert {} is firing with labels {}",
            alert.alert_name,
            format_labels(&alert.firing_labels)
        ));

        let expr = parse(&alert.rule_expression)
            .map_err(|e| CorrelatorError::invalid_query(&alert.rule_expression, e.to_string()))?;
        let group = extract_selector_groups(&expr)
            .into_iter()
            .next()
            .ok_or_else(|| CorrelatorError::NoSelectors(alert.rule_expression.clone()))?;
        debug!(selector = %group, "Active matcher set");

        let pivot = if input.include_exemplar_pivot {
            let window = lookback("exemplar_lookback_secs", self.settings.exemplar_lookback_secs)?;
            let resolver = ExemplarResolver::new(self.backend.as_ref(), &self.settings.trace_id_label)
                .with_padding(seconds("pivot_padding_secs", self.settings.pivot_padding_secs)?);
            match resolver.resolve(&alert.rule_expression, &group, &window).await? {
                Resolution::Found(pivot) => {
                    result.discoveries.push(format!(
                        "Found exemplar with {} {} on series {}",
                        self.settings.trace_id_label,
                        pivot.external_id,
                        format_labels(&pivot.source_series_labels)
                    ));
                    Some(pivot)
                }
                Resolution::Absent(reason) => {
                    info!(reason = %reason, "No exemplar pivot");
                    result
                        .discoveries
                        .push(format!("No exemplar to pivot on: {}", reason));
                    None
                }
            }
        } else {
            None
        };

        let windows = Windows {
            fallback: lookback("default_lookback_secs", self.settings.default_lookback_secs)?,
            metrics: lookback("metrics_range_secs", self.links.metrics_range_secs)?,
        };
        let rule_expression = strip_alert_threshold(&expr).to_string();
        result.correlations =
            self.build_entries(&alert, &group, &rule_expression, pivot.as_ref(), windows);

        info!(
            discoveries = result.discoveries.len(),
            correlations = result.correlations.len(),
            "Correlation complete"
        );
        Ok(result)
    }

    /// Find the first alerting rule named `name` and its first firing instance
    async fn resolve_alert(&self, name: &str) -> Result<AlertQuery> {
        let groups = self.backend.rules().await?;

        let rule = groups
            .iter()
            .flat_map(|g| g.rules.iter())
            .filter_map(Rule::as_alerting)
            .find(|r| r.name == name)
            .ok_or_else(|| CorrelatorError::NotFound(name.to_string()))?;

        let firing = rule
            .first_firing()
            .ok_or_else(|| CorrelatorError::NoActiveInstance(name.to_string()))?;

        Ok(AlertQuery {
            alert_name: rule.name.clone(),
            rule_expression: rule.query.clone(),
            firing_labels: firing.labels.clone(),
            rule_labels: rule.labels.clone(),
        })
    }

    /// Metrics link first, then every other configured backend in kind order
    fn build_entries(
        &self,
        alert: &AlertQuery,
        group: &SelectorGroup,
        rule_expression: &str,
        pivot: Option<&ExemplarPivot>,
        windows: Windows,
    ) -> Vec<CorrelationEntry> {
        let identity = match pivot {
            Some(p) => {
                let from_series = self.identity(&p.source_series_labels);
                if from_series.is_empty() {
                    self.identity(&alert.series_labels())
                } else {
                    from_series
                }
            }
            None => self.identity(&alert.series_labels()),
        };

        let window = pivot.map_or(windows.fallback, |p| p.window);

        let ctx = LinkContext {
            selector: group,
            rule_expression,
            identity: &identity,
            window,
            pivot,
        };

        self.sources
            .iter()
            .map(|source| {
                let ctx = match source.kind {
                    BackendKind::Metrics => ctx.with_window(windows.metrics),
                    _ => ctx,
                };
                let description = source.kind.describe(pivot.is_some());

                match source.kind.build_link(source, &ctx, &self.links) {
                    Ok(url) => {
                        LINKS_BUILT_TOTAL
                            .with_label_values(&[source.kind.as_ref(), "success"])
                            .inc();
                        CorrelationEntry::link(source.kind, description, url)
                    }
                    Err(e) => {
                        LINKS_BUILT_TOTAL
                            .with_label_values(&[source.kind.as_ref(), "error"])
                            .inc();
                        warn!(backend = %source.kind, error = %e, "Failed to build link");
                        CorrelationEntry::failed(source.kind, description, e.to_string())
                    }
                }
            })
            .collect()
    }

    /// Configured identity labels present in `labels`
    fn identity(&self, labels: &Labels) -> Labels {
        self.settings
            .identity_labels
            .iter()
            .filter_map(|name| labels.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    }

    /// Recognize a backend UI URL; sources are tried in kind order
    pub fn recognize(&self, raw: &str) -> Result<Option<RecognizedView>> {
        let url = Url::parse(raw)
            .map_err(|e| CorrelatorError::InvalidInput(format!("invalid URL {:?}: {}", raw, e)))?;

        for source in self.sources.iter() {
            if let Some(view) = source.kind.recognize(source, &url)? {
                return Ok(Some(view));
            }
        }
        Ok(None)
    }
}

/// Windows for links that are not scoped by a pivot
#[derive(Clone, Copy)]
struct Windows {
    fallback: TimeWindow,
    metrics: TimeWindow,
}

fn seconds(setting: &str, value: u64) -> Result<chrono::Duration> {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| CorrelatorError::Config(format!("{} of {}s is out of range", setting, value)))
}

/// Window of a configured length ending now
fn lookback(setting: &str, value: u64) -> Result<TimeWindow> {
    TimeWindow::last(seconds(setting, value)?).ok_or_else(|| {
        CorrelatorError::Config(format!("{} of {}s reaches before the earliest supported time", setting, value))
    })
}
