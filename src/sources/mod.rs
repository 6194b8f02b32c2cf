//! Static identity of the telemetry backends the correlator links into.
//!
//! A [`Source`] is pure data: which kind of backend it is, the address the
//! correlator itself calls, and the address rendered into user-facing links.
//! The two may differ (container-internal vs. browser-reachable host).

use crate::config::{SourceConfig, SourcesConfig};
use crate::error::{CorrelatorError, Result};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};
use url::Url;

/// Supported telemetry signal kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    Metrics,
    Logs,
    Traces,
    Profiles,
}

/// A configured backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub kind: BackendKind,
    pub internal_endpoint: String,
    pub external_endpoint: String,
}

impl Source {
    pub fn new(
        kind: BackendKind,
        internal_endpoint: impl Into<String>,
        external_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            internal_endpoint: internal_endpoint.into(),
            external_endpoint: external_endpoint.into(),
        }
    }

    pub fn from_config(kind: BackendKind, cfg: &SourceConfig) -> Self {
        Self::new(kind, cfg.internal_endpoint.clone(), cfg.external_endpoint.clone())
    }

    /// Base URL for calls made by the correlator
    pub fn internal_url(&self) -> Result<Url> {
        endpoint_url(self.kind, "internal", &self.internal_endpoint)
    }

    /// Base URL for rendered links
    pub fn external_url(&self) -> Result<Url> {
        endpoint_url(self.kind, "external", &self.external_endpoint)
    }

    /// Whether `url` points at this backend through either endpoint
    pub fn serves(&self, url: &Url) -> bool {
        [&self.internal_endpoint, &self.external_endpoint]
            .into_iter()
            .filter_map(|endpoint| endpoint_url(self.kind, "", endpoint).ok())
            .any(|base| {
                base.host_str() == url.host_str()
                    && base.port_or_known_default() == url.port_or_known_default()
            })
    }
}

fn endpoint_url(kind: BackendKind, which: &str, endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(CorrelatorError::Config(format!(
            "{} source has no {} endpoint",
            kind, which
        )));
    }

    let raw = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    let url = Url::parse(&raw)?;
    if url.cannot_be_a_base() {
        return Err(CorrelatorError::Config(format!(
            "{} endpoint {:?} cannot be used as a base URL",
            kind, endpoint
        )));
    }
    Ok(url)
}

/// Backends known to one correlator, fixed for its lifetime
#[derive(Debug, Clone, Serialize)]
pub struct SourceSet {
    metrics: Source,
    logs: Option<Source>,
    traces: Option<Source>,
    profiles: Option<Source>,
}

impl SourceSet {
    /// Create a set holding only the metrics backend
    pub fn new(metrics: Source) -> Self {
        Self {
            metrics,
            logs: None,
            traces: None,
            profiles: None,
        }
    }

    pub fn from_config(cfg: &SourcesConfig) -> Self {
        let source = |kind, cfg: &Option<SourceConfig>| {
            cfg.as_ref().map(|c| Source::from_config(kind, c))
        };

        Self {
            metrics: Source::from_config(BackendKind::Metrics, &cfg.metrics),
            logs: source(BackendKind::Logs, &cfg.logs),
            traces: source(BackendKind::Traces, &cfg.traces),
            profiles: source(BackendKind::Profiles, &cfg.profiles),
        }
    }

    /// Add or replace a source; its kind decides the slot
    pub fn with(mut self, source: Source) -> Self {
        match source.kind {
            BackendKind::Metrics => self.metrics = source,
            BackendKind::Logs => self.logs = Some(source),
            BackendKind::Traces => self.traces = Some(source),
            BackendKind::Profiles => self.profiles = Some(source),
        }
        self
    }

    pub fn metrics(&self) -> &Source {
        &self.metrics
    }

    pub fn get(&self, kind: BackendKind) -> Option<&Source> {
        match kind {
            BackendKind::Metrics => Some(&self.metrics),
            BackendKind::Logs => self.logs.as_ref(),
            BackendKind::Traces => self.traces.as_ref(),
            BackendKind::Profiles => self.profiles.as_ref(),
        }
    }

    /// Configured sources in kind order
    pub fn iter(&self) -> impl Iterator<Item = &Source> + '_ {
        BackendKind::iter().filter_map(move |kind| self.get(kind))
    }
}
