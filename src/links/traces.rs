use super::{with_path, LinkContext};
use crate::config::LinkSettings;
use crate::correlation::models::RecognizedView;
use crate::error::{CorrelatorError, Result};
use crate::sources::BackendKind;
use url::Url;

/// Jaeger UI: the trace itself with a pivot, otherwise a service search
pub(super) fn build(base: Url, ctx: &LinkContext<'_>, settings: &LinkSettings) -> Result<Url> {
    if let Some(id) = ctx.pivot_id() {
        return with_path(base, &["trace", id]);
    }

    let label = settings.trace_service_label.as_str();
    let service = ctx
        .identity
        .get(label)
        .map(String::as_str)
        .or_else(|| ctx.selector.equality_value(label))
        .ok_or_else(|| {
            CorrelatorError::InvalidInput(format!(
                "no {:?} label to search traces by service",
                label
            ))
        })?;

    let mut url = with_path(base, &["search"])?;
    url.query_pairs_mut()
        .append_pair("service", service)
        .append_pair("start", &ctx.window.start.timestamp_micros().to_string())
        .append_pair("end", &ctx.window.end.timestamp_micros().to_string())
        .append_pair("limit", &settings.trace_search_limit.to_string())
        .append_pair("lookback", "custom");
    Ok(url)
}

pub(super) fn recognize(url: &Url) -> Option<RecognizedView> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., "trace", id] => Some(RecognizedView {
            backend: BackendKind::Traces,
            selector_groups: Vec::new(),
            window: None,
            pivot_id: Some(id.to_string()),
        }),
        _ => None,
    }
}
