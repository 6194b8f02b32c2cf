use super::{with_path, LinkContext};
use crate::config::LinkSettings;
use crate::correlation::models::{RecognizedView, TimeWindow};
use crate::error::{CorrelatorError, Result};
use crate::promql::{extract_selector_groups, parse, parse_duration, PromDuration};
use crate::sources::BackendKind;
use chrono::{Duration, NaiveDateTime, Utc};
use url::Url;

const DEFAULT_RANGE_MINUTES: i64 = 30;
const END_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Two panels on the graph page: the alert's signal and the rule without its threshold
pub(super) fn build(base: Url, ctx: &LinkContext<'_>, _settings: &LinkSettings) -> Result<Url> {
    let mut url = with_path(base, &["graph"])?;
    let range = PromDuration::from_millis(ctx.window.length().num_milliseconds()).to_string();

    {
        let mut query = url.query_pairs_mut();
        for (panel, expr) in [("g0", ctx.selector.to_query()), ("g1", ctx.rule_expression.to_string())] {
            query
                .append_pair(&format!("{}.expr", panel), &expr)
                .append_pair(&format!("{}.tab", panel), "0")
                .append_pair(&format!("{}.stacked", panel), "0")
                .append_pair(&format!("{}.range_input", panel), &range)
                .append_pair(
                    &format!("{}.end_input", panel),
                    &ctx.window.end.format(END_INPUT_FORMAT).to_string(),
                )
                .append_pair(&format!("{}.max_source_resolution", panel), "0s")
                .append_pair(&format!("{}.deduplicate", panel), "1")
                .append_pair(&format!("{}.partial_response", panel), "0");
        }
    }

    Ok(url)
}

/// Read the first graph panel back into selector groups and a window
pub(super) fn recognize(url: &Url) -> Result<RecognizedView> {
    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    let expr = param("g0.expr").ok_or_else(|| {
        CorrelatorError::InvalidInput("metrics URL does not query anything (no g0.expr)".to_string())
    })?;
    let ast = parse(&expr).map_err(|e| CorrelatorError::invalid_query(&expr, e.to_string()))?;

    let range = match param("g0.range_input") {
        Some(raw) => parse_duration(&raw)
            .map_err(|e| CorrelatorError::InvalidInput(format!("g0.range_input: {}", e)))?
            .to_chrono(),
        None => Duration::minutes(DEFAULT_RANGE_MINUTES),
    };
    let end = match param("g0.end_input") {
        Some(raw) => NaiveDateTime::parse_from_str(&raw, END_INPUT_FORMAT)
            .map_err(|e| CorrelatorError::InvalidInput(format!("g0.end_input: {}", e)))?
            .and_utc(),
        None => Utc::now(),
    };

    let window = TimeWindow::ending_at(end, range).ok_or_else(|| {
        CorrelatorError::InvalidInput(format!(
            "g0.range_input: {} before {} is out of range",
            PromDuration::from_millis(range.num_milliseconds()),
            end
        ))
    })?;

    Ok(RecognizedView {
        backend: BackendKind::Metrics,
        selector_groups: extract_selector_groups(&ast),
        window: Some(window),
        pivot_id: None,
    })
}
