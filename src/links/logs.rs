use super::{missing_identity, with_path, LinkContext};
use crate::config::LinkSettings;
use crate::error::Result;
use crate::promql::ast::quote;
use crate::sources::BackendKind;
use serde_json::json;
use url::Url;

/// Grafana Explore over the logs datasource.
///
/// The stream is scoped to the identity labels; with a pivot the lines are
/// further filtered to the ones carrying its identifier.
pub(super) fn build(base: Url, ctx: &LinkContext<'_>, settings: &LinkSettings) -> Result<Url> {
    let matchers = ctx.identity_matchers();
    if matchers.is_empty() {
        return Err(missing_identity(BackendKind::Logs));
    }

    let mut expr = format!("{{{}}}", matchers.join(","));
    if let Some(id) = ctx.pivot_id() {
        expr.push_str(" |= ");
        expr.push_str(&quote(id));
    }

    let left = json!([
        ctx.window.start.timestamp_millis().to_string(),
        ctx.window.end.timestamp_millis().to_string(),
        settings.logs_datasource,
        { "refId": "A", "expr": expr },
    ]);

    let mut url = with_path(base, &["explore"])?;
    url.query_pairs_mut()
        .append_pair("orgId", &settings.grafana_org_id.to_string())
        .append_pair("left", &left.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::models::{ExemplarPivot, TimeWindow};
    use crate::error::CorrelatorError;
    use crate::promql::{Labels, SelectorGroup};
    use chrono::{Duration, TimeZone, Utc};

    fn left_of(url: &Url) -> serde_json::Value {
        let (_, left) = url.query_pairs().find(|(k, _)| k == "left").unwrap();
        serde_json::from_str(&left).unwrap()
    }

    #[test]
    fn test_pivot_link_filters_on_trace_id() {
        let selector = SelectorGroup::default();
        let identity: Labels = [("job".to_string(), "ping".to_string())].into_iter().collect();
        let at = Utc.with_ymd_and_hms(2022, 5, 20, 10, 0, 0).unwrap();
        let pivot = ExemplarPivot {
            source_series_labels: identity.clone(),
            external_id: "abc123".to_string(),
            sample_timestamp: at,
            window: TimeWindow::around(at, Duration::minutes(5)).unwrap(),
        };
        let ctx = LinkContext {
            selector: &selector,
            rule_expression: "",
            identity: &identity,
            window: TimeWindow::around(at, Duration::minutes(5)).unwrap(),
            pivot: Some(&pivot),
        };

        let url = build(
            Url::parse("http://localhost:3000").unwrap(),
            &ctx,
            &LinkSettings::default(),
        )
        .unwrap();
        assert_eq!(url.path(), "/explore");

        let left = left_of(&url);
        assert_eq!(left[0], json!((at - Duration::minutes(5)).timestamp_millis().to_string()));
        assert_eq!(left[2], json!("Logging"));
        assert_eq!(left[3]["expr"], json!(r#"{job="ping"} |= "abc123""#));
    }

    #[test]
    fn test_requires_identity() {
        let selector = SelectorGroup::default();
        let identity = Labels::new();
        let ctx = LinkContext {
            selector: &selector,
            rule_expression: "",
            identity: &identity,
            window: TimeWindow::last(Duration::hours(1)).unwrap(),
            pivot: None,
        };

        let err = build(
            Url::parse("http://localhost:3000").unwrap(),
            &ctx,
            &LinkSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CorrelatorError::InvalidInput(_)));
    }
}
