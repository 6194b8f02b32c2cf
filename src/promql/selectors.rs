use super::ast::{Binary, Expr};
use super::matcher::{LabelMatcher, MatchOp};
use super::Labels;
use serde::Serialize;
use std::fmt;

/// Ordered label matchers taken from one selector of an expression
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectorGroup {
    matchers: Vec<LabelMatcher>,
}

impl SelectorGroup {
    pub fn new(matchers: Vec<LabelMatcher>) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &[LabelMatcher] {
        &self.matchers
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn push(&mut self, matcher: LabelMatcher) {
        self.matchers.push(matcher);
    }

    /// Metric name pinned by an equality matcher
    pub fn metric_name(&self) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| m.is_metric_name() && m.op == MatchOp::Equal)
            .map(|m| m.value.as_str())
    }

    /// Value pinned for `label` by an equality matcher
    pub fn equality_value(&self, label: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| m.name == label && m.op == MatchOp::Equal)
            .map(|m| m.value.as_str())
    }

    /// Whether a series satisfies every matcher whose label it carries.
    ///
    /// Matchers on labels absent from the series do not bind.
    pub fn matches_series(&self, labels: &Labels) -> bool {
        self.matchers.iter().all(|m| match labels.get(&m.name) {
            Some(value) => m.matches(value),
            None => true,
        })
    }

    /// Query for the metrics view; counters are shown as a 1m rate
    pub fn to_query(&self) -> String {
        let selector = self.to_string();
        match self.metric_name() {
            Some(name) if name.ends_with("_total") => format!("rate({}[1m])", selector),
            _ => selector,
        }
    }
}

impl fmt::Display for SelectorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matchers: Vec<String> = self.matchers.iter().map(|m| m.to_string()).collect();
        write!(f, "{{{}}}", matchers.join(","))
    }
}

/// Collect one selector group per vector or matrix selector, in pre-order.
///
/// A matrix selector yields a single group for its inner vector selector.
/// `offset` and `@` modifiers are not reflected in the groups.
pub fn extract_selector_groups(expr: &Expr) -> Vec<SelectorGroup> {
    let mut groups = Vec::new();
    expr.walk(&mut |node| match node {
        Expr::VectorSelector(vs) => groups.push(SelectorGroup::new(vs.matchers.clone())),
        Expr::MatrixSelector(ms) => groups.push(SelectorGroup::new(ms.vector.matchers.clone())),
        _ => {}
    });
    groups
}

/// Drop a top-level comparison against a number literal used only for alerting.
///
/// `sum(rate(x[1m])) > 0.3` yields `sum(rate(x[1m]))`; anything else is
/// returned unchanged. `bool` comparisons are kept since they change the value.
pub fn strip_alert_threshold(expr: &Expr) -> &Expr {
    match expr {
        Expr::Binary(Binary {
            op,
            lhs,
            rhs,
            return_bool: false,
            ..
        }) if op.is_comparison() => match (lhs.as_ref(), rhs.as_ref()) {
            (Expr::Number(_), Expr::Number(_)) => expr,
            (side, Expr::Number(_)) | (Expr::Number(_), side) => side,
            _ => expr,
        },
        _ => expr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promql::parse;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_in_pre_order() {
        let expr = parse(
            r#"sum(rate(errors_total{job="ping"}[1m])) / sum(rate(requests_total{job="ping", code!="200"}[1m]))"#,
        )
        .unwrap();
        let groups = extract_selector_groups(&expr);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].metric_name(), Some("errors_total"));
        assert_eq!(
            groups[1].to_string(),
            r#"{__name__="requests_total",job="ping",code!="200"}"#
        );
    }

    #[test]
    fn test_matrix_selector_yields_one_group() {
        let expr = parse(r#"rate(http_requests_total{job="ping"}[1m] offset 5m)"#).unwrap();
        let groups = extract_selector_groups(&expr);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_absent_labels_do_not_bind() {
        let expr = parse(r#"x{job="ping", handler!="/ping"}"#).unwrap();
        let group = &extract_selector_groups(&expr)[0];

        assert!(group.matches_series(&labels(&[("job", "ping")])));
        assert!(group.matches_series(&labels(&[("instance", "ping:8080")])));
        assert!(!group.matches_series(&labels(&[("job", "other")])));
        assert!(!group.matches_series(&labels(&[("job", "ping"), ("handler", "/ping")])));
    }

    #[test]
    fn test_to_query_wraps_counters() {
        let counter = &extract_selector_groups(&parse(r#"http_requests_total{job="ping"}"#).unwrap())[0];
        assert_eq!(
            counter.to_query(),
            r#"rate({__name__="http_requests_total",job="ping"}[1m])"#
        );

        let gauge = &extract_selector_groups(&parse(r#"up{job="ping"}"#).unwrap())[0];
        assert_eq!(gauge.to_query(), r#"{__name__="up",job="ping"}"#);
    }

    #[test]
    fn test_strip_alert_threshold() {
        let expr = parse(r#"sum(rate(http_requests_total{job="ping"}[1m])) > 0.3"#).unwrap();
        assert_eq!(
            strip_alert_threshold(&expr).to_string(),
            r#"sum(rate(http_requests_total{job="ping"}[1m]))"#
        );

        let reversed = parse("0.3 < up").unwrap();
        assert_eq!(strip_alert_threshold(&reversed).to_string(), "up");

        let keep_bool = parse("up > bool 0").unwrap();
        assert_eq!(strip_alert_threshold(&keep_bool), &keep_bool);

        let no_threshold = parse("a > b").unwrap();
        assert_eq!(strip_alert_threshold(&no_threshold), &no_threshold);
    }
}
