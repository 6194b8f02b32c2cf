//! Query analysis over realistic alerting rules

use telemetry_correlator::promql::{
    extract_selector_groups, parse, strip_alert_threshold, Labels, MatchOp,
};

const RULES: &[&str] = &[
    r#"sum(rate(http_requests_total{job="ping", code=~"5.."}[1m])) / sum(rate(http_requests_total{job="ping"}[1m])) > 0.3"#,
    r#"histogram_quantile(0.99, sum by (le) (rate(http_request_duration_seconds_bucket{job="ping"}[5m]))) > 0.5"#,
    r#"up{job=~"ping|pinger"} == 0"#,
    r#"absent(up{job="ping"} offset 5m)"#,
    r#"max_over_time(process_resident_memory_bytes{job="ping"}[10m:1m] @ end()) > 1e9"#,
    r#"topk(3, sum without (instance) (rate(http_requests_total{job!="ping"}[5m])))"#,
    r#"(rate(errors_total[5m]) or on (job) vector(0)) * on (job) group_left (team) team_info"#,
];

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_extraction_is_deterministic() {
    for rule in RULES {
        let first = extract_selector_groups(&parse(rule).unwrap());
        let second = extract_selector_groups(&parse(rule).unwrap());
        assert_eq!(first, second, "{}", rule);
        assert!(!first.is_empty(), "{} yields selectors", rule);
        assert!(first.iter().all(|g| !g.is_empty()));
    }
}

#[test]
fn test_rendering_reparses_to_same_groups() {
    for rule in RULES {
        let expr = parse(rule).unwrap();
        let rendered = expr.to_string();
        let reparsed = parse(&rendered).unwrap_or_else(|e| panic!("{}: {}", rendered, e));
        assert_eq!(
            extract_selector_groups(&expr),
            extract_selector_groups(&reparsed),
            "{}",
            rule
        );
    }
}

#[test]
fn test_groups_follow_source_order() {
    let groups = extract_selector_groups(&parse(RULES[0]).unwrap());
    assert_eq!(groups.len(), 2);

    let first = groups[0].matchers();
    assert_eq!(first[0].name, "__name__");
    assert_eq!(first[1].name, "job");
    assert_eq!(first[2].name, "code");
    assert_eq!(first[2].op, MatchOp::RegexMatch);

    let rule = r#"a{x="1"} + on (x) group_left b{y="2"} * c{z="3"}"#;
    let groups = extract_selector_groups(&parse(rule).unwrap());
    let names: Vec<Option<&str>> = groups.iter().map(|g| g.metric_name()).collect();
    assert_eq!(names, vec![Some("a"), Some("b"), Some("c")]);
}

#[test]
fn test_more_constraints_never_match_more_series() {
    let loose = &extract_selector_groups(&parse(r#"x{job="ping"}"#).unwrap())[0];
    let strict = &extract_selector_groups(&parse(r#"x{job="ping", code=~"5.."}"#).unwrap())[0];

    let series = [
        labels(&[("job", "ping"), ("code", "500")]),
        labels(&[("job", "ping"), ("code", "200")]),
        labels(&[("job", "other"), ("code", "503")]),
        labels(&[("job", "ping")]),
        labels(&[("instance", "a")]),
    ];

    for s in &series {
        if strict.matches_series(s) {
            assert!(loose.matches_series(s), "{:?}", s);
        }
    }
    assert!(!strict.matches_series(&series[1]));
    assert!(loose.matches_series(&series[1]));
}

#[test]
fn test_regex_matchers_are_anchored() {
    let group = &extract_selector_groups(&parse(r#"up{job=~"ping"}"#).unwrap())[0];
    assert!(group.matches_series(&labels(&[("job", "ping")])));
    assert!(!group.matches_series(&labels(&[("job", "pinger")])));
}

#[test]
fn test_threshold_stripping_on_rules() {
    let expr = parse(RULES[2]).unwrap();
    assert_eq!(strip_alert_threshold(&expr).to_string(), r#"up{job=~"ping|pinger"}"#);

    let expr = parse(RULES[3]).unwrap();
    assert_eq!(strip_alert_threshold(&expr), &expr);
}

#[test]
fn test_invalid_rules() {
    for rule in [
        "",
        "sum(",
        r#"up{job="ping"#,
        r#"{job=~"("}"#,
        r#"{job=""}"#,
        "up[5m",
        "rate(up[5m]) offset",
        "1 +",
        "up and bool down",
    ] {
        assert!(parse(rule).is_err(), "{:?} should not parse", rule);
    }
}
