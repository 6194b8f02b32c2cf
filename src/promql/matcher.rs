use super::ast::quote;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use strum::Display;

/// Label name holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Label matching operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum MatchOp {
    #[serde(rename = "=")]
    #[strum(serialize = "=")]
    Equal,
    #[serde(rename = "!=")]
    #[strum(serialize = "!=")]
    NotEqual,
    #[serde(rename = "=~")]
    #[strum(serialize = "=~")]
    RegexMatch,
    #[serde(rename = "!~")]
    #[strum(serialize = "!~")]
    RegexNoMatch,
}

/// One `name op "value"` constraint of a selector
#[derive(Debug, Clone, Serialize)]
pub struct LabelMatcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
    #[serde(skip)]
    regex: Option<Regex>,
}

impl LabelMatcher {
    /// Build a matcher, compiling regex values fully anchored
    pub fn new(
        op: MatchOp,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let value = value.into();
        let regex = match op {
            MatchOp::RegexMatch | MatchOp::RegexNoMatch => {
                Some(Regex::new(&format!("^(?s:{})$", value))?)
            }
            MatchOp::Equal | MatchOp::NotEqual => None,
        };

        Ok(Self {
            name: name.into(),
            op,
            value,
            regex,
        })
    }

    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::Equal,
            value: value.into(),
            regex: None,
        }
    }

    /// Whether `value` satisfies this matcher
    pub fn matches(&self, value: &str) -> bool {
        match (self.op, &self.regex) {
            (MatchOp::Equal, _) => self.value == value,
            (MatchOp::NotEqual, _) => self.value != value,
            (MatchOp::RegexMatch, Some(re)) => re.is_match(value),
            (MatchOp::RegexNoMatch, Some(re)) => !re.is_match(value),
            // Regex matchers always carry a compiled pattern
            (MatchOp::RegexMatch, None) | (MatchOp::RegexNoMatch, None) => false,
        }
    }

    pub fn is_metric_name(&self) -> bool {
        self.name == METRIC_NAME_LABEL
    }
}

impl PartialEq for LabelMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.op == other.op && self.value == other.value
    }
}

impl Eq for LabelMatcher {}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.op, quote(&self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_matchers() {
        let eq = LabelMatcher::equal("job", "ping");
        assert!(eq.matches("ping"));
        assert!(!eq.matches("pong"));

        let neq = LabelMatcher::new(MatchOp::NotEqual, "handler", "/ping").unwrap();
        assert!(neq.matches("/metrics"));
        assert!(!neq.matches("/ping"));
    }

    #[test]
    fn test_regex_matchers_are_anchored() {
        let re = LabelMatcher::new(MatchOp::RegexMatch, "instance", "ping.*").unwrap();
        assert!(re.matches("ping:8080"));
        assert!(!re.matches("xping:8080"));

        let nre = LabelMatcher::new(MatchOp::RegexNoMatch, "code", "5..").unwrap();
        assert!(nre.matches("200"));
        assert!(!nre.matches("503"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        assert!(LabelMatcher::new(MatchOp::RegexMatch, "job", "(").is_err());
    }

    #[test]
    fn test_display_quotes_value() {
        let m = LabelMatcher::new(MatchOp::RegexMatch, "path", "a\"b").unwrap();
        assert_eq!(m.to_string(), r#"path=~"a\"b""#);
    }
}
