//! Abstract syntax tree for PromQL expressions.
//!
//! Every node renders back to PromQL through `Display`, which is how the
//! metrics view receives the rule expression without its alert threshold.

use super::duration::PromDuration;
use super::matcher::LabelMatcher;
use std::fmt;
use strum::{Display, EnumString};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    VectorSelector(VectorSelector),
    MatrixSelector(MatrixSelector),
    Subquery(Subquery),
    Call(Call),
    Aggregate(Aggregate),
    Binary(Binary),
    Unary(Unary),
    Paren(Box<Expr>),
}

/// `offset` and `@` modifiers attached to a selector or subquery
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeModifiers {
    pub offset: Option<PromDuration>,
    pub at: Option<AtModifier>,
}

impl TimeModifiers {
    pub fn is_empty(&self) -> bool {
        self.offset.is_none() && self.at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AtModifier {
    /// Unix timestamp in seconds
    Timestamp(f64),
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSelector {
    pub name: Option<String>,
    /// Matchers in source order; a metric name becomes the leading `__name__` matcher
    pub matchers: Vec<LabelMatcher>,
    pub modifiers: TimeModifiers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSelector {
    pub vector: VectorSelector,
    pub range: PromDuration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub expr: Box<Expr>,
    pub range: PromDuration,
    pub step: Option<PromDuration>,
    pub modifiers: TimeModifiers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AggregateOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Group,
    Stddev,
    Stdvar,
    Topk,
    Bottomk,
    CountValues,
    Quantile,
    Limitk,
    LimitRatio,
}

impl AggregateOp {
    /// Whether the aggregation takes a leading parameter
    pub fn takes_param(&self) -> bool {
        matches!(
            self,
            AggregateOp::Topk
                | AggregateOp::Bottomk
                | AggregateOp::CountValues
                | AggregateOp::Quantile
                | AggregateOp::Limitk
                | AggregateOp::LimitRatio
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub without: bool,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub op: AggregateOp,
    pub param: Option<Box<Expr>>,
    pub expr: Box<Expr>,
    pub grouping: Option<Grouping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "^")]
    Pow,
    #[strum(serialize = "atan2")]
    Atan2,
    #[strum(serialize = "==")]
    Eql,
    #[strum(serialize = "!=")]
    Neq,
    #[strum(serialize = ">")]
    Gtr,
    #[strum(serialize = "<")]
    Lss,
    #[strum(serialize = ">=")]
    Gte,
    #[strum(serialize = "<=")]
    Lte,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "unless")]
    Unless,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And | BinaryOp::Unless => 2,
            BinaryOp::Eql
            | BinaryOp::Neq
            | BinaryOp::Gtr
            | BinaryOp::Lss
            | BinaryOp::Gte
            | BinaryOp::Lte => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Atan2 => 5,
            BinaryOp::Pow => 6,
        }
    }

    pub fn is_right_assoc(&self) -> bool {
        matches!(self, BinaryOp::Pow)
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 3
    }

    pub fn is_set_operator(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Unless)
    }

    /// Keyword operators spelled as identifiers
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "and" => Some(BinaryOp::And),
            "or" => Some(BinaryOp::Or),
            "unless" => Some(BinaryOp::Unless),
            "atan2" => Some(BinaryOp::Atan2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cardinality {
    OneToOne,
    ManyToOne(Vec<String>),
    OneToMany(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatching {
    /// `on` when true, `ignoring` otherwise
    pub on: bool,
    pub labels: Vec<String>,
    pub card: Cardinality,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub return_bool: bool,
    pub matching: Option<VectorMatching>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    pub expr: Box<Expr>,
}

impl Expr {
    /// Visit this node and its children in pre-order, left to right
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        visit(self);
        match self {
            Expr::Number(_)
            | Expr::String(_)
            | Expr::VectorSelector(_)
            | Expr::MatrixSelector(_) => {}
            Expr::Subquery(sq) => sq.expr.walk(visit),
            Expr::Call(call) => call.args.iter().for_each(|arg| arg.walk(visit)),
            Expr::Aggregate(agg) => {
                if let Some(param) = &agg.param {
                    param.walk(visit);
                }
                agg.expr.walk(visit);
            }
            Expr::Binary(bin) => {
                bin.lhs.walk(visit);
                bin.rhs.walk(visit);
            }
            Expr::Unary(unary) => unary.expr.walk(visit),
            Expr::Paren(inner) => inner.walk(visit),
        }
    }
}

/// Quote a string the way PromQL literals are written
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}

fn join_labels(labels: &[String]) -> String {
    labels.join(", ")
}

impl fmt::Display for TimeModifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.at {
            Some(AtModifier::Timestamp(ts)) => write!(f, " @ {:.3}", ts)?,
            Some(AtModifier::Start) => f.write_str(" @ start()")?,
            Some(AtModifier::End) => f.write_str(" @ end()")?,
            None => {}
        }
        if let Some(offset) = self.offset {
            write!(f, " offset {}", offset)?;
        }
        Ok(())
    }
}

impl VectorSelector {
    fn fmt_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rest: Vec<String> = self
            .matchers
            .iter()
            .filter(|m| {
                // The leading name matcher is already spelled out as the metric name
                !(self.name.is_some()
                    && m.is_metric_name()
                    && Some(m.value.as_str()) == self.name.as_deref())
            })
            .map(|m| m.to_string())
            .collect();

        if let Some(name) = &self.name {
            f.write_str(name)?;
            if rest.is_empty() {
                return Ok(());
            }
        }
        write!(f, "{{{}}}", rest.join(", "))
    }
}

impl fmt::Display for VectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_body(f)?;
        write!(f, "{}", self.modifiers)
    }
}

impl fmt::Display for MatrixSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.vector.fmt_body(f)?;
        write!(f, "[{}]{}", self.range, self.vector.modifiers)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => f.write_str(&format_number(*v)),
            Expr::String(s) => f.write_str(&quote(s)),
            Expr::VectorSelector(vs) => write!(f, "{}", vs),
            Expr::MatrixSelector(ms) => write!(f, "{}", ms),
            Expr::Subquery(sq) => {
                write!(f, "{}[{}:", sq.expr, sq.range)?;
                if let Some(step) = sq.step {
                    write!(f, "{}", step)?;
                }
                write!(f, "]{}", sq.modifiers)
            }
            Expr::Call(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", call.func, args.join(", "))
            }
            Expr::Aggregate(agg) => {
                write!(f, "{}", agg.op)?;
                if let Some(grouping) = &agg.grouping {
                    let keyword = if grouping.without { "without" } else { "by" };
                    write!(f, " {} ({}) ", keyword, join_labels(&grouping.labels))?;
                }
                match &agg.param {
                    Some(param) => write!(f, "({}, {})", param, agg.expr),
                    None => write!(f, "({})", agg.expr),
                }
            }
            Expr::Binary(bin) => {
                write!(f, "{} {}", bin.lhs, bin.op)?;
                if bin.return_bool {
                    f.write_str(" bool")?;
                }
                if let Some(matching) = &bin.matching {
                    let keyword = if matching.on { "on" } else { "ignoring" };
                    write!(f, " {} ({})", keyword, join_labels(&matching.labels))?;
                    match &matching.card {
                        Cardinality::OneToOne => {}
                        Cardinality::ManyToOne(labels) => {
                            write!(f, " group_left ({})", join_labels(labels))?
                        }
                        Cardinality::OneToMany(labels) => {
                            write!(f, " group_right ({})", join_labels(labels))?
                        }
                    }
                }
                write!(f, " {}", bin.rhs)
            }
            Expr::Unary(unary) => {
                let sign = match unary.op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                };
                write!(f, "{}{}", sign, unary.expr)
            }
            Expr::Paren(inner) => write!(f, "({})", inner),
        }
    }
}
