use super::ast::*;
use super::duration::PromDuration;
use super::lexer::{Lexer, Token, TokenKind};
use super::matcher::{LabelMatcher, MatchOp, METRIC_NAME_LABEL};
use super::ParseError;
use std::str::FromStr;

const FUNCTIONS: &[&str] = &[
    "abs", "absent", "absent_over_time", "acos", "acosh", "asin", "asinh", "atan", "atanh",
    "avg_over_time", "ceil", "changes", "clamp", "clamp_max", "clamp_min", "cos", "cosh",
    "count_over_time", "day_of_month", "day_of_week", "day_of_year", "days_in_month", "deg",
    "delta", "deriv", "double_exponential_smoothing", "exp", "floor", "histogram_avg",
    "histogram_count", "histogram_fraction", "histogram_quantile", "histogram_stddev",
    "histogram_stdvar", "histogram_sum", "holt_winters", "hour", "idelta", "increase", "irate",
    "label_join", "label_replace", "last_over_time", "ln", "log10", "log2", "mad_over_time",
    "max_over_time", "min_over_time", "minute", "month", "pi", "predict_linear",
    "present_over_time", "quantile_over_time", "rad", "rate", "resets", "round", "scalar", "sgn",
    "sin", "sinh", "sort", "sort_by_label", "sort_by_label_desc", "sort_desc", "sqrt",
    "stddev_over_time", "stdvar_over_time", "sum_over_time", "tan", "tanh", "time", "timestamp",
    "vector", "year",
];

/// Deepest nesting of sub-expressions the parser descends into
const MAX_DEPTH: usize = 128;

const KEYWORDS: &[&str] = &[
    "by", "without", "on", "ignoring", "group_left", "group_right", "bool", "offset", "and", "or",
    "unless", "atan2",
];

/// Parse a PromQL expression into its syntax tree
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    if parser.peek() == &TokenKind::Eof {
        return Err(ParseError::new(0, "no expression found in input"));
    }

    let expr = parser.parse_expr()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        other => Err(ParseError::new(
            parser.current().pos,
            format!("unexpected {} after expression", describe(other)),
        )),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Identifier(name) => format!("identifier {:?}", name),
        TokenKind::Number(v) => format!("number {}", v),
        TokenKind::Duration(d) => format!("duration {}", d),
        TokenKind::Str(s) => format!("string {:?}", s),
        TokenKind::Op(op) => format!("operator {:?}", op.to_string()),
        TokenKind::Eof => "end of input".to_string(),
        other => format!("{:?}", other),
    }
}

impl Parser {
    fn current(&self) -> &Token {
        // tokenize always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_ahead(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.current().kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError::new(self.current().pos, message))
    }

    fn unexpected<T>(&self, context: &str) -> Result<T, ParseError> {
        self.error(format!("unexpected {} in {}", describe(self.peek()), context))
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<(), ParseError> {
        if *self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            self.unexpected(context)
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Identifier(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(1)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        match self.peek() {
            TokenKind::Op(op) => Some(*op),
            TokenKind::Identifier(word) => BinaryOp::from_keyword(word),
            _ => None,
        }
    }

    /// Fails once `extra` more levels on top of the current recursion would exceed the limit
    fn check_depth(&self, extra: usize) -> Result<(), ParseError> {
        if self.depth + extra >= MAX_DEPTH {
            return self.error("expression nested too deeply");
        }
        Ok(())
    }

    /// Every nested sub-expression passes through here, so this bounds recursion
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        self.check_depth(0)?;
        self.depth += 1;
        let result = self.parse_binary_ops(min_prec);
        self.depth -= 1;
        result
    }

    fn parse_binary_ops(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        // Left-associative chains deepen the tree without recursing
        let mut chained = 0;

        while let Some(op) = self.peek_binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            chained += 1;
            self.check_depth(chained)?;
            self.advance();

            let return_bool = if self.peek_keyword("bool") {
                if !op.is_comparison() {
                    return self.error("bool modifier can only be used on comparison operators");
                }
                self.advance();
                true
            } else {
                false
            };

            let matching = self.parse_vector_matching(op)?;
            let next_min = if op.is_right_assoc() { prec } else { prec + 1 };
            let rhs = self.parse_binary(next_min)?;

            lhs = Expr::Binary(Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                return_bool,
                matching,
            });
        }

        Ok(lhs)
    }

    fn parse_vector_matching(&mut self, op: BinaryOp) -> Result<Option<VectorMatching>, ParseError> {
        let on = if self.peek_keyword("on") {
            true
        } else if self.peek_keyword("ignoring") {
            false
        } else {
            return Ok(None);
        };
        self.advance();
        let labels = self.parse_label_list()?;

        let card = if self.peek_keyword("group_left") || self.peek_keyword("group_right") {
            if op.is_set_operator() {
                return self.error(format!("no grouping allowed for \"{}\" operation", op));
            }
            let left = self.peek_keyword("group_left");
            self.advance();
            let include = if *self.peek() == TokenKind::LeftParen {
                self.parse_label_list()?
            } else {
                Vec::new()
            };
            if left {
                Cardinality::ManyToOne(include)
            } else {
                Cardinality::OneToMany(include)
            }
        } else {
            Cardinality::OneToOne
        };

        Ok(Some(VectorMatching { on, labels, card }))
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Op(BinaryOp::Sub) => UnaryOp::Neg,
            TokenKind::Op(BinaryOp::Add) => UnaryOp::Pos,
            _ => return self.parse_postfix(),
        };
        self.advance();

        // Only `^` binds tighter than a unary sign
        let operand = self.parse_binary(BinaryOp::Pow.precedence())?;
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Number(v)) => Expr::Number(-v),
            (UnaryOp::Pos, Expr::Number(v)) => Expr::Number(v),
            (op, expr) => Expr::Unary(Unary {
                op,
                expr: Box::new(expr),
            }),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        let mut wrapped = 0;

        loop {
            match self.peek() {
                TokenKind::LeftBracket => {
                    wrapped += 1;
                    self.check_depth(wrapped)?;
                    expr = self.parse_range(expr)?;
                }
                TokenKind::At => {
                    self.advance();
                    let at = self.parse_at()?;
                    let modifiers = self.modifiers_mut(&mut expr, "@")?;
                    if modifiers.at.is_some() {
                        return self.error("@ <timestamp> may not be set multiple times");
                    }
                    modifiers.at = Some(at);
                }
                TokenKind::Identifier(word) if word.eq_ignore_ascii_case("offset") => {
                    self.advance();
                    let negative = if *self.peek() == TokenKind::Op(BinaryOp::Sub) {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    let duration = self.expect_duration("offset")?;
                    let offset = if negative { -duration } else { duration };
                    let modifiers = self.modifiers_mut(&mut expr, "offset")?;
                    if modifiers.offset.is_some() {
                        return self.error("offset may not be set multiple times");
                    }
                    modifiers.offset = Some(offset);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn modifiers_mut<'e>(
        &self,
        expr: &'e mut Expr,
        modifier: &str,
    ) -> Result<&'e mut TimeModifiers, ParseError> {
        match expr {
            Expr::VectorSelector(vs) => Ok(&mut vs.modifiers),
            Expr::MatrixSelector(ms) => Ok(&mut ms.vector.modifiers),
            Expr::Subquery(sq) => Ok(&mut sq.modifiers),
            _ => self.error(format!(
                "{} modifier must be preceded by an instant vector selector or range vector selector or a subquery",
                modifier
            )),
        }
    }

    fn parse_at(&mut self) -> Result<AtModifier, ParseError> {
        match self.advance() {
            TokenKind::Number(ts) if ts.is_finite() => Ok(AtModifier::Timestamp(ts)),
            TokenKind::Op(BinaryOp::Sub) => match self.advance() {
                TokenKind::Number(ts) if ts.is_finite() => Ok(AtModifier::Timestamp(-ts)),
                _ => self.error("invalid @ timestamp"),
            },
            TokenKind::Identifier(word) if word == "start" || word == "end" => {
                self.expect(TokenKind::LeftParen, "@ modifier")?;
                self.expect(TokenKind::RightParen, "@ modifier")?;
                Ok(if word == "start" {
                    AtModifier::Start
                } else {
                    AtModifier::End
                })
            }
            _ => self.error("@ modifier must be followed by a timestamp, start() or end()"),
        }
    }

    fn expect_duration(&mut self, context: &str) -> Result<PromDuration, ParseError> {
        match self.peek().clone() {
            TokenKind::Duration(d) => {
                self.advance();
                Ok(d)
            }
            _ => self.unexpected(context),
        }
    }

    fn parse_range(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LeftBracket, "range")?;
        let range = self.expect_duration("range")?;

        if *self.peek() == TokenKind::Colon {
            self.advance();
            let step = match self.peek() {
                TokenKind::Duration(_) => Some(self.expect_duration("subquery step")?),
                _ => None,
            };
            self.expect(TokenKind::RightBracket, "subquery")?;
            return Ok(Expr::Subquery(Subquery {
                expr: Box::new(expr),
                range,
                step,
                modifiers: TimeModifiers::default(),
            }));
        }

        self.expect(TokenKind::RightBracket, "range")?;
        match expr {
            Expr::VectorSelector(vector) => {
                if !vector.modifiers.is_empty() {
                    return self.error("no offset or @ modifiers allowed before range");
                }
                Ok(Expr::MatrixSelector(MatrixSelector { vector, range }))
            }
            _ => self.error("ranges only allowed for vector selectors"),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            TokenKind::Number(v) => {
                self.advance();
                Ok(Expr::Number(v))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::String(s))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RightParen, "parenthesized expression")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            TokenKind::LeftBrace => self.parse_selector(None),
            TokenKind::Identifier(name) => self.parse_identifier_expr(name),
            _ => self.unexpected("expression"),
        }
    }

    fn parse_identifier_expr(&mut self, name: String) -> Result<Expr, ParseError> {
        let next = self.peek_ahead(1).clone();
        let grouping_follows = matches!(
            &next,
            TokenKind::Identifier(w) if w.eq_ignore_ascii_case("by") || w.eq_ignore_ascii_case("without")
        );

        if let Ok(op) = AggregateOp::from_str(&name.to_ascii_lowercase()) {
            if next == TokenKind::LeftParen || grouping_follows {
                return self.parse_aggregate(op);
            }
        }

        if next == TokenKind::LeftParen {
            if !FUNCTIONS.contains(&name.as_str()) {
                return self.error(format!("unknown function with name {:?}", name));
            }
            return self.parse_call(name);
        }

        if KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
            return self.unexpected("expression");
        }

        self.advance();
        self.parse_selector(Some(name))
    }

    fn parse_call(&mut self, func: String) -> Result<Expr, ParseError> {
        self.advance();
        self.expect(TokenKind::LeftParen, "function call")?;

        let mut args = Vec::new();
        if *self.peek() != TokenKind::RightParen {
            loop {
                args.push(self.parse_expr()?);
                match self.peek() {
                    TokenKind::Comma => {
                        self.advance();
                    }
                    TokenKind::RightParen => break,
                    _ => return self.unexpected("function call arguments"),
                }
            }
        }
        self.expect(TokenKind::RightParen, "function call")?;

        Ok(Expr::Call(Call { func, args }))
    }

    fn parse_aggregate(&mut self, op: AggregateOp) -> Result<Expr, ParseError> {
        self.advance();

        let mut grouping = self.parse_grouping()?;
        self.expect(TokenKind::LeftParen, "aggregation")?;

        let param = if op.takes_param() {
            let param = self.parse_expr()?;
            self.expect(TokenKind::Comma, "aggregation parameter")?;
            Some(Box::new(param))
        } else {
            None
        };
        let expr = self.parse_expr()?;
        self.expect(TokenKind::RightParen, "aggregation")?;

        if let Some(trailing) = self.parse_grouping()? {
            if grouping.is_some() {
                return self.error("aggregation grouping may only be given once");
            }
            grouping = Some(trailing);
        }

        Ok(Expr::Aggregate(Aggregate {
            op,
            param,
            expr: Box::new(expr),
            grouping,
        }))
    }

    fn parse_grouping(&mut self) -> Result<Option<Grouping>, ParseError> {
        let without = if self.peek_keyword("by") {
            false
        } else if self.peek_keyword("without") {
            true
        } else {
            return Ok(None);
        };
        self.advance();
        let labels = self.parse_label_list()?;
        Ok(Some(Grouping { without, labels }))
    }

    fn parse_label_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LeftParen, "label list")?;
        let mut labels = Vec::new();
        loop {
            match self.advance() {
                TokenKind::RightParen => return Ok(labels),
                TokenKind::Identifier(label) | TokenKind::Str(label) => {
                    labels.push(label);
                    match self.advance() {
                        TokenKind::Comma => {}
                        TokenKind::RightParen => return Ok(labels),
                        _ => return self.error("expected ',' or ')' in label list"),
                    }
                }
                _ => return self.error("expected label name in label list"),
            }
        }
    }

    fn parse_selector(&mut self, name: Option<String>) -> Result<Expr, ParseError> {
        let mut matchers = Vec::new();
        if let Some(name) = &name {
            matchers.push(LabelMatcher::equal(METRIC_NAME_LABEL, name.clone()));
        }

        if *self.peek() == TokenKind::LeftBrace {
            self.advance();
            loop {
                let label = match self.advance() {
                    TokenKind::RightBrace => break,
                    TokenKind::Identifier(label) | TokenKind::Str(label) => label,
                    _ => return self.error("expected label name in label matchers"),
                };

                let op = match self.advance() {
                    TokenKind::Assign => MatchOp::Equal,
                    TokenKind::Op(BinaryOp::Neq) => MatchOp::NotEqual,
                    TokenKind::RegexMatch => MatchOp::RegexMatch,
                    TokenKind::RegexNoMatch => MatchOp::RegexNoMatch,
                    _ => return self.error(format!("expected label matching operator after {:?}", label)),
                };

                let value = match self.advance() {
                    TokenKind::Str(value) => value,
                    _ => return self.error(format!("expected quoted label value for {:?}", label)),
                };

                if name.is_some() && label == METRIC_NAME_LABEL {
                    return self.error("metric name must not be set twice");
                }

                let matcher = LabelMatcher::new(op, label, value)
                    .map_err(|e| ParseError::new(self.current().pos, format!("invalid regular expression: {}", e)))?;
                matchers.push(matcher);

                match self.advance() {
                    TokenKind::Comma => {}
                    TokenKind::RightBrace => break,
                    _ => return self.error("expected ',' or '}' in label matchers"),
                }
            }
        }

        if name.is_none() && matchers.iter().all(|m| m.matches("")) {
            return self.error("vector selector must contain at least one non-empty matcher");
        }

        Ok(Expr::VectorSelector(VectorSelector {
            name,
            matchers,
            modifiers: TimeModifiers::default(),
        }))
    }
}
