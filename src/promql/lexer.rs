use super::ast::BinaryOp;
use super::duration::{is_duration_unit_start, parse_duration, PromDuration};
use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    Duration(PromDuration),
    Str(String),
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    At,
    Assign,
    RegexMatch,
    RegexNoMatch,
    Op(BinaryOp),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the expression
    pub pos: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    idx: usize,
    bracket_depth: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            idx: 0,
            bracket_depth: 0,
        }
    }

    /// Tokenize the whole input, ending with `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.idx)
            .map(|(pos, _)| *pos)
            .unwrap_or(self.input.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.idx += 1;
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.idx += 1;
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace_and_comments();
        let pos = self.offset();

        let c = match self.bump() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    pos,
                })
            }
        };

        let kind = match c {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => {
                self.bracket_depth += 1;
                TokenKind::LeftBracket
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RightBracket
            }
            ',' => TokenKind::Comma,
            '@' => TokenKind::At,
            ':' if self.bracket_depth > 0 => TokenKind::Colon,
            '+' => TokenKind::Op(BinaryOp::Add),
            '-' => TokenKind::Op(BinaryOp::Sub),
            '*' => TokenKind::Op(BinaryOp::Mul),
            '/' => TokenKind::Op(BinaryOp::Div),
            '%' => TokenKind::Op(BinaryOp::Mod),
            '^' => TokenKind::Op(BinaryOp::Pow),
            '=' => match self.peek() {
                Some('=') => {
                    self.idx += 1;
                    TokenKind::Op(BinaryOp::Eql)
                }
                Some('~') => {
                    self.idx += 1;
                    TokenKind::RegexMatch
                }
                _ => TokenKind::Assign,
            },
            '!' => match self.bump() {
                Some('=') => TokenKind::Op(BinaryOp::Neq),
                Some('~') => TokenKind::RegexNoMatch,
                _ => return Err(ParseError::new(pos, "unexpected character after '!'")),
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.idx += 1;
                    TokenKind::Op(BinaryOp::Gte)
                } else {
                    TokenKind::Op(BinaryOp::Gtr)
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.idx += 1;
                    TokenKind::Op(BinaryOp::Lte)
                } else {
                    TokenKind::Op(BinaryOp::Lss)
                }
            }
            '"' | '\'' => TokenKind::Str(self.lex_quoted(c, pos)?),
            '`' => TokenKind::Str(self.lex_raw(pos)?),
            c if c.is_ascii_digit() || (c == '.' && self.peek().is_some_and(|n| n.is_ascii_digit())) => {
                self.idx -= 1;
                self.lex_number_or_duration(pos)?
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
                self.idx -= 1;
                self.lex_identifier()
            }
            other => {
                return Err(ParseError::new(
                    pos,
                    format!("unexpected character: {:?}", other),
                ))
            }
        };

        Ok(Token { kind, pos })
    }

    fn lex_quoted(&mut self, quote: char, start: usize) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(ParseError::new(start, "unterminated quoted string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| ParseError::new(start, "unterminated quoted string"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        'a' => '\u{07}',
                        'b' => '\u{08}',
                        'f' => '\u{0c}',
                        'v' => '\u{0b}',
                        '\\' | '"' | '\'' => escaped,
                        other => {
                            return Err(ParseError::new(
                                self.offset(),
                                format!("unknown escape sequence '\\{}'", other),
                            ))
                        }
                    });
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_raw(&mut self, start: usize) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::new(start, "unterminated raw string")),
                Some('`') => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let start = self.offset();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || (c == ':' && self.bracket_depth == 0) {
                self.idx += 1;
            } else {
                break;
            }
        }
        let word = &self.input[start..self.offset()];

        match word.to_ascii_lowercase().as_str() {
            "inf" => TokenKind::Number(f64::INFINITY),
            "nan" => TokenKind::Number(f64::NAN),
            _ => TokenKind::Identifier(word.to_string()),
        }
    }

    fn lex_number_or_duration(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        // Hexadecimal literal
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.idx += 2;
            let digits_start = self.offset();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.idx += 1;
            }
            let digits = &self.input[digits_start..self.offset()];
            return i64::from_str_radix(digits, 16)
                .map(|v| TokenKind::Number(v as f64))
                .map_err(|_| ParseError::new(start, format!("bad number {:?}", digits)));
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.idx += 1;
        }

        // Duration: digits followed by a unit, possibly compound (1h30m)
        if self.peek().is_some_and(is_duration_unit_start) {
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_digit() || c.is_ascii_alphabetic())
            {
                self.idx += 1;
            }
            let text = &self.input[start..self.offset()];
            return parse_duration(text)
                .map(TokenKind::Duration)
                .map_err(|e| ParseError::new(start, e));
        }

        if self.peek() == Some('.') {
            self.idx += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.idx += 1;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.idx += digit_at;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.idx += 1;
                }
            }
        }

        let text = &self.input[start..self.offset()];
        if self
            .peek()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return Err(ParseError::new(
                start,
                format!("bad number or duration syntax: {:?}", text),
            ));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ParseError::new(start, format!("bad number {:?}", text)))
    }
}
