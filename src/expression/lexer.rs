// SPDX-License-Identifier: MIT

//! Lexer for normalized expressions
//!
//! Every token is checked against the transition table as soon as it is
//! produced, so malformed input fails here with the offending position
//! instead of reaching the parser.

use regex::Regex;

use super::token::{lexer_state, Token, TokenKind, TokenValue};
use super::value::parse_time;
use crate::pipeline::error::ExpressionError;

type Result<T> = std::result::Result<T, ExpressionError>;

const TWO_CHAR_COMPARATORS: [&str; 6] = ["==", "!=", "<=", ">=", "=~", "!~"];

/// Tokenize a normalized expression
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let tokens = Lexer::new(input, 0).run()?;
    if tokens.is_empty() {
        return Err(ExpressionError::syntax(0, "empty expression"));
    }
    Ok(tokens)
}

struct Lexer<'a> {
    input: &'a str,
    /// Offset of `input` inside the full expression, for error positions
    offset: usize,
    cursor: usize,
    tokens: Vec<Token>,
    depth: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, offset: usize) -> Self {
        Self {
            input,
            offset,
            cursor: 0,
            tokens: Vec::new(),
            depth: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(token) = self.next_token()? {
            self.check_transition(&token)?;
            match token.kind {
                TokenKind::Clause => self.depth += 1,
                TokenKind::ClauseClose => {
                    if self.depth == 0 {
                        return Err(ExpressionError::syntax(token.position, "unbalanced ')'"));
                    }
                    self.depth -= 1;
                }
                _ => {}
            }
            self.tokens.push(token);
        }

        let end = self.offset + self.input.len();
        if self.depth > 0 {
            return Err(ExpressionError::syntax(end, "unbalanced '('"));
        }
        if let Some(last) = self.tokens.last() {
            if !lexer_state(Some(last.kind)).can_end {
                return Err(ExpressionError::syntax(
                    end,
                    format!("expression cannot end with {}", last.kind),
                ));
            }
        }
        Ok(self.tokens)
    }

    fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    fn check_transition(&self, token: &Token) -> Result<()> {
        let state = lexer_state(self.last_kind());
        if state.can_transition_to(token.kind) {
            return Ok(());
        }
        let message = match state.kind {
            Some(kind) => format!("{} cannot follow {}", token.kind, kind),
            None => format!("expression cannot start with {}", token.kind),
        };
        Err(ExpressionError::syntax(token.position, message))
    }

    fn peek(&self) -> Option<char> {
        self.input[self.cursor..].chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.cursor += c.len_utf8();
        }
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.cursor;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.cursor += c.len_utf8();
        }
        &self.input[start..self.cursor]
    }

    fn token(&self, kind: TokenKind, value: TokenValue, start: usize) -> Token {
        Token::new(kind, value, self.offset + start)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        let start = self.cursor;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            c if c.is_ascii_digit() => self.numeric(start)?,
            '\'' => self.quoted(start)?,
            '[' => self.variable(start)?,
            '(' => self.clause_or_array(start)?,
            ')' => {
                self.cursor += 1;
                self.token(TokenKind::ClauseClose, TokenValue::None, start)
            }
            ',' => {
                self.cursor += 1;
                self.token(TokenKind::Separator, TokenValue::None, start)
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '@' => self.word(start),
            _ => self.operator(start)?,
        };
        Ok(Some(token))
    }

    fn numeric(&mut self, start: usize) -> Result<Token> {
        let text = self.take_while(|c| c.is_ascii_digit() || c == '.');
        let number = text.parse::<f64>().map_err(|_| {
            ExpressionError::syntax(self.offset + start, format!("invalid number '{}'", text))
        })?;
        Ok(self.token(TokenKind::Numeric, TokenValue::Number(number), start))
    }

    fn quoted(&mut self, start: usize) -> Result<Token> {
        let after_regex_op = self
            .tokens
            .last()
            .is_some_and(|t| t.kind == TokenKind::Comparator && matches!(t.text(), Some("=~" | "!~")));

        self.cursor += 1;
        let mut content = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ExpressionError::syntax(
                    self.offset + start,
                    "unterminated string literal",
                ));
            };
            self.cursor += c.len_utf8();
            match c {
                '\'' => break,
                '\\' => match self.peek() {
                    Some('\'') => {
                        self.cursor += 1;
                        content.push('\'');
                    }
                    // Patterns keep every other escape for the regex engine
                    Some(escaped) if after_regex_op => {
                        self.cursor += escaped.len_utf8();
                        content.push('\\');
                        content.push(escaped);
                    }
                    Some('\\') => {
                        self.cursor += 1;
                        content.push('\\');
                    }
                    _ => content.push('\\'),
                },
                other => content.push(other),
            }
        }

        if after_regex_op {
            let pattern = Regex::new(&content).map_err(|e| {
                ExpressionError::syntax(self.offset + start, format!("invalid regex: {}", e))
            })?;
            return Ok(self.token(TokenKind::Pattern, TokenValue::Pattern(pattern), start));
        }

        if let Some(time) = parse_time(&content) {
            return Ok(self.token(TokenKind::Time, TokenValue::Time(time, content), start));
        }
        Ok(self.token(TokenKind::String, TokenValue::Text(content), start))
    }

    fn variable(&mut self, start: usize) -> Result<Token> {
        self.cursor += 1;
        let path = self.take_while(|c| c != ']');
        if self.peek() != Some(']') {
            return Err(ExpressionError::syntax(
                self.offset + start,
                "unterminated field reference",
            ));
        }
        self.cursor += 1;
        let path = path.trim();
        if path.is_empty() {
            return Err(ExpressionError::syntax(self.offset + start, "empty field reference"));
        }
        Ok(self.token(
            TokenKind::Variable,
            TokenValue::Text(path.to_string()),
            start,
        ))
    }

    fn word(&mut self, start: usize) -> Token {
        let word = self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@'));
        match word {
            "true" => self.token(TokenKind::Boolean, TokenValue::Boolean(true), start),
            "false" => self.token(TokenKind::Boolean, TokenValue::Boolean(false), start),
            "in" => self.token(TokenKind::Comparator, TokenValue::Text("in".to_string()), start),
            name => {
                self.skip_whitespace();
                let kind = if self.peek() == Some('(') {
                    TokenKind::Function
                } else {
                    TokenKind::Variable
                };
                self.token(kind, TokenValue::Text(name.to_string()), start)
            }
        }
    }

    /// A `(` opens a clause, unless the group holds a top-level comma and is
    /// not a function's argument list, in which case the whole group is one
    /// ARRAY token
    fn clause_or_array(&mut self, start: usize) -> Result<Token> {
        if self.last_kind() != Some(TokenKind::Function) {
            if let Some((close, true)) = find_group_end(self.rest()) {
                let inner_start = start + 1;
                let inner = &self.input[inner_start..start + close];
                let items = array_items(inner, self.offset + inner_start)?;
                self.cursor = start + close + 1;
                return Ok(self.token(TokenKind::Array, TokenValue::Array(items), start));
            }
        }
        self.cursor += 1;
        Ok(self.token(TokenKind::Clause, TokenValue::None, start))
    }

    fn operator(&mut self, start: usize) -> Result<Token> {
        let rest = self.rest();
        let two = rest.get(..2).unwrap_or_default();

        let (kind, symbol) = if TWO_CHAR_COMPARATORS.contains(&two) {
            (TokenKind::Comparator, two)
        } else if two == "&&" || two == "||" {
            (TokenKind::LogicalOp, two)
        } else {
            let one = rest.get(..1).unwrap_or_default();
            match one {
                "<" | ">" => (TokenKind::Comparator, one),
                "!" => (TokenKind::Prefix, one),
                "-" if !self.after_operand() => (TokenKind::Prefix, one),
                "+" | "-" | "*" | "/" | "%" => (TokenKind::Modifier, one),
                _ => {
                    let c = self.peek().unwrap_or_default();
                    return Err(ExpressionError::syntax(
                        self.offset + start,
                        format!("unexpected character '{}'", c),
                    ));
                }
            }
        };

        self.cursor += symbol.len();
        Ok(self.token(kind, TokenValue::Text(symbol.to_string()), start))
    }

    fn after_operand(&self) -> bool {
        matches!(
            self.last_kind(),
            Some(
                TokenKind::Numeric
                    | TokenKind::Boolean
                    | TokenKind::String
                    | TokenKind::Time
                    | TokenKind::Variable
                    | TokenKind::ClauseClose
            )
        )
    }
}

/// Find the `)` matching the `(` at the start of `text`. Returns its byte
/// offset and whether a comma appears at the group's top level.
fn find_group_end(text: &str) -> Option<(usize, bool)> {
    let mut depth = 0usize;
    let mut has_comma = false;
    let mut in_string = false;
    let mut in_field = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '\'' => in_string = false,
                _ => {}
            }
            continue;
        }
        if in_field {
            in_field = c != ']';
            continue;
        }
        match c {
            '\'' => in_string = true,
            '[' => in_field = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((i, has_comma));
                }
            }
            ',' if depth == 1 => has_comma = true,
            _ => {}
        }
    }
    None
}

/// Lex the inside of an array group: each comma-separated item must be a
/// single operand token, or a negative number
fn array_items(inner: &str, offset: usize) -> Result<Vec<Token>> {
    let mut tokens = Lexer::new(inner, offset).run()?.into_iter().peekable();
    let mut items = Vec::new();
    let mut expect_item = true;

    while let Some(token) = tokens.next() {
        let position = token.position;
        match (expect_item, token.kind) {
            (
                true,
                TokenKind::Numeric
                | TokenKind::Boolean
                | TokenKind::String
                | TokenKind::Time
                | TokenKind::Variable,
            ) => {
                items.push(token);
                expect_item = false;
            }
            (true, TokenKind::Prefix) if token.text() == Some("-") => {
                match tokens.next_if(|next| next.kind == TokenKind::Numeric) {
                    Some(Token {
                        value: TokenValue::Number(n),
                        ..
                    }) => {
                        items.push(Token::new(TokenKind::Numeric, TokenValue::Number(-n), position));
                        expect_item = false;
                    }
                    _ => {
                        return Err(ExpressionError::syntax(
                            position,
                            "'-' in an array must precede a number",
                        ))
                    }
                }
            }
            (false, TokenKind::Separator) => expect_item = true,
            _ => {
                return Err(ExpressionError::syntax(
                    position,
                    "array items must be single literals or field references",
                ))
            }
        }
    }

    if expect_item {
        return Err(ExpressionError::syntax(
            offset + inner.len(),
            "array cannot end with ','",
        ));
    }
    Ok(items)
}
