// SPDX-License-Identifier: MIT

//! Surface syntax translator
//!
//! Rewrites the conditional syntax found in stage configuration into the
//! normalized form read by the lexer:
//! - `[a][b]` becomes `[a.b]`
//! - double-quoted strings become single-quoted
//! - `/re/` after `=~` / `!~` becomes `'re'`
//! - `and` / `or` / `not` become `&&` / `||` / `!`
//! - `X not in L` becomes `! ( X in L )`
//!
//! Tokens are re-emitted separated by a single space.

use crate::pipeline::error::ExpressionError;

type Result<T> = std::result::Result<T, ExpressionError>;

#[derive(Debug, Clone, PartialEq)]
struct SurfaceToken {
    text: String,
    word: bool,
    position: usize,
}

impl SurfaceToken {
    fn symbol(text: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            word: false,
            position,
        }
    }

    fn word(text: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            word: true,
            position,
        }
    }

    fn is_word(&self, word: &str) -> bool {
        self.word && self.text == word
    }
}

const TWO_CHAR_OPERATORS: [&str; 8] = ["==", "!=", "<=", ">=", "=~", "!~", "&&", "||"];
const ONE_CHAR_OPERATORS: [char; 8] = ['<', '>', '!', '+', '-', '*', '/', '%'];

/// Translate a surface expression into normalized form
pub fn translate(input: &str) -> Result<String> {
    let tokens = scan(input)?;
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());

    // Input paren depths at which a synthetic `)` must be emitted
    let mut closers: Vec<usize> = Vec::new();
    // Close the `not in` wrapper right after the next single-token operand
    let mut close_after_operand = 0usize;
    let mut depth = 0usize;

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];

        if token.is_word("not") && tokens.get(i + 1).is_some_and(|t| t.is_word("in")) {
            let start = operand_start(&out).ok_or_else(|| {
                ExpressionError::syntax(token.position, "'not in' requires a left operand")
            })?;
            out.insert(start, "(".to_string());
            out.insert(start, "!".to_string());
            out.push("in".to_string());
            i += 2;

            match tokens.get(i) {
                None => {
                    return Err(ExpressionError::syntax(
                        input.len(),
                        "'not in' requires a right operand",
                    ))
                }
                Some(next) if next.text == "(" => closers.push(depth),
                Some(next)
                    if next.word && tokens.get(i + 1).is_some_and(|t| t.text == "(") =>
                {
                    closers.push(depth)
                }
                Some(_) => close_after_operand += 1,
            }
            continue;
        }

        let text = match token.text.as_str() {
            "and" if token.word => "&&".to_string(),
            "or" if token.word => "||".to_string(),
            "not" if token.word => "!".to_string(),
            other => other.to_string(),
        };

        match text.as_str() {
            "(" => {
                depth += 1;
                out.push(text);
            }
            ")" => {
                depth -= 1;
                out.push(text);
                while closers.last() == Some(&depth) {
                    closers.pop();
                    out.push(")".to_string());
                }
            }
            _ => {
                let is_function = token.word && tokens.get(i + 1).is_some_and(|t| t.text == "(");
                out.push(text);
                if !is_function && close_after_operand > 0 && ends_operand(out.last()) {
                    close_after_operand -= 1;
                    out.push(")".to_string());
                }
            }
        }
        i += 1;
    }

    Ok(out.join(" "))
}

fn is_identifier(text: &str) -> bool {
    text.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '@')
        && !matches!(text, "in" | "true" | "false")
}

fn is_operand(text: &str) -> bool {
    text.starts_with('\'')
        || text.starts_with('[')
        || text.chars().next().is_some_and(|c| c.is_ascii_digit())
        || matches!(text, "true" | "false")
        || is_identifier(text)
}

fn ends_operand(text: Option<&String>) -> bool {
    text.is_some_and(|t| t == ")" || is_operand(t))
}

fn is_modifier(text: &str) -> bool {
    matches!(text, "+" | "-" | "*" | "/" | "%")
}

/// Find where the operand (including an arithmetic chain) ending at the tail
/// of `out` starts
fn operand_start(out: &[String]) -> Option<usize> {
    let mut end = out.len().checked_sub(1)?;
    loop {
        let start = if out[end] == ")" {
            let mut depth = 0usize;
            let mut j = end;
            loop {
                match out[j].as_str() {
                    ")" => depth += 1,
                    "(" => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                j = j.checked_sub(1)?;
            }
            if j > 0 && is_identifier(&out[j - 1]) {
                j - 1
            } else {
                j
            }
        } else if is_operand(&out[end]) {
            end
        } else {
            return None;
        };

        if start >= 1 && is_modifier(&out[start - 1]) {
            if start >= 2 && ends_operand(out.get(start - 2)) {
                end = start - 2;
                continue;
            }
            if out[start - 1] == "-" {
                return Some(start - 1);
            }
        }
        return Some(start);
    }
}

fn scan(input: &str) -> Result<Vec<SurfaceToken>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|(_, c)| *c);
    let pos = |i: usize| chars.get(i).map(|(p, _)| *p).unwrap_or(input.len());

    let mut tokens: Vec<SurfaceToken> = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while let Some(c) = at(i) {
        let start = pos(i);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                let (content, next) = read_quoted(&chars, i + 1, c).ok_or_else(|| {
                    ExpressionError::syntax(start, "unterminated string literal")
                })?;
                let text = if c == '\'' {
                    format!("'{}'", content)
                } else {
                    format!("'{}'", requote(&content.replace("\\\"", "\"")))
                };
                tokens.push(SurfaceToken::symbol(text, start));
                i = next;
            }
            '/' if tokens
                .last()
                .is_some_and(|t| t.text == "=~" || t.text == "!~") =>
            {
                let (content, next) = read_quoted(&chars, i + 1, '/').ok_or_else(|| {
                    ExpressionError::syntax(start, "unterminated regex literal")
                })?;
                if at(next).is_some_and(|n| !n.is_whitespace() && n != ')') {
                    return Err(ExpressionError::syntax(
                        pos(next),
                        "unescaped '/' inside regex literal",
                    ));
                }
                let pattern = requote(&content.replace("\\/", "/"));
                tokens.push(SurfaceToken::symbol(format!("'{}'", pattern), start));
                i = next;
            }
            '[' => {
                let mut segments = Vec::new();
                while at(i) == Some('[') {
                    let seg_start = i + 1;
                    let mut j = seg_start;
                    while at(j).is_some_and(|c| c != ']' && c != '[') {
                        j += 1;
                    }
                    if at(j) != Some(']') {
                        return Err(ExpressionError::syntax(
                            start,
                            "unterminated field reference",
                        ));
                    }
                    let segment = input[pos(seg_start)..pos(j)].trim();
                    if segment.is_empty() {
                        return Err(ExpressionError::syntax(pos(seg_start), "empty field reference"));
                    }
                    segments.push(segment.to_string());
                    i = j + 1;
                }
                tokens.push(SurfaceToken::symbol(
                    format!("[{}]", segments.join(".")),
                    start,
                ));
            }
            ']' => return Err(ExpressionError::syntax(start, "unexpected ']'")),
            '(' => {
                depth += 1;
                tokens.push(SurfaceToken::symbol("(", start));
                i += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(ExpressionError::syntax(start, "unbalanced ')'"));
                }
                depth -= 1;
                tokens.push(SurfaceToken::symbol(")", start));
                i += 1;
            }
            ',' => {
                tokens.push(SurfaceToken::symbol(",", start));
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let mut j = i;
                while at(j).is_some_and(|c| c.is_ascii_digit() || c == '.') {
                    j += 1;
                }
                tokens.push(SurfaceToken::symbol(&input[start..pos(j)], start));
                i = j;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '@' => {
                let mut j = i;
                while at(j).is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@')) {
                    j += 1;
                }
                tokens.push(SurfaceToken::word(&input[start..pos(j)], start));
                i = j;
            }
            _ => {
                let pair: String = [Some(c), at(i + 1)].iter().flatten().collect();
                if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
                    tokens.push(SurfaceToken::symbol(pair, start));
                    i += 2;
                } else if ONE_CHAR_OPERATORS.contains(&c) {
                    tokens.push(SurfaceToken::symbol(c.to_string(), start));
                    i += 1;
                } else {
                    return Err(ExpressionError::syntax(
                        start,
                        format!("unexpected character '{}'", c),
                    ));
                }
            }
        }
    }

    if depth > 0 {
        return Err(ExpressionError::syntax(input.len(), "unbalanced '('"));
    }

    Ok(tokens)
}

/// Read up to the closing `delimiter`, honoring backslash escapes.
/// Returns the raw content and the index just past the delimiter.
fn read_quoted(chars: &[(usize, char)], from: usize, delimiter: char) -> Option<(String, usize)> {
    let mut content = String::new();
    let mut i = from;
    loop {
        let (_, c) = *chars.get(i)?;
        if c == '\\' {
            let (_, escaped) = *chars.get(i + 1)?;
            content.push(c);
            content.push(escaped);
            i += 2;
        } else if c == delimiter {
            return Some((content, i + 1));
        } else {
            content.push(c);
            i += 1;
        }
    }
}

/// Escape bare single quotes so content can live inside `'…'`
fn requote(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut escaped = false;
    for c in content.chars() {
        if c == '\'' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out
}
