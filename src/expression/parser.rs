// SPDX-License-Identifier: MIT

//! Parser and compiler
//!
//! Recursive descent over the token stream, lowest precedence first:
//! `||`, `&&`, comparators (`== != < > <= >= =~ !~ in`), `+ -`, `* / %`,
//! unary `!` / `-`, then operands. Parentheses override all of it.

use super::ast::{ArithmeticOp, CompareOp, Expression, Literal, Pattern};
use super::evaluator::{self, Bindings};
use super::functions;
use super::lexer::tokenize;
use super::token::{Token, TokenKind, TokenValue};
use super::translator::translate;
use super::value::Value;
use crate::pipeline::error::ExpressionError;

type Result<T> = std::result::Result<T, ExpressionError>;

/// Parse a token stream into an expression tree
pub fn parse(tokens: &[Token]) -> Result<Expression> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::syntax(
            token.position,
            format!("unexpected {}", token.kind),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&'a Token> {
        let token = self.tokens.get(self.pos).ok_or_else(|| {
            let end = self.tokens.last().map(|t| t.position + 1).unwrap_or(0);
            ExpressionError::syntax(end, "unexpected end of expression")
        })?;
        self.pos += 1;
        Ok(token)
    }

    /// Consume the next token if it has `kind` and one of `symbols`
    fn eat(&mut self, kind: TokenKind, symbols: &[&str]) -> Option<&'a str> {
        let token = self.peek()?;
        let text = token.text()?;
        if token.kind == kind && symbols.iter().any(|s| *s == text) {
            self.pos += 1;
            Some(text)
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'a Token> {
        let token = self.next()?;
        if token.kind != kind {
            return Err(ExpressionError::syntax(
                token.position,
                format!("expected {}, found {}", kind, token.kind),
            ));
        }
        Ok(token)
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::LogicalOp, &["||"]).is_some() {
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_comparison()?;
        while self.eat(TokenKind::LogicalOp, &["&&"]).is_some() {
            let right = self.parse_comparison()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let mut left = self.parse_additive()?;
        while let Some(op) = self.eat(
            TokenKind::Comparator,
            &["==", "!=", "<", ">", "<=", ">=", "=~", "!~", "in"],
        ) {
            left = match op {
                "=~" | "!~" => {
                    let token = self.next()?;
                    let TokenValue::Pattern(re) = &token.value else {
                        return Err(ExpressionError::syntax(
                            token.position,
                            format!("'{}' requires a regex literal", op),
                        ));
                    };
                    Expression::Match {
                        subject: Box::new(left),
                        pattern: Pattern(re.clone()),
                        negated: op == "!~",
                    }
                }
                "in" => Expression::In {
                    needle: Box::new(left),
                    haystack: Box::new(self.parse_additive()?),
                },
                _ => Expression::Compare {
                    op: compare_op(op),
                    left: Box::new(left),
                    right: Box::new(self.parse_additive()?),
                },
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.eat(TokenKind::Modifier, &["+", "-"]) {
            let right = self.parse_multiplicative()?;
            left = arithmetic(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat(TokenKind::Modifier, &["*", "/", "%"]) {
            let right = self.parse_unary()?;
            left = arithmetic(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        match self.eat(TokenKind::Prefix, &["!", "-"]) {
            Some("!") => Ok(Expression::Not(Box::new(self.parse_unary()?))),
            Some(_) => Ok(Expression::Negate(Box::new(self.parse_unary()?))),
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Clause => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::ClauseClose)?;
                Ok(inner)
            }
            TokenKind::Function => self.parse_call(token),
            TokenKind::Array => match &token.value {
                TokenValue::Array(items) => Ok(Expression::Array(
                    items.iter().map(operand).collect::<Result<_>>()?,
                )),
                _ => Err(unexpected(token)),
            },
            _ => operand(token),
        }
    }

    fn parse_call(&mut self, name_token: &Token) -> Result<Expression> {
        let name = name_token.text().unwrap_or_default();
        let function =
            functions::lookup(name).ok_or_else(|| ExpressionError::unknown_function(name))?;

        self.expect(TokenKind::Clause)?;
        let mut args = Vec::new();
        if self.peek().map(|t| t.kind) == Some(TokenKind::ClauseClose) {
            self.pos += 1;
            return Ok(Expression::Call { function, args });
        }
        loop {
            args.push(self.parse_or()?);
            let token = self.next()?;
            match token.kind {
                TokenKind::Separator => continue,
                TokenKind::ClauseClose => break,
                _ => return Err(unexpected(token)),
            }
        }
        Ok(Expression::Call { function, args })
    }
}

/// Literal or field reference token
fn operand(token: &Token) -> Result<Expression> {
    let expr = match (&token.kind, &token.value) {
        (TokenKind::Numeric, TokenValue::Number(n)) => Expression::Literal(Literal::Number(*n)),
        (TokenKind::Boolean, TokenValue::Boolean(b)) => Expression::Literal(Literal::Boolean(*b)),
        (TokenKind::String, TokenValue::Text(s)) => Expression::Literal(Literal::String(s.clone())),
        (TokenKind::Time, TokenValue::Time(t, text)) => {
            Expression::Literal(Literal::Time(*t, text.clone()))
        }
        (TokenKind::Variable, TokenValue::Text(path)) => Expression::Field(path.clone()),
        _ => return Err(unexpected(token)),
    };
    Ok(expr)
}

fn unexpected(token: &Token) -> ExpressionError {
    ExpressionError::syntax(token.position, format!("unexpected {}", token.kind))
}

fn compare_op(symbol: &str) -> CompareOp {
    match symbol {
        "!=" => CompareOp::NotEq,
        "<" => CompareOp::Lt,
        ">" => CompareOp::Gt,
        "<=" => CompareOp::Lte,
        ">=" => CompareOp::Gte,
        _ => CompareOp::Eq,
    }
}

fn arithmetic(symbol: &str, left: Expression, right: Expression) -> Expression {
    let op = match symbol {
        "+" => ArithmeticOp::Add,
        "-" => ArithmeticOp::Sub,
        "*" => ArithmeticOp::Mul,
        "/" => ArithmeticOp::Div,
        _ => ArithmeticOp::Rem,
    };
    Expression::Arithmetic {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// An expression compiled once and evaluated against many events
///
/// Immutable after construction; share it behind an `Arc` to evaluate from
/// several threads.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    tokens: Vec<Token>,
    root: Expression,
    variables: Vec<String>,
}

impl CompiledExpression {
    /// Compile an expression already in normalized form
    pub fn compile(normalized: &str) -> Result<Self> {
        let tokens = tokenize(normalized)?;
        let root = parse(&tokens)?;
        let variables = root.variables();
        Ok(Self {
            source: normalized.to_string(),
            tokens,
            root,
            variables,
        })
    }

    /// Translate a surface expression, then compile it
    pub fn compile_surface(surface: &str) -> Result<Self> {
        Self::compile(&translate(surface)?)
    }

    /// The normalized expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn root(&self) -> &Expression {
        &self.root
    }

    /// Distinct field paths referenced by the expression
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluate to a value of any type
    pub fn evaluate(&self, bindings: &dyn Bindings) -> Result<Value> {
        evaluator::evaluate(&self.root, bindings)
    }

    /// Evaluate to a boolean; any other result type is a type mismatch
    pub fn evaluate_bool(&self, bindings: &dyn Bindings) -> Result<bool> {
        evaluator::evaluate_bool(&self.root, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(input: &str) -> Expression {
        CompiledExpression::compile(input).unwrap().root().clone()
    }

    fn field(path: &str) -> Box<Expression> {
        Box::new(Expression::Field(path.to_string()))
    }

    fn number(n: f64) -> Box<Expression> {
        Box::new(Expression::Literal(Literal::Number(n)))
    }

    fn boolean(b: bool) -> Box<Expression> {
        Box::new(Expression::Literal(Literal::Boolean(b)))
    }

    #[test]
    fn test_parse_simple_equality() {
        assert_eq!(
            compile("[testInt] == 4"),
            Expression::Compare {
                op: CompareOp::Eq,
                left: field("testInt"),
                right: number(4.0),
            }
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(
            compile("1 + 2 * 3 == 7"),
            Expression::Compare {
                op: CompareOp::Eq,
                left: Box::new(Expression::Arithmetic {
                    op: ArithmeticOp::Add,
                    left: number(1.0),
                    right: Box::new(Expression::Arithmetic {
                        op: ArithmeticOp::Mul,
                        left: number(2.0),
                        right: number(3.0),
                    }),
                }),
                right: number(7.0),
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            compile("true || false && false"),
            Expression::Or(
                boolean(true),
                Box::new(Expression::And(boolean(false), boolean(false)))
            )
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(
            compile("( true || false ) && false"),
            Expression::And(
                Box::new(Expression::Or(boolean(true), boolean(false))),
                boolean(false)
            )
        );
    }

    #[test]
    fn test_prefix_binds_tightest() {
        assert_eq!(
            compile("! [a] == false"),
            Expression::Compare {
                op: CompareOp::Eq,
                left: Box::new(Expression::Not(field("a"))),
                right: boolean(false),
            }
        );
        assert_eq!(
            compile("- 2 * 3"),
            Expression::Arithmetic {
                op: ArithmeticOp::Mul,
                left: Box::new(Expression::Negate(number(2.0))),
                right: number(3.0),
            }
        );
    }

    #[test]
    fn test_surface_not_applies_to_the_next_operand() {
        let surface = CompiledExpression::compile_surface("not [a] == 1").unwrap();
        assert_eq!(
            surface.root(),
            &Expression::Compare {
                op: CompareOp::Eq,
                left: Box::new(Expression::Not(field("a"))),
                right: number(1.0),
            }
        );
        let grouped = CompiledExpression::compile_surface("not ([a] == 1)").unwrap();
        assert_eq!(
            grouped.root(),
            &Expression::Not(Box::new(Expression::Compare {
                op: CompareOp::Eq,
                left: field("a"),
                right: number(1.0),
            }))
        );
    }

    #[test]
    fn test_negative_array_items() {
        match compile("[x] in ( - 1 , 2 )") {
            Expression::In { haystack, .. } => assert_eq!(
                *haystack,
                Expression::Array(vec![
                    Expression::Literal(Literal::Number(-1.0)),
                    Expression::Literal(Literal::Number(2.0)),
                ])
            ),
            other => panic!("expected In, got {:?}", other),
        }
    }

    #[test]
    fn test_membership_and_arrays() {
        match compile("'foo' in ( 'a' , [b] , 3 )") {
            Expression::In { needle, haystack } => {
                assert_eq!(
                    *needle,
                    Expression::Literal(Literal::String("foo".to_string()))
                );
                assert_eq!(
                    *haystack,
                    Expression::Array(vec![
                        Expression::Literal(Literal::String("a".to_string())),
                        Expression::Field("b".to_string()),
                        Expression::Literal(Literal::Number(3.0)),
                    ])
                );
            }
            other => panic!("expected In, got {:?}", other),
        }
    }

    #[test]
    fn test_regex_match() {
        match compile("[way] !~ '(RECEIVE|SEND)'") {
            Expression::Match {
                subject,
                pattern,
                negated,
            } => {
                assert_eq!(subject, field("way"));
                assert_eq!(pattern.0.as_str(), "(RECEIVE|SEND)");
                assert!(negated);
            }
            other => panic!("expected Match, got {:?}", other),
        }
    }

    #[test]
    fn test_regex_requires_literal() {
        let err = CompiledExpression::compile("[a] =~ [b]").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { .. }));
    }

    #[test]
    fn test_function_call() {
        match compile("len ( [s] ) > 2") {
            Expression::Compare { left, .. } => match *left {
                Expression::Call { function, args } => {
                    assert_eq!(function.name, "len");
                    assert_eq!(args, vec![Expression::Field("s".to_string())]);
                }
                other => panic!("expected Call, got {:?}", other),
            },
            other => panic!("expected Compare, got {:?}", other),
        }
        assert!(CompiledExpression::compile("bool ( )").is_ok());
    }

    #[test]
    fn test_unknown_function() {
        let err = CompiledExpression::compile("[testInt] == nope ( 4 )").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::UnknownFunction {
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_structural_errors() {
        for bad in ["( )", "1 , 2", "len ( 1 2 )", "[a] == ( )"] {
            assert!(
                CompiledExpression::compile(bad).is_err(),
                "expected error for {}",
                bad
            );
        }
    }

    #[test]
    fn test_compile_surface() {
        let compiled = CompiledExpression::compile_surface("[location][city] == \"Paris\"").unwrap();
        assert_eq!(compiled.source(), "[location.city] == 'Paris'");
        assert_eq!(compiled.variables(), &["location.city".to_string()]);
        assert_eq!(compiled.tokens().len(), 3);
    }
}
