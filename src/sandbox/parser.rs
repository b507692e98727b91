//! Recursive-descent parser for the tool-code subset.
//!
//! The accepted language is a sequence of expression statements built from
//! literals, names, `capability.<name>` attribute access, calls with
//! positional and keyword arguments, and list/tuple/dict displays.

use super::ast::{Expr, Literal, Program};
use super::lexer::{tokenize, Spanned, Token};
use crate::error::ToolcodeError;

/// Statement keywords that are never accepted.
const FORBIDDEN_KEYWORDS: &[(&str, &str)] = &[
    ("import", "Import statements are not allowed"),
    ("from", "Import statements are not allowed"),
    ("def", "Function definitions are not allowed"),
    ("class", "Class definitions are not allowed"),
    ("global", "Global statements are not allowed"),
    ("nonlocal", "Nonlocal statements are not allowed"),
    ("lambda", "Lambda expressions are not allowed"),
    ("async", "Async constructs are not allowed"),
    ("await", "Await expressions are not allowed"),
    ("del", "Delete statements are not allowed"),
    ("while", "Loops are not allowed"),
    ("for", "Loops are not allowed"),
    ("with", "With statements are not allowed"),
    ("try", "Exception handling is not allowed"),
    ("raise", "Raise statements are not allowed"),
    ("yield", "Yield expressions are not allowed"),
];

/// Deepest expression nesting accepted. Brackets, unary signs and chained
/// calls or attributes each count as one level.
pub const MAX_NESTING: usize = 64;

/// Parse tool code into a [`Program`].
pub fn parse(source: &str) -> Result<Program, ToolcodeError> {
    let tokens = tokenize(source)?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .program()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

fn too_deep() -> ToolcodeError {
    ToolcodeError::UnsafeInput("expression nested too deeply".to_string())
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl std::fmt::Display) -> ToolcodeError {
        match self.tokens.get(self.pos) {
            Some(s) => ToolcodeError::UnsafeInput(format!(
                "syntax error at line {}, column {}: {message}",
                s.line, s.column
            )),
            None => ToolcodeError::UnsafeInput(format!("syntax error: {message}")),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ToolcodeError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn program(mut self) -> Result<Program, ToolcodeError> {
        let mut statements = Vec::new();
        loop {
            while *self.peek() == Token::Separator {
                self.advance();
            }
            if *self.peek() == Token::Eof {
                break;
            }
            if let Token::Ident(name) = self.peek() {
                if let Some((_, message)) = FORBIDDEN_KEYWORDS.iter().find(|(kw, _)| kw == name) {
                    return Err(ToolcodeError::UnsafeInput((*message).to_string()));
                }
                if *self.peek_at(1) == Token::Equals {
                    return Err(ToolcodeError::UnsafeInput(
                        "Assignment statements are not allowed".to_string(),
                    ));
                }
            }
            statements.push(self.expression()?);
            match self.peek() {
                Token::Separator | Token::Eof => {}
                Token::Equals => {
                    return Err(ToolcodeError::UnsafeInput(
                        "Assignment statements are not allowed".to_string(),
                    ))
                }
                other => {
                    return Err(self.error(format!("unexpected {}", describe(other))));
                }
            }
        }
        Ok(Program { statements })
    }

    fn expression(&mut self) -> Result<Expr, ToolcodeError> {
        if self.depth >= MAX_NESTING {
            return Err(too_deep());
        }
        self.depth += 1;
        let expr = match self.peek() {
            Token::Minus => {
                self.advance();
                self.expression().map(|inner| Expr::Neg(Box::new(inner)))
            }
            Token::Plus => {
                self.advance();
                self.expression()
            }
            _ => self.postfix(),
        };
        self.depth -= 1;
        expr
    }

    fn postfix(&mut self) -> Result<Expr, ToolcodeError> {
        let base = self.depth;
        let expr = self.chain();
        self.depth = base;
        expr
    }

    /// An atom followed by calls and attribute accesses. Each link counts
    /// toward the nesting of everything parsed after it.
    fn chain(&mut self) -> Result<Expr, ToolcodeError> {
        let mut expr = self.atom()?;
        loop {
            if matches!(self.peek(), Token::Dot | Token::LParen) {
                if self.depth >= MAX_NESTING {
                    return Err(too_deep());
                }
                self.depth += 1;
            }
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    match self.advance() {
                        Token::Ident(attr) => {
                            expr = Expr::Attribute {
                                value: Box::new(expr),
                                attr,
                            };
                        }
                        other => {
                            return Err(self.error(format!(
                                "expected attribute name, found {}",
                                describe(&other)
                            )))
                        }
                    }
                }
                Token::LParen => {
                    self.advance();
                    let (args, kwargs) = self.call_arguments()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        kwargs,
                    };
                }
                Token::LBracket => {
                    return Err(ToolcodeError::UnsafeInput(
                        "Subscript expressions are not allowed".to_string(),
                    ))
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ToolcodeError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while *self.peek() != Token::RParen {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Token::Ident(name), Token::Equals) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.advance();
                self.advance();
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(format!("keyword argument repeated: {name}")));
                }
                let value = self.expression()?;
                kwargs.push((name, value));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.expression()?);
            }
            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok((args, kwargs))
    }

    fn atom(&mut self) -> Result<Expr, ToolcodeError> {
        match self.advance() {
            Token::Int(i) => Ok(Expr::Literal(Literal::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Literal::Float(f))),
            Token::Str(mut s) => {
                // adjacent string literals concatenate
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.advance();
                }
                Ok(Expr::Literal(Literal::Str(s)))
            }
            Token::Ident(name) => Ok(match name.as_str() {
                "True" => Expr::Literal(Literal::Bool(true)),
                "False" => Expr::Literal(Literal::Bool(false)),
                "None" => Expr::Literal(Literal::None),
                _ => {
                    if let Some((_, message)) =
                        FORBIDDEN_KEYWORDS.iter().find(|(kw, _)| *kw == name)
                    {
                        return Err(ToolcodeError::UnsafeInput((*message).to_string()));
                    }
                    Expr::Name(name)
                }
            }),
            Token::LBracket => {
                let items = self.sequence(Token::RBracket, "']'")?.0;
                Ok(Expr::List(items))
            }
            Token::LParen => {
                let (mut items, trailing_comma) = self.sequence(Token::RParen, "')'")?;
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Expr::Tuple(items))
                }
            }
            Token::LBrace => self.dict(),
            other => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }

    /// Comma-separated expressions up to `close`. Returns whether the last
    /// item was followed by a comma.
    fn sequence(&mut self, close: Token, what: &str) -> Result<(Vec<Expr>, bool), ToolcodeError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        while *self.peek() != close {
            items.push(self.expression()?);
            trailing_comma = *self.peek() == Token::Comma;
            if trailing_comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(close, what)?;
        Ok((items, trailing_comma))
    }

    fn dict(&mut self) -> Result<Expr, ToolcodeError> {
        let mut entries = Vec::new();
        while *self.peek() != Token::RBrace {
            let key = self.expression()?;
            if *self.peek() != Token::Colon {
                return Err(ToolcodeError::UnsafeInput(
                    "Set displays are not allowed".to_string(),
                ));
            }
            self.advance();
            let value = self.expression()?;
            entries.push((key, value));
            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RBrace, "'}'")?;
        Ok(Expr::Dict(entries))
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("name '{name}'"),
        Token::Int(i) => format!("number {i}"),
        Token::Float(f) => format!("number {f}"),
        Token::Str(_) => "string".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::LBrace => "'{'".to_string(),
        Token::RBrace => "'}'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Colon => "':'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Equals => "'='".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Separator => "end of statement".to_string(),
        Token::Eof => "end of input".to_string(),
    }
}
