//! Tokenizer for tool-code expressions.

use crate::error::ToolcodeError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Equals,
    Minus,
    Plus,
    /// Statement separator: a newline outside brackets, or `;`.
    Separator,
    Eof,
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ToolcodeError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    depth: usize,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            depth: 0,
            tokens: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl std::fmt::Display) -> ToolcodeError {
        ToolcodeError::UnsafeInput(format!(
            "syntax error at line {}, column {}: {message}",
            self.line, self.column
        ))
    }

    fn push(&mut self, token: Token, line: usize, column: usize) {
        self.tokens.push(Spanned {
            token,
            line,
            column,
        });
    }

    fn run(mut self) -> Result<Vec<Spanned>, ToolcodeError> {
        while let Some(&ch) = self.chars.peek() {
            let (line, column) = (self.line, self.column);
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' => {
                    // explicit line continuation
                    self.bump();
                    match self.bump() {
                        Some('\n') => {}
                        Some('\r') if self.chars.peek() == Some(&'\n') => {
                            self.bump();
                        }
                        _ => return Err(self.error("unexpected character after line continuation")),
                    }
                }
                '\n' | ';' => {
                    self.bump();
                    if self.depth == 0 || ch == ';' {
                        self.push(Token::Separator, line, column);
                    }
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '(' | '[' | '{' => {
                    self.bump();
                    self.depth += 1;
                    let token = match ch {
                        '(' => Token::LParen,
                        '[' => Token::LBracket,
                        _ => Token::LBrace,
                    };
                    self.push(token, line, column);
                }
                ')' | ']' | '}' => {
                    self.bump();
                    self.depth = self.depth.saturating_sub(1);
                    let token = match ch {
                        ')' => Token::RParen,
                        ']' => Token::RBracket,
                        _ => Token::RBrace,
                    };
                    self.push(token, line, column);
                }
                ',' => self.single(Token::Comma),
                ':' => self.single(Token::Colon),
                '-' => self.single(Token::Minus),
                '+' => self.single(Token::Plus),
                '=' => {
                    self.bump();
                    if self.chars.peek() == Some(&'=') {
                        return Err(self.error("comparison operators are not supported"));
                    }
                    self.push(Token::Equals, line, column);
                }
                '.' => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(char::is_ascii_digit) {
                        let token = self.number()?;
                        self.push(token, line, column);
                    } else {
                        self.single(Token::Dot);
                    }
                }
                '"' | '\'' => {
                    let value = self.string(false)?;
                    self.push(Token::Str(value), line, column);
                }
                c if c.is_ascii_digit() => {
                    let token = self.number()?;
                    self.push(token, line, column);
                }
                c if c == '_' || c.is_alphabetic() => {
                    let ident = self.ident();
                    if matches!(self.chars.peek(), Some('"') | Some('\'')) {
                        match ident.to_ascii_lowercase().as_str() {
                            "r" => {
                                let value = self.string(true)?;
                                self.push(Token::Str(value), line, column);
                            }
                            "u" => {
                                let value = self.string(false)?;
                                self.push(Token::Str(value), line, column);
                            }
                            other => {
                                return Err(self.error(format!(
                                    "string prefix '{other}' is not supported"
                                )))
                            }
                        }
                    } else {
                        self.push(Token::Ident(ident), line, column);
                    }
                }
                other => return Err(self.error(format!("unexpected character '{other}'"))),
            }
        }
        let (line, column) = (self.line, self.column);
        self.push(Token::Eof, line, column);
        Ok(self.tokens)
    }

    fn single(&mut self, token: Token) {
        let (line, column) = (self.line, self.column);
        self.bump();
        self.push(token, line, column);
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '_' || c.is_alphanumeric() {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn number(&mut self) -> Result<Token, ToolcodeError> {
        let mut text = String::new();
        let mut is_float = false;

        if self.chars.peek() == Some(&'0') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if let Some(radix_char) = lookahead.peek().copied() {
                let radix = match radix_char {
                    'x' | 'X' => Some(16),
                    'o' | 'O' => Some(8),
                    'b' | 'B' => Some(2),
                    _ => None,
                };
                if let Some(radix) = radix {
                    self.bump();
                    self.bump();
                    let mut digits = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if c == '_' {
                            self.bump();
                        } else if c.is_digit(radix) {
                            digits.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    return i64::from_str_radix(&digits, radix)
                        .map(Token::Int)
                        .map_err(|_| self.error("invalid integer literal"));
                }
            }
        }

        while let Some(&c) = self.chars.peek() {
            match c {
                '0'..='9' => text.push(c),
                '_' => {}
                '.' if !is_float => {
                    is_float = true;
                    text.push(c);
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if let Some(&sign) = self.chars.peek() {
                        if sign == '+' || sign == '-' {
                            text.push(sign);
                            self.bump();
                        }
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        if self
            .chars
            .peek()
            .is_some_and(|c| c.is_alphabetic() || *c == '_')
        {
            return Err(self.error("invalid numeric literal"));
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float literal '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error(format!("integer literal '{text}' out of range")))
        }
    }

    fn string(&mut self, raw: bool) -> Result<String, ToolcodeError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string"));
        };
        let triple = {
            let mut lookahead = self.chars.clone();
            lookahead.next() == Some(quote) && lookahead.next() == Some(quote)
        };
        if triple {
            self.bump();
            self.bump();
        } else if self.chars.peek() == Some(&quote) {
            // empty string literal
            self.bump();
            return Ok(String::new());
        }

        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string literal"));
            };
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                let mut lookahead = self.chars.clone();
                if lookahead.next() == Some(quote) && lookahead.next() == Some(quote) {
                    self.bump();
                    self.bump();
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(self.error("unterminated string literal"));
            }
            if c == '\\' {
                if raw {
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                    continue;
                }
                self.escape(&mut out)?;
                continue;
            }
            out.push(c);
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), ToolcodeError> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated string literal"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '\n' => {}
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, len: usize) -> Result<char, ToolcodeError> {
        let mut digits = String::with_capacity(len);
        for _ in 0..len {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(self.error("truncated escape sequence")),
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid escape sequence"))
    }
}
