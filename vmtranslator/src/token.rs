//! Lexical analysis of VM IL source text.
//!
//! A unit is tokenized up front. The token list always ends with a single
//! [`TokenKind::Eof`] token.

use crate::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    Eof,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: &[u8], line: usize) -> Self {
        Self {
            kind,
            lexeme: String::from_utf8_lossy(lexeme).into_owned(),
            line,
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || matches!(c, b'_' | b'.' | b':')
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'.' | b':' | b'-')
}

/// Whether `s` can stand in an assembler symbol: an identifier without `-`.
pub fn is_symbol(s: &str) -> bool {
    match s.as_bytes().split_first() {
        Some((&first, rest)) => {
            is_ident_start(first) && rest.iter().all(|&c| c != b'-' && is_ident_char(c))
        }
        None => false,
    }
}

struct Lexer<'a> {
    s: &'a [u8],
    p: usize,
    ln: usize,
}

impl<'a> Lexer<'a> {
    fn new(s: &'a [u8]) -> Self {
        Self { s, p: 0, ln: 1 }
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.p).copied()
    }

    fn scan(&mut self, mut accept: impl FnMut(u8) -> bool) -> &'a [u8] {
        let b = self.p;
        while self.p < self.s.len() && accept(self.s[self.p]) {
            if self.s[self.p] == b'\n' {
                self.ln += 1;
            }
            self.p += 1;
        }
        &self.s[b..self.p]
    }

    fn skip_useless(&mut self) {
        loop {
            self.scan(|c| c.is_ascii_whitespace());
            if self.s[self.p..].starts_with(b"//") {
                self.scan(|c| c != b'\n');
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_useless();
        let line = self.ln;
        match self.peek() {
            None => Token::new(TokenKind::Eof, b"", line),
            Some(c) if is_ident_start(c) => {
                Token::new(TokenKind::Identifier, self.scan(is_ident_char), line)
            }
            Some(c) if c.is_ascii_digit() => {
                Token::new(TokenKind::Number, self.scan(|c| c.is_ascii_digit()), line)
            }
            Some(_) => {
                let b = self.p;
                // a whole UTF-8 sequence, so the report shows the real character
                self.p += 1;
                while self.p < self.s.len() && self.s[self.p] & 0xc0 == 0x80 {
                    self.p += 1;
                }
                Token::new(TokenKind::Error, &self.s[b..self.p], line)
            }
        }
    }
}

/// Splits `source` into tokens. The first unrecognised character aborts the unit.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source.as_bytes());
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        match token.kind {
            TokenKind::Error => {
                return Err(LexError {
                    line: token.line,
                    text: token.lexeme,
                })
            }
            TokenKind::Eof => {
                tokens.push(token);
                return Ok(tokens);
            }
            _ => tokens.push(token),
        }
    }
}
