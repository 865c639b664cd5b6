// Mylox lexical analyzer
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-06-14: Initial version
//      26-06-15: Line-spanning string literals, '//' comments
//      26-06-16: Keyword trie

pub mod token;

use crate::frontend::scanner::token::{Token, TokenKind};

/// On-demand tokenizer. Three cursors into the borrowed source: the start of
/// the lexeme in flight, the read position, and the current line.
pub struct Scanner<'src> {
    source: &'src str,
    start: usize,
    current: usize,
    line: usize,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Scanner<'src> {
        return Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
        };
    }

    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_eof() {
            return self.make_token(TokenKind::Eof);
        }

        let c = self.advance();

        if c.is_ascii_alphabetic() || c == b'_' {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenKind::LParen),
            b')' => self.make_token(TokenKind::RParen),
            b'{' => self.make_token(TokenKind::LBrace),
            b'}' => self.make_token(TokenKind::RBrace),
            b',' => self.make_token(TokenKind::Comma),
            b'.' => self.make_token(TokenKind::Dot),
            b';' => self.make_token(TokenKind::Semicolon),
            b'+' => self.make_token(TokenKind::Plus),
            b'-' => self.make_token(TokenKind::Minus),
            b'*' => self.make_token(TokenKind::Asterisk),
            b'/' => self.make_token(TokenKind::Slash),
            b'!' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::Neq
                } else {
                    TokenKind::Bang
                };
                self.make_token(kind)
            }
            b'=' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                };
                self.make_token(kind)
            }
            b'<' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::Leq
                } else {
                    TokenKind::Lt
                };
                self.make_token(kind)
            }
            b'>' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::Geq
                } else {
                    TokenKind::Gt
                };
                self.make_token(kind)
            }
            b'"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn is_eof(&self) -> bool {
        return self.current >= self.source.len();
    }

    fn advance(&mut self) -> u8 {
        let c = self.source.as_bytes()[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_eof() {
            0
        } else {
            self.source.as_bytes()[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            0
        } else {
            self.source.as_bytes()[self.current + 1]
        }
    }

    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_eof() || self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn make_token(&self, kind: TokenKind) -> Token<'src> {
        Token {
            kind,
            lexeme: &self.source[self.start..self.current],
            line: self.line,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenKind::Errno,
            lexeme: message,
            line: self.line,
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.current += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                b'/' if self.peek_next() == b'/' => {
                    // 行注释吃到换行为止，换行留给上面的分支计数
                    while !self.is_eof() && self.peek() != b'\n' {
                        self.current += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn string(&mut self) -> Token<'src> {
        while !self.is_eof() && self.peek() != b'"' {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }
        if self.is_eof() {
            return self.error_token("Unterminated string.");
        }
        // closing quote
        self.current += 1;
        self.make_token(TokenKind::StrLit)
    }

    fn number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.current += 1;
        }
        // 小数点后面必须跟数字才算小数的一部分
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.current += 1;
            while self.peek().is_ascii_digit() {
                self.current += 1;
            }
        }
        self.make_token(TokenKind::NumLit)
    }

    fn identifier(&mut self) -> Token<'src> {
        loop {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.current += 1;
            } else {
                break;
            }
        }
        self.make_token(self.identifier_kind())
    }

    // hand-rolled keyword trie: branch on the first byte (or first two),
    // then verify the remaining suffix in one comparison
    fn identifier_kind(&self) -> TokenKind {
        let bytes = self.source.as_bytes();
        match bytes[self.start] {
            b'a' => self.check_keyword(1, "nd", TokenKind::KwAnd),
            b'c' => self.check_keyword(1, "lass", TokenKind::KwClass),
            b'e' => self.check_keyword(1, "lse", TokenKind::KwElse),
            b'f' if self.current - self.start > 1 => match bytes[self.start + 1] {
                b'a' => self.check_keyword(2, "lse", TokenKind::KwFalse),
                b'o' => self.check_keyword(2, "r", TokenKind::KwFor),
                b'u' => self.check_keyword(2, "n", TokenKind::KwFun),
                _ => TokenKind::Ident,
            },
            b'i' => self.check_keyword(1, "f", TokenKind::KwIf),
            b'n' => self.check_keyword(1, "il", TokenKind::KwNil),
            b'o' => self.check_keyword(1, "r", TokenKind::KwOr),
            b'p' => self.check_keyword(1, "rint", TokenKind::KwPrint),
            b'r' => self.check_keyword(1, "eturn", TokenKind::KwReturn),
            b's' => self.check_keyword(1, "uper", TokenKind::KwSuper),
            b't' if self.current - self.start > 1 => match bytes[self.start + 1] {
                b'h' => self.check_keyword(2, "is", TokenKind::KwThis),
                b'r' => self.check_keyword(2, "ue", TokenKind::KwTrue),
                _ => TokenKind::Ident,
            },
            b'v' => self.check_keyword(1, "ar", TokenKind::KwVar),
            b'w' => self.check_keyword(1, "hile", TokenKind::KwWhile),
            _ => TokenKind::Ident,
        }
    }

    fn check_keyword(&self, offset: usize, rest: &str, kind: TokenKind) -> TokenKind {
        let begin = self.start + offset;
        if self.current - begin == rest.len() && &self.source[begin..self.current] == rest {
            kind
        } else {
            TokenKind::Ident
        }
    }
}
