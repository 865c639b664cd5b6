// Mylox token definitions
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-06-14: Initial version
//      26-06-16: Added class-related keywords (class / this / super)

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // 错误 token，lexeme 指向一条静态错误消息
    Errno,

    Eof,

    Ident,
    NumLit,
    StrLit,

    Assign,

    Plus,
    Minus,
    Asterisk,
    Slash,

    Bang,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,

    LParen,
    RParen,
    LBrace,
    RBrace,

    Comma,
    Dot,
    Semicolon,

    KwAnd,
    KwClass,
    KwElse,
    KwFalse,
    KwFor,
    KwFun,
    KwIf,
    KwNil,
    KwOr,
    KwPrint,
    KwReturn,
    KwSuper,
    KwThis,
    KwTrue,
    KwVar,
    KwWhile,
}

/// Tokens borrow their lexeme straight out of the source buffer.
#[derive(Debug, Clone, Copy)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub lexeme: &'src str,
    pub line: usize,
}

impl<'src> Token<'src> {
    pub fn synthetic(lexeme: &'src str) -> Self {
        Self {
            kind: TokenKind::Ident,
            lexeme,
            line: 0,
        }
    }
}
