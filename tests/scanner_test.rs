use mylox::frontend::scanner::Scanner;
use mylox::frontend::scanner::token::{Token, TokenKind};

fn scan(source: &str) -> Vec<Token<'_>> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.next_token();
        let kind = token.kind;
        tokens.push(token);
        if kind == TokenKind::Eof {
            return tokens;
        }
    }
}

fn kinds(source: &str) -> Vec<TokenKind> {
    scan(source).iter().map(|t| t.kind).collect()
}

#[test]
fn single_character_tokens() {
    use TokenKind::*;
    assert_eq!(
        kinds("(){},.;+-*/"),
        vec![
            LParen, RParen, LBrace, RBrace, Comma, Dot, Semicolon, Plus, Minus, Asterisk, Slash,
            Eof
        ]
    );
}

#[test]
fn one_or_two_character_operators() {
    use TokenKind::*;
    assert_eq!(
        kinds("! != = == < <= > >="),
        vec![Bang, Neq, Assign, Eq, Lt, Leq, Gt, Geq, Eof]
    );
}

#[test]
fn keywords_and_identifiers() {
    use TokenKind::*;
    assert_eq!(
        kinds("and class else false for fun if nil or print return super this true var while"),
        vec![
            KwAnd, KwClass, KwElse, KwFalse, KwFor, KwFun, KwIf, KwNil, KwOr, KwPrint, KwReturn,
            KwSuper, KwThis, KwTrue, KwVar, KwWhile, Eof
        ]
    );
    // prefixes and extensions of keywords fall back to identifiers
    assert_eq!(
        kinds("classy fals f forx _var superb"),
        vec![Ident, Ident, Ident, Ident, Ident, Ident, Eof]
    );
}

#[test]
fn number_literals() {
    let tokens = scan("123 3.14 3.");
    assert_eq!(tokens[0].kind, TokenKind::NumLit);
    assert_eq!(tokens[0].lexeme, "123");
    assert_eq!(tokens[1].kind, TokenKind::NumLit);
    assert_eq!(tokens[1].lexeme, "3.14");
    // a dot with no following digit is not part of the number
    assert_eq!(tokens[2].kind, TokenKind::NumLit);
    assert_eq!(tokens[2].lexeme, "3");
    assert_eq!(tokens[3].kind, TokenKind::Dot);
}

#[test]
fn string_literals_keep_their_quotes_in_the_lexeme() {
    let tokens = scan("\"hello\"");
    assert_eq!(tokens[0].kind, TokenKind::StrLit);
    assert_eq!(tokens[0].lexeme, "\"hello\"");
}

#[test]
fn strings_may_span_lines() {
    let tokens = scan("\"a\nb\" x");
    assert_eq!(tokens[0].kind, TokenKind::StrLit);
    assert_eq!(tokens[0].lexeme, "\"a\nb\"");
    // the identifier after the string sits on line 2
    assert_eq!(tokens[1].kind, TokenKind::Ident);
    assert_eq!(tokens[1].line, 2);
}

#[test]
fn unterminated_string_yields_error_token() {
    let tokens = scan("\"abc");
    assert_eq!(tokens[0].kind, TokenKind::Errno);
    assert_eq!(tokens[0].lexeme, "Unterminated string.");
    assert_eq!(tokens[1].kind, TokenKind::Eof);
}

#[test]
fn unexpected_character_yields_error_token_and_scanning_continues() {
    let tokens = scan("@ 1");
    assert_eq!(tokens[0].kind, TokenKind::Errno);
    assert_eq!(tokens[0].lexeme, "Unexpected character.");
    assert_eq!(tokens[1].kind, TokenKind::NumLit);
}

#[test]
fn comments_and_whitespace_are_skipped() {
    use TokenKind::*;
    assert_eq!(kinds("// whole line\n1 // trailing\n+ 2"), vec![NumLit, Plus, NumLit, Eof]);
    let tokens = scan("// c\nx");
    assert_eq!(tokens[0].line, 2);
}

#[test]
fn line_numbers_advance_on_newlines() {
    let tokens = scan("1\n2\n\n3");
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[1].line, 2);
    assert_eq!(tokens[2].line, 4);
}

#[test]
fn eof_is_final_and_repeats() {
    let mut scanner = Scanner::new("x");
    assert_eq!(scanner.next_token().kind, TokenKind::Ident);
    assert_eq!(scanner.next_token().kind, TokenKind::Eof);
    // the stream stays terminated
    assert_eq!(scanner.next_token().kind, TokenKind::Eof);
}

#[test]
fn lexemes_are_slices_of_the_source_buffer() {
    let source = "var abc = 12 + foo;";
    let range = source.as_ptr() as usize..source.as_ptr() as usize + source.len();
    for token in scan(source) {
        if token.kind == TokenKind::Eof {
            continue;
        }
        let start = token.lexeme.as_ptr() as usize;
        assert!(range.contains(&start), "lexeme escapes the source buffer");
        assert!(start + token.lexeme.len() <= range.end);
    }
}
