/// Lexer unit tests: positions, lexeme round-trips, literal decoding and
/// the positional error kinds.
use crate::compiler::lexer::{Lexer, Token, TokenKind};
use crate::vm::error::{ErrorKind, LexErrorKind};

fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source, "test")
        .tokenize()
        .unwrap_or_else(|e| panic!("lex failed: {}", e))
}

fn lex_err(source: &str) -> LexErrorKind {
    match Lexer::new(source, "test").tokenize() {
        Ok(tokens) => panic!("expected lex error, got {:?}", tokens),
        Err(err) => match err.kind {
            ErrorKind::Lex(kind) => kind,
            other => panic!("expected lex error, got {:?}", other),
        },
    }
}

#[test]
fn empty_and_trivia_only_inputs() {
    assert_eq!(lex("").len(), 1);
    assert_eq!(lex("   \t \n ").len(), 1);
    assert_eq!(lex("-- just a comment").len(), 1);
    assert_eq!(lex("--[[ long\ncomment ]]").len(), 1);
    assert!(matches!(lex("")[0].kind, TokenKind::Eof));
}

#[test]
fn keywords_are_case_sensitive() {
    let tokens = lex("if IF If");
    assert!(matches!(tokens[0].kind, TokenKind::If));
    assert!(matches!(tokens[1].kind, TokenKind::Name(_)));
    assert!(matches!(tokens[2].kind, TokenKind::Name(_)));
}

#[test]
fn every_lexeme_matches_its_offsets() {
    let source = "local answer = 42 + 0xFF -- trailing\nreturn answer .. 'x'";
    for token in lex(source) {
        let start = token.span.start.offset as usize;
        let end = start + token.raw_len as usize;
        let lexeme = &source[start..end];
        match &token.kind {
            TokenKind::Name(n) => assert_eq!(lexeme, n.as_str()),
            TokenKind::Int(42) => assert_eq!(lexeme, "42"),
            TokenKind::Int(255) => assert_eq!(lexeme, "0xFF"),
            TokenKind::Local => assert_eq!(lexeme, "local"),
            TokenKind::Concat => assert_eq!(lexeme, ".."),
            _ => {}
        }
    }
}

#[test]
fn positions_track_lines_and_columns() {
    let tokens = lex("a\n  b");
    assert_eq!(tokens[0].span.start.line, 1);
    assert_eq!(tokens[0].span.start.column, 1);
    assert_eq!(tokens[1].span.start.line, 2);
    assert_eq!(tokens[1].span.start.column, 3);
}

#[test]
fn number_forms() {
    assert!(matches!(lex("0")[0].kind, TokenKind::Int(0)));
    assert!(matches!(lex("0xFF")[0].kind, TokenKind::Int(255)));
    assert!(matches!(lex("0X0")[0].kind, TokenKind::Int(0)));
    assert!(matches!(lex("3.14")[0].kind, TokenKind::Float(_)));
    assert!(matches!(lex("2.5e3")[0].kind, TokenKind::Float(f) if f == 2500.0));
    assert!(matches!(lex("1E+2")[0].kind, TokenKind::Float(f) if f == 100.0));
    assert!(matches!(lex("1e10")[0].kind, TokenKind::Float(_)));
    assert!(matches!(lex("1.5e-5")[0].kind, TokenKind::Float(_)));
    assert!(matches!(lex(".5")[0].kind, TokenKind::Float(f) if f == 0.5));
}

#[test]
fn trailing_dot_is_a_delimiter() {
    // `42.` lexes as the number 42 followed by the dot delimiter.
    let tokens = lex("42.");
    assert!(matches!(tokens[0].kind, TokenKind::Int(42)));
    assert!(matches!(tokens[1].kind, TokenKind::Dot));
}

#[test]
fn exponent_needs_digits() {
    assert_eq!(lex_err("1e"), LexErrorKind::InvalidNumber);
    assert_eq!(lex_err("1e+"), LexErrorKind::InvalidNumber);
    assert_eq!(lex_err("0x"), LexErrorKind::InvalidHexNumber);
}

#[test]
fn string_escapes_decode() {
    let tokens = lex(r#""a\tb\nc\\d\"e""#);
    match &tokens[0].kind {
        TokenKind::Str(bytes) => assert_eq!(bytes, b"a\tb\nc\\d\"e"),
        other => panic!("expected string, got {:?}", other),
    }
    // Unknown escapes are preserved literally.
    let tokens = lex(r#""\q""#);
    match &tokens[0].kind {
        TokenKind::Str(bytes) => assert_eq!(bytes, b"\\q"),
        other => panic!("expected string, got {:?}", other),
    }
}

#[test]
fn empty_and_quoted_strings() {
    assert!(matches!(&lex("''")[0].kind, TokenKind::Str(b) if b.is_empty()));
    assert!(matches!(&lex("\"\"")[0].kind, TokenKind::Str(b) if b.is_empty()));
}

#[test]
fn newline_in_short_string_is_an_error() {
    assert_eq!(lex_err("'abc\ndef'"), LexErrorKind::UnclosedString);
    assert_eq!(lex_err("'abc"), LexErrorKind::UnclosedString);
}

#[test]
fn long_bracket_levels() {
    for (source, expected) in [
        ("[[hello]]", "hello"),
        ("[=[hello]=]", "hello"),
        ("[==[hello]==]", "hello"),
        ("[===[hello]===]", "hello"),
        // A closer with the wrong level is content.
        ("[==[a]=]b]==]", "a]=]b"),
    ] {
        match &lex(source)[0].kind {
            TokenKind::Str(bytes) => assert_eq!(bytes, expected.as_bytes()),
            other => panic!("expected string for {}, got {:?}", source, other),
        }
    }
}

#[test]
fn long_string_discards_leading_newline() {
    match &lex("[[\nline]]")[0].kind {
        TokenKind::Str(bytes) => assert_eq!(bytes, b"line"),
        other => panic!("expected string, got {:?}", other),
    }
}

#[test]
fn unclosed_long_forms() {
    assert_eq!(lex_err("[[abc"), LexErrorKind::UnclosedLongString);
    assert_eq!(lex_err("--[[abc"), LexErrorKind::UnclosedComment);
}

#[test]
fn comment_newline_variants() {
    for source in ["-- c\nx", "-- c\rx", "-- c\r\nx"] {
        let tokens = lex(source);
        assert!(
            matches!(&tokens[0].kind, TokenKind::Name(n) if n == "x"),
            "for {:?}",
            source
        );
    }
    // `--[` without a long-bracket opener is a line comment.
    assert_eq!(lex("--[ not a long comment\nx").len(), 2);
}

#[test]
fn dot_concat_dots_longest_match() {
    let tokens = lex(". .. ...");
    assert!(matches!(tokens[0].kind, TokenKind::Dot));
    assert!(matches!(tokens[1].kind, TokenKind::Concat));
    assert!(matches!(tokens[2].kind, TokenKind::Dots));
}

#[test]
fn unexpected_character() {
    assert!(matches!(
        lex_err("local a = $"),
        LexErrorKind::UnexpectedCharacter('$')
    ));
}

#[test]
fn decimal_overflow_becomes_float() {
    let tokens = lex("99999999999999999999999999");
    assert!(matches!(tokens[0].kind, TokenKind::Float(_)));
}
