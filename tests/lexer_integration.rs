//! Integration tests for the lexer
//!
//! These tests cover matcher priority, positions, byte round-trips and the
//! content cache.

use codeseam::engine::{
    java, CodedBuffer, Lexer, Position, TextEncoding, TokenMatcher, INVALID_KIND,
};
use std::sync::Arc;

fn utf8(text: &str) -> CodedBuffer {
    CodedBuffer::decode(text.as_bytes(), TextEncoding::utf8())
}

fn java_lexer() -> Lexer {
    Lexer::new(java().matchers().to_vec()).with_cache(16)
}

// ============================================================================
// Token Stream Tests
// ============================================================================

#[test]
fn test_java_statement() {
    let tokens = java_lexer().lex(&utf8("if (x) { y = 1; }"), Position::start());
    let relevant: Vec<_> = tokens.iter().filter(|t| t.kind != "T_SPACE").collect();

    let codes: Vec<&str> = relevant.iter().map(|t| t.code.as_str()).collect();
    assert_eq!(
        codes,
        vec!["if", "(", "x", ")", "{", "y", "=", "1", ";", "}"]
    );
    let kinds: Vec<&str> = relevant.iter().map(|t| t.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["T_IF", "(", "T_SYMBOL", ")", "{", "T_SYMBOL", "=", "T_NUMBER", ";", "}"]
    );

    assert!(tokens.iter().all(|t| t.position.row == 1));
    assert!(tokens
        .windows(2)
        .all(|w| w[0].position.offset < w[1].position.offset));
}

#[test]
fn test_tokens_cover_input() {
    let source = "class A {\n  // note\n  String s = \"a\\\"b\";\n}\n";
    let tokens = java_lexer().lex(&utf8(source), Position::start());

    let joined: String = tokens.iter().map(|t| t.code.as_str()).collect();
    assert_eq!(joined, source);

    let string = tokens.iter().find(|t| t.kind == "T_STRING").unwrap();
    assert_eq!(string.code.as_str(), "\"a\\\"b\"");
    assert_eq!(string.position.row, 3);
    assert_eq!(string.position.column, 14);

    let comment = tokens.iter().find(|t| t.kind == "T_COMMENT").unwrap();
    assert_eq!(comment.code.as_str(), "// note");
}

#[test]
fn test_invalid_bytes_survive() {
    let bytes = b"a \xff\xfe b";
    let buffer = CodedBuffer::decode(bytes, TextEncoding::utf8());
    let lexer = Lexer::new(vec![
        TokenMatcher::regex("\\s+", "T_SPACE"),
        TokenMatcher::regex("[a-z]+", "T_WORD"),
    ]);
    let tokens = lexer.lex(&buffer, Position::start());

    let invalid: Vec<_> = tokens.iter().filter(|t| t.kind == INVALID_KIND).collect();
    assert_eq!(invalid.len(), 2);

    let mut round_trip = Vec::new();
    for token in tokens.iter() {
        round_trip.extend_from_slice(token.code.as_bytes());
    }
    assert_eq!(round_trip, bytes);
}

#[test]
fn test_start_position_offsets_tokens() {
    let tokens = java_lexer().lex(&utf8("a\nb"), Position::new(10, 3, 200));
    assert_eq!(tokens[0].position, Position::new(10, 3, 200));
    let b = tokens.last().unwrap();
    assert_eq!(b.position, Position::new(11, 1, 202));
}

// ============================================================================
// Cache Tests
// ============================================================================

#[test]
fn test_cache_returns_shared_list() {
    let lexer = java_lexer();
    let first = lexer.lex(&utf8("int x = 1;"), Position::start());
    let second = lexer.lex(&utf8("int x = 1;"), Position::start());
    assert!(Arc::ptr_eq(&first, &second));

    let (hits, misses, _) = lexer.cache_stats().unwrap();
    assert_eq!((hits, misses), (1, 1));

    // a different start position is a different entry
    let moved = lexer.lex(&utf8("int x = 1;"), Position::new(2, 1, 40));
    assert!(!Arc::ptr_eq(&first, &moved));
}

#[test]
fn test_uncached_lexer_has_no_stats() {
    let lexer = Lexer::new(java().matchers().to_vec());
    let first = lexer.lex(&utf8("x"), Position::start());
    let second = lexer.lex(&utf8("x"), Position::start());
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(lexer.cache_stats().is_none());
}
