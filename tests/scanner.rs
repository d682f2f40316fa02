use loxi::scanner::Scanner;
use loxi::token::{Token, TokenType};

fn scan_ok(source: &str) -> Vec<Token> {
    Scanner::new(source).filter_map(Result::ok).collect()
}

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let tokens = scan_ok(source);

    assert_eq!(
        tokens.len(),
        expected.len(),
        "token count mismatch for {:?}: {:?}",
        source,
        tokens
    );

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

#[test]
fn symbols() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn one_and_two_character_operators() {
    assert_token_sequence(
        "! != = == < <= > >= /",
        &[
            (TokenType::BANG, "!"),
            (TokenType::BANG_EQUAL, "!="),
            (TokenType::EQUAL, "="),
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::LESS, "<"),
            (TokenType::LESS_EQUAL, "<="),
            (TokenType::GREATER, ">"),
            (TokenType::GREATER_EQUAL, ">="),
            (TokenType::SLASH, "/"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn keywords_are_case_sensitive_exact_matches() {
    assert_token_sequence(
        "class extends super this fun var CLASS classy",
        &[
            (TokenType::CLASS, "class"),
            (TokenType::EXTENDS, "extends"),
            (TokenType::SUPER, "super"),
            (TokenType::THIS, "this"),
            (TokenType::FUN, "fun"),
            (TokenType::VAR, "var"),
            (TokenType::IDENTIFIER, "CLASS"),
            (TokenType::IDENTIFIER, "classy"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn number_literals() {
    let tokens = scan_ok("12 3.14 0.5");

    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[0].token_type, TokenType::NUMBER(0.0));
    assert_eq!(tokens[0].lexeme, "12");

    let values: Vec<f64> = tokens[..3]
        .iter()
        .map(|t| match t.token_type {
            TokenType::NUMBER(n) => n,
            _ => panic!("expected number, got {:?}", t),
        })
        .collect();

    assert_eq!(values, vec![12.0, 3.14, 0.5]);
}

#[test]
fn no_leading_or_trailing_dot_numbers() {
    // "1." scans as NUMBER then DOT; ".5" scans as DOT then NUMBER.
    assert_token_sequence(
        "1. .5",
        &[
            (TokenType::NUMBER(0.0), "1"),
            (TokenType::DOT, "."),
            (TokenType::DOT, "."),
            (TokenType::NUMBER(0.0), "5"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn string_literal_contents_exclude_quotes() {
    let tokens = scan_ok("\"hello\"");

    assert_eq!(tokens[0].token_type, TokenType::STRING(String::new()));
    assert_eq!(tokens[0].lexeme, "\"hello\"");

    match &tokens[0].token_type {
        TokenType::STRING(s) => assert_eq!(s, "hello"),
        other => panic!("expected string, got {:?}", other),
    }
}

#[test]
fn multiline_string_counts_lines() {
    let tokens = scan_ok("\"a\nb\"\nx");

    // The identifier after the two-line string sits on line 3.
    let ident = tokens
        .iter()
        .find(|t| t.token_type == TokenType::IDENTIFIER)
        .expect("identifier token");

    assert_eq!(ident.line, 3);
}

#[test]
fn line_comment_skips_to_newline() {
    assert_token_sequence(
        "1 // ignored ) { \"\n2",
        &[
            (TokenType::NUMBER(0.0), "1"),
            (TokenType::NUMBER(0.0), "2"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn block_comment_is_skipped_and_counts_lines() {
    let tokens = scan_ok("1 /* one\ntwo\nthree */ 2");

    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[1].line, 3);
}

#[test]
fn block_comments_do_not_nest() {
    // The comment closes at the first `*/`; the trailing `*/` scans as
    // STAR SLASH.
    assert_token_sequence(
        "/* a /* b */ */",
        &[
            (TokenType::STAR, "*"),
            (TokenType::SLASH, "/"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn unterminated_string_is_reported() {
    let results: Vec<_> = Scanner::new("\"abc").collect();

    let errors: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
    assert_eq!(errors.len(), 1);

    let message = format!("{}", results[0].as_ref().unwrap_err());
    assert!(message.contains("Unterminated string."), "{}", message);

    // The stream still ends with EOF.
    let last = results.last().unwrap().as_ref().unwrap();
    assert_eq!(last.token_type, TokenType::EOF);
}

#[test]
fn unterminated_block_comment_is_reported() {
    let results: Vec<_> = Scanner::new("/* never closed").collect();

    assert!(results[0].is_err());

    let message = format!("{}", results[0].as_ref().unwrap_err());
    assert!(message.contains("Unterminated block comment."), "{}", message);
}

#[test]
fn unexpected_characters_do_not_abort_scanning() {
    let results: Vec<_> = Scanner::new(",.$(#").collect();

    // COMMA, DOT, error '$', LEFT_PAREN, error '#', EOF.
    assert_eq!(results.len(), 6);

    let error_count = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(error_count, 2);

    let kinds: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|t| t.token_type.clone())
        .collect();

    assert_eq!(
        kinds,
        vec![
            TokenType::COMMA,
            TokenType::DOT,
            TokenType::LEFT_PAREN,
            TokenType::EOF,
        ],
    );
}

#[test]
fn lexeme_round_trip_preserves_token_order() {
    let source = r#"
        // a program with a bit of everything
        class Pair extends Base {
            init(a, b) { this.a = a; /* inline */ this.b = b; }
        }
        var p = Pair(1, 2.5);
        print p.a <= p.b and !false or "s";
    "#;

    let original = scan_ok(source);

    // Rebuild a source string from the significant lexemes alone and
    // rescan: all tokens must come back in the original order.
    let rebuilt: String = original
        .iter()
        .filter(|t| t.token_type != TokenType::EOF)
        .map(|t| t.lexeme.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let rescanned = scan_ok(&rebuilt);

    assert_eq!(original.len(), rescanned.len());

    for (a, b) in original.iter().zip(rescanned.iter()) {
        assert_eq!(a.token_type, b.token_type);
        assert_eq!(a.lexeme, b.lexeme);
    }
}
