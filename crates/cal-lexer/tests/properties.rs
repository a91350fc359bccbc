use cal_lexer::tokenize;
use cal_syntax::{escape_quoted_identifier, escape_string, TokenKind};
use proptest::prelude::*;

/// Fragments that drive the context machine through its interesting states.
fn fragment() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "OBJECT", "Table", "18", "Customer", "{", "}", "[", "]", "BEGIN", "END", "CASE", "OF",
        "FIELDS", "PROPERTIES", "CODE", "ACTIONS", ";", "=", ":=", "..", "'str'", "\"Name\"", "'open",
        "\"open", "/*", "*/", "//", "\n", " ", "311299D", "1.5", "x", "CaptionML", "ENU", "#", "ü",
    ])
}

fn source() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment(), 0..60).prop_map(|parts| parts.join(" "))
}

proptest! {
    #[test]
    fn exactly_one_end_marker_at_the_end(src in "\\PC{0,200}") {
        let result = tokenize(&src);
        let ends = result.tokens.iter().filter(|t| t.kind == TokenKind::EndOfInput).count();
        prop_assert_eq!(ends, 1);
        prop_assert_eq!(result.tokens.last().map(|t| t.kind), Some(TokenKind::EndOfInput));
    }

    #[test]
    fn token_text_is_the_source_slice(src in source()) {
        let result = tokenize(&src);
        for tok in &result.tokens {
            prop_assert_eq!(&src[tok.start_offset..tok.end_offset], tok.text.as_str());
        }
    }

    #[test]
    fn every_token_consumes_input(src in source()) {
        let result = tokenize(&src);
        for tok in result.tokens.iter().filter(|t| t.kind != TokenKind::EndOfInput) {
            prop_assert!(tok.end_offset > tok.start_offset, "empty token {:?}", tok);
        }
    }

    #[test]
    fn positions_never_decrease(src in source()) {
        let result = tokenize(&src);
        for pair in result.tokens.windows(2) {
            prop_assert!(pair[0].end_offset <= pair[1].start_offset);
            prop_assert!((pair[0].line, pair[0].column) < (pair[1].line, pair[1].column)
                || pair[1].kind == TokenKind::EndOfInput);
        }
    }

    #[test]
    fn tokenizing_twice_gives_the_same_result(src in source()) {
        prop_assert_eq!(tokenize(&src), tokenize(&src));
    }

    #[test]
    fn end_state_stack_is_never_empty(src in source()) {
        let state = tokenize(&src).end_state;
        prop_assert_eq!(state.context_stack.first().copied(), Some(cal_syntax::LexContext::Normal));
    }

    #[test]
    fn escaped_strings_read_back_unchanged(value in "[^\r\n]{0,40}") {
        let result = tokenize(&escape_string(&value));
        prop_assert_eq!(result.tokens.len(), 2);
        prop_assert_eq!(result.tokens[0].kind, TokenKind::String);
        prop_assert_eq!(result.tokens[0].value(), value);
    }

    #[test]
    fn escaped_names_read_back_unchanged(value in "[^\r\n]{0,40}") {
        let result = tokenize(&escape_quoted_identifier(&value));
        prop_assert_eq!(result.tokens[0].kind, TokenKind::QuotedIdentifier);
        prop_assert_eq!(result.tokens[0].value(), value);
    }

    #[test]
    fn quoted_tokens_reescape_to_their_text(src in source()) {
        for tok in tokenize(&src).tokens {
            match tok.kind {
                TokenKind::String => prop_assert_eq!(escape_string(&tok.value()), tok.text),
                TokenKind::QuotedIdentifier => prop_assert_eq!(escape_quoted_identifier(&tok.value()), tok.text),
                _ => {}
            }
        }
    }
}
