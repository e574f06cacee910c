// Property-based tests for the lexer and parser.
//
// These verify the totality laws over generated inputs:
//
// 1. The lexer always terminates and ends with EOF, emitting at most one
//    token per input byte.
// 2. Token line numbers start at 1 and never decrease.
// 3. Lexing is deterministic.
// 4. The parser always terminates and returns a block, never panicking.
// 5. Known-valid fragments lex and parse without errors.

use proptest::prelude::*;

use fen::lexer::{Lexer, Token, TokenType};
use fen::parser::Parser;

/// Valid fragments that must parse cleanly.
const VALID_FRAGMENTS: &[&str] = &[
    "42",
    "3.14",
    "10.",
    ".5",
    "\"hello\"",
    "true",
    "false",
    "nil",
    "x",
    "x := 1",
    "x = y = 1",
    "[x, y] := [1, 2]",
    "1 + 2 * (3 + 1)",
    "-x",
    "!ready",
    "a and b or c",
    "1 <= 2",
    "t.key",
    "t.[1 + 1]",
    "table{ a = 1, [2] = 3, }",
    "[1, 2, 3,]",
    "{ 1; 2 }",
    "if a 1 else 2",
    "if a { 1 } else { 2 }",
    "func(x, y)[z, w := 1] { return x }",
    "f(1, 2)",
    "return 1",
    "break nil",
    "for i := 0; i < 10; i = i + 1 { i }",
];

fn lex_all(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenType::Eof;
        tokens.push(token);
        if done {
            return tokens;
        }
        assert!(
            tokens.len() <= input.len() + 1,
            "lexer emitted more tokens than input bytes"
        );
    }
}

proptest! {
    /// The lexer terminates on arbitrary input and ends with EOF.
    #[test]
    fn lexer_is_total(input in "\\PC{0,400}") {
        let tokens = lex_all(&input);
        prop_assert_eq!(&tokens.last().unwrap().kind, &TokenType::Eof);
    }

    /// Lines are 1-based and non-decreasing across the token stream.
    #[test]
    fn lexer_lines_are_monotonic(input in "[a-z0-9+*/ \\n\\t\"().]{0,300}") {
        let tokens = lex_all(&input);
        let mut previous = 1;
        for token in &tokens {
            prop_assert!(token.line >= previous);
            previous = token.line;
        }
    }

    /// The same input always lexes to the same stream.
    #[test]
    fn lexer_is_deterministic(input in "\\PC{0,300}") {
        let first = lex_all(&input);
        let second = lex_all(&input);
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert_eq!(&a.kind, &b.kind);
            prop_assert_eq!(&a.text, &b.text);
            prop_assert_eq!(a.line, b.line);
        }
    }

    /// The parser returns a block for every input, recording errors instead
    /// of failing.
    #[test]
    fn parser_is_total(input in "\\PC{0,300}") {
        let lexer = Lexer::new(&input);
        let mut parser = Parser::new(lexer);
        let _block = parser.parse_program();
    }

    /// The parser also survives operator-dense garbage.
    #[test]
    fn parser_survives_operator_soup(input in "[-+*/=!<>:.,;(){}\\[\\] ]{0,200}") {
        let lexer = Lexer::new(&input);
        let mut parser = Parser::new(lexer);
        let _block = parser.parse_program();
    }

    /// Known-valid fragments parse without any recorded errors.
    #[test]
    fn valid_fragments_parse_cleanly(fragment in prop::sample::select(VALID_FRAGMENTS)) {
        let lexer = Lexer::new(fragment);
        let mut parser = Parser::new(lexer);
        let _block = parser.parse_program();
        prop_assert!(
            parser.errors.is_empty(),
            "fragment {:?} produced errors: {:?}",
            fragment,
            parser.errors
        );
    }
}
