//! Diagnostics reported by the parser.
//!
//! Nothing in the front-end aborts on malformed input. Syntactic problems are
//! collected as [`Diagnostic`] values while parsing continues; lexical
//! problems surface as [`TokenKind::Unknown`](crate::TokenKind::Unknown)
//! tokens and structural problems through the lexer end-state (see
//! [`crate::validation`]).
//!
//! # Message stability
//!
//! Callers classify diagnostics by [`DiagnosticCategory`] or, for older
//! tooling, by message substring. Messages therefore keep their identifying
//! prefixes: `"Expected ..."`, `"Unexpected <KEYWORD> ..."` and
//! `"... end of input"`.
//!
//! # Examples
//!
//! ```rust
//! use cal_syntax::{Diagnostic, DiagnosticCategory, Token, TokenKind};
//!
//! let tok = Token::new(TokenKind::Do, "DO", 4, 9, 57, 59);
//! let diag = Diagnostic::new(DiagnosticCategory::OrphanedKeyword, "Unexpected DO", &tok);
//! assert_eq!(diag.to_string(), "Unexpected DO at 4:9");
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::token::Token;

/// Coarse classification of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticCategory {
    /// Input ended inside an unfinished construct
    UnexpectedEndOfInput,
    /// A token that cannot start or continue the current construct
    UnexpectedToken,
    /// A specific token was required but something else was found
    ExpectedToken,
    /// `FOR` variable that is not an identifier or member chain
    InvalidLoopVariable,
    /// Assignment target that is not an lvalue
    InvalidAssignmentTarget,
    /// `DO`, `OF`, `THEN`, `TO`, `DOWNTO` or `UNTIL` starting a statement
    OrphanedKeyword,
    /// `Name=Value` property that could not be read
    MalformedProperty,
    /// Section row that ended before its structural columns
    IncompleteField,
    /// `OBJECT <Kind> <Id> <Name>` header problems
    MalformedObjectHeader,
    /// Section that is not valid for the object kind
    UnsupportedSection,
    /// Statements or expressions nested past the parser's recursion limit
    NestingTooDeep,
}

/// A syntactic problem found while parsing, anchored at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} at {}:{}", .token.line, .token.column)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub message: String,
    /// The token the problem was detected at, used for positions
    pub token: Token,
}

impl Diagnostic {
    pub fn new(category: DiagnosticCategory, message: impl Into<String>, token: &Token) -> Self {
        Self {
            category,
            message: message.into(),
            token: token.clone(),
        }
    }

    /// `Expected <what>, found <token>`; end of input gets its own category.
    pub fn expected(what: &str, found: &Token) -> Self {
        let category = if found.kind == crate::TokenKind::EndOfInput {
            DiagnosticCategory::UnexpectedEndOfInput
        } else {
            DiagnosticCategory::ExpectedToken
        };
        Self::new(category, format!("Expected {}, found {}", what, found.describe()), found)
    }

    /// `Unexpected <token>` with a trailing context phrase.
    pub fn unexpected(found: &Token, context: &str) -> Self {
        let category = if found.kind == crate::TokenKind::EndOfInput {
            DiagnosticCategory::UnexpectedEndOfInput
        } else {
            DiagnosticCategory::UnexpectedToken
        };
        Self::new(category, format!("Unexpected {} {}", found.describe(), context), found)
    }

    pub fn line(&self) -> usize {
        self.token.line
    }

    pub fn column(&self) -> usize {
        self.token.column
    }
}

/// A specialized `Result` type for parser sub-routines.
pub type Result<T> = std::result::Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenKind;

    #[test]
    fn expected_at_end_of_input_is_categorized() {
        let eof = Token::new(TokenKind::EndOfInput, "", 9, 1, 120, 120);
        let diag = Diagnostic::expected("END", &eof);
        assert_eq!(diag.category, DiagnosticCategory::UnexpectedEndOfInput);
        assert_eq!(diag.message, "Expected END, found end of input");
    }

    #[test]
    fn unexpected_names_keyword() {
        let tok = Token::new(TokenKind::Else, "else", 2, 3, 10, 14);
        let diag = Diagnostic::unexpected(&tok, "in statement list");
        assert_eq!(diag.category, DiagnosticCategory::UnexpectedToken);
        assert!(diag.message.starts_with("Unexpected ELSE"));
        assert_eq!((diag.line(), diag.column()), (2, 3));
    }
}
