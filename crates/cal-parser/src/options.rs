//! Parser configuration.
//!
//! Which reserved words may be declared as procedure, variable or parameter
//! names is a property of the real-world corpus, not of the grammar, so it is
//! data. Callers load it from configuration (`[parser]` table in `cal.toml`)
//! and validate it before use.

use cal_syntax::{keyword_from_str, TokenKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("'{0}' is not a C/AL keyword")]
    UnknownKeyword(String),
    #[error("'{0}' delimits blocks or declarations and cannot be a declared name")]
    Reserved(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserOptions {
    /// Keywords allowed as declared names. Code refers to such a declaration
    /// with the quoted spelling (`"Break";`); the bare keyword always parses
    /// as the statement.
    pub declarable_keywords: Vec<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            declarable_keywords: vec!["BREAK".to_string()],
        }
    }
}

impl ParserOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        self.declarable_kinds().map(|_| ())
    }

    /// Resolves the configured spellings to token kinds.
    pub fn declarable_kinds(&self) -> Result<Vec<TokenKind>, OptionsError> {
        self.declarable_keywords
            .iter()
            .map(|spelling| {
                let kind = keyword_from_str(spelling).ok_or_else(|| OptionsError::UnknownKeyword(spelling.clone()))?;
                match kind {
                    TokenKind::Begin | TokenKind::End | TokenKind::Var | TokenKind::Procedure | TokenKind::Local => {
                        Err(OptionsError::Reserved(spelling.clone()))
                    }
                    _ => Ok(kind),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_break() {
        let opts = ParserOptions::default();
        assert_eq!(opts.declarable_kinds(), Ok(vec![TokenKind::Break]));
    }

    #[test]
    fn unknown_spelling_is_rejected() {
        let opts = ParserOptions {
            declarable_keywords: vec!["Break".into(), "Frobnicate".into()],
        };
        assert_eq!(opts.validate(), Err(OptionsError::UnknownKeyword("Frobnicate".into())));
    }

    #[test]
    fn block_keywords_are_rejected() {
        let opts = ParserOptions {
            declarable_keywords: vec!["end".into()],
        };
        assert!(matches!(opts.validate(), Err(OptionsError::Reserved(s)) if s == "end"));
    }
}
