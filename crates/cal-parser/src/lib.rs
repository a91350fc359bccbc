pub mod options;
pub mod parser;

pub use options::{OptionsError, ParserOptions};
pub use parser::{ParseOutput, Parser};

use cal_syntax::Token;

/// Parses a lexed token sequence into a document and its diagnostics.
pub fn parse(tokens: &[Token], options: &ParserOptions) -> ParseOutput {
    Parser::new(tokens, options).parse_document()
}
