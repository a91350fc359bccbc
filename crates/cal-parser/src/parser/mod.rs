//! Recursive-descent parser over a lexed token sequence.
//!
//! Parsing never stops at the first problem. Sub-parsers return
//! [`Result`](cal_syntax::Result) and use `?`; the loops that own a
//! resynchronisation point (object body, section bodies, the code section,
//! statement lists) push the diagnostic and skip to the next boundary.

mod code;
mod expressions;
mod sections;
mod statements;

use cal_syntax::ast::*;
use cal_syntax::{Diagnostic, DiagnosticCategory, Result, Token, TokenKind};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::options::ParserOptions;

/// Deepest statement/expression nesting parsed before giving up on a
/// construct. Keeps recursion well inside a 2 MiB thread stack.
pub(crate) const MAX_NESTING: usize = 128;

/// Document plus every diagnostic found while building it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutput {
    pub document: CALDocument,
    pub diagnostics: Vec<Diagnostic>,
}

/// Cursor and counter snapshot for speculative parsing.
///
/// Restoring rewinds the token cursor, both depth counters and the
/// diagnostic list together.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    position: usize,
    brace_depth: usize,
    bracket_depth: usize,
    diagnostics_len: usize,
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    brace_depth: usize,
    bracket_depth: usize,
    diagnostics: Vec<Diagnostic>,
    declarable: Vec<TokenKind>,
    /// Nesting of REPEAT bodies; UNTIL is only a terminator inside one
    repeat_depth: usize,
    /// Current recursion depth through statements, unary operators,
    /// parentheses and sets
    nesting: usize,
    eof: Token,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], options: &ParserOptions) -> Self {
        let declarable = match options.declarable_kinds() {
            Ok(kinds) => kinds,
            Err(err) => {
                warn!(%err, "invalid parser options, using defaults");
                ParserOptions::default().declarable_kinds().unwrap_or_default()
            }
        };
        let eof = match tokens.last() {
            Some(last) => Token::new(TokenKind::EndOfInput, "", last.line, last.column, last.end_offset, last.end_offset),
            None => Token::new(TokenKind::EndOfInput, "", 1, 1, 0, 0),
        };
        Self {
            tokens,
            pos: 0,
            brace_depth: 0,
            bracket_depth: 0,
            diagnostics: Vec::new(),
            declarable,
            repeat_depth: 0,
            nesting: 0,
            eof,
        }
    }

    /// Parses a whole file: an optional `OBJECT` declaration and nothing else.
    pub fn parse_document(mut self) -> ParseOutput {
        let object = if self.check(TokenKind::Object) {
            match self.parse_object() {
                Ok(object) => Some(object),
                Err(diag) => {
                    self.error(diag);
                    None
                }
            }
        } else {
            if !self.is_at_end() {
                let diag = Diagnostic::expected("OBJECT", self.current());
                self.error(diag);
            }
            None
        };
        if object.is_some() && !self.is_at_end() {
            let diag = Diagnostic::unexpected(self.current(), "after the object declaration");
            self.error(diag);
        }
        debug!(
            tokens = self.tokens.len(),
            diagnostics = self.diagnostics().len(),
            has_object = object.is_some(),
            "parsed document"
        );
        ParseOutput {
            document: CALDocument { object },
            diagnostics: self.diagnostics,
        }
    }

    /// Diagnostics recorded so far.
    pub(crate) fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // --- token cursor ---

    pub(crate) fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    pub(crate) fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.tokens.get(self.pos + ahead).map_or(TokenKind::EndOfInput, |t| t.kind)
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.check(TokenKind::EndOfInput)
    }

    /// Consumes the current token and returns its index. Structural braces
    /// and brackets update the depth counters; end of input is never consumed.
    pub(crate) fn advance(&mut self) -> usize {
        let index = self.pos;
        match self.current().kind {
            TokenKind::EndOfInput => return index,
            TokenKind::LeftBrace => self.brace_depth += 1,
            TokenKind::RightBrace => self.brace_depth = self.brace_depth.saturating_sub(1),
            TokenKind::LeftBracket => self.bracket_depth += 1,
            TokenKind::RightBracket => self.bracket_depth = self.bracket_depth.saturating_sub(1),
            _ => {}
        }
        self.pos += 1;
        index
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<usize> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<usize> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(Diagnostic::expected(what, self.current()))
        }
    }

    /// Index of the most recently consumed token.
    pub(crate) fn last_index(&self) -> usize {
        self.pos.saturating_sub(1)
    }

    pub(crate) fn previous_is(&self, kind: TokenKind) -> bool {
        self.pos > 0 && self.tokens.get(self.pos - 1).is_some_and(|t| t.kind == kind)
    }

    pub(crate) fn span_from(&self, start: usize) -> NodeSpan {
        NodeSpan::new(start, self.last_index())
    }

    pub(crate) fn error(&mut self, diag: Diagnostic) {
        trace!(message = %diag.message, line = diag.line(), column = diag.column(), "diagnostic");
        self.diagnostics.push(diag);
    }

    /// Runs `parse` one nesting level deeper. Past [`MAX_NESTING`] the
    /// construct fails at the current token and the caller's recovery point
    /// skips it.
    pub(crate) fn nested<T>(&mut self, what: &str, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.nesting >= MAX_NESTING {
            return Err(Diagnostic::new(
                DiagnosticCategory::NestingTooDeep,
                format!("{what} nested too deeply"),
                self.current(),
            ));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.pos,
            brace_depth: self.brace_depth,
            bracket_depth: self.bracket_depth,
            diagnostics_len: self.diagnostics.len(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        trace!(from = self.pos, to = checkpoint.position, "restore checkpoint");
        self.pos = checkpoint.position;
        self.brace_depth = checkpoint.brace_depth;
        self.bracket_depth = checkpoint.bracket_depth;
        self.diagnostics.truncate(checkpoint.diagnostics_len);
    }

    /// Source text of tokens `from..to`, with one space wherever the source
    /// had a gap between two tokens.
    pub(crate) fn text_between(&self, from: usize, to: usize) -> String {
        let to = to.min(self.tokens.len());
        let mut out = String::new();
        let mut prev_end = None;
        for tok in self.tokens.get(from..to).unwrap_or_default() {
            if tok.kind == TokenKind::EndOfInput {
                break;
            }
            if prev_end.is_some_and(|end| tok.start_offset > end) {
                out.push(' ');
            }
            out.push_str(&tok.text);
            prev_end = Some(tok.end_offset);
        }
        out
    }

    /// Identifier-like token usable as a reference in code.
    pub(crate) fn is_name_token(kind: TokenKind) -> bool {
        kind.is_name() || kind.is_soft_keyword()
    }

    /// Identifier-like token usable as a declared name.
    pub(crate) fn is_declarable(&self, kind: TokenKind) -> bool {
        Self::is_name_token(kind) || self.declarable.contains(&kind)
    }

    /// Reads a declared name; quoted names are unescaped.
    pub(crate) fn parse_declared_name(&mut self) -> Result<(String, usize)> {
        let tok = self.current();
        if !self.is_declarable(tok.kind) {
            return Err(Diagnostic::expected("name", tok));
        }
        let name = tok.value();
        Ok((name, self.advance()))
    }

    /// Optional `@Id` suffix of a declaration.
    pub(crate) fn parse_declaration_id(&mut self) -> Result<Option<u32>> {
        if self.eat(TokenKind::At).is_none() {
            return Ok(None);
        }
        let tok = self.current();
        if tok.kind != TokenKind::Integer {
            return Err(Diagnostic::expected("declaration id after '@'", tok));
        }
        let id = tok
            .text
            .parse::<u32>()
            .map_err(|_| Diagnostic::new(DiagnosticCategory::ExpectedToken, "Expected a declaration id in range", tok))?;
        self.advance();
        Ok(Some(id))
    }

    // --- object ---

    fn parse_object(&mut self) -> Result<ObjectDeclaration> {
        let start = self.expect(TokenKind::Object, "OBJECT")?;
        let kind = self.parse_object_kind()?;
        let id_tok = self.current();
        let id = match id_tok.kind {
            TokenKind::Integer => id_tok.text.parse::<u32>().map_err(|_| {
                Diagnostic::new(DiagnosticCategory::MalformedObjectHeader, "Object id out of range", id_tok)
            })?,
            _ => {
                return Err(Diagnostic::new(
                    DiagnosticCategory::MalformedObjectHeader,
                    format!("Expected object id, found {}", id_tok.describe()),
                    id_tok,
                ))
            }
        };
        self.advance();

        let name_start = self.pos;
        while !self.is_at_end() && !self.check(TokenKind::LeftBrace) {
            self.advance();
        }
        let name = self.text_between(name_start, self.pos);
        if name.is_empty() {
            let diag = Diagnostic::new(
                DiagnosticCategory::MalformedObjectHeader,
                format!("Expected object name, found {}", self.current().describe()),
                self.current(),
            );
            self.error(diag);
        }

        let mut object = ObjectDeclaration {
            kind,
            id,
            name,
            object_properties: None,
            properties: None,
            fields: None,
            keys: None,
            field_groups: None,
            code: None,
            skipped_sections: Vec::new(),
            span: NodeSpan::new(start, start),
        };

        self.expect(TokenKind::LeftBrace, "'{'")?;
        let body_depth = self.brace_depth;
        let mut object_triggers = Vec::new();

        while !self.is_at_end() && !(self.check(TokenKind::RightBrace) && self.brace_depth == body_depth) {
            let section = self.current().kind;
            match section {
                TokenKind::ObjectProperties => {
                    let (props, _) = self.parse_property_section();
                    object.object_properties = Some(props);
                }
                TokenKind::Properties => {
                    let (props, triggers) = self.parse_property_section();
                    object.properties = Some(props);
                    object_triggers.extend(triggers);
                }
                TokenKind::Fields if kind == ObjectKind::Table => object.fields = Some(self.parse_field_section()),
                TokenKind::Keys if kind == ObjectKind::Table => object.keys = Some(self.parse_key_section()),
                TokenKind::FieldGroups if kind == ObjectKind::Table => {
                    object.field_groups = Some(self.parse_field_group_section())
                }
                TokenKind::Code => object.code = Some(self.parse_code_section()),
                TokenKind::Fields | TokenKind::Keys | TokenKind::FieldGroups => {
                    let tok = self.current();
                    let diag = Diagnostic::new(
                        DiagnosticCategory::UnsupportedSection,
                        format!("{} section is not valid in a {} object", tok.describe(), kind.as_str()),
                        tok,
                    );
                    self.error(diag);
                    let skipped = self.skip_unsupported_section();
                    object.skipped_sections.push(skipped);
                }
                k if k.is_section_keyword() => {
                    let skipped = self.skip_unsupported_section();
                    object.skipped_sections.push(skipped);
                }
                _ => {
                    let diag = Diagnostic::unexpected(self.current(), "in object body");
                    self.error(diag);
                    self.advance();
                }
            }
        }

        if !object_triggers.is_empty() {
            let code = object.code.get_or_insert_with(CodeSection::default);
            let mut triggers = object_triggers;
            triggers.append(&mut code.triggers);
            code.triggers = triggers;
        }

        if let Err(diag) = self.expect(TokenKind::RightBrace, "'}' closing the object") {
            self.error(diag);
        }
        object.span = self.span_from(start);
        Ok(object)
    }

    fn parse_object_kind(&mut self) -> Result<ObjectKind> {
        let tok = self.current();
        let kind = match tok.kind {
            TokenKind::Table => ObjectKind::Table,
            TokenKind::Page => ObjectKind::Page,
            TokenKind::Report => ObjectKind::Report,
            TokenKind::Codeunit => ObjectKind::Codeunit,
            TokenKind::Query => ObjectKind::Query,
            TokenKind::XmlPort => ObjectKind::XMLport,
            TokenKind::MenuSuite => ObjectKind::MenuSuite,
            TokenKind::Form => ObjectKind::Form,
            TokenKind::Dataport => ObjectKind::Dataport,
            _ => {
                return Err(Diagnostic::new(
                    DiagnosticCategory::MalformedObjectHeader,
                    format!("Expected object type, found {}", tok.describe()),
                    tok,
                ))
            }
        };
        self.advance();
        Ok(kind)
    }

    /// Consumes a section this parser builds no nodes for. The section ends
    /// when the brace depth returns to the depth observed at entry.
    pub(crate) fn skip_unsupported_section(&mut self) -> SkippedSection {
        let start = self.advance();
        let name = self.tokens.get(start).map(|t| t.text.clone()).unwrap_or_default();
        let entry_depth = self.brace_depth;
        if let Err(diag) = self.expect(TokenKind::LeftBrace, "'{'") {
            self.error(diag);
            return SkippedSection {
                name,
                span: self.span_from(start),
            };
        }
        while !self.is_at_end() {
            let closes = self.check(TokenKind::RightBrace) && self.brace_depth == entry_depth + 1;
            self.advance();
            if closes {
                break;
            }
        }
        if self.brace_depth != entry_depth {
            let diag = Diagnostic::new(
                DiagnosticCategory::UnexpectedEndOfInput,
                format!("Expected '}}' closing {name} section, found end of input"),
                self.current(),
            );
            self.error(diag);
        }
        debug!(section = %name, tokens = self.pos - start, "skipped section");
        SkippedSection {
            name,
            span: self.span_from(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, text: &str, offset: usize) -> Token {
        Token::new(kind, text, 1, offset + 1, offset, offset + text.len())
    }

    #[test]
    fn restore_rewinds_depths_and_diagnostics() {
        let tokens = vec![
            tok(TokenKind::LeftBrace, "{", 0),
            tok(TokenKind::LeftBracket, "[", 2),
            tok(TokenKind::Identifier, "a", 4),
            tok(TokenKind::EndOfInput, "", 5),
        ];
        let options = ParserOptions::default();
        let mut parser = Parser::new(&tokens, &options);
        let checkpoint = parser.checkpoint();
        parser.advance();
        parser.advance();
        assert_eq!((parser.brace_depth, parser.bracket_depth), (1, 1));
        parser.error(Diagnostic::expected("x", &tokens[2]));
        parser.restore(checkpoint);
        assert_eq!((parser.pos, parser.brace_depth, parser.bracket_depth), (0, 0, 0));
        assert!(parser.diagnostics().is_empty());
    }

    #[test]
    fn advance_never_passes_end_of_input() {
        let tokens = vec![tok(TokenKind::EndOfInput, "", 0)];
        let options = ParserOptions::default();
        let mut parser = Parser::new(&tokens, &options);
        parser.advance();
        parser.advance();
        assert_eq!(parser.pos, 0);
        assert!(parser.is_at_end());
    }

    #[test]
    fn empty_token_slice_is_end_of_input() {
        let options = ParserOptions::default();
        let output = Parser::new(&[], &options).parse_document();
        assert!(output.document.object.is_none());
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn text_between_keeps_single_spaces_for_gaps() {
        let tokens = vec![
            tok(TokenKind::Identifier, "Sales", 0),
            tok(TokenKind::Identifier, "Header", 8),
            tok(TokenKind::Dot, ".", 14),
            tok(TokenKind::EndOfInput, "", 15),
        ];
        let options = ParserOptions::default();
        let parser = Parser::new(&tokens, &options);
        assert_eq!(parser.text_between(0, 3), "Sales Header.");
    }
}
