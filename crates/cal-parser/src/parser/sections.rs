//! Property sections and the table row sections (FIELDS, KEYS, FIELDGROUPS).

use cal_syntax::ast::*;
use cal_syntax::{Diagnostic, DiagnosticCategory, Result, TokenKind};
use tracing::debug;

use super::Parser;

/// A property value that turned out to be code.
pub(crate) enum PropertyItem {
    Value(Property),
    Trigger(Trigger),
}

impl<'a> Parser<'a> {
    /// Opens `KEYWORD {` and returns the keyword index and the depth inside.
    fn open_section(&mut self) -> Result<(usize, usize)> {
        let start = self.advance();
        self.expect(TokenKind::LeftBrace, "'{'")?;
        Ok((start, self.brace_depth))
    }

    /// Consumes the section's closing brace, reporting if it is missing.
    fn close_section(&mut self, depth: usize) {
        if self.check(TokenKind::RightBrace) && self.brace_depth == depth {
            self.advance();
        } else {
            let diag = Diagnostic::expected("'}' closing the section", self.current());
            self.error(diag);
        }
    }

    fn at_section_end(&self, depth: usize) -> bool {
        self.is_at_end() || (self.check(TokenKind::RightBrace) && self.brace_depth <= depth)
    }

    /// Skips to the end of the current property: past the next `;` at
    /// `depth`, or up to a `}` that closes `depth`.
    fn recover_property(&mut self, depth: usize) {
        debug!(line = self.current().line, "resynchronising at property boundary");
        while !self.is_at_end() {
            if self.check(TokenKind::RightBrace) && self.brace_depth <= depth {
                return;
            }
            let at_depth = self.brace_depth == depth;
            if self.advance_is(TokenKind::Semicolon) && at_depth {
                return;
            }
        }
    }

    fn advance_is(&mut self, kind: TokenKind) -> bool {
        let is = self.check(kind);
        self.advance();
        is
    }

    /// `OBJECT-PROPERTIES { ... }` or `PROPERTIES { ... }`. Property
    /// triggers are returned separately.
    pub(crate) fn parse_property_section(&mut self) -> (PropertySection, Vec<Trigger>) {
        let mut section = PropertySection::default();
        let mut triggers = Vec::new();
        let (start, depth) = match self.open_section() {
            Ok(opened) => opened,
            Err(diag) => {
                self.error(diag);
                return (section, triggers);
            }
        };
        while !self.at_section_end(depth) {
            if self.eat(TokenKind::Semicolon).is_some() {
                continue;
            }
            match self.parse_property(depth) {
                Ok(PropertyItem::Value(prop)) => section.properties.push(prop),
                Ok(PropertyItem::Trigger(trigger)) => triggers.push(trigger),
                Err(diag) => {
                    self.error(diag);
                    self.recover_property(depth);
                }
            }
        }
        self.close_section(depth);
        section.span = self.span_from(start);
        (section, triggers)
    }

    /// `Name=Value` terminated by `;` or the enclosing `}`; `depth` is the
    /// brace depth the property lives at. A value starting with `BEGIN` or
    /// `VAR` is a trigger.
    pub(crate) fn parse_property(&mut self, depth: usize) -> Result<PropertyItem> {
        let name_tok = self.current();
        if !(Self::is_name_token(name_tok.kind) || name_tok.kind.is_keyword()) {
            return Err(Diagnostic::new(
                DiagnosticCategory::MalformedProperty,
                format!("Expected property name, found {}", name_tok.describe()),
                name_tok,
            ));
        }
        let start = self.advance();
        // `Version List=...`
        while Self::is_name_token(self.current().kind) || self.current().kind.is_keyword() {
            self.advance();
        }
        let name = self.text_between(start, self.pos);
        if !self.check(TokenKind::Equal) {
            let tok = self.current();
            return Err(Diagnostic::new(
                DiagnosticCategory::MalformedProperty,
                format!("Expected '=' after property {name}, found {}", tok.describe()),
                tok,
            ));
        }
        self.advance();

        if self.check(TokenKind::Begin) || self.check(TokenKind::Var) {
            let trigger = self.parse_property_trigger(name, start, depth);
            self.finish_property(depth);
            return Ok(PropertyItem::Trigger(trigger));
        }

        let value_start = self.pos;
        let mut brackets = 0usize;
        let mut braces = 0usize;
        loop {
            match self.current().kind {
                TokenKind::EndOfInput => break,
                TokenKind::LeftBracket => brackets += 1,
                TokenKind::RightBracket => brackets = brackets.saturating_sub(1),
                TokenKind::LeftBrace => braces += 1,
                // a `[` never spans the `}` that ends its row or section
                TokenKind::RightBrace if braces == 0 => {
                    if brackets > 0 {
                        let diag = Diagnostic::new(
                            DiagnosticCategory::MalformedProperty,
                            format!("Expected ']' in value of property {name}, found {}", self.current().describe()),
                            self.current(),
                        );
                        self.error(diag);
                    }
                    break;
                }
                TokenKind::RightBrace => braces -= 1,
                TokenKind::Semicolon if braces == 0 && brackets == 0 => break,
                _ => {}
            }
            self.advance();
        }
        let value = self.text_between(value_start, self.pos);
        let end = self.last_index();
        self.finish_property(depth);
        Ok(PropertyItem::Value(Property {
            name,
            value,
            span: NodeSpan::new(start, end),
        }))
    }

    /// Consumes the property terminator, if any.
    fn finish_property(&mut self, depth: usize) {
        if self.eat(TokenKind::Semicolon).is_some() || self.at_section_end(depth) {
            return;
        }
        let diag = Diagnostic::expected("';' or '}' after property", self.current());
        self.error(diag);
        self.recover_property(depth);
    }

    /// `[VAR decls] BEGIN ... END` as a property value. A trigger that cannot
    /// be parsed is rewound and skipped as a unit.
    fn parse_property_trigger(&mut self, name: String, start: usize, depth: usize) -> Trigger {
        let checkpoint = self.checkpoint();
        match self.parse_trigger_parts() {
            Ok((variables, body)) => Trigger {
                name,
                variables,
                body,
                span: self.span_from(start),
            },
            Err(diag) => {
                self.restore(checkpoint);
                self.error(diag);
                self.skip_trigger_body(depth);
                Trigger {
                    name,
                    variables: Vec::new(),
                    body: BlockStatement::default(),
                    span: self.span_from(start),
                }
            }
        }
    }

    pub(crate) fn parse_trigger_parts(&mut self) -> Result<(Vec<VariableDeclaration>, BlockStatement)> {
        let variables = if self.check(TokenKind::Var) {
            self.parse_var_block()?
        } else {
            Vec::new()
        };
        let body = self.parse_block()?;
        Ok((variables, body))
    }

    /// Skips a trigger by matching BEGIN/CASE against END.
    fn skip_trigger_body(&mut self, depth: usize) {
        let mut nesting = 0usize;
        while !self.at_section_end(depth) {
            match self.current().kind {
                TokenKind::Begin | TokenKind::Case => nesting += 1,
                TokenKind::End => {
                    nesting = nesting.saturating_sub(1);
                    if nesting == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    // --- row sections ---

    /// Reads one row column: the tokens up to `;` or the row's `}`.
    /// Returns the joined text and whether a `;` separator was consumed.
    fn read_column(&mut self, row_depth: usize) -> (String, bool) {
        let start = self.pos;
        while !self.is_at_end()
            && !(self.check(TokenKind::Semicolon) && self.brace_depth == row_depth)
            && !(self.check(TokenKind::RightBrace) && self.brace_depth <= row_depth)
        {
            self.advance();
        }
        let text = self.text_between(start, self.pos);
        (text, self.eat(TokenKind::Semicolon).is_some())
    }

    /// Splits a comma-separated column (`No.,Name`) into names.
    fn read_name_list(&mut self, row_depth: usize) -> (Vec<String>, bool) {
        let mut names = Vec::new();
        let mut item_start = self.pos;
        while !self.is_at_end()
            && !(self.check(TokenKind::Semicolon) && self.brace_depth == row_depth)
            && !(self.check(TokenKind::RightBrace) && self.brace_depth <= row_depth)
        {
            if self.check(TokenKind::Comma) {
                names.push(self.text_between(item_start, self.pos));
                self.advance();
                item_start = self.pos;
            } else {
                self.advance();
            }
        }
        let last = self.text_between(item_start, self.pos);
        if !last.is_empty() || !names.is_empty() {
            names.push(last);
        }
        (names, self.eat(TokenKind::Semicolon).is_some())
    }

    fn parse_row_id(&self, text: &str, at: usize) -> Result<Option<u32>> {
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<u32>().map(Some).map_err(|_| {
            let tok = self.tokens.get(at).unwrap_or(&self.eof);
            Diagnostic::new(
                DiagnosticCategory::IncompleteField,
                format!("Expected numeric id, found {}", tok.describe()),
                tok,
            )
        })
    }

    fn incomplete_row(&self, what: &str) -> Diagnostic {
        let tok = self.current();
        Diagnostic::new(
            DiagnosticCategory::IncompleteField,
            format!("Expected ';' before {what}, found {}", tok.describe()),
            tok,
        )
    }

    /// Parses the trailing properties of a row until its `}`.
    fn parse_row_properties(&mut self, row_depth: usize, properties: &mut Vec<Property>, triggers: &mut Vec<Trigger>) {
        while !self.at_section_end(row_depth) {
            if self.eat(TokenKind::Semicolon).is_some() {
                continue;
            }
            match self.parse_property(row_depth) {
                Ok(PropertyItem::Value(prop)) => properties.push(prop),
                Ok(PropertyItem::Trigger(trigger)) => triggers.push(trigger),
                Err(diag) => {
                    self.error(diag);
                    self.recover_property(row_depth);
                }
            }
        }
    }

    /// Skips whatever is left of a row, including its closing brace.
    fn skip_row(&mut self, section_depth: usize) {
        debug!(line = self.current().line, "skipping malformed row");
        while !self.is_at_end() {
            if self.check(TokenKind::RightBrace) {
                if self.brace_depth <= section_depth {
                    return;
                }
                if self.brace_depth == section_depth + 1 {
                    self.advance();
                    return;
                }
            }
            self.advance();
        }
    }

    /// Runs `row` for every `{ ... }` in a row section.
    fn parse_rows<T>(&mut self, mut row: impl FnMut(&mut Self, usize, usize) -> Result<T>) -> (Vec<T>, NodeSpan) {
        let mut rows = Vec::new();
        let (start, depth) = match self.open_section() {
            Ok(opened) => opened,
            Err(diag) => {
                self.error(diag);
                return (rows, NodeSpan::new(self.pos, self.pos));
            }
        };
        while !self.at_section_end(depth) {
            if !self.check(TokenKind::LeftBrace) {
                let diag = Diagnostic::expected("'{' starting a row", self.current());
                self.error(diag);
                self.advance();
                continue;
            }
            let row_start = self.advance();
            let row_depth = self.brace_depth;
            match row(self, row_start, row_depth) {
                Ok(item) => {
                    if self.check(TokenKind::RightBrace) && self.brace_depth == row_depth {
                        self.advance();
                    } else {
                        let diag = Diagnostic::expected("'}' closing the row", self.current());
                        self.error(diag);
                        self.skip_row(depth);
                    }
                    rows.push(item);
                }
                Err(diag) => {
                    self.error(diag);
                    self.skip_row(depth);
                }
            }
        }
        self.close_section(depth);
        (rows, self.span_from(start))
    }

    /// `FIELDS { { id ; ; name ; type ; properties } ... }`
    pub(crate) fn parse_field_section(&mut self) -> FieldSection {
        let (fields, span) = self.parse_rows(|p, row_start, row_depth| {
            let id_at = p.pos;
            let (id_text, sep) = p.read_column(row_depth);
            let id = p.parse_row_id(&id_text, id_at)?;
            if !sep {
                return Err(p.incomplete_row("the field name"));
            }
            let (_, sep) = p.read_column(row_depth);
            if !sep {
                return Err(p.incomplete_row("the field name"));
            }
            let (name, sep) = p.read_column(row_depth);
            if !sep {
                return Err(p.incomplete_row("the field data type"));
            }
            let (data_type, _) = p.read_column(row_depth);
            let mut properties = Vec::new();
            let mut triggers = Vec::new();
            p.parse_row_properties(row_depth, &mut properties, &mut triggers);
            Ok(FieldDeclaration {
                id,
                name,
                data_type,
                properties,
                triggers,
                span: NodeSpan::new(row_start, p.pos),
            })
        });
        FieldSection { fields, span }
    }

    /// `KEYS { { [Disabled] ; field,field ; properties } ... }`
    pub(crate) fn parse_key_section(&mut self) -> KeySection {
        let (keys, span) = self.parse_rows(|p, row_start, row_depth| {
            let (_, sep) = p.read_column(row_depth);
            if !sep {
                return Err(p.incomplete_row("the key fields"));
            }
            let (fields, _) = p.read_name_list(row_depth);
            let mut properties = Vec::new();
            let mut triggers = Vec::new();
            p.parse_row_properties(row_depth, &mut properties, &mut triggers);
            Ok(KeyDeclaration {
                fields,
                properties,
                span: NodeSpan::new(row_start, p.pos),
            })
        });
        KeySection { keys, span }
    }

    /// `FIELDGROUPS { { id ; name ; field,field ; properties } ... }`
    pub(crate) fn parse_field_group_section(&mut self) -> FieldGroupSection {
        let (groups, span) = self.parse_rows(|p, row_start, row_depth| {
            let id_at = p.pos;
            let (id_text, sep) = p.read_column(row_depth);
            let id = p.parse_row_id(&id_text, id_at)?;
            if !sep {
                return Err(p.incomplete_row("the field group name"));
            }
            let (name, sep) = p.read_column(row_depth);
            if !sep {
                return Err(p.incomplete_row("the field group fields"));
            }
            let (fields, _) = p.read_name_list(row_depth);
            let mut properties = Vec::new();
            let mut triggers = Vec::new();
            p.parse_row_properties(row_depth, &mut properties, &mut triggers);
            Ok(FieldGroupDeclaration {
                id,
                name,
                fields,
                properties,
                span: NodeSpan::new(row_start, p.pos),
            })
        });
        FieldGroupSection { groups, span }
    }
}
