//! The CODE section: globals, procedures and the documentation trigger.

use cal_syntax::ast::*;
use cal_syntax::{Diagnostic, Result, TokenKind};
use tracing::debug;

use super::Parser;

impl<'a> Parser<'a> {
    /// `CODE { [VAR ...] [attributes] PROCEDURE ... BEGIN END. }`
    pub(crate) fn parse_code_section(&mut self) -> CodeSection {
        let mut code = CodeSection::default();
        let start = self.advance();
        if let Err(diag) = self.expect(TokenKind::LeftBrace, "'{'") {
            self.error(diag);
            code.span = self.span_from(start);
            return code;
        }
        let depth = self.brace_depth;
        let mut attributes = Vec::new();

        while !self.is_at_end() && !(self.check(TokenKind::RightBrace) && self.brace_depth <= depth) {
            let result = match self.current().kind {
                TokenKind::Var => self.parse_var_block().map(|vars| code.variables.extend(vars)),
                TokenKind::LeftBracket => self.parse_attribute().map(|attr| attributes.push(attr)),
                TokenKind::Local | TokenKind::Procedure => self
                    .parse_procedure(std::mem::take(&mut attributes))
                    .map(|proc| code.procedures.push(proc)),
                TokenKind::Begin => self.parse_documentation_trigger().map(|trigger| code.triggers.push(trigger)),
                TokenKind::Semicolon => {
                    self.advance();
                    Ok(())
                }
                _ => Err(Diagnostic::unexpected(self.current(), "in CODE section")),
            };
            if let Err(diag) = result {
                self.error(diag);
                self.recover_declaration(depth);
            }
        }

        if self.check(TokenKind::RightBrace) && self.brace_depth == depth {
            self.advance();
        } else {
            let diag = Diagnostic::expected("'}' closing the CODE section", self.current());
            self.error(diag);
        }
        code.span = self.span_from(start);
        code
    }

    /// Skips to the next declaration-level token in the code section.
    fn recover_declaration(&mut self, depth: usize) {
        debug!(line = self.current().line, "resynchronising in CODE section");
        let start = self.pos;
        while !self.is_at_end() {
            let kind = self.current().kind;
            if kind == TokenKind::RightBrace && self.brace_depth <= depth {
                break;
            }
            let boundary = matches!(
                kind,
                TokenKind::Var | TokenKind::Local | TokenKind::Procedure | TokenKind::LeftBracket
            );
            if boundary && self.pos > start {
                break;
            }
            if self.advance_past_semicolon() {
                break;
            }
        }
    }

    fn advance_past_semicolon(&mut self) -> bool {
        let semi = self.check(TokenKind::Semicolon);
        self.advance();
        semi
    }

    /// `VAR` followed by `Name@Id : Type;` declarations.
    pub(crate) fn parse_var_block(&mut self) -> Result<Vec<VariableDeclaration>> {
        self.expect(TokenKind::Var, "VAR")?;
        let mut variables = Vec::new();
        while self.is_declarable(self.current().kind) {
            variables.push(self.parse_variable()?);
        }
        Ok(variables)
    }

    fn parse_variable(&mut self) -> Result<VariableDeclaration> {
        let (name, start) = self.parse_declared_name()?;
        let id = self.parse_declaration_id()?;
        self.expect(TokenKind::Colon, "':'")?;
        let data_type = self.parse_type_text(&[TokenKind::Semicolon]);
        if data_type.is_empty() {
            return Err(Diagnostic::expected("data type", self.current()));
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(VariableDeclaration {
            name,
            id,
            data_type,
            span: self.span_from(start),
        })
    }

    /// Reads a type up to one of `stops` at bracket and paren depth zero
    /// (`Code[20]`, `ARRAY [2] OF Decimal`, `Record 18`).
    fn parse_type_text(&mut self, stops: &[TokenKind]) -> String {
        let start = self.pos;
        let mut nesting = 0usize;
        while !self.is_at_end() {
            let kind = self.current().kind;
            if nesting == 0 && stops.contains(&kind) {
                break;
            }
            match kind {
                TokenKind::LeftBracket | TokenKind::LeftParen => nesting += 1,
                TokenKind::RightBracket | TokenKind::RightParen => nesting = nesting.saturating_sub(1),
                TokenKind::Begin | TokenKind::RightBrace => break,
                _ => {}
            }
            self.advance();
        }
        self.text_between(start, self.pos)
    }

    /// `[External]`, `[EventSubscriber(Table,18,OnAfterInsertEvent)]`;
    /// returns the text between the brackets.
    fn parse_attribute(&mut self) -> Result<String> {
        self.expect(TokenKind::LeftBracket, "'['")?;
        let start = self.pos;
        let mut nesting = 0usize;
        loop {
            match self.current().kind {
                TokenKind::EndOfInput => return Err(Diagnostic::expected("']' closing the attribute", self.current())),
                TokenKind::LeftBracket => nesting += 1,
                TokenKind::RightBracket if nesting == 0 => break,
                TokenKind::RightBracket => nesting -= 1,
                _ => {}
            }
            self.advance();
        }
        let text = self.text_between(start, self.pos);
        self.advance();
        Ok(text)
    }

    /// `[LOCAL] PROCEDURE Name@Id(params) [RetName] [: Type]; [VAR ...] BEGIN ... END;`
    fn parse_procedure(&mut self, attributes: Vec<String>) -> Result<ProcedureDeclaration> {
        let start = self.pos;
        let is_local = self.eat(TokenKind::Local).is_some();
        self.expect(TokenKind::Procedure, "PROCEDURE")?;
        let (name, _) = self.parse_declared_name()?;
        let id = self.parse_declaration_id()?;

        self.expect(TokenKind::LeftParen, "'('")?;
        let mut parameters = Vec::new();
        while !self.check(TokenKind::RightParen) && !self.is_at_end() {
            parameters.push(self.parse_parameter()?);
            if self.eat(TokenKind::Semicolon).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RightParen, "')'")?;

        let return_name = if self.is_declarable(self.current().kind) {
            let (ret, _) = self.parse_declared_name()?;
            self.parse_declaration_id()?;
            Some(ret)
        } else {
            None
        };
        let return_type = match self.eat(TokenKind::Colon) {
            Some(_) => Some(self.parse_type_text(&[TokenKind::Semicolon])),
            None => None,
        };
        self.expect(TokenKind::Semicolon, "';'")?;

        let variables = if self.check(TokenKind::Var) {
            self.parse_var_block()?
        } else {
            Vec::new()
        };
        let body = self.parse_block()?;
        self.eat(TokenKind::Semicolon);

        Ok(ProcedureDeclaration {
            name,
            id,
            is_local,
            attributes,
            parameters,
            return_name,
            return_type,
            variables,
            body,
            span: self.span_from(start),
        })
    }

    /// `[VAR] Name@Id : Type`
    fn parse_parameter(&mut self) -> Result<Parameter> {
        let start = self.pos;
        let by_reference = self.eat(TokenKind::Var).is_some();
        let (name, _) = self.parse_declared_name()?;
        let id = self.parse_declaration_id()?;
        self.expect(TokenKind::Colon, "':'")?;
        let data_type = self.parse_type_text(&[TokenKind::Semicolon, TokenKind::RightParen]);
        if data_type.is_empty() {
            return Err(Diagnostic::expected("parameter type", self.current()));
        }
        Ok(Parameter {
            name,
            id,
            by_reference,
            data_type,
            span: self.span_from(start),
        })
    }

    /// The object's trailing `BEGIN ... END.` block, which holds the
    /// documentation comment.
    fn parse_documentation_trigger(&mut self) -> Result<Trigger> {
        let start = self.pos;
        let body = self.parse_block()?;
        if self.eat(TokenKind::Dot).is_none() {
            self.eat(TokenKind::Semicolon);
        }
        Ok(Trigger {
            name: "Documentation".to_string(),
            variables: Vec::new(),
            body,
            span: self.span_from(start),
        })
    }
}
