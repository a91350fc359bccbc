//! Statement grammar and statement-level recovery.

use cal_syntax::ast::*;
use cal_syntax::{Diagnostic, DiagnosticCategory, Result, TokenKind};
use tracing::debug;

use super::Parser;

/// Owning construct(s) named when a continuation keyword starts a statement.
fn orphan_owner(kind: TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::Do => Some("WHILE, FOR or WITH"),
        TokenKind::Of => Some("CASE"),
        TokenKind::Then => Some("IF"),
        TokenKind::To | TokenKind::DownTo => Some("FOR"),
        TokenKind::Until => Some("REPEAT"),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    /// `BEGIN statements END`. A missing END is reported and the block is
    /// kept.
    pub fn parse_block(&mut self) -> Result<BlockStatement> {
        let start = self.expect(TokenKind::Begin, "BEGIN")?;
        // UNTIL inside the block cannot close an enclosing REPEAT
        let repeat_depth = std::mem::replace(&mut self.repeat_depth, 0);
        let statements = self.parse_statement_list(&[TokenKind::End]);
        self.repeat_depth = repeat_depth;
        match self.expect(TokenKind::End, "END") {
            Ok(end) => Ok(BlockStatement {
                statements,
                span: NodeSpan::new(start, end),
            }),
            Err(diag) => {
                self.error(diag);
                Ok(BlockStatement {
                    statements,
                    span: self.span_from(start),
                })
            }
        }
    }

    /// Statements separated by `;` up to one of `stops`, a stray `}` or end
    /// of input. Every iteration consumes at least one token or stops.
    pub(crate) fn parse_statement_list(&mut self, stops: &[TokenKind]) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            if self.at_list_end(stops) {
                break;
            }
            let before = self.pos;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(diag) => {
                    self.error(diag);
                    self.synchronize();
                }
            }
            if self.eat(TokenKind::Semicolon).is_some() || self.at_list_end(stops) {
                continue;
            }
            if self.pos == before {
                let diag = Diagnostic::unexpected(self.current(), "in statement list");
                self.error(diag);
                self.advance();
                continue;
            }
            let after_orphan = self.pos > 0 && orphan_owner(self.tokens[self.pos - 1].kind).is_some();
            if !self.previous_is(TokenKind::Semicolon) && !after_orphan {
                let diag = Diagnostic::expected("';'", self.current());
                self.error(diag);
            }
        }
        statements
    }

    fn at_list_end(&self, stops: &[TokenKind]) -> bool {
        self.is_at_end() || self.check(TokenKind::RightBrace) || stops.contains(&self.current().kind)
    }

    /// Skips to the next statement boundary: past `;`, or up to END, UNTIL,
    /// `}` or end of input.
    fn synchronize(&mut self) {
        debug!(line = self.current().line, "resynchronising at statement boundary");
        while !self.is_at_end() {
            match self.current().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::End | TokenKind::Until | TokenKind::RightBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    pub fn parse_statement(&mut self) -> Result<Statement> {
        self.nested("Statement", Self::parse_statement_by_keyword)
    }

    fn parse_statement_by_keyword(&mut self) -> Result<Statement> {
        let kind = self.current().kind;
        match kind {
            TokenKind::Begin => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Repeat => self.parse_repeat(),
            TokenKind::For => self.parse_for(),
            TokenKind::Case => self.parse_case(),
            TokenKind::With => self.parse_with(),
            TokenKind::Exit => self.parse_exit(),
            TokenKind::Break => {
                let at = self.advance();
                Ok(Statement::Break(BreakStatement {
                    span: NodeSpan::new(at, at),
                }))
            }
            TokenKind::Until if self.repeat_depth > 0 => Ok(self.empty_statement()),
            TokenKind::Semicolon
            | TokenKind::End
            | TokenKind::Else
            | TokenKind::RightBrace
            | TokenKind::EndOfInput => Ok(self.empty_statement()),
            _ => match orphan_owner(kind) {
                Some(owner) => Ok(self.orphaned_keyword(owner)),
                None => self.parse_simple_statement(),
            },
        }
    }

    fn empty_statement(&self) -> Statement {
        Statement::Empty(EmptyStatement {
            span: NodeSpan::new(self.pos, self.pos),
        })
    }

    /// Reports a continuation keyword that starts a statement, then consumes
    /// it and an optional `;`.
    fn orphaned_keyword(&mut self, owner: &str) -> Statement {
        let tok = self.current();
        let diag = Diagnostic::new(
            DiagnosticCategory::OrphanedKeyword,
            format!("Unexpected {} keyword outside of {owner} statement", tok.describe()),
            tok,
        );
        self.error(diag);
        let start = self.advance();
        let end = self.eat(TokenKind::Semicolon).unwrap_or(start);
        Statement::Empty(EmptyStatement {
            span: NodeSpan::new(start, end),
        })
    }

    /// `IF cond THEN stmt [ELSE stmt]`
    fn parse_if(&mut self) -> Result<Statement> {
        let start = self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "THEN")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = match self.eat(TokenKind::Else) {
            Some(_) => Some(Box::new(self.parse_statement()?)),
            None => None,
        };
        Ok(Statement::If(IfStatement {
            condition,
            then_branch,
            else_branch,
            span: self.span_from(start),
        }))
    }

    /// `WHILE cond DO stmt`
    fn parse_while(&mut self) -> Result<Statement> {
        let start = self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Do, "DO")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While(WhileStatement {
            condition,
            body,
            span: self.span_from(start),
        }))
    }

    /// `WITH record DO stmt`
    fn parse_with(&mut self) -> Result<Statement> {
        let start = self.advance();
        let record = self.parse_expression()?;
        self.expect(TokenKind::Do, "DO")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::With(WithStatement {
            record,
            body,
            span: self.span_from(start),
        }))
    }

    /// `REPEAT statements UNTIL cond`
    fn parse_repeat(&mut self) -> Result<Statement> {
        let start = self.advance();
        self.repeat_depth += 1;
        let body = self.parse_statement_list(&[TokenKind::Until, TokenKind::End]);
        self.repeat_depth -= 1;
        self.expect(TokenKind::Until, "UNTIL")?;
        let condition = self.parse_expression()?;
        Ok(Statement::Repeat(RepeatStatement {
            body,
            condition,
            span: self.span_from(start),
        }))
    }

    /// `FOR var := start TO|DOWNTO end DO stmt`
    ///
    /// With an invalid loop variable the rest of the loop is still parsed
    /// and its body is returned as a block.
    fn parse_for(&mut self) -> Result<Statement> {
        let start = self.advance();
        let variable = self.parse_loop_variable()?;
        self.expect(TokenKind::Assign, "':='")?;
        let from = self.parse_expression()?;
        let direction = match self.current().kind {
            TokenKind::To => ForDirection::To,
            TokenKind::DownTo => ForDirection::DownTo,
            _ => return Err(Diagnostic::expected("TO or DOWNTO", self.current())),
        };
        self.advance();
        let to = self.parse_expression()?;
        self.expect(TokenKind::Do, "DO")?;
        let body = self.parse_statement()?;
        let span = self.span_from(start);
        Ok(match variable {
            Some(variable) => Statement::For(ForStatement {
                variable,
                start: from,
                direction,
                end: to,
                body: Box::new(body),
                span,
            }),
            None => Statement::Block(BlockStatement {
                statements: vec![body],
                span,
            }),
        })
    }

    /// Identifier or `.member` chain followed by `:=`. Any other shape is
    /// reported at its first token and consumed as an expression.
    fn parse_loop_variable(&mut self) -> Result<Option<Expression>> {
        let checkpoint = self.checkpoint();
        if let Some(chain) = self.parse_member_chain() {
            if self.check(TokenKind::Assign) {
                return Ok(Some(chain));
            }
        }
        self.restore(checkpoint);

        let first = self.current().clone();
        self.parse_expression()?;
        self.error(Diagnostic::new(
            DiagnosticCategory::InvalidLoopVariable,
            format!(
                "Invalid FOR loop variable starting at {}: expected an identifier or member access",
                first.describe()
            ),
            &first,
        ));
        Ok(None)
    }

    /// `a`, `"Line No."`, `a.b."c".d`
    fn parse_member_chain(&mut self) -> Option<Expression> {
        if !Self::is_name_token(self.current().kind) {
            return None;
        }
        let mut expr = Expression::Identifier(self.identifier_at_cursor());
        while self.check(TokenKind::Dot) && Self::is_name_token(self.peek_kind(1)) {
            self.advance();
            let member = self.identifier_at_cursor();
            let span = expr.span().to(member.span);
            expr = Expression::Member(MemberExpression {
                object: Box::new(expr),
                member,
                separator: MemberSeparator::Dot,
                span,
            });
        }
        Some(expr)
    }

    /// `CASE selector OF values: stmt; ... [ELSE statements] END`
    fn parse_case(&mut self) -> Result<Statement> {
        let start = self.advance();
        let selector = self.parse_expression()?;
        self.expect(TokenKind::Of, "OF")?;

        let mut branches = Vec::new();
        while !self.at_list_end(&[TokenKind::End, TokenKind::Else]) {
            if self.eat(TokenKind::Semicolon).is_some() {
                continue;
            }
            let before = self.pos;
            match self.parse_case_branch() {
                Ok(branch) => branches.push(branch),
                Err(diag) => {
                    self.error(diag);
                    self.synchronize();
                    if self.pos == before {
                        self.advance();
                    }
                    continue;
                }
            }
            if self.eat(TokenKind::Semicolon).is_none() && !self.at_list_end(&[TokenKind::End, TokenKind::Else]) {
                let diag = Diagnostic::expected("';'", self.current());
                self.error(diag);
                self.synchronize();
            }
        }

        let else_branch = match self.eat(TokenKind::Else) {
            Some(_) => Some(self.parse_statement_list(&[TokenKind::End])),
            None => None,
        };
        self.expect(TokenKind::End, "END")?;
        Ok(Statement::Case(CaseStatement {
            selector,
            branches,
            else_branch,
            span: self.span_from(start),
        }))
    }

    fn parse_case_branch(&mut self) -> Result<CaseBranch> {
        let start = self.pos;
        let mut values = vec![self.parse_range_or_expression()?];
        while self.eat(TokenKind::Comma).is_some() {
            values.push(self.parse_range_or_expression()?);
        }
        self.expect(TokenKind::Colon, "':'")?;
        let body = self.parse_statement()?;
        Ok(CaseBranch {
            values,
            body,
            span: self.span_from(start),
        })
    }

    /// `EXIT`, `EXIT()` or `EXIT(value)`
    fn parse_exit(&mut self) -> Result<Statement> {
        let start = self.advance();
        let mut value = None;
        if self.eat(TokenKind::LeftParen).is_some() {
            if !self.check(TokenKind::RightParen) {
                value = Some(self.parse_expression()?);
            }
            self.expect(TokenKind::RightParen, "')'")?;
        }
        Ok(Statement::Exit(ExitStatement {
            value,
            span: self.span_from(start),
        }))
    }

    /// Assignment or call statement.
    fn parse_simple_statement(&mut self) -> Result<Statement> {
        let start = self.pos;
        let first = self.current().clone();
        let target = self.parse_expression()?;

        let operator = match self.current().kind {
            TokenKind::Assign => Some(AssignmentOperator::Assign),
            TokenKind::PlusAssign => Some(AssignmentOperator::AddAssign),
            TokenKind::MinusAssign => Some(AssignmentOperator::SubtractAssign),
            TokenKind::MultiplyAssign => Some(AssignmentOperator::MultiplyAssign),
            TokenKind::DivideAssign => Some(AssignmentOperator::DivideAssign),
            _ => None,
        };
        let Some(operator) = operator else {
            if !matches!(
                target,
                Expression::Identifier(_) | Expression::Member(_) | Expression::Call(_) | Expression::ArrayAccess(_)
            ) {
                self.error(Diagnostic::new(
                    DiagnosticCategory::UnexpectedToken,
                    format!("Unexpected expression starting at {}: not a statement", first.describe()),
                    &first,
                ));
            }
            return Ok(Statement::Call(CallStatement {
                expression: target,
                span: self.span_from(start),
            }));
        };

        if !target.is_assignable() {
            self.error(Diagnostic::new(
                DiagnosticCategory::InvalidAssignmentTarget,
                format!("Invalid assignment target starting at {}", first.describe()),
                &first,
            ));
        }
        self.advance();
        let value = self.parse_expression()?;
        Ok(Statement::Assignment(AssignmentStatement {
            target,
            operator,
            value,
            span: self.span_from(start),
        }))
    }
}
