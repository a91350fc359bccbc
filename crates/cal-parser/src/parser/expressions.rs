//! Expression grammar.
//!
//! Precedence, loosest first:
//!
//! | level          | operators                  |
//! |----------------|----------------------------|
//! | relational     | `= <> < <= > >= IN`        |
//! | additive       | `+ - OR XOR`               |
//! | multiplicative | `* / DIV MOD AND`          |
//! | unary          | `NOT - +`                  |
//! | postfix        | `.` `::` `(...)` `[...]`   |
//!
//! Binary operators associate to the left. `..` only appears inside sets and
//! case labels.

use cal_syntax::ast::*;
use cal_syntax::{Diagnostic, Result, TokenKind};

use super::Parser;

impl<'a> Parser<'a> {
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_relational()
    }

    fn parse_relational(&mut self) -> Result<Expression> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Equal => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::Less => BinaryOperator::Less,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::Greater => BinaryOperator::Greater,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                TokenKind::In => BinaryOperator::In,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                TokenKind::Or => BinaryOperator::Or,
                TokenKind::Xor => BinaryOperator::Xor,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Multiply => BinaryOperator::Multiply,
                TokenKind::Divide => BinaryOperator::Divide,
                TokenKind::Div => BinaryOperator::IntegerDivide,
                TokenKind::Mod => BinaryOperator::Modulo,
                TokenKind::And => BinaryOperator::And,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// Every nested expression passes through here, so depth is bounded here.
    fn parse_unary(&mut self) -> Result<Expression> {
        self.nested("Expression", Self::parse_prefixed)
    }

    fn parse_prefixed(&mut self) -> Result<Expression> {
        let op = match self.current().kind {
            TokenKind::Not => UnaryOperator::Not,
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Plus => UnaryOperator::Plus,
            _ => return self.parse_postfix(),
        };
        let start = self.advance();
        let operand = self.parse_unary()?;
        let span = NodeSpan::new(start, operand.span().end_token);
        Ok(Expression::Unary(UnaryExpression {
            operator: op,
            operand: Box::new(operand),
            span,
        }))
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current().kind {
                TokenKind::Dot | TokenKind::DoubleColon => {
                    let separator = if self.check(TokenKind::Dot) {
                        MemberSeparator::Dot
                    } else {
                        MemberSeparator::DoubleColon
                    };
                    self.advance();
                    let kind = self.current().kind;
                    if !(Self::is_name_token(kind) || kind.is_keyword()) {
                        return Err(Diagnostic::expected("member name", self.current()));
                    }
                    let member = self.identifier_at_cursor();
                    let span = expr.span().to(member.span);
                    expr = Expression::Member(MemberExpression {
                        object: Box::new(expr),
                        member,
                        separator,
                        span,
                    });
                }
                TokenKind::LeftParen => {
                    self.advance();
                    let arguments = self.parse_expression_list(TokenKind::RightParen, "')'")?;
                    let span = NodeSpan::new(expr.span().start_token, self.last_index());
                    expr = Expression::Call(CallExpression {
                        callee: Box::new(expr),
                        arguments,
                        span,
                    });
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let indices = self.parse_expression_list(TokenKind::RightBracket, "']'")?;
                    if indices.is_empty() {
                        return Err(Diagnostic::expected("array index", self.current()));
                    }
                    let span = NodeSpan::new(expr.span().start_token, self.last_index());
                    expr = Expression::ArrayAccess(ArrayAccessExpression {
                        array: Box::new(expr),
                        indices,
                        span,
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_expression_list(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expression>> {
        let mut items = Vec::new();
        if self.eat(close).is_some() {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(close, what)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let at = self.pos;
        let kind = self.current().kind;
        if Self::is_name_token(kind) {
            return Ok(Expression::Identifier(self.identifier_at_cursor()));
        }
        match kind {
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LeftBracket => return self.parse_set(),
            _ => {}
        }

        let tok = self.current();
        let value = match kind {
            TokenKind::Integer => match tok.text.parse::<i64>() {
                Ok(n) => LiteralValue::Integer(n),
                // out of i64 range, keep the digits
                Err(_) => LiteralValue::Decimal(tok.text.clone()),
            },
            TokenKind::Decimal => LiteralValue::Decimal(tok.text.clone()),
            TokenKind::String => LiteralValue::String(tok.value()),
            TokenKind::Date => LiteralValue::Date(tok.text.clone()),
            TokenKind::Time => LiteralValue::Time(tok.text.clone()),
            TokenKind::True => LiteralValue::Boolean(true),
            TokenKind::False => LiteralValue::Boolean(false),
            _ => return Err(Diagnostic::expected("expression", tok)),
        };
        self.advance();
        Ok(Expression::Literal(Literal {
            value,
            span: NodeSpan::new(at, at),
        }))
    }

    /// `[a, b..c]`
    fn parse_set(&mut self) -> Result<Expression> {
        let start = self.advance();
        let mut elements = Vec::new();
        if !self.check(TokenKind::RightBracket) {
            loop {
                elements.push(self.parse_range_or_expression()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        let end = self.expect(TokenKind::RightBracket, "']'")?;
        Ok(Expression::Set(SetExpression {
            elements,
            span: NodeSpan::new(start, end),
        }))
    }

    /// An expression optionally followed by `..upper`.
    pub(crate) fn parse_range_or_expression(&mut self) -> Result<Expression> {
        let low = self.parse_expression()?;
        if self.eat(TokenKind::DotDot).is_none() {
            return Ok(low);
        }
        let high = self.parse_expression()?;
        Ok(binary(BinaryOperator::Range, low, high))
    }

    /// Consumes the current token as an [`Identifier`]. Quoted names are
    /// unescaped; keywords keep their source spelling.
    pub(crate) fn identifier_at_cursor(&mut self) -> Identifier {
        let tok = self.current();
        let quoted = tok.kind == TokenKind::QuotedIdentifier;
        let name = tok.value();
        let at = self.advance();
        Identifier {
            name,
            quoted,
            span: NodeSpan::new(at, at),
        }
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let span = left.span().to(right.span());
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        span,
    })
}
