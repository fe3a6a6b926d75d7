//! Precedence-climbing expression parser: one method per precedence level,
//! from loosest (`||`) to tightest (primary/postfix).
//!
//! `parse_or_expression` -> `parse_and_expression` -> `parse_comparison_expression`
//! -> `parse_additive_expression` -> `parse_multiplicative_expression`
//! -> `parse_unary_expression` -> `parse_postfix_expression` -> `parse_primary_expression`.

use super::Parser;
use crate::ast::{BinaryOperator, Expression, ObjectField, ObjectLiteral};
use crate::error::QueryResult;
use crate::lexer::Token;
use serde_json::Value;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> QueryResult<Expression> {
        self.parse_or_expression()
    }

    fn parse_or_expression(&mut self) -> QueryResult<Expression> {
        let mut left = self.parse_and_expression()?;
        while matches!(self.current(), Token::OrOr) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> QueryResult<Expression> {
        let mut left = self.parse_comparison_expression()?;
        while matches!(self.current(), Token::AndAnd) {
            self.advance();
            let right = self.parse_comparison_expression()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison_expression(&mut self) -> QueryResult<Expression> {
        let mut left = self.parse_additive_expression()?;
        while let Some(op) = self.parse_comparison_operator() {
            let right = self.parse_additive_expression()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison_operator(&mut self) -> Option<BinaryOperator> {
        let op = match self.current() {
            Token::Equal => BinaryOperator::Equal,
            Token::NotEqual => BinaryOperator::NotEqual,
            Token::LessThan => BinaryOperator::LessThan,
            Token::LessThanEq => BinaryOperator::LessThanOrEqual,
            Token::GreaterThan => BinaryOperator::GreaterThan,
            Token::GreaterThanEq => BinaryOperator::GreaterThanOrEqual,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_additive_expression(&mut self) -> QueryResult<Expression> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> QueryResult<Expression> {
        let mut left = self.parse_unary_expression()?;
        loop {
            let op = match self.current() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expression()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> QueryResult<Expression> {
        if matches!(self.current(), Token::Minus) {
            self.advance();
            let operand = self.parse_unary_expression()?;
            return Ok(Expression::UnaryMinus(Box::new(operand)));
        }
        if matches!(self.current(), Token::Spread) {
            self.advance();
            let operand = self.parse_unary_expression()?;
            return Ok(Expression::Spread(Box::new(operand)));
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> QueryResult<Expression> {
        let mut expr = self.parse_primary_expression()?;
        loop {
            match self.current() {
                Token::Dot => {
                    self.advance();
                    let field = self.expect_identifier_name()?;
                    expr = Expression::FieldAccess(Box::new(expr), field);
                }
                Token::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(Token::RightBracket)?;
                    expr = Expression::Index(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary_expression(&mut self) -> QueryResult<Expression> {
        match self.current().clone() {
            Token::Integer(n) => {
                self.advance();
                Ok(Expression::Literal(Value::from(n)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expression::Literal(
                    serde_json::Number::from_f64(f)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                ))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expression::Literal(Value::String(s)))
            }
            Token::True => {
                self.advance();
                Ok(Expression::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expression::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.advance();
                Ok(Expression::Literal(Value::Null))
            }
            Token::Iff => {
                self.advance();
                self.parse_call_arguments("iff".to_string())
            }
            Token::Identifier(name) => {
                self.advance();
                if matches!(self.current(), Token::LeftParen) {
                    self.parse_call_arguments(name)
                } else {
                    Ok(Expression::Variable(name))
                }
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            Token::LeftBrace => self.parse_object_literal().map(Expression::Object),
            Token::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.current(), Token::RightBracket) {
                    items.push(self.parse_expression()?);
                    while matches!(self.current(), Token::Comma) {
                        self.advance();
                        items.push(self.parse_expression()?);
                    }
                }
                self.expect(Token::RightBracket)?;
                Ok(Expression::Array(items))
            }
            other => Err(self.unexpected(&format!("{other:?}"), "an expression")),
        }
    }

    fn parse_call_arguments(&mut self, name: String) -> QueryResult<Expression> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        if !matches!(self.current(), Token::RightParen) {
            args.push(self.parse_expression()?);
            while matches!(self.current(), Token::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        self.expect(Token::RightParen)?;
        Ok(Expression::Call { name, args })
    }

    /// `{ field: expr, ...spread, -excludedField, shorthand }`
    ///
    /// Keywords are valid field names here (`{step: 1, where: 2}`) — a
    /// keyword token loses its special meaning the moment it sits where a
    /// field name is expected.
    pub(crate) fn parse_object_literal(&mut self) -> QueryResult<ObjectLiteral> {
        self.expect(Token::LeftBrace)?;
        let mut fields = Vec::new();

        while !matches!(self.current(), Token::RightBrace) {
            match self.current().clone() {
                Token::Spread => {
                    self.advance();
                    fields.push(ObjectField::Spread(self.parse_expression()?));
                }
                Token::Minus => {
                    self.advance();
                    let name = self.expect_field_name()?;
                    fields.push(ObjectField::Exclude(name));
                }
                _ if keyword_as_name(self.current()).is_some()
                    || matches!(self.current(), Token::Identifier(_)) =>
                {
                    let name = self.expect_field_name()?;
                    if matches!(self.current(), Token::Colon) {
                        self.advance();
                        let value = self.parse_expression()?;
                        fields.push(ObjectField::Pair(name, value));
                    } else {
                        fields.push(ObjectField::Pair(name.clone(), Expression::Variable(name)));
                    }
                }
                other => return Err(self.unexpected(&format!("{other:?}"), "an object field")),
            }

            if matches!(self.current(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(Token::RightBrace)?;
        Ok(ObjectLiteral { fields })
    }

    /// An identifier, or a keyword used where a field name is expected.
    fn expect_field_name(&mut self) -> QueryResult<String> {
        if let Some(name) = keyword_as_name(self.current()) {
            self.advance();
            return Ok(name.to_string());
        }
        self.expect_identifier_name()
    }
}

/// The source spelling of a keyword token, for contexts (object field
/// names) where keywords are allowed to double as identifiers.
fn keyword_as_name(token: &Token) -> Option<&'static str> {
    Some(match token {
        Token::Create => "create",
        Token::Flow => "flow",
        Token::Ttl => "ttl",
        Token::As => "as",
        Token::Where => "where",
        Token::Select => "select",
        Token::Scan => "scan",
        Token::Step => "step",
        Token::Summarize => "summarize",
        Token::InsertInto => "insert_into",
        Token::Collect => "collect",
        Token::By => "by",
        Token::Over => "over",
        Token::Iff => "iff",
        Token::Emit => "emit",
        Token::Every => "every",
        Token::When => "when",
        Token::On => "on",
        Token::Change => "change",
        Token::Of => "of",
        Token::Group => "group",
        Token::Update => "update",
        Token::Using => "using",
        Token::HoppingWindow => "hopping_window",
        Token::TumblingWindow => "tumbling_window",
        Token::SlidingWindow => "sliding_window",
        Token::CountWindow => "count_window",
        Token::SessionWindow => "session_window",
        Token::HoppingWindowBy => "hopping_window_by",
        Token::TumblingWindowBy => "tumbling_window_by",
        Token::SlidingWindowBy => "sliding_window_by",
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        _ => return None,
    })
}
