//! Recursive-descent parser: turns a token stream into a [`Statement`].
//!
//! Statement- and clause-level grammar lives here; expression grammar (the
//! precedence-climbing chain) lives in [`expressions`] to keep this file to
//! the "shape of a query" concerns.

mod expressions;

use crate::ast::{
    CreateFlow, EmitClause, Operation, Pipeline, ScanStatement, ScanStep, Statement,
    SummarizeSpec, WindowCall, WindowKind,
};
use crate::error::{QueryError, QueryResult, SyntaxError};
use crate::lexer::{Lexer, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a full query-language source string into a [`Statement`].
pub fn parse(source: &str) -> QueryResult<Statement> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_statement()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: Token) -> QueryResult<()> {
        if *self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", self.current()), &format!("{expected:?}")))
        }
    }

    fn expect_identifier_name(&mut self) -> QueryResult<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.unexpected(&format!("{other:?}"), "an identifier")),
        }
    }

    fn unexpected(&self, found: &str, expected: &str) -> QueryError {
        QueryError::from(SyntaxError::new(
            format!("expected {expected}, found {found}"),
            self.pos,
        ))
    }

    pub fn parse_statement(&mut self) -> QueryResult<Statement> {
        let statement = if matches!(self.current(), Token::Create) {
            Statement::CreateFlow(self.parse_create_flow()?)
        } else {
            Statement::Pipeline(self.parse_pipeline()?)
        };
        self.expect(Token::Eof)?;
        Ok(statement)
    }

    fn parse_create_flow(&mut self) -> QueryResult<CreateFlow> {
        self.expect(Token::Create)?;
        self.expect(Token::Flow)?;
        let name = self.expect_identifier_name()?;

        let ttl = if matches!(self.current(), Token::Ttl) {
            self.advance();
            self.expect(Token::LeftParen)?;
            let ttl = match self.current().clone() {
                Token::String(s) => {
                    self.advance();
                    s
                }
                other => return Err(self.unexpected(&format!("{other:?}"), "a duration string")),
            };
            self.expect(Token::RightParen)?;
            Some(ttl)
        } else {
            None
        };

        self.expect(Token::As)?;
        let pipeline = self.parse_pipeline()?;
        Ok(CreateFlow { name, ttl, pipeline })
    }

    fn parse_pipeline(&mut self) -> QueryResult<Pipeline> {
        let source = self.expect_identifier_name()?;
        let mut operations = Vec::new();
        while matches!(self.current(), Token::Pipe) {
            self.advance();
            operations.push(self.parse_operation()?);
        }
        Ok(Pipeline { source, operations })
    }

    fn parse_operation(&mut self) -> QueryResult<Operation> {
        match self.current().clone() {
            Token::Where => {
                self.advance();
                Ok(Operation::Where(self.parse_expression()?))
            }
            Token::Select => {
                self.advance();
                Ok(Operation::Select(self.parse_object_literal()?))
            }
            Token::Scan => {
                self.advance();
                Ok(Operation::Scan(self.parse_scan_steps()?))
            }
            Token::Summarize => {
                self.advance();
                Ok(Operation::Summarize(self.parse_summarize_spec()?))
            }
            Token::InsertInto => {
                self.advance();
                self.expect(Token::LeftParen)?;
                let name = self.expect_identifier_name()?;
                self.expect(Token::RightParen)?;
                Ok(Operation::InsertInto(name))
            }
            Token::Collect => {
                self.advance();
                Ok(Operation::Collect)
            }
            other => Err(self.unexpected(&format!("{other:?}"), "a pipeline operation")),
        }
    }

    /// `scan '(' stepDef (';' stepDef)* ';'? ')'`
    fn parse_scan_steps(&mut self) -> QueryResult<Vec<ScanStep>> {
        self.expect(Token::LeftParen)?;
        let mut steps = vec![self.parse_step_def()?];
        while matches!(self.current(), Token::Semicolon) {
            self.advance();
            if matches!(self.current(), Token::RightParen) {
                break;
            }
            steps.push(self.parse_step_def()?);
        }
        self.expect(Token::RightParen)?;
        Ok(steps)
    }

    fn parse_step_def(&mut self) -> QueryResult<ScanStep> {
        self.expect(Token::Step)?;
        let name = self.expect_identifier_name()?;
        self.expect(Token::Colon)?;
        let condition = self.parse_expression()?;
        self.expect(Token::FatArrow)?;
        let statements = self.parse_scan_statements()?;
        Ok(ScanStep {
            name,
            condition,
            statements,
        })
    }

    fn parse_scan_statements(&mut self) -> QueryResult<Vec<ScanStatement>> {
        let mut statements = vec![self.parse_scan_statement()?];
        while matches!(self.current(), Token::Comma) {
            self.advance();
            statements.push(self.parse_scan_statement()?);
        }
        Ok(statements)
    }

    fn parse_scan_statement(&mut self) -> QueryResult<ScanStatement> {
        if matches!(self.current(), Token::Emit) {
            self.advance();
            self.expect(Token::LeftParen)?;
            let expr = self.parse_expression()?;
            self.expect(Token::RightParen)?;
            return Ok(ScanStatement::Emit(expr));
        }

        let name = self.expect_identifier_name()?;
        self.expect(Token::Assign)?;
        let expr = self.parse_expression()?;
        Ok(ScanStatement::Assign(name, expr))
    }

    fn parse_summarize_spec(&mut self) -> QueryResult<SummarizeSpec> {
        let template = self.parse_object_literal()?;

        let mut by = Vec::new();
        if matches!(self.current(), Token::By) {
            self.advance();
            by.push(self.parse_expression()?);
            while matches!(self.current(), Token::Comma) {
                self.advance();
                by.push(self.parse_expression()?);
            }
        }

        let window = if matches!(self.current(), Token::Over) {
            self.advance();
            let name = self.expect_identifier_name()?;
            self.expect(Token::Assign)?;
            let call = self.parse_window_call()?;
            Some((name, call))
        } else {
            None
        };

        let emit = if matches!(self.current(), Token::Emit) {
            self.advance();
            Some(self.parse_emit_clause()?)
        } else {
            None
        };

        Ok(SummarizeSpec {
            template,
            by,
            window,
            emit,
        })
    }

    fn parse_window_call(&mut self) -> QueryResult<WindowCall> {
        let kind = match self.current() {
            Token::TumblingWindow => WindowKind::Tumbling,
            Token::TumblingWindowBy => WindowKind::TumblingBy,
            Token::HoppingWindow => WindowKind::Hopping,
            Token::HoppingWindowBy => WindowKind::HoppingBy,
            Token::SlidingWindow => WindowKind::Sliding,
            Token::SlidingWindowBy => WindowKind::SlidingBy,
            Token::CountWindow => WindowKind::Count,
            Token::SessionWindow => WindowKind::Session,
            other => return Err(self.unexpected(&format!("{other:?}"), "a window function")),
        };
        self.advance();
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
        Ok(WindowCall { kind, args })
    }

    /// `emit every <expr>` | `emit on change of <field>` | `emit on group change` | `emit on update`
    fn parse_emit_clause(&mut self) -> QueryResult<EmitClause> {
        if matches!(self.current(), Token::Every) {
            self.advance();
            return Ok(EmitClause::Every(self.parse_expression()?));
        }

        self.expect(Token::On)?;
        match self.current() {
            Token::Change => {
                self.advance();
                self.expect(Token::Of)?;
                let field = self.expect_identifier_name()?;
                Ok(EmitClause::OnChangeOf(field))
            }
            Token::Group => {
                self.advance();
                self.expect(Token::Change)?;
                Ok(EmitClause::OnGroupChange)
            }
            Token::Update => {
                self.advance();
                Ok(EmitClause::OnUpdate)
            }
            other => Err(self.unexpected(&format!("{other:?}"), "change/group change/update")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, Expression, ObjectField};

    #[test]
    fn test_parse_simple_where_select_pipeline() {
        let stmt = parse("orders | where amount > 100 | select { amount, -id }").unwrap();
        let Statement::Pipeline(pipeline) = stmt else {
            panic!("expected pipeline")
        };
        assert_eq!(pipeline.source, "orders");
        assert_eq!(pipeline.operations.len(), 2);

        match &pipeline.operations[0] {
            Operation::Where(Expression::BinaryOp { op, .. }) => {
                assert_eq!(*op, BinaryOperator::GreaterThan);
            }
            other => panic!("unexpected operation: {other:?}"),
        }

        match &pipeline.operations[1] {
            Operation::Select(obj) => {
                assert_eq!(obj.fields.len(), 2);
                assert!(matches!(&obj.fields[0], ObjectField::Pair(name, _) if name == "amount"));
                assert!(matches!(&obj.fields[1], ObjectField::Exclude(name) if name == "id"));
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_parse_create_flow_with_ttl() {
        let stmt = parse(r#"create flow recent_orders ttl("5m") as orders | collect"#).unwrap();
        let Statement::CreateFlow(flow) = stmt else {
            panic!("expected create flow")
        };
        assert_eq!(flow.name, "recent_orders");
        assert_eq!(flow.ttl.as_deref(), Some("5m"));
        assert_eq!(flow.pipeline.source, "orders");
    }

    #[test]
    fn test_parse_summarize_with_window_and_emit() {
        let stmt = parse(
            "orders | summarize { total: sum(amount) } by region over w = tumbling_window(\"1m\") emit on update",
        )
        .unwrap();
        let Statement::Pipeline(pipeline) = stmt else {
            panic!("expected pipeline")
        };
        match &pipeline.operations[0] {
            Operation::Summarize(spec) => {
                assert_eq!(spec.by.len(), 1);
                let (name, call) = spec.window.as_ref().unwrap();
                assert_eq!(name, "w");
                assert_eq!(call.kind, WindowKind::Tumbling);
                assert!(matches!(spec.emit, Some(EmitClause::OnUpdate)));
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_parse_scan_with_steps() {
        let stmt = parse(
            "events | scan(step start: kind == \"login\" => matched = true, emit(matched); step next: kind == \"logout\" => emit(kind);)",
        )
        .unwrap();
        let Statement::Pipeline(pipeline) = stmt else {
            panic!("expected pipeline")
        };
        match &pipeline.operations[0] {
            Operation::Scan(steps) => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[0].name, "start");
                assert_eq!(steps[0].statements.len(), 2);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_parse_operator_precedence() {
        let stmt = parse("s | where a + 1 * 2 > 3 && b == 1 || c").unwrap();
        let Statement::Pipeline(pipeline) = stmt else {
            panic!("expected pipeline")
        };
        match &pipeline.operations[0] {
            Operation::Where(Expression::BinaryOp { op, .. }) => {
                assert_eq!(*op, BinaryOperator::Or);
            }
            other => panic!("unexpected top-level operator: {other:?}"),
        }
    }

    #[test]
    fn test_parse_field_access_and_index() {
        let stmt = parse("s | where user.address[0] == 1").unwrap();
        let Statement::Pipeline(pipeline) = stmt else {
            panic!("expected pipeline")
        };
        assert!(matches!(
            &pipeline.operations[0],
            Operation::Where(Expression::BinaryOp { .. })
        ));
    }

    #[test]
    fn test_parse_error_on_garbage() {
        assert!(parse("s | where ").is_err());
        assert!(parse("s | bogus_operation").is_err());
    }

    #[test]
    fn test_parse_insert_into_requires_parens() {
        let stmt = parse("s | insert_into(sink)").unwrap();
        let Statement::Pipeline(pipeline) = stmt else {
            panic!("expected pipeline")
        };
        assert!(matches!(&pipeline.operations[0], Operation::InsertInto(name) if name == "sink"));

        assert!(parse("s | insert_into sink").is_err());
    }

    #[test]
    fn test_parse_keywords_as_object_field_names() {
        let stmt = parse("s | select { step: 1, where: 2, by: x }").unwrap();
        let Statement::Pipeline(pipeline) = stmt else {
            panic!("expected pipeline")
        };
        let Operation::Select(object) = &pipeline.operations[0] else {
            panic!("expected select")
        };
        assert_eq!(object.fields.len(), 3);
        assert!(matches!(&object.fields[0], ObjectField::Pair(name, _) if name == "step"));
        assert!(matches!(&object.fields[1], ObjectField::Pair(name, _) if name == "where"));
        assert!(matches!(&object.fields[2], ObjectField::Pair(name, _) if name == "by"));
    }
}
