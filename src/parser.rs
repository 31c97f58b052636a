use crate::ast::{Expr, Stmt};
use crate::error::SyntaxError;
use crate::token::{Token, TokenKind};
use crate::value::Value;
use std::rc::Rc;
use tracing::{instrument, trace};

/// Parses a scanned token stream into top-level statements. Stops at the
/// first grammar violation; nothing after the offending token is consumed.
#[instrument(skip(tokens), fields(count = tokens.len()), err)]
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, SyntaxError> {
    Parser::new(tokens).program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    fn program(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        trace!(count = statements.len(), "Parsed program");
        Ok(statements)
    }

    // ---- statements ----

    fn declaration(&mut self) -> Result<Stmt, SyntaxError> {
        if self.matches(&[TokenKind::Var]) {
            self.var_declaration()
        } else if self.matches(&[TokenKind::Func]) {
            self.function_declaration()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> Result<Stmt, SyntaxError> {
        let name = self.consume_identifier("expect variable name")?;
        let initializer = if self.matches(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            TokenKind::Semicolon,
            "expect ';' after variable declaration",
        )?;
        trace!(name = %name.lexeme, "Parsed variable declaration");
        Ok(Stmt::Var { name, initializer })
    }

    fn function_declaration(&mut self) -> Result<Stmt, SyntaxError> {
        let name = self.consume_identifier("expect function name")?;
        self.consume(TokenKind::LeftParen, "expect '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.consume_identifier("expect parameter name")?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expect ')' after parameters")?;

        self.consume(TokenKind::LeftBrace, "expect '{' before function body")?;
        let body = self.block_statements()?;
        trace!(name = %name.lexeme, params = params.len(), "Parsed function declaration");
        Ok(Stmt::Function {
            name,
            params,
            body: Rc::new(body),
        })
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        if self.matches(&[TokenKind::LeftBrace]) {
            Ok(Stmt::Block(self.block_statements()?))
        } else if self.matches(&[TokenKind::If]) {
            self.if_statement()
        } else if self.matches(&[TokenKind::While]) {
            self.while_statement()
        } else if self.matches(&[TokenKind::Return]) {
            self.return_statement()
        } else if self.matches(&[TokenKind::Print]) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// Parses the statements of a block whose `{` is already consumed.
    fn block_statements(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "expect '}' after block")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.consume(TokenKind::LeftParen, "expect '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "expect ')' after if condition")?;

        let then_branch = Box::new(self.statement()?);
        // An `else` binds to the nearest unmatched `if`, which falls out of
        // parsing it eagerly here.
        let else_branch = if self.matches(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.consume(TokenKind::LeftParen, "expect '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "expect ')' after while condition")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let keyword = self.previous().clone();
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "expect ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn print_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "expect ';' after value")?;
        Ok(Stmt::Print(expr))
    }

    fn expression_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "expect ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    // ---- expressions, lowest precedence first ----

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.assignment()
    }

    /// Assignment parses a full `logic_or` expression first and only then
    /// reinterprets it as a target when an `=` follows. That is what lets
    /// the right-hand side be an arbitrary expression.
    fn assignment(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.logic_or()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name } => Ok(Expr::Assignment {
                    name,
                    value: Box::new(value),
                }),
                _ => Err(SyntaxError::new(&equals, "invalid assignment target")),
            };
        }
        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.logic_and()?;
        while self.matches(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.equality()?;
        while self.matches(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.comparison()?;
        while self.matches(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.term()?;
        while self.matches(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.factor()?;
        while self.matches(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.unary()?;
        while self.matches(&[TokenKind::Slash, TokenKind::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
            });
        }
        self.call()
    }

    /// A primary followed by zero or more `(...)` suffixes. Each suffix
    /// wraps the expression built so far, so `f()()` nests two calls.
    fn call(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        while self.matches(&[TokenKind::LeftParen]) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, SyntaxError> {
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "expect ')' after arguments")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Literal(Value::Nil))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Str(s)))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Variable { name: token })
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.expression()?;
                self.consume(TokenKind::RightParen, "expect ')' after expression")?;
                Ok(Expr::Grouping {
                    inner: Box::new(inner),
                })
            }
            _ => Err(SyntaxError::new(&token, "expect expression")),
        }
    }

    // ---- token-stream helpers ----

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(self.peek(), message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, SyntaxError> {
        if self.peek().kind == TokenKind::Identifier {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(self.peek(), message))
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use crate::scanner::scan;

    fn parse_source(source: &str) -> Result<Vec<Stmt>, SyntaxError> {
        parse(scan(source).expect("scan should succeed"))
    }

    fn parse_expression(source: &str) -> Expr {
        let statements = parse_source(&format!("{};", source)).expect("parse should succeed");
        match statements.into_iter().next() {
            Some(Stmt::Expression(expr)) => expr,
            other => panic!("expected a single expression statement, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        init_test_logging();
        // 2 + 3 * 4 must parse as 2 + (3 * 4).
        let expr = parse_expression("2 + 3 * 4");
        match expr {
            Expr::Binary {
                operator, right, ..
            } => {
                assert_eq!(operator.kind, TokenKind::Plus);
                assert!(matches!(
                    *right,
                    Expr::Binary { ref operator, .. } if operator.kind == TokenKind::Star
                ));
            }
            other => panic!("expected binary plus at the root, got {:?}", other),
        }
    }

    #[test]
    fn binary_tiers_are_left_associative() {
        init_test_logging();
        // 1 - 2 - 3 must parse as (1 - 2) - 3.
        let expr = parse_expression("1 - 2 - 3");
        match expr {
            Expr::Binary { operator, left, .. } => {
                assert_eq!(operator.kind, TokenKind::Minus);
                assert!(matches!(
                    *left,
                    Expr::Binary { ref operator, .. } if operator.kind == TokenKind::Minus
                ));
            }
            other => panic!("expected binary minus at the root, got {:?}", other),
        }
    }

    #[test]
    fn comparison_binds_looser_than_term() {
        init_test_logging();
        let expr = parse_expression("1 + 2 < 4");
        assert!(matches!(
            expr,
            Expr::Binary { ref operator, .. } if operator.kind == TokenKind::Less
        ));
    }

    #[test]
    fn unary_is_right_associative() {
        init_test_logging();
        let expr = parse_expression("!!true");
        match expr {
            Expr::Unary { operator, operand } => {
                assert_eq!(operator.kind, TokenKind::Bang);
                assert!(matches!(*operand, Expr::Unary { .. }));
            }
            other => panic!("expected nested unary, got {:?}", other),
        }
    }

    #[test]
    fn grouping_overrides_precedence() {
        init_test_logging();
        let expr = parse_expression("(2 + 3) * 4");
        match expr {
            Expr::Binary { operator, left, .. } => {
                assert_eq!(operator.kind, TokenKind::Star);
                assert!(matches!(*left, Expr::Grouping { .. }));
            }
            other => panic!("expected star at the root, got {:?}", other),
        }
    }

    #[test]
    fn call_with_zero_arguments() {
        init_test_logging();
        let expr = parse_expression("f()");
        match expr {
            Expr::Call { arguments, .. } => assert!(arguments.is_empty()),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn curried_call_nests_call_nodes() {
        init_test_logging();
        let expr = parse_expression("f(1)(2)");
        match expr {
            Expr::Call {
                callee, arguments, ..
            } => {
                assert_eq!(arguments.len(), 1);
                assert!(matches!(*callee, Expr::Call { .. }));
            }
            other => panic!("expected nested calls, got {:?}", other),
        }
    }

    #[test]
    fn logical_operators_produce_logical_nodes() {
        init_test_logging();
        let expr = parse_expression("a or b and c");
        match expr {
            Expr::Logical {
                operator, right, ..
            } => {
                assert_eq!(operator.kind, TokenKind::Or);
                assert!(matches!(
                    *right,
                    Expr::Logical { ref operator, .. } if operator.kind == TokenKind::And
                ));
            }
            other => panic!("expected logical or at the root, got {:?}", other),
        }
    }

    #[test]
    fn assignment_to_variable_target() {
        init_test_logging();
        let expr = parse_expression("x = 1 + 2");
        match expr {
            Expr::Assignment { name, value } => {
                assert_eq!(name.lexeme, "x");
                assert!(matches!(*value, Expr::Binary { .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn assignment_to_non_variable_is_a_syntax_error() {
        init_test_logging();
        let err = parse_source("1 = 2;").expect_err("should fail");
        assert_eq!(err.message, "invalid assignment target");
        assert_eq!(err.token.kind, TokenKind::Equal);
    }

    #[test]
    fn assignment_is_right_associative() {
        init_test_logging();
        let expr = parse_expression("a = b = 1");
        match expr {
            Expr::Assignment { value, .. } => {
                assert!(matches!(*value, Expr::Assignment { .. }));
            }
            other => panic!("expected chained assignment, got {:?}", other),
        }
    }

    #[test]
    fn var_declaration_without_initializer() {
        init_test_logging();
        let statements = parse_source("var x;").expect("parse should succeed");
        assert!(matches!(
            statements[0],
            Stmt::Var {
                ref name,
                initializer: None
            } if name.lexeme == "x"
        ));
    }

    #[test]
    fn else_binds_to_nearest_if() {
        init_test_logging();
        let statements =
            parse_source("if (a) if (b) print 1; else print 2;").expect("parse should succeed");
        match &statements[0] {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                // The outer if has no else; the inner one owns it.
                assert!(else_branch.is_none());
                assert!(matches!(
                    **then_branch,
                    Stmt::If { ref else_branch, .. } if else_branch.is_some()
                ));
            }
            other => panic!("expected if statement, got {:?}", other),
        }
    }

    #[test]
    fn while_statement_parses_condition_and_body() {
        init_test_logging();
        let statements = parse_source("while (x < 3) x = x + 1;").expect("parse should succeed");
        assert!(matches!(statements[0], Stmt::While { .. }));
    }

    #[test]
    fn function_declaration_collects_parameters() {
        init_test_logging();
        let statements =
            parse_source("func add(a, b) { return a + b; }").expect("parse should succeed");
        match &statements[0] {
            Stmt::Function { name, params, body } => {
                assert_eq!(name.lexeme, "add");
                assert_eq!(params.len(), 2);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected function declaration, got {:?}", other),
        }
    }

    #[test]
    fn return_without_value() {
        init_test_logging();
        let statements = parse_source("func f() { return; }").expect("parse should succeed");
        match &statements[0] {
            Stmt::Function { body, .. } => {
                assert!(matches!(body[0], Stmt::Return { value: None, .. }));
            }
            other => panic!("expected function declaration, got {:?}", other),
        }
    }

    #[test]
    fn missing_closing_paren_names_the_expectation() {
        init_test_logging();
        let err = parse_source("f(1;").expect_err("should fail");
        assert_eq!(err.message, "expect ')' after arguments");
    }

    #[test]
    fn missing_closing_brace_names_the_expectation() {
        init_test_logging();
        let err = parse_source("{ print 1;").expect_err("should fail");
        assert_eq!(err.message, "expect '}' after block");
    }

    #[test]
    fn missing_semicolon_is_a_syntax_error() {
        init_test_logging();
        let err = parse_source("print 1").expect_err("should fail");
        assert_eq!(err.message, "expect ';' after value");
        assert_eq!(err.token.kind, TokenKind::Eof);
    }

    #[test]
    fn block_collects_inner_declarations() {
        init_test_logging();
        let statements = parse_source("{ var x = 1; print x; }").expect("parse should succeed");
        match &statements[0] {
            Stmt::Block(inner) => assert_eq!(inner.len(), 2),
            other => panic!("expected block, got {:?}", other),
        }
    }
}
