//! The main parser implementation.

use crate::Error;
use crate::ast::*;
use crate::lexer::{AugOperator, Scanner, Span, Token, TokenKind};

/// Deepest nesting of expressions and blocks accepted before parsing fails.
pub const MAX_NESTING_DEPTH: usize = 100;

/// A recursive descent parser for mod scripts.
///
/// The whole host-language grammar is accepted, but only the constructs the
/// lowering pass understands get a full tree. The rest parse into
/// [`Statement::Unsupported`] and [`Expression::Opaque`] nodes.
pub struct Parser<'a> {
    source: &'a str,
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            source,
            scanner,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0)),
            depth: 0,
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program, Error> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            if self.check(&TokenKind::Newline) {
                self.advance();
                continue;
            }
            self.parse_statement(&mut body)?;
        }

        Ok(Program { body })
    }

    /// Parses one statement line (or compound statement) into `body`.
    ///
    /// A line of `;`-separated simple statements appends several nodes.
    pub fn parse_statement(&mut self, body: &mut Vec<Statement>) -> Result<(), Error> {
        let stmt = match &self.current.kind {
            TokenKind::Def => self.parse_function_def(Vec::new())?,
            TokenKind::At => self.parse_decorated()?,
            TokenKind::If => self.parse_if_statement()?,
            TokenKind::While => self.parse_while_statement()?,
            TokenKind::For => self.parse_for_statement()?,
            TokenKind::Try => self.parse_try_statement()?,
            TokenKind::With => self.parse_with_statement()?,
            TokenKind::Class => self.parse_class_def()?,
            TokenKind::Async => self.parse_async_statement()?,
            TokenKind::Indent => return Err(self.error("unexpected indent")),
            _ => return self.parse_simple_statements(body),
        };
        body.push(stmt);
        Ok(())
    }

    fn parse_simple_statements(&mut self, body: &mut Vec<Statement>) -> Result<(), Error> {
        loop {
            body.push(self.parse_simple_statement()?);

            if !self.check(&TokenKind::Semicolon) {
                break;
            }
            self.advance();
            if self.check(&TokenKind::Newline) || self.is_at_end() {
                break;
            }
        }

        self.expect_line_end()
    }

    fn parse_simple_statement(&mut self) -> Result<Statement, Error> {
        match &self.current.kind {
            TokenKind::Pass => {
                self.advance();
                Ok(Statement::Pass)
            }
            TokenKind::Break => {
                self.advance();
                Ok(Statement::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Statement::Continue)
            }
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Import => self.parse_import_statement(),
            TokenKind::From => self.parse_from_import_statement(),
            TokenKind::Global => self.parse_name_list_statement("global"),
            TokenKind::Nonlocal => self.parse_name_list_statement("nonlocal"),
            TokenKind::Assert => {
                self.advance();
                self.parse_expression()?;
                if self.check(&TokenKind::Comma) {
                    self.advance();
                    self.parse_expression()?; // message
                }
                Ok(Statement::Unsupported(UnsupportedStatement::simple("assert")))
            }
            TokenKind::Del => {
                self.advance();
                self.parse_expression_list()?;
                Ok(Statement::Unsupported(UnsupportedStatement::simple("del")))
            }
            TokenKind::Raise => {
                self.advance();
                if !self.at_statement_end() {
                    self.parse_expression()?;
                    if self.check(&TokenKind::From) {
                        self.advance();
                        self.parse_expression()?; // cause
                    }
                }
                Ok(Statement::Unsupported(UnsupportedStatement::simple("raise")))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_name_list_statement(&mut self, kind: &'static str) -> Result<Statement, Error> {
        self.advance(); // consume 'global' or 'nonlocal'
        loop {
            self.expect_identifier()?;
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(Statement::Unsupported(UnsupportedStatement::simple(kind)))
    }

    fn parse_decorated(&mut self) -> Result<Statement, Error> {
        let mut decorators = Vec::new();

        while self.check(&TokenKind::At) {
            self.advance(); // consume '@'
            decorators.push(self.parse_expression()?);
            self.expect(&TokenKind::Newline)?;
        }

        match &self.current.kind {
            TokenKind::Def => self.parse_function_def(decorators),
            TokenKind::Class => self.parse_class_def(),
            TokenKind::Async => self.parse_async_statement(),
            _ => Err(self.error("expected 'def' or 'class' after decorator")),
        }
    }

    /// `async def`, `async for` and `async with` never lower; an `async def`
    /// is not an entry point either.
    fn parse_async_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'async'
        let inner = match &self.current.kind {
            TokenKind::Def => self.parse_function_def(Vec::new())?,
            TokenKind::For => self.parse_for_statement()?,
            TokenKind::With => self.parse_with_statement()?,
            _ => return Err(self.error("expected 'def', 'for' or 'with' after 'async'")),
        };
        Ok(Statement::Unsupported(UnsupportedStatement::compound(
            "async",
            vec![inner],
        )))
    }

    fn parse_class_def(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'class'
        self.expect_identifier()?;
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            self.parse_arguments()?; // bases and keywords
            self.expect(&TokenKind::RightParen)?;
        }
        let body = self.parse_block()?;
        Ok(Statement::Unsupported(UnsupportedStatement::compound("class", body)))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'try'
        let mut body = self.parse_block()?;

        let mut has_handler = false;
        while self.check(&TokenKind::Except) {
            self.advance();
            if self.check(&TokenKind::Star) {
                self.advance(); // except*
            }
            if !self.check(&TokenKind::Colon) {
                self.parse_expression()?;
                self.skip_alias()?;
            }
            body.extend(self.parse_block()?);
            has_handler = true;
        }
        if has_handler {
            body.extend(self.parse_else_block()?);
        }

        if self.check(&TokenKind::Finally) {
            self.advance();
            body.extend(self.parse_block()?);
        } else if !has_handler {
            return Err(self.error("expected 'except' or 'finally' block"));
        }

        Ok(Statement::Unsupported(UnsupportedStatement::compound("try", body)))
    }

    fn parse_with_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'with'
        loop {
            self.parse_expression()?;
            if self.check(&TokenKind::As) {
                self.advance();
                self.parse_bit_or()?; // target
            }
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        let body = self.parse_block()?;
        Ok(Statement::Unsupported(UnsupportedStatement::compound("with", body)))
    }

    fn parse_function_def(&mut self, decorators: Vec<Expression>) -> Result<Statement, Error> {
        self.advance(); // consume 'def'
        let name = self.expect_identifier()?;

        self.expect(&TokenKind::LeftParen)?;
        let params = self.parse_parameters()?;
        self.expect(&TokenKind::RightParen)?;

        let returns = if self.check(&TokenKind::Arrow) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(Statement::FunctionDef(FunctionDef {
            name,
            params,
            body,
            decorators,
            returns,
        }))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Identifier>, Error> {
        let mut params = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            // `*args`, `**kwargs` and the bare `*` and `/` separators
            if matches!(
                self.current.kind,
                TokenKind::Star | TokenKind::StarStar | TokenKind::Slash
            ) {
                self.advance();
                if self.check(&TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                if self.check(&TokenKind::RightParen) {
                    break;
                }
            }

            params.push(self.expect_identifier()?);

            if self.check(&TokenKind::Colon) {
                self.advance();
                self.parse_expression()?; // annotation
            }
            if self.check(&TokenKind::Equal) {
                self.advance();
                self.parse_expression()?; // default value
            }

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(params)
    }

    fn parse_if_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'if' or 'elif'
        let test = self.parse_expression()?;
        let body = self.parse_block()?;

        let orelse = if self.check(&TokenKind::Elif) {
            vec![self.parse_if_statement()?]
        } else if self.check(&TokenKind::Else) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };

        Ok(Statement::If(IfStatement { test, body, orelse }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'while'
        let test = self.parse_expression()?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_block()?;

        Ok(Statement::While(WhileStatement { test, body, orelse }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'for'

        // Targets stop below comparisons so `in` is not taken as an operator
        let target = self.parse_target_list()?;
        self.expect(&TokenKind::In)?;
        let iter = self.parse_expression_list()?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_block()?;

        Ok(Statement::For(ForStatement {
            target,
            iter,
            body,
            orelse,
        }))
    }

    fn parse_else_block(&mut self) -> Result<Vec<Statement>, Error> {
        if self.check(&TokenKind::Else) {
            self.advance();
            self.parse_block()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_target_list(&mut self) -> Result<Expression, Error> {
        let first = self.parse_bit_or()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut elements = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.check(&TokenKind::In) {
                break;
            }
            elements.push(self.parse_bit_or()?);
        }
        Ok(Expression::Tuple(elements))
    }

    /// Parses `':' suite`, where the suite is either the rest of the line or
    /// an indented block.
    fn parse_block(&mut self) -> Result<Vec<Statement>, Error> {
        self.nested(Self::parse_suite)
    }

    fn parse_suite(&mut self) -> Result<Vec<Statement>, Error> {
        self.expect(&TokenKind::Colon)?;
        let mut body = Vec::new();

        if !self.check(&TokenKind::Newline) {
            self.parse_simple_statements(&mut body)?;
            return Ok(body);
        }

        self.advance(); // consume NEWLINE
        if !self.check(&TokenKind::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.advance();

        while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
            self.parse_statement(&mut body)?;
        }
        self.expect(&TokenKind::Dedent)?;

        Ok(body)
    }

    fn parse_return_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'return'

        let value = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression_list()?)
        };

        Ok(Statement::Return(ReturnStatement { value }))
    }

    fn parse_import_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'import'

        let module = self.parse_dotted_name()?;
        self.skip_alias()?;

        // `import a, b` keeps the first module and records the rest as names
        let mut names = Vec::new();
        while self.check(&TokenKind::Comma) {
            self.advance();
            names.push(self.parse_dotted_name()?);
            self.skip_alias()?;
        }

        Ok(Statement::Import(ImportStatement { module, names }))
    }

    fn parse_from_import_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'from'

        let mut module = String::new();
        while self.check(&TokenKind::Dot) {
            self.advance();
            module.push('.');
        }
        if !self.check(&TokenKind::Import) {
            module.push_str(&self.parse_dotted_name()?);
        }
        self.expect(&TokenKind::Import)?;

        let mut names = Vec::new();
        if self.check(&TokenKind::Star) {
            self.advance();
            names.push("*".to_string());
        } else {
            let parenthesized = self.check(&TokenKind::LeftParen);
            if parenthesized {
                self.advance();
            }
            loop {
                names.push(self.expect_identifier()?.name);
                self.skip_alias()?;
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
                if parenthesized && self.check(&TokenKind::RightParen) {
                    break;
                }
            }
            if parenthesized {
                self.expect(&TokenKind::RightParen)?;
            }
        }

        Ok(Statement::Import(ImportStatement { module, names }))
    }

    fn parse_dotted_name(&mut self) -> Result<String, Error> {
        let mut name = self.expect_identifier()?.name;
        while self.check(&TokenKind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_identifier()?.name);
        }
        Ok(name)
    }

    fn skip_alias(&mut self) -> Result<(), Error> {
        if self.check(&TokenKind::As) {
            self.advance();
            self.expect_identifier()?;
        }
        Ok(())
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, Error> {
        let first = self.parse_expression_list()?;

        if let TokenKind::AugAssign(op) = self.current.kind {
            self.advance();
            self.check_assignable(&first)?;
            let value = self.parse_expression_list()?;
            return Ok(Statement::AugAssign(AugAssignStatement {
                target: first,
                operator: aug_to_binary(op),
                value,
            }));
        }

        if self.check(&TokenKind::Colon) {
            // Annotated assignment, `x: int = 1` or a bare `x: int`
            self.advance();
            self.check_assignable(&first)?;
            self.parse_expression()?;
            if !self.check(&TokenKind::Equal) {
                return Ok(Statement::Unsupported(UnsupportedStatement::simple(
                    "annotation",
                )));
            }
            self.advance();
            let value = self.parse_expression_list()?;
            return Ok(Statement::Assign(AssignStatement {
                targets: vec![first],
                value,
            }));
        }

        if !self.check(&TokenKind::Equal) {
            return Ok(Statement::Expression(ExpressionStatement { expression: first }));
        }

        // a = b = value: everything but the last expression is a target
        let mut targets = vec![first];
        while self.check(&TokenKind::Equal) {
            self.advance();
            targets.push(self.parse_expression_list()?);
        }
        let value = targets.pop().ok_or_else(|| self.error("expected expression"))?;
        for target in &targets {
            self.check_assignable(target)?;
        }

        Ok(Statement::Assign(AssignStatement { targets, value }))
    }

    fn check_assignable(&self, target: &Expression) -> Result<(), Error> {
        match target {
            Expression::Name(_) | Expression::Attribute(_) | Expression::Subscript(_) => Ok(()),
            Expression::Tuple(items) | Expression::List(items) => {
                items.iter().try_for_each(|item| self.check_assignable(item))
            }
            Expression::Opaque(OpaqueExpression {
                kind: OpaqueKind::Starred,
                operands,
            }) => operands.iter().try_for_each(|item| self.check_assignable(item)),
            _ => Err(self.error_at(self.previous.span, "cannot assign to expression")),
        }
    }

    // ==================== Expressions ====================

    /// Parses a comma-separated expression list; more than one element (or a
    /// trailing comma) yields a tuple.
    pub fn parse_expression_list(&mut self) -> Result<Expression, Error> {
        let first = self.parse_starred()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut elements = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.at_expression_list_end() {
                break;
            }
            elements.push(self.parse_starred()?);
        }
        Ok(Expression::Tuple(elements))
    }

    /// Parses a single expression.
    pub fn parse_expression(&mut self) -> Result<Expression, Error> {
        self.nested(Self::parse_conditional)
    }

    /// Parses an expression that may carry a `*` or `**` unpacking prefix.
    fn parse_starred(&mut self) -> Result<Expression, Error> {
        if self.check(&TokenKind::Star) || self.check(&TokenKind::StarStar) {
            self.advance();
            let value = self.parse_bit_or()?;
            return Ok(opaque(OpaqueKind::Starred, vec![value]));
        }
        self.parse_expression()
    }

    fn parse_conditional(&mut self) -> Result<Expression, Error> {
        match &self.current.kind {
            TokenKind::Lambda => return self.parse_lambda(),
            TokenKind::Yield => return self.parse_yield(),
            _ => {}
        }

        let expr = self.parse_or()?;

        if self.check(&TokenKind::If) {
            self.advance();
            let test = self.parse_or()?;
            self.expect(&TokenKind::Else)?;
            let orelse = self.parse_expression()?;
            return Ok(opaque(OpaqueKind::Conditional, vec![expr, test, orelse]));
        }

        if self.check(&TokenKind::ColonEqual) {
            if expr.as_name().is_none() {
                return Err(self.error("cannot use assignment expressions with this target"));
            }
            self.advance();
            let value = self.parse_expression()?;
            return Ok(opaque(OpaqueKind::NamedExpr, vec![expr, value]));
        }

        Ok(expr)
    }

    fn parse_lambda(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume 'lambda'

        while !self.check(&TokenKind::Colon) {
            if matches!(
                self.current.kind,
                TokenKind::Star | TokenKind::StarStar | TokenKind::Slash
            ) {
                self.advance();
            }
            if let TokenKind::Identifier(_) = self.current.kind {
                self.advance();
                if self.check(&TokenKind::Equal) {
                    self.advance();
                    self.parse_expression()?; // default value
                }
            }
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&TokenKind::Colon)?;
        let body = self.parse_expression()?;
        Ok(opaque(OpaqueKind::Lambda, vec![body]))
    }

    fn parse_yield(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume 'yield'

        let mut operands = Vec::new();
        if self.check(&TokenKind::From) {
            self.advance();
            operands.push(self.parse_expression()?);
        } else if !self.at_expression_list_end() && !self.check(&TokenKind::RightParen) {
            operands.push(self.parse_expression_list()?);
        }
        Ok(opaque(OpaqueKind::Yield, operands))
    }

    /// Parses the `for ... in ... if ...` clauses that follow the leading
    /// parts of a comprehension.
    fn parse_comprehension(&mut self, mut operands: Vec<Expression>) -> Result<Expression, Error> {
        while self.check(&TokenKind::For) || self.check(&TokenKind::Async) {
            if self.check(&TokenKind::Async) {
                self.advance();
            }
            self.expect(&TokenKind::For)?;
            operands.push(self.parse_target_list()?);
            self.expect(&TokenKind::In)?;
            operands.push(self.parse_or()?);

            while self.check(&TokenKind::If) {
                self.advance();
                operands.push(self.parse_or()?);
            }
        }
        Ok(opaque(OpaqueKind::Comprehension, operands))
    }

    fn parse_or(&mut self) -> Result<Expression, Error> {
        let first = self.parse_and()?;
        if !self.check(&TokenKind::Or) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.check(&TokenKind::Or) {
            self.advance();
            values.push(self.parse_and()?);
        }
        Ok(Expression::BoolOp(BoolOpExpression {
            operator: BoolOperator::Or,
            values,
        }))
    }

    fn parse_and(&mut self) -> Result<Expression, Error> {
        let first = self.parse_not()?;
        if !self.check(&TokenKind::And) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.check(&TokenKind::And) {
            self.advance();
            values.push(self.parse_not()?);
        }
        Ok(Expression::BoolOp(BoolOpExpression {
            operator: BoolOperator::And,
            values,
        }))
    }

    fn parse_not(&mut self) -> Result<Expression, Error> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expression::Unary(UnaryExpression {
                operator: UnaryOperator::Not,
                operand: Box::new(operand),
            }));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, Error> {
        let left = self.parse_bit_or()?;

        let mut operators = Vec::new();
        let mut comparators = Vec::new();

        while let Some(op) = self.match_compare_operator()? {
            operators.push(op);
            comparators.push(self.parse_bit_or()?);
        }

        if operators.is_empty() {
            return Ok(left);
        }
        Ok(Expression::Compare(CompareExpression {
            left: Box::new(left),
            operators,
            comparators,
        }))
    }

    fn match_compare_operator(&mut self) -> Result<Option<CompareOperator>, Error> {
        let op = match &self.current.kind {
            TokenKind::EqualEqual => CompareOperator::Eq,
            TokenKind::NotEqual => CompareOperator::NotEq,
            TokenKind::LessThan => CompareOperator::Lt,
            TokenKind::LessThanEqual => CompareOperator::LtE,
            TokenKind::GreaterThan => CompareOperator::Gt,
            TokenKind::GreaterThanEqual => CompareOperator::GtE,
            TokenKind::In => CompareOperator::In,
            TokenKind::Is => {
                self.advance();
                if self.check(&TokenKind::Not) {
                    self.advance();
                    return Ok(Some(CompareOperator::IsNot));
                }
                return Ok(Some(CompareOperator::Is));
            }
            TokenKind::Not => {
                self.advance();
                self.expect(&TokenKind::In)?;
                return Ok(Some(CompareOperator::NotIn));
            }
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(op))
    }

    fn parse_bit_or(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_bit_xor()?;
        while self.check(&TokenKind::Pipe) {
            self.advance();
            let right = self.parse_bit_xor()?;
            left = binary(BinaryOperator::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_bit_and()?;
        while self.check(&TokenKind::Caret) {
            self.advance();
            let right = self.parse_bit_and()?;
            left = binary(BinaryOperator::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_shift()?;
        while self.check(&TokenKind::Ampersand) {
            self.advance();
            let right = self.parse_shift()?;
            left = binary(BinaryOperator::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match &self.current.kind {
                TokenKind::LeftShift => BinaryOperator::LShift,
                TokenKind::RightShift => BinaryOperator::RShift,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match &self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.current.kind {
                TokenKind::Star => BinaryOperator::Mult,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::SlashSlash => BinaryOperator::FloorDiv,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, Error> {
        let operator = match &self.current.kind {
            TokenKind::Minus => UnaryOperator::USub,
            TokenKind::Plus => UnaryOperator::UAdd,
            TokenKind::Tilde => UnaryOperator::Invert,
            TokenKind::Await => {
                self.advance();
                let operand = self.nested(Self::parse_unary)?;
                return Ok(opaque(OpaqueKind::Await, vec![operand]));
            }
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expression::Unary(UnaryExpression {
            operator,
            operand: Box::new(operand),
        }))
    }

    fn parse_power(&mut self) -> Result<Expression, Error> {
        let base = self.parse_postfix()?;
        if self.check(&TokenKind::StarStar) {
            self.advance();
            // Right associative, and binds tighter than a unary on its left
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(binary(BinaryOperator::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expression, Error> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&TokenKind::LeftParen) {
                self.advance();
                let (arguments, keywords) = self.parse_arguments()?;
                self.expect(&TokenKind::RightParen)?;
                expr = Expression::Call(CallExpression {
                    callee: Box::new(expr),
                    arguments,
                    keywords,
                });
            } else if self.check(&TokenKind::Dot) {
                self.advance();
                let attr = self.expect_identifier()?;
                expr = Expression::Attribute(AttributeExpression {
                    value: Box::new(expr),
                    attr,
                });
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let index = self.parse_subscript()?;
                self.expect(&TokenKind::RightBracket)?;
                expr = Expression::Subscript(SubscriptExpression {
                    value: Box::new(expr),
                    index: Box::new(index),
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Expression>, Vec<Keyword>), Error> {
        let mut arguments = Vec::new();
        let mut keywords = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            if self.check(&TokenKind::StarStar) {
                // `**mapping` unpacking is not kept
                self.advance();
                self.parse_bit_or()?;
            } else if self.check(&TokenKind::Star) {
                arguments.push(self.parse_starred()?);
            } else {
                self.parse_argument(&mut arguments, &mut keywords)?;
            }

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok((arguments, keywords))
    }

    fn parse_argument(
        &mut self,
        arguments: &mut Vec<Expression>,
        keywords: &mut Vec<Keyword>,
    ) -> Result<(), Error> {
        let value = self.parse_expression()?;

        if self.check(&TokenKind::For) {
            // A lone generator argument, `sum(x for x in xs)`
            arguments.push(self.parse_comprehension(vec![value])?);
        } else if self.check(&TokenKind::Equal) {
            let Expression::Name(name) = value else {
                return Err(self.error("keyword argument must be a plain name"));
            };
            self.advance();
            let value = self.parse_expression()?;
            keywords.push(Keyword { name, value });
        } else if !keywords.is_empty() {
            return Err(self.error("positional argument follows keyword argument"));
        } else {
            arguments.push(value);
        }
        Ok(())
    }

    /// Parses the inside of `[...]` after a value: indexes, slices or a
    /// tuple of them.
    fn parse_subscript(&mut self) -> Result<Expression, Error> {
        let first = self.parse_slice_item()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut elements = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.check(&TokenKind::RightBracket) {
                break;
            }
            elements.push(self.parse_slice_item()?);
        }
        Ok(Expression::Tuple(elements))
    }

    fn parse_slice_item(&mut self) -> Result<Expression, Error> {
        let mut operands = Vec::new();
        if !self.check(&TokenKind::Colon) {
            let index = self.parse_starred()?;
            if !self.check(&TokenKind::Colon) {
                return Ok(index);
            }
            operands.push(index);
        }

        // `:upper` then `:step`, either of them may be empty
        for _ in 0..2 {
            if !self.check(&TokenKind::Colon) {
                break;
            }
            self.advance();
            if !matches!(
                self.current.kind,
                TokenKind::Colon | TokenKind::Comma | TokenKind::RightBracket
            ) {
                operands.push(self.parse_expression()?);
            }
        }
        Ok(opaque(OpaqueKind::Slice, operands))
    }

    fn parse_primary(&mut self) -> Result<Expression, Error> {
        match &self.current.kind {
            TokenKind::Int(n) => {
                let value = *n;
                self.advance();
                Ok(Expression::Literal(Literal::Int(value)))
            }
            TokenKind::Float(n) => {
                let value = *n;
                self.advance();
                Ok(Expression::Literal(Literal::Float(value)))
            }
            TokenKind::String(_) | TokenKind::Bytes(_) | TokenKind::FString(_) => {
                self.parse_strings()
            }
            TokenKind::Ellipsis => {
                self.advance();
                Ok(opaque(OpaqueKind::Ellipsis, Vec::new()))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::Literal(Literal::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::Literal(Literal::Boolean(false)))
            }
            TokenKind::None => {
                self.advance();
                Ok(Expression::Literal(Literal::None))
            }
            TokenKind::Identifier(name) => {
                let id = Identifier::new(name.clone());
                self.advance();
                Ok(Expression::Name(id))
            }
            TokenKind::LeftParen => self.parse_parenthesized(),
            TokenKind::LeftBracket => self.parse_list_display(),
            TokenKind::LeftBrace => self.parse_brace_display(),
            TokenKind::Invalid(msg) => Err(self.error(&msg.clone())),
            other => Err(self.error(&format!("unexpected token {:?}", other))),
        }
    }

    /// Parses a run of adjacent string literals, which concatenate. A bytes
    /// or formatted part makes the whole run opaque.
    fn parse_strings(&mut self) -> Result<Expression, Error> {
        let start = self.current.span;
        let mut value = String::new();
        let (mut text, mut bytes, mut formatted) = (false, false, false);

        loop {
            match &self.current.kind {
                TokenKind::String(part) => {
                    value.push_str(part);
                    text = true;
                }
                TokenKind::Bytes(part) => {
                    value.push_str(part);
                    bytes = true;
                }
                TokenKind::FString(part) => {
                    value.push_str(part);
                    formatted = true;
                }
                _ => break,
            }
            self.advance();
        }

        if bytes && (text || formatted) {
            return Err(self.error_at(start, "cannot mix bytes and nonbytes literals"));
        }
        Ok(if bytes {
            opaque(OpaqueKind::Bytes(value), Vec::new())
        } else if formatted {
            opaque(OpaqueKind::FormattedString(value), Vec::new())
        } else {
            Expression::Literal(Literal::String(value))
        })
    }

    fn parse_parenthesized(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '('

        if self.check(&TokenKind::RightParen) {
            self.advance();
            return Ok(Expression::Tuple(Vec::new()));
        }

        let first = self.parse_starred()?;
        if self.check(&TokenKind::RightParen) {
            self.advance();
            return Ok(first);
        }
        if self.check(&TokenKind::For) || self.check(&TokenKind::Async) {
            let generator = self.parse_comprehension(vec![first])?;
            self.expect(&TokenKind::RightParen)?;
            return Ok(generator);
        }

        self.expect(&TokenKind::Comma)?;
        let mut elements = vec![first];
        elements.extend(self.parse_display_elements(&TokenKind::RightParen)?);
        self.expect(&TokenKind::RightParen)?;
        Ok(Expression::Tuple(elements))
    }

    fn parse_list_display(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '['

        if self.check(&TokenKind::RightBracket) {
            self.advance();
            return Ok(Expression::List(Vec::new()));
        }

        let first = self.parse_starred()?;
        if self.check(&TokenKind::For) || self.check(&TokenKind::Async) {
            let comprehension = self.parse_comprehension(vec![first])?;
            self.expect(&TokenKind::RightBracket)?;
            return Ok(comprehension);
        }

        let mut elements = vec![first];
        if self.check(&TokenKind::Comma) {
            self.advance();
            elements.extend(self.parse_display_elements(&TokenKind::RightBracket)?);
        }
        self.expect(&TokenKind::RightBracket)?;
        Ok(Expression::List(elements))
    }

    fn parse_display_elements(&mut self, close: &TokenKind) -> Result<Vec<Expression>, Error> {
        let mut elements = Vec::new();
        while !self.check(close) {
            elements.push(self.parse_starred()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(elements)
    }

    /// Parses a dict or set display, or a dict or set comprehension.
    fn parse_brace_display(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '{'

        if self.check(&TokenKind::RightBrace) || self.check(&TokenKind::StarStar) {
            return self.parse_dict_entries(Vec::new(), Vec::new());
        }

        let first = self.parse_starred()?;

        if self.check(&TokenKind::Colon) {
            self.advance();
            let value = self.parse_expression()?;
            if self.check(&TokenKind::For) || self.check(&TokenKind::Async) {
                let comprehension = self.parse_comprehension(vec![first, value])?;
                self.expect(&TokenKind::RightBrace)?;
                return Ok(comprehension);
            }
            if self.check(&TokenKind::Comma) {
                self.advance();
                return self.parse_dict_entries(vec![first], vec![value]);
            }
            self.expect(&TokenKind::RightBrace)?;
            return Ok(Expression::Dict(DictExpression {
                keys: vec![first],
                values: vec![value],
            }));
        }

        if self.check(&TokenKind::For) || self.check(&TokenKind::Async) {
            let comprehension = self.parse_comprehension(vec![first])?;
            self.expect(&TokenKind::RightBrace)?;
            return Ok(comprehension);
        }

        let mut elements = vec![first];
        if self.check(&TokenKind::Comma) {
            self.advance();
            elements.extend(self.parse_display_elements(&TokenKind::RightBrace)?);
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(opaque(OpaqueKind::Set, elements))
    }

    /// Parses the remaining `key: value` and `**mapping` entries of a dict
    /// display, through the closing brace.
    fn parse_dict_entries(
        &mut self,
        mut keys: Vec<Expression>,
        mut values: Vec<Expression>,
    ) -> Result<Expression, Error> {
        while !self.check(&TokenKind::RightBrace) {
            if self.check(&TokenKind::StarStar) {
                // `**mapping` unpacking is not kept
                self.advance();
                self.parse_bit_or()?;
            } else {
                keys.push(self.parse_expression()?);
                self.expect(&TokenKind::Colon)?;
                values.push(self.parse_expression()?);
            }
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Expression::Dict(DictExpression { keys, values }))
    }

    // ==================== Helpers ====================

    /// Runs `parse` one nesting level deeper, failing past
    /// [`MAX_NESTING_DEPTH`].
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("too many nested expressions or blocks"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.scanner.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), Error> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                describe(kind),
                describe(&self.current.kind)
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<Identifier, Error> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let id = Identifier::new(name.clone());
            self.advance();
            Ok(id)
        } else {
            Err(self.error(&format!(
                "expected identifier, found {}",
                describe(&self.current.kind)
            )))
        }
    }

    fn expect_line_end(&mut self) -> Result<(), Error> {
        if self.check(&TokenKind::Newline) {
            self.advance();
            Ok(())
        } else if self.is_at_end() || self.check(&TokenKind::Dedent) {
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected end of line, found {}",
                describe(&self.current.kind)
            )))
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof | TokenKind::Dedent
        )
    }

    fn at_expression_list_end(&self) -> bool {
        self.at_statement_end()
            || matches!(
                self.current.kind,
                TokenKind::Equal | TokenKind::AugAssign(_) | TokenKind::Colon | TokenKind::RightBracket
            )
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn error(&self, message: &str) -> Error {
        self.error_at(self.current.span, message)
    }

    fn error_at(&self, span: Span, message: &str) -> Error {
        let (line, column) = line_column(self.source, span.start);
        Error::Syntax {
            message: message.to_string(),
            line,
            column,
        }
    }
}

fn opaque(kind: OpaqueKind, operands: Vec<Expression>) -> Expression {
    Expression::Opaque(OpaqueExpression::new(kind, operands))
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn aug_to_binary(op: AugOperator) -> BinaryOperator {
    match op {
        AugOperator::Add => BinaryOperator::Add,
        AugOperator::Sub => BinaryOperator::Sub,
        AugOperator::Mult => BinaryOperator::Mult,
        AugOperator::Div => BinaryOperator::Div,
        AugOperator::FloorDiv => BinaryOperator::FloorDiv,
        AugOperator::Mod => BinaryOperator::Mod,
        AugOperator::Pow => BinaryOperator::Pow,
        AugOperator::LShift => BinaryOperator::LShift,
        AugOperator::RShift => BinaryOperator::RShift,
        AugOperator::BitAnd => BinaryOperator::BitAnd,
        AugOperator::BitOr => BinaryOperator::BitOr,
        AugOperator::BitXor => BinaryOperator::BitXor,
    }
}

/// Human-readable token name for diagnostics.
fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Indent => "indent".to_string(),
        TokenKind::Dedent => "dedent".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::LeftParen => "'('".to_string(),
        TokenKind::RightParen => "')'".to_string(),
        TokenKind::RightBracket => "']'".to_string(),
        TokenKind::RightBrace => "'}'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::In => "'in'".to_string(),
        TokenKind::Identifier(name) => format!("identifier '{}'", name),
        TokenKind::Invalid(msg) => msg.clone(),
        other => format!("{:?}", other),
    }
}

/// Converts a byte offset to a 1-based (line, column) pair.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to parse and get first statement
    fn parse_stmt(src: &str) -> Statement {
        let mut parser = Parser::new(src);
        let program = parser.parse_program().unwrap();
        program.body.into_iter().next().unwrap()
    }

    // Helper to parse and check it succeeds
    fn parse_ok(src: &str) -> Program {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap()
    }

    // Helper to parse and check it fails
    fn parse_err(src: &str) -> Error {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap_err()
    }

    fn first_def(src: &str) -> FunctionDef {
        match parse_stmt(src) {
            Statement::FunctionDef(def) => def,
            other => panic!("expected def, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_def() {
        let def = first_def("def on_tick():\n    log('hi')\n");
        assert_eq!(def.name.name, "on_tick");
        assert_eq!(def.body.len(), 1);
    }

    #[test]
    fn test_parse_def_with_params_annotations_and_decorators() {
        let def = first_def("@event\ndef handle(a, b: int = 3, *rest, **kw) -> None:\n    pass\n");
        let params: Vec<_> = def.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["a", "b", "rest", "kw"]);
        assert_eq!(def.decorators.len(), 1);
        assert_eq!(def.returns, Some(Expression::Literal(Literal::None)));
    }

    #[test]
    fn test_parse_call_with_keywords() {
        let stmt = parse_stmt("give_item('p', 'diamond', count=3)\n");
        let Statement::Expression(ExpressionStatement {
            expression: Expression::Call(call),
        }) = stmt
        else {
            panic!("expected call");
        };
        assert_eq!(call.arguments.len(), 2);
        assert_eq!(call.keywords.len(), 1);
        assert_eq!(call.keywords[0].name.name, "count");
    }

    #[test]
    fn test_parse_elif_chain_nests() {
        let stmt = parse_stmt("if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n");
        let Statement::If(outer) = stmt else {
            panic!("expected if");
        };
        assert_eq!(outer.orelse.len(), 1);
        let Statement::If(inner) = &outer.orelse[0] else {
            panic!("expected nested if");
        };
        assert_eq!(inner.test, Expression::Name(Identifier::new("b")));
        assert_eq!(inner.orelse, vec![Statement::Pass]);
    }

    #[test]
    fn test_parse_while_and_for_else() {
        let Statement::While(w) = parse_stmt("while x:\n    break\nelse:\n    pass\n") else {
            panic!("expected while");
        };
        assert_eq!(w.orelse, vec![Statement::Pass]);

        let Statement::For(f) = parse_stmt("for i in range(3):\n    continue\n") else {
            panic!("expected for");
        };
        assert_eq!(f.target, Expression::Name(Identifier::new("i")));
        assert!(matches!(f.iter, Expression::Call(_)));
    }

    #[test]
    fn test_parse_for_tuple_target() {
        let Statement::For(f) = parse_stmt("for a, b in pairs:\n    pass\n") else {
            panic!("expected for");
        };
        assert!(matches!(f.target, Expression::Tuple(ref items) if items.len() == 2));
    }

    #[test]
    fn test_parse_comparison_chain() {
        let Statement::Expression(stmt) = parse_stmt("0 < x <= 10\n") else {
            panic!("expected expression");
        };
        let Expression::Compare(cmp) = stmt.expression else {
            panic!("expected compare");
        };
        assert_eq!(cmp.operators, vec![CompareOperator::Lt, CompareOperator::LtE]);
    }

    #[test]
    fn test_parse_not_in_and_is_not() {
        let Statement::Expression(stmt) = parse_stmt("a not in b is not c\n") else {
            panic!("expected expression");
        };
        let Expression::Compare(cmp) = stmt.expression else {
            panic!("expected compare");
        };
        assert_eq!(cmp.operators, vec![CompareOperator::NotIn, CompareOperator::IsNot]);
    }

    #[test]
    fn test_parse_precedence() {
        let Statement::Expression(stmt) = parse_stmt("1 + 2 * 3\n") else {
            panic!("expected expression");
        };
        let Expression::Binary(add) = stmt.expression else {
            panic!("expected binary");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        assert!(matches!(*add.right, Expression::Binary(ref m) if m.operator == BinaryOperator::Mult));
    }

    #[test]
    fn test_parse_power_binds_tighter_than_unary_minus() {
        let Statement::Expression(stmt) = parse_stmt("-2 ** 2\n") else {
            panic!("expected expression");
        };
        assert!(matches!(
            stmt.expression,
            Expression::Unary(UnaryExpression { operator: UnaryOperator::USub, .. })
        ));
    }

    #[test]
    fn test_parse_assignments() {
        assert!(matches!(parse_stmt("x = 1\n"), Statement::Assign(_)));
        assert!(matches!(parse_stmt("a = b = 2\n"), Statement::Assign(ref s) if s.targets.len() == 2));
        assert!(matches!(
            parse_stmt("x += 1\n"),
            Statement::AugAssign(AugAssignStatement { operator: BinaryOperator::Add, .. })
        ));
        assert!(matches!(parse_stmt("a, b = 1, 2\n"), Statement::Assign(_)));
        assert!(matches!(parse_stmt("obj.speed = 2\n"), Statement::Assign(_)));
    }

    #[test]
    fn test_parse_imports() {
        assert_eq!(
            parse_stmt("import pyrium.api as api\n"),
            Statement::Import(ImportStatement {
                module: "pyrium.api".into(),
                names: vec![],
            })
        );
        assert_eq!(
            parse_stmt("from pyrium import (log, broadcast,)\n"),
            Statement::Import(ImportStatement {
                module: "pyrium".into(),
                names: vec!["log".into(), "broadcast".into()],
            })
        );
    }

    #[test]
    fn test_parse_semicolon_separated_statements() {
        let program = parse_ok("def f():\n    log(1); log(2)\n");
        let Statement::FunctionDef(def) = &program.body[0] else {
            panic!("expected def");
        };
        assert_eq!(def.body.len(), 2);
    }

    #[test]
    fn test_parse_single_line_suite() {
        let def = first_def("def f(): pass\n");
        assert_eq!(def.body, vec![Statement::Pass]);
    }

    #[test]
    fn test_parse_displays_and_subscripts() {
        parse_ok("x = [1, 2, 3]\n");
        parse_ok("x = (1,)\n");
        parse_ok("x = {'a': 1, 'b': 2}\n");
        parse_ok("x = data['key'][0]\n");
        parse_ok("x = ()\n");
    }

    #[test]
    fn test_parse_multiline_call() {
        let program = parse_ok("def on_tick():\n    set_block(\n        1, 2, 3,\n        'stone',\n    )\n");
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn test_parse_return() {
        parse_ok("def f():\n    return\n");
        parse_ok("def f():\n    return 1, 2\n");
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse_err("def f():\n    log(1\n");
        assert!(matches!(err, Error::Syntax { line: 3, .. } | Error::Syntax { line: 2, .. }));

        let err = parse_err("def f()\n    pass\n");
        let Error::Syntax { line, column, .. } = err else {
            panic!("expected syntax error");
        };
        assert_eq!((line, column), (1, 8));
    }

    #[test]
    fn test_missing_indented_block() {
        let err = parse_err("def f():\nlog(1)\n");
        assert!(matches!(err, Error::Syntax { ref message, .. } if message.contains("indented block")));
    }

    #[test]
    fn test_unexpected_indent() {
        let err = parse_err("log(1)\n    log(2)\n");
        assert!(matches!(err, Error::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(matches!(parse_err("f() = 1\n"), Error::Syntax { .. }));
    }

    #[test]
    fn test_lexer_errors_surface_as_syntax_errors() {
        let err = parse_err("log('unterminated\n");
        assert!(matches!(err, Error::Syntax { ref message, .. } if message.contains("unterminated")));
    }

    fn unsupported_kind(stmt: &Statement) -> &'static str {
        match stmt {
            Statement::Unsupported(stmt) => stmt.kind,
            other => panic!("expected unsupported statement, got {:?}", other),
        }
    }

    fn expression(src: &str) -> Expression {
        match parse_stmt(src) {
            Statement::Expression(stmt) => stmt.expression,
            other => panic!("expected expression, got {:?}", other),
        }
    }

    fn opaque_kind(src: &str) -> OpaqueKind {
        match expression(src) {
            Expression::Opaque(expr) => expr.kind,
            other => panic!("expected opaque expression, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unsupported_simple_statements() {
        let def = first_def(
            "def f():\n    global a, b\n    nonlocal c\n    assert x, 'msg'\n    del d[0], e\n    raise ValueError('x') from err\n    raise\n",
        );
        let kinds: Vec<_> = def.body.iter().map(unsupported_kind).collect();
        assert_eq!(kinds, vec!["global", "nonlocal", "assert", "del", "raise", "raise"]);
    }

    #[test]
    fn test_parse_try_keeps_every_block() {
        let src = "try:\n    log('a')\nexcept (KeyError, ValueError) as e:\n    log('b')\nexcept:\n    pass\nelse:\n    log('c')\nfinally:\n    log('d')\n";
        let Statement::Unsupported(stmt) = parse_stmt(src) else {
            panic!("expected unsupported statement");
        };
        assert_eq!(stmt.kind, "try");
        assert_eq!(stmt.body.len(), 5);

        let Statement::Unsupported(stmt) = parse_stmt("try:\n    pass\nfinally:\n    pass\n") else {
            panic!("expected unsupported statement");
        };
        assert_eq!(stmt.body, vec![Statement::Pass, Statement::Pass]);
    }

    #[test]
    fn test_try_without_handler_is_an_error() {
        let err = parse_err("try:\n    pass\nlog(1)\n");
        assert!(matches!(err, Error::Syntax { ref message, .. } if message.contains("except")));
    }

    #[test]
    fn test_parse_with_class_and_async() {
        assert_eq!(
            unsupported_kind(&parse_stmt("with open(a) as f, lock:\n    pass\n")),
            "with"
        );
        assert_eq!(
            unsupported_kind(&parse_stmt("@dataclass(frozen=True)\nclass Mod(Base, metaclass=M):\n    x: int = 3\n    def on_tick(self):\n        pass\n")),
            "class"
        );

        let program = parse_ok("async def on_tick():\n    await sleep(1)\n    async with a:\n        pass\n");
        assert_eq!(unsupported_kind(&program.body[0]), "async");
        assert_eq!(program.functions().count(), 0);
    }

    #[test]
    fn test_parse_annotated_assignment() {
        assert!(matches!(parse_stmt("x: int = 1\n"), Statement::Assign(ref s) if s.targets.len() == 1));
        assert_eq!(unsupported_kind(&parse_stmt("x: int\n")), "annotation");
    }

    #[test]
    fn test_parse_opaque_expressions() {
        assert_eq!(
            opaque_kind("f'hi {x}'\n"),
            OpaqueKind::FormattedString("hi {x}".into())
        );
        assert_eq!(opaque_kind("'a' f'{b}'\n"), OpaqueKind::FormattedString("a{b}".into()));
        assert_eq!(opaque_kind("b'raw'\n"), OpaqueKind::Bytes("raw".into()));
        assert_eq!(opaque_kind("y if z else w\n"), OpaqueKind::Conditional);
        assert_eq!(opaque_kind("[i for i in range(3) if i]\n"), OpaqueKind::Comprehension);
        assert_eq!(opaque_kind("{k: v for k, v in pairs}\n"), OpaqueKind::Comprehension);
        assert_eq!(opaque_kind("(x async for x in xs)\n"), OpaqueKind::Comprehension);
        assert_eq!(opaque_kind("lambda: 1\n"), OpaqueKind::Lambda);
        assert_eq!(opaque_kind("lambda a, *b, c=2, **d: a\n"), OpaqueKind::Lambda);
        assert_eq!(opaque_kind("(n := 10)\n"), OpaqueKind::NamedExpr);
        assert_eq!(opaque_kind("{1, 2}\n"), OpaqueKind::Set);
        assert_eq!(opaque_kind("...\n"), OpaqueKind::Ellipsis);
        assert_eq!(opaque_kind("await task\n"), OpaqueKind::Await);
        assert_eq!(opaque_kind("yield\n"), OpaqueKind::Yield);
        assert_eq!(opaque_kind("yield from gen()\n"), OpaqueKind::Yield);
    }

    #[test]
    fn test_parse_calls_with_unpacking_and_generators() {
        let Expression::Call(call) = expression("f(a, *rest, key=1, **extra)\n") else {
            panic!("expected call");
        };
        assert_eq!(call.arguments.len(), 2);
        assert_eq!(call.keywords.len(), 1);

        let Expression::Call(call) = expression("total(x for x in xs)\n") else {
            panic!("expected call");
        };
        assert!(matches!(
            call.arguments[0],
            Expression::Opaque(OpaqueExpression { kind: OpaqueKind::Comprehension, .. })
        ));
    }

    #[test]
    fn test_parse_slices() {
        let Expression::Subscript(sub) = expression("items[1:-1]\n") else {
            panic!("expected subscript");
        };
        assert!(matches!(
            *sub.index,
            Expression::Opaque(OpaqueExpression { kind: OpaqueKind::Slice, ref operands }) if operands.len() == 2
        ));
        parse_ok("x = items[:]\n");
        parse_ok("x = items[::2]\n");
        parse_ok("x = grid[1:2, ::3]\n");
        parse_ok("first, *rest = items\n");
        parse_ok("merged = {**a, 'k': 1, **b}\n");
    }

    #[test]
    fn test_parse_positional_only_marker() {
        let def = first_def("def f(a, /, b, *, c):\n    pass\n");
        let params: Vec<_> = def.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["a", "b", "c"]);
        parse_ok("def g(a, /):\n    pass\n");
    }

    #[test]
    fn test_mixing_bytes_and_text_is_an_error() {
        let err = parse_err("x = b'a' 'b'\n");
        assert!(matches!(err, Error::Syntax { ref message, .. } if message.contains("bytes")));
    }

    #[test]
    fn test_deeply_nested_parentheses_are_rejected() {
        let depth = 5000;
        let src = format!(
            "def on_tick():\n    if {}x{}:\n        pass\n",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let err = parse_err(&src);
        assert!(matches!(err, Error::Syntax { line: 2, ref message, .. } if message.contains("nested")));
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let src = format!("x = {}1{}\n", "(".repeat(50), ")".repeat(50));
        assert_eq!(
            parse_stmt(&src),
            Statement::Assign(AssignStatement {
                targets: vec![Expression::Name(Identifier::new("x"))],
                value: Expression::Literal(Literal::Int(1)),
            })
        );
    }

    #[test]
    fn test_deep_unary_and_power_chains_are_rejected() {
        let err = parse_err(&format!("x = {}1\n", "-".repeat(5000)));
        assert!(matches!(err, Error::Syntax { ref message, .. } if message.contains("nested")));

        let err = parse_err(&format!("x = 2{}\n", " ** 2".repeat(5000)));
        assert!(matches!(err, Error::Syntax { ref message, .. } if message.contains("nested")));
    }

    #[test]
    fn test_deeply_nested_blocks_are_rejected() {
        let mut src = String::from("def on_tick():\n");
        for level in 1..=(MAX_NESTING_DEPTH + 5) {
            src.push_str(&"    ".repeat(level));
            src.push_str("if x:\n");
        }
        src.push_str(&"    ".repeat(MAX_NESTING_DEPTH + 6));
        src.push_str("pass\n");

        let err = parse_err(&src);
        assert!(matches!(err, Error::Syntax { ref message, .. } if message.contains("nested")));
    }

    #[test]
    fn test_line_column() {
        assert_eq!(line_column("ab\ncd", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
    }
}
