//! SQL parser implementation.
//!
//! Recursive descent for statements, precedence climbing for expressions.

use super::error::ParseError;
use super::pratt::{
    infix_binding_power, token_to_binary_op, token_to_unary_op, BETWEEN_OPERAND_BP, NOT_BP,
    SIGN_BP,
};
use crate::ast::{
    ColumnSpec, CompoundOp, CompoundSelect, CreateIndexStatement, CreateTableStatement, Cte,
    DataType, DeleteStatement, DropIndexStatement, DropTableStatement, Expr, FunctionCall,
    InsertStatement, JoinClause, JoinType, Literal, NiladicFunction, OrderBy, OrderDirection,
    OverClause, Quantifier, SelectColumn, SelectStatement, Statement, TableRef, UnaryOp,
    UpdateAssignment, UpdateStatement, WithClause,
};
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};

/// SQL parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// Counter assigning 1-based positions to `?` placeholders in lexical
    /// order.
    param_counter: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            param_counter: 0,
        }
    }

    /// Parses a single SQL statement, requiring the input to be fully
    /// consumed (a trailing semicolon is allowed).
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid SQL statement.
    pub fn parse(&mut self) -> Result<Statement, ParseError> {
        let statement = self.parse_statement()?;
        if self.check(&TokenKind::Semicolon) {
            self.advance()?;
        }
        if !self.current.is_eof() {
            return Err(ParseError::unexpected(
                "end of input",
                self.current.kind.clone(),
                self.current.span,
            ));
        }
        Ok(statement)
    }

    /// Parses the input as a standalone expression fragment, requiring it
    /// to be fully consumed.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid expression.
    pub fn parse_expression_fragment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression(0)?;
        if !self.current.is_eof() {
            return Err(ParseError::unexpected(
                "end of input",
                self.current.kind.clone(),
                self.current.span,
            ));
        }
        Ok(expr)
    }

    /// Parses a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid SQL statement.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::Select | Keyword::With) => {
                Ok(Statement::Select(self.parse_select_statement()?))
            }
            TokenKind::Keyword(Keyword::Insert) => {
                Ok(Statement::Insert(self.parse_insert_statement()?))
            }
            TokenKind::Keyword(Keyword::Update) => {
                Ok(Statement::Update(self.parse_update_statement()?))
            }
            TokenKind::Keyword(Keyword::Delete) => {
                Ok(Statement::Delete(self.parse_delete_statement()?))
            }
            TokenKind::Keyword(Keyword::Create) => self.parse_create_statement(),
            TokenKind::Keyword(Keyword::Drop) => self.parse_drop_statement(),
            _ => Err(ParseError::unexpected(
                "SELECT, INSERT, UPDATE, DELETE, CREATE, or DROP",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    // ---- select ----------------------------------------------------------

    /// Parses a full SELECT statement: WITH prologue, compound chain, and
    /// trailing ORDER BY / LIMIT / OFFSET governing the whole chain.
    pub(crate) fn parse_select_statement(&mut self) -> Result<SelectStatement, ParseError> {
        let with = if self.check_keyword(Keyword::With) {
            Some(self.parse_with_clause()?)
        } else {
            None
        };

        let mut head = self.parse_select_core()?;
        head.with = with;

        while let Some(op) = self.parse_compound_op()? {
            let select = self.parse_select_core()?;
            head.compounds.push(CompoundSelect { op, select });
        }

        if self.check_keyword(Keyword::Order) {
            self.advance()?;
            self.expect_keyword(Keyword::By)?;
            head.order_by = self.parse_order_by_list()?;
        }

        if self.check_keyword(Keyword::Limit) {
            self.advance()?;
            head.limit = Some(self.parse_expression(0)?);
        }

        if self.check_keyword(Keyword::Offset) {
            self.advance()?;
            head.offset = Some(self.parse_expression(0)?);
        }

        Ok(head)
    }

    fn parse_with_clause(&mut self) -> Result<WithClause, ParseError> {
        self.expect_keyword(Keyword::With)?;
        let recursive = if self.check_keyword(Keyword::Recursive) {
            self.advance()?;
            true
        } else {
            false
        };

        let mut ctes = vec![];
        loop {
            let name = self.expect_identifier()?;
            self.expect_keyword(Keyword::As)?;
            self.expect(&TokenKind::LeftParen)?;
            let query = self.parse_select_statement()?;
            self.expect(&TokenKind::RightParen)?;
            ctes.push(Cte { name, query });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }

        Ok(WithClause { recursive, ctes })
    }

    fn parse_compound_op(&mut self) -> Result<Option<CompoundOp>, ParseError> {
        let op = match self.current.as_keyword() {
            Some(Keyword::Union) => {
                self.advance()?;
                if self.check_keyword(Keyword::All) {
                    self.advance()?;
                    CompoundOp::UnionAll
                } else {
                    CompoundOp::Union
                }
            }
            Some(Keyword::Intersect) => {
                self.advance()?;
                CompoundOp::Intersect
            }
            Some(Keyword::Except) => {
                self.advance()?;
                CompoundOp::Except
            }
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    /// Parses one SELECT core: select list, FROM, WHERE, GROUP BY, HAVING.
    fn parse_select_core(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect_keyword(Keyword::Select)?;

        let distinct = if self.check_keyword(Keyword::Distinct) {
            self.advance()?;
            true
        } else {
            if self.check_keyword(Keyword::All) {
                self.advance()?;
            }
            false
        };

        let columns = self.parse_select_columns()?;

        let from = if self.check_keyword(Keyword::From) {
            self.advance()?;
            Some(self.parse_table_ref()?)
        } else {
            None
        };

        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance()?;
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let group_by = if self.check_keyword(Keyword::Group) {
            self.advance()?;
            self.expect_keyword(Keyword::By)?;
            self.parse_expression_list()?
        } else {
            vec![]
        };

        let having = if self.check_keyword(Keyword::Having) {
            self.advance()?;
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(SelectStatement {
            with: None,
            distinct,
            columns,
            from,
            where_clause,
            group_by,
            having,
            compounds: vec![],
            order_by: vec![],
            limit: None,
            offset: None,
        })
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>, ParseError> {
        let mut columns = vec![];

        loop {
            let expr = self.parse_expression(0)?;

            let alias = if self.check_keyword(Keyword::As) {
                self.advance()?;
                Some(self.expect_identifier()?)
            } else if matches!(&self.current.kind, TokenKind::Identifier(_)) {
                Some(self.expect_identifier()?)
            } else {
                None
            };

            columns.push(SelectColumn { expr, alias });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }

        Ok(columns)
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderBy>, ParseError> {
        let mut entries = vec![];
        loop {
            let expr = self.parse_expression(0)?;
            let direction = if self.check_keyword(Keyword::Asc) {
                self.advance()?;
                OrderDirection::Asc
            } else if self.check_keyword(Keyword::Desc) {
                self.advance()?;
                OrderDirection::Desc
            } else {
                OrderDirection::Asc
            };
            entries.push(OrderBy { expr, direction });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }
        Ok(entries)
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.parse_expression(0)?];
        while self.check(&TokenKind::Comma) {
            self.advance()?;
            exprs.push(self.parse_expression(0)?);
        }
        Ok(exprs)
    }

    // ---- table references ------------------------------------------------

    fn parse_table_ref(&mut self) -> Result<TableRef, ParseError> {
        let mut table = self.parse_table_primary()?;

        loop {
            let join_type = match self.current.as_keyword() {
                Some(Keyword::Join) => {
                    self.advance()?;
                    JoinType::Inner
                }
                Some(Keyword::Inner) => {
                    self.advance()?;
                    self.expect_keyword(Keyword::Join)?;
                    JoinType::Inner
                }
                Some(Keyword::Left) => {
                    self.advance()?;
                    if self.check_keyword(Keyword::Outer) {
                        self.advance()?;
                    }
                    self.expect_keyword(Keyword::Join)?;
                    JoinType::Left
                }
                Some(Keyword::Right) => {
                    self.advance()?;
                    if self.check_keyword(Keyword::Outer) {
                        self.advance()?;
                    }
                    self.expect_keyword(Keyword::Join)?;
                    JoinType::Right
                }
                Some(Keyword::Full) => {
                    self.advance()?;
                    if self.check_keyword(Keyword::Outer) {
                        self.advance()?;
                    }
                    self.expect_keyword(Keyword::Join)?;
                    JoinType::Full
                }
                Some(Keyword::Cross) => {
                    self.advance()?;
                    self.expect_keyword(Keyword::Join)?;
                    JoinType::Cross
                }
                _ => break,
            };

            let right = self.parse_table_primary()?;

            let on = if self.check_keyword(Keyword::On) {
                if join_type == JoinType::Cross {
                    return Err(ParseError::new(
                        "CROSS JOIN cannot have an ON clause",
                        self.current.span,
                    ));
                }
                self.advance()?;
                Some(self.parse_expression(0)?)
            } else {
                None
            };

            table = TableRef::Join {
                left: Box::new(table),
                join: Box::new(JoinClause {
                    join_type,
                    table: right,
                    on,
                }),
            };
        }

        Ok(table)
    }

    fn parse_table_primary(&mut self) -> Result<TableRef, ParseError> {
        if self.check(&TokenKind::LeftParen) {
            self.advance()?;
            let query = self.parse_select_statement()?;
            self.expect(&TokenKind::RightParen)?;
            if self.check_keyword(Keyword::As) {
                self.advance()?;
            }
            let alias = self.expect_identifier()?;
            return Ok(TableRef::Subquery {
                query: Box::new(query),
                alias,
            });
        }

        let name = self.expect_identifier()?;
        let alias = if self.check_keyword(Keyword::As) {
            self.advance()?;
            Some(self.expect_identifier()?)
        } else if matches!(&self.current.kind, TokenKind::Identifier(_)) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        Ok(TableRef::Table { name, alias })
    }

    // ---- expressions -----------------------------------------------------

    /// Parses an expression with precedence climbing.
    pub(crate) fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some((left_bp, right_bp)) = infix_binding_power(&self.current.kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }

            match self.current.as_keyword() {
                Some(Keyword::Is) => {
                    self.advance()?;
                    let negated = if self.check_keyword(Keyword::Not) {
                        self.advance()?;
                        true
                    } else {
                        false
                    };
                    self.expect_keyword(Keyword::Null)?;
                    lhs = Expr::IsNull {
                        expr: Box::new(lhs),
                        negated,
                    };
                }
                Some(Keyword::Like) => {
                    self.advance()?;
                    lhs = self.parse_like(lhs, false)?;
                }
                Some(Keyword::In) => {
                    self.advance()?;
                    lhs = self.parse_in(lhs, false)?;
                }
                Some(Keyword::Between) => {
                    self.advance()?;
                    lhs = self.parse_between(lhs, false)?;
                }
                Some(Keyword::Not) => {
                    // Infix NOT introduces a negated keyword predicate.
                    self.advance()?;
                    match self.current.as_keyword() {
                        Some(Keyword::Like) => {
                            self.advance()?;
                            lhs = self.parse_like(lhs, true)?;
                        }
                        Some(Keyword::In) => {
                            self.advance()?;
                            lhs = self.parse_in(lhs, true)?;
                        }
                        Some(Keyword::Between) => {
                            self.advance()?;
                            lhs = self.parse_between(lhs, true)?;
                        }
                        _ => {
                            return Err(ParseError::unexpected(
                                "LIKE, IN, or BETWEEN after NOT",
                                self.current.kind.clone(),
                                self.current.span,
                            ));
                        }
                    }
                }
                _ => {
                    let op = token_to_binary_op(&self.current.kind).ok_or_else(|| {
                        ParseError::unexpected(
                            "binary operator",
                            self.current.kind.clone(),
                            self.current.span,
                        )
                    })?;
                    self.advance()?;

                    // A comparison followed by ALL / ANY / SOME and a
                    // parenthesized subquery is a quantified comparison.
                    if op.is_comparison() {
                        if let Some(quantifier) = self.parse_quantifier()? {
                            self.expect(&TokenKind::LeftParen)?;
                            let subquery = self.parse_select_statement()?;
                            self.expect(&TokenKind::RightParen)?;
                            lhs = Expr::Quantified {
                                left: Box::new(lhs),
                                op,
                                quantifier,
                                subquery: Box::new(subquery),
                            };
                            continue;
                        }
                    }

                    let rhs = self.parse_expression(right_bp)?;
                    lhs = Expr::Binary {
                        left: Box::new(lhs),
                        op,
                        right: Box::new(rhs),
                    };
                }
            }
        }

        Ok(lhs)
    }

    fn parse_quantifier(&mut self) -> Result<Option<Quantifier>, ParseError> {
        let quantifier = match self.current.as_keyword() {
            Some(Keyword::All) => Quantifier::All,
            Some(Keyword::Any | Keyword::Some) => Quantifier::Any,
            _ => return Ok(None),
        };
        self.advance()?;
        Ok(Some(quantifier))
    }

    fn parse_like(&mut self, lhs: Expr, negated: bool) -> Result<Expr, ParseError> {
        // The pattern binds tighter than comparisons.
        let pattern = self.parse_expression(BETWEEN_OPERAND_BP)?;
        Ok(Expr::Like {
            expr: Box::new(lhs),
            pattern: Box::new(pattern),
            negated,
        })
    }

    fn parse_in(&mut self, lhs: Expr, negated: bool) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With) {
            let subquery = self.parse_select_statement()?;
            self.expect(&TokenKind::RightParen)?;
            return Ok(Expr::InSubquery {
                expr: Box::new(lhs),
                subquery: Box::new(subquery),
                negated,
            });
        }

        let list = self.parse_expression_list()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(Expr::InList {
            expr: Box::new(lhs),
            list,
            negated,
        })
    }

    fn parse_between(&mut self, lhs: Expr, negated: bool) -> Result<Expr, ParseError> {
        let low = self.parse_expression(BETWEEN_OPERAND_BP)?;
        self.expect_keyword(Keyword::And)?;
        let high = self.parse_expression(BETWEEN_OPERAND_BP)?;
        Ok(Expr::Between {
            expr: Box::new(lhs),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    /// Parses a prefix expression (literal, column, unary op, subquery, …).
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let span = self.current.span;
        match self.current.kind.clone() {
            TokenKind::Integer(i) => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Integer(i)))
            }
            TokenKind::Float(v) => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Float(v)))
            }
            TokenKind::String(s) => {
                self.advance()?;
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Question => {
                self.advance()?;
                self.param_counter += 1;
                Ok(Expr::Parameter {
                    name: None,
                    position: self.param_counter,
                })
            }
            TokenKind::NamedParam(name) => {
                self.advance()?;
                // Named placeholders resolve by name; they do not consume a
                // positional slot.
                Ok(Expr::Parameter {
                    name: Some(name),
                    position: 0,
                })
            }
            TokenKind::Star => {
                self.advance()?;
                Ok(Expr::Wildcard { table: None })
            }
            TokenKind::Minus | TokenKind::Plus => {
                let op = token_to_unary_op(&self.current.kind)
                    .expect("sign tokens map to unary operators");
                self.advance()?;
                let operand = self.parse_expression(SIGN_BP)?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Keyword(Keyword::Not) => {
                self.advance()?;
                let operand = self.parse_expression(NOT_BP)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::Keyword(Keyword::CurrentDate) => {
                self.advance()?;
                Ok(Expr::Niladic(NiladicFunction::CurrentDate))
            }
            TokenKind::Keyword(Keyword::CurrentTime) => {
                self.advance()?;
                Ok(Expr::Niladic(NiladicFunction::CurrentTime))
            }
            TokenKind::Keyword(Keyword::CurrentTimestamp) => {
                self.advance()?;
                Ok(Expr::Niladic(NiladicFunction::CurrentTimestamp))
            }
            TokenKind::Keyword(Keyword::Case) => self.parse_case(),
            TokenKind::Keyword(Keyword::Exists) => {
                self.advance()?;
                self.expect(&TokenKind::LeftParen)?;
                let subquery = self.parse_select_statement()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(Expr::Exists(Box::new(subquery)))
            }
            TokenKind::LeftParen => {
                self.advance()?;
                if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With) {
                    let subquery = self.parse_select_statement()?;
                    self.expect(&TokenKind::RightParen)?;
                    Ok(Expr::Subquery(Box::new(subquery)))
                } else {
                    let inner = self.parse_expression(0)?;
                    self.expect(&TokenKind::RightParen)?;
                    Ok(Expr::Paren(Box::new(inner)))
                }
            }
            TokenKind::Identifier(name) => {
                self.advance()?;
                self.parse_identifier_expression(name, span)
            }
            other => Err(ParseError::unexpected("expression", other, span)),
        }
    }

    /// Continues an expression that started with an identifier: a column
    /// reference, a qualified column or wildcard, or a function call.
    fn parse_identifier_expression(
        &mut self,
        name: String,
        span: Span,
    ) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Dot) {
            self.advance()?;
            if self.check(&TokenKind::Star) {
                self.advance()?;
                return Ok(Expr::Wildcard { table: Some(name) });
            }
            let column = self.expect_identifier()?;
            return Ok(Expr::Column {
                table: Some(name),
                name: column,
                span: span.merge(self.current.span),
            });
        }

        if self.check(&TokenKind::LeftParen) {
            return self.parse_function_call(name);
        }

        Ok(Expr::Column {
            table: None,
            name,
            span,
        })
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let mut distinct = false;
        let mut args = vec![];

        if !self.check(&TokenKind::RightParen) {
            if self.check_keyword(Keyword::Distinct) {
                self.advance()?;
                distinct = true;
            }
            if self.check(&TokenKind::Star) {
                self.advance()?;
                args.push(Expr::Wildcard { table: None });
            } else {
                args = self.parse_expression_list()?;
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let call = FunctionCall {
            name: name.to_ascii_uppercase(),
            args,
            distinct,
        };

        if self.check_keyword(Keyword::Over) {
            self.advance()?;
            let over = self.parse_over_clause()?;
            return Ok(Expr::WindowFunction { call, over });
        }

        Ok(Expr::Function(call))
    }

    fn parse_over_clause(&mut self) -> Result<OverClause, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let partition_by = if self.check_keyword(Keyword::Partition) {
            self.advance()?;
            self.expect_keyword(Keyword::By)?;
            self.parse_expression_list()?
        } else {
            vec![]
        };

        let order_by = if self.check_keyword(Keyword::Order) {
            self.advance()?;
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            vec![]
        };

        self.expect(&TokenKind::RightParen)?;
        Ok(OverClause {
            partition_by,
            order_by,
        })
    }

    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword(Keyword::Case)?;

        let operand = if self.check_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expression(0)?))
        };

        let mut when_clauses = vec![];
        while self.check_keyword(Keyword::When) {
            self.advance()?;
            let when = self.parse_expression(0)?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expression(0)?;
            when_clauses.push((when, then));
        }
        if when_clauses.is_empty() {
            return Err(ParseError::new(
                "CASE requires at least one WHEN clause",
                self.current.span,
            ));
        }

        let else_clause = if self.check_keyword(Keyword::Else) {
            self.advance()?;
            Some(Box::new(self.parse_expression(0)?))
        } else {
            None
        };

        self.expect_keyword(Keyword::End)?;

        Ok(Expr::Case {
            operand,
            when_clauses,
            else_clause,
        })
    }

    // ---- DML -------------------------------------------------------------

    fn parse_insert_statement(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_identifier()?;

        let mut columns = vec![];
        if self.check(&TokenKind::LeftParen) {
            self.advance()?;
            loop {
                columns.push(self.expect_identifier()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance()?;
            }
            self.expect(&TokenKind::RightParen)?;
        }

        self.expect_keyword(Keyword::Values)?;

        let mut rows = vec![];
        loop {
            self.expect(&TokenKind::LeftParen)?;
            let row = self.parse_expression_list()?;
            self.expect(&TokenKind::RightParen)?;
            rows.push(row);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }

        Ok(InsertStatement {
            table,
            columns,
            rows,
        })
    }

    fn parse_update_statement(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = vec![];
        loop {
            let column = self.expect_identifier()?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expression(0)?;
            assignments.push(UpdateAssignment { column, value });
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }

        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance()?;
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete_statement(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_identifier()?;

        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance()?;
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(DeleteStatement {
            table,
            where_clause,
        })
    }

    // ---- DDL -------------------------------------------------------------

    fn parse_create_statement(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::Create)?;

        let unique = if self.check_keyword(Keyword::Unique) {
            self.advance()?;
            true
        } else {
            false
        };

        match self.current.as_keyword() {
            Some(Keyword::Table) if !unique => {
                self.advance()?;
                Ok(Statement::CreateTable(self.parse_create_table_body()?))
            }
            Some(Keyword::Index) => {
                self.advance()?;
                Ok(Statement::CreateIndex(self.parse_create_index_body(unique)?))
            }
            _ => Err(ParseError::unexpected(
                "TABLE or INDEX",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    fn parse_if_not_exists(&mut self) -> Result<bool, ParseError> {
        if self.check_keyword(Keyword::If) {
            self.advance()?;
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_if_exists(&mut self) -> Result<bool, ParseError> {
        if self.check_keyword(Keyword::If) {
            self.advance()?;
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_create_table_body(&mut self) -> Result<CreateTableStatement, ParseError> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LeftParen)?;

        let mut columns = vec![];
        loop {
            columns.push(self.parse_column_spec()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }
        self.expect(&TokenKind::RightParen)?;

        Ok(CreateTableStatement {
            if_not_exists,
            name,
            columns,
        })
    }

    fn parse_column_spec(&mut self) -> Result<ColumnSpec, ParseError> {
        let name = self.expect_identifier()?;

        let ty = match self.current.as_keyword() {
            Some(Keyword::Int | Keyword::Integer) => {
                self.advance()?;
                Some(DataType::Integer)
            }
            Some(Keyword::Real | Keyword::Float) => {
                self.advance()?;
                Some(DataType::Real)
            }
            Some(Keyword::Text) => {
                self.advance()?;
                Some(DataType::Text)
            }
            Some(Keyword::Blob) => {
                self.advance()?;
                Some(DataType::Blob)
            }
            Some(Keyword::Date) => {
                self.advance()?;
                Some(DataType::Date)
            }
            Some(Keyword::Datetime) => {
                self.advance()?;
                Some(DataType::Datetime)
            }
            Some(Keyword::Boolean) => {
                self.advance()?;
                Some(DataType::Boolean)
            }
            _ => None,
        };

        let mut primary_key = false;
        let mut unique = false;
        let mut not_null = false;
        loop {
            match self.current.as_keyword() {
                Some(Keyword::Primary) => {
                    self.advance()?;
                    self.expect_keyword(Keyword::Key)?;
                    primary_key = true;
                }
                Some(Keyword::Unique) => {
                    self.advance()?;
                    unique = true;
                }
                Some(Keyword::Not) => {
                    self.advance()?;
                    self.expect_keyword(Keyword::Null)?;
                    not_null = true;
                }
                _ => break,
            }
        }

        Ok(ColumnSpec {
            name,
            ty,
            primary_key,
            unique,
            not_null,
        })
    }

    fn parse_create_index_body(&mut self, unique: bool) -> Result<CreateIndexStatement, ParseError> {
        // IF NOT EXISTS is tolerated here as well.
        let _ = self.parse_if_not_exists()?;
        let name = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let table = self.expect_identifier()?;
        self.expect(&TokenKind::LeftParen)?;

        let mut columns = vec![];
        loop {
            columns.push(self.expect_identifier()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }
        self.expect(&TokenKind::RightParen)?;

        Ok(CreateIndexStatement {
            name,
            table,
            columns,
            unique,
        })
    }

    fn parse_drop_statement(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::Drop)?;
        match self.current.as_keyword() {
            Some(Keyword::Table) => {
                self.advance()?;
                let if_exists = self.parse_if_exists()?;
                let name = self.expect_identifier()?;
                Ok(Statement::DropTable(DropTableStatement { if_exists, name }))
            }
            Some(Keyword::Index) => {
                self.advance()?;
                let if_exists = self.parse_if_exists()?;
                let name = self.expect_identifier()?;
                Ok(Statement::DropIndex(DropIndexStatement { if_exists, name }))
            }
            _ => Err(ParseError::unexpected(
                "TABLE or INDEX",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    // ---- token helpers ---------------------------------------------------

    /// Advances past the current token, surfacing lexer errors.
    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token();
        if let TokenKind::Error(message) = &self.current.kind {
            return Err(ParseError::new(message.clone(), self.current.span));
        }
        Ok(())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current.as_keyword() == Some(keyword)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance()?;
            Ok(())
        } else {
            Err(ParseError::unexpected(
                format!("{kind:?}"),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.check_keyword(keyword) {
            self.advance()?;
            Ok(())
        } else {
            Err(ParseError::unexpected(
                keyword.as_str(),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Identifier(name) = self.current.kind.clone() {
            self.advance()?;
            Ok(name)
        } else {
            Err(ParseError::unexpected(
                "identifier",
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(input: &str) -> Expr {
        Parser::new(input)
            .parse_expression(0)
            .unwrap_or_else(|e| panic!("failed to parse {input}: {e}"))
    }

    #[test]
    fn test_unary_minus_binds_like_pow() {
        // -2**2 parses as -(2**2)
        let e = parse_expr("-2 ** 2");
        assert!(matches!(
            e,
            Expr::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }

    #[test]
    fn test_pow_right_associative() {
        let e = parse_expr("2 ** 3 ** 2");
        // Right-assoc: 2 ** (3 ** 2)
        let Expr::Binary { left, right, .. } = e else {
            panic!("expected binary");
        };
        assert!(matches!(*left, Expr::Literal(Literal::Integer(2))));
        assert!(matches!(*right, Expr::Binary { .. }));
    }

    #[test]
    fn test_concat_binds_tighter_than_comparison() {
        let e = parse_expr("a || b = c || d");
        let Expr::Binary { op, .. } = &e else {
            panic!("expected binary");
        };
        assert_eq!(*op, crate::ast::BinaryOp::Eq);
    }

    #[test]
    fn test_not_like() {
        let e = parse_expr("name NOT LIKE 'a%'");
        assert!(matches!(e, Expr::Like { negated: true, .. }));
    }

    #[test]
    fn test_quantified_any() {
        let e = parse_expr("x > ANY (SELECT y FROM t)");
        assert!(matches!(
            e,
            Expr::Quantified {
                quantifier: Quantifier::Any,
                ..
            }
        ));
    }

    #[test]
    fn test_named_parameter_positions() {
        let mut p = Parser::new("a = ? AND b = :name AND c = ?");
        let e = p.parse_expression(0).unwrap();
        let mut positions = vec![];
        fn walk(e: &Expr, out: &mut Vec<(Option<String>, usize)>) {
            if let Expr::Binary { left, right, .. } = e {
                walk(left, out);
                walk(right, out);
            }
            if let Expr::Parameter { name, position } = e {
                out.push((name.clone(), *position));
            }
        }
        walk(&e, &mut positions);
        assert_eq!(
            positions,
            vec![
                (None, 1),
                (Some(String::from("name")), 0),
                (None, 2),
            ]
        );
    }
}
