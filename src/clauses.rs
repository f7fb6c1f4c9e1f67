// Clause sub-parsers: SELECT, FROM, JOIN, GROUP BY, ORDER BY and HAVING.
// Each one starts at its own keyword and leaves the cursor on the first token it
// does not own.

use crate::ast::{
    Direction, FromClause, GroupByClause, HavingClause, JoinClause, Order, OrderByClause,
    SelectClause, SelectItem, Table, TableReference, TableSource,
};
use crate::error::{Construct, ParseError, ParseResult};
use crate::expr::{Expr, LogicalOp};
use crate::parser::Parser;
use crate::token::{Token, TokenKind};
use nom::bytes::complete::{tag_no_case, take_till1};
use nom::character::complete::multispace1;
use nom::combinator::{all_consuming, rest, verify};
use nom::sequence::{delimited, separated_pair};
use nom::IResult;
use tracing::warn;

const SELECT_TERMINATORS: &[&str] = &["FROM", "WHERE", "GROUP BY", "HAVING", "ORDER BY"];

fn ends_select_list(token: &Token) -> bool {
    token.kind == TokenKind::Keyword
        && (token.is_join_keyword() || SELECT_TERMINATORS.iter().any(|kw| token.matches_text(kw)))
}

/// `users AS u` inside one identifier token, split into name and alias.
fn split_alias(text: &str) -> IResult<&str, (&str, &str)> {
    all_consuming(separated_pair(
        take_till1(|c: char| c.is_whitespace()),
        delimited(multispace1, tag_no_case("AS"), multispace1),
        verify(rest, |alias: &str| {
            !alias.is_empty() && !alias.contains(char::is_whitespace)
        }),
    ))(text.trim())
}

impl<'a> Parser<'a> {
    /// SELECT item (',' item)*, ended by a clause keyword or the end of input.
    pub fn parse_select(&mut self) -> ParseResult<SelectClause> {
        self.expect_keyword("SELECT")?;
        let mut items = Vec::new();

        while let Some(token) = self.current() {
            if ends_select_list(token) {
                break;
            }

            items.push(self.parse_select_item()?);

            if self.check_kind(TokenKind::Operator) || self.check_kind(TokenKind::Wildcard) {
                return Err(ParseError::unsupported(
                    self.position(),
                    Construct::CompositeExpression,
                ));
            }
            if !self.try_consume_punctuation(",") {
                break;
            }
        }

        Ok(SelectClause { items })
    }

    fn parse_select_item(&mut self) -> ParseResult<SelectItem> {
        let position = self.position();
        let token = self.current();

        match token {
            Some(t) if t.kind == TokenKind::Wildcard => {
                self.advance();
                Ok(SelectItem {
                    expression: Expr::Wildcard,
                    alias: None,
                })
            }
            Some(t)
                if t.kind == TokenKind::Keyword
                    && self.peek().is_some_and(|next| next.is_punctuation("(")) =>
            {
                let expression = self.parse_function_call()?;
                let alias = self.parse_select_alias()?;
                Ok(SelectItem { expression, alias })
            }
            Some(t) if t.kind == TokenKind::Identifier => {
                if self.peek().is_some_and(|next| next.is_punctuation("(")) {
                    return Err(ParseError::unsupported(
                        position,
                        Construct::Function(t.text.to_string()),
                    ));
                }
                let expression = self.parse_identifier()?;
                let alias = self.parse_select_alias()?;
                Ok(SelectItem { expression, alias })
            }
            Some(t) if t.is_punctuation("(") => Err(ParseError::unsupported(
                position,
                Construct::CompositeExpression,
            )),
            other => Err(ParseError::unexpected(position, "select item", other)),
        }
    }

    fn parse_select_alias(&mut self) -> ParseResult<Option<String>> {
        if self.try_consume_keyword("AS") {
            let alias = self.expect(TokenKind::Identifier)?;
            Ok(Some(alias.text.to_string()))
        } else {
            Ok(None)
        }
    }

    /// FROM source (',' source)*. Only the first source is kept.
    pub fn parse_from(&mut self) -> ParseResult<FromClause> {
        self.expect_keyword("FROM")?;
        let first = self.parse_from_table()?;

        let mut dropped = Vec::new();
        while self.try_consume_punctuation(",") {
            dropped.push(self.parse_from_table()?.name);
        }

        if !dropped.is_empty() {
            warn!(kept = %first.name, dropped = ?dropped, "FROM keeps only its first table");
        }

        Ok(FromClause {
            table: TableSource::Table(first),
        })
    }

    fn parse_from_table(&mut self) -> ParseResult<Table> {
        if self.check_punctuation("(") {
            return Err(ParseError::unsupported(self.position(), Construct::Subquery));
        }

        let name = self.parse_qualified_name()?;
        let alias = self.parse_table_alias()?;
        Ok(Table { name, alias })
    }

    /// `AS alias`, or a bare IDENTIFIER directly after a table name.
    fn parse_table_alias(&mut self) -> ParseResult<Option<String>> {
        if self.try_consume_keyword("AS") {
            return Ok(Some(self.expect(TokenKind::Identifier)?.text.to_string()));
        }
        if self.check_kind(TokenKind::Identifier) {
            Ok(self.advance().map(|token| token.text.to_string()))
        } else {
            Ok(None)
        }
    }

    /// One or more JOIN clauses, each with a single `ON a OP b` comparison.
    pub fn parse_joins(&mut self) -> ParseResult<Vec<JoinClause>> {
        let mut joins = Vec::new();

        while self.current().is_some_and(|t| t.is_join_keyword()) {
            joins.push(self.parse_join()?);
        }

        Ok(joins)
    }

    fn parse_join(&mut self) -> ParseResult<JoinClause> {
        let join_type = self.expect(TokenKind::Keyword)?.normalized();

        let table_ref = self.parse_table_reference()?;

        self.expect_keyword("ON")?;
        let left = self.parse_identifier()?;
        let operator = self.expect(TokenKind::Operator)?;
        let right = self.parse_identifier()?;

        if self
            .current()
            .is_some_and(|t| LogicalOp::from_token(t).is_some())
        {
            return Err(ParseError::unsupported(
                self.position(),
                Construct::MultiPredicateJoin,
            ));
        }

        Ok(JoinClause {
            join_type,
            table_ref,
            condition: Expr::comparison(left, operator.text, right),
        })
    }

    fn parse_table_reference(&mut self) -> ParseResult<TableReference> {
        let name_token = self.expect(TokenKind::Identifier)?;

        let (mut name, mut alias) = match split_alias(name_token.text) {
            Ok((_, (name, alias))) => (name.to_string(), Some(alias.to_string())),
            Err(_) => (name_token.text.to_string(), None),
        };

        if self.try_consume_punctuation(".") {
            name.push('.');
            name.push_str(self.expect(TokenKind::Identifier)?.text);
        }
        if let Some(written) = self.parse_table_alias()? {
            alias = Some(written);
        }

        Ok(TableReference { name, alias })
    }

    /// GROUP BY column (',' column)*
    pub fn parse_group_by(&mut self) -> ParseResult<GroupByClause> {
        self.expect_keyword("GROUP BY")?;

        let mut columns = vec![self.parse_identifier()?];
        while self.try_consume_punctuation(",") {
            columns.push(self.parse_identifier()?);
        }

        Ok(GroupByClause { columns })
    }

    /// ORDER BY column [ASC|DESC] (',' column [ASC|DESC])*
    ///
    /// The list continues only while the next item starts with an identifier, so a
    /// trailing comma ends the clause instead of failing.
    pub fn parse_order_by(&mut self) -> ParseResult<OrderByClause> {
        self.expect_keyword("ORDER BY")?;
        let mut items = Vec::new();

        while self.check_kind(TokenKind::Identifier) {
            let column = self.parse_identifier()?;

            let direction = if self.try_consume_keyword("ASC") {
                Some(Direction::Asc)
            } else if self.try_consume_keyword("DESC") {
                Some(Direction::Desc)
            } else {
                None
            };
            items.push(Order { column, direction });

            if !self.try_consume_punctuation(",") {
                break;
            }
        }

        Ok(OrderByClause { items })
    }

    /// HAVING condition, using the configured HAVING grammar.
    pub fn parse_having(&mut self) -> ParseResult<HavingClause> {
        self.expect_keyword("HAVING")?;
        let grammar = self.config.having_grammar;
        let condition = self.parse_condition(grammar)?;

        Ok(HavingClause { condition })
    }
}
