// The token cursor, parser configuration and the top-level clause dispatcher

use crate::ast::Query;
use crate::canonical::Canonical;
use crate::error::{Found, ParseError, ParseResult, SqlError};
use crate::expr::{ConditionGrammar, Expr};
use crate::token::{tokenize, Token, TokenKind};
use crate::where_clause::WhereStatus;
use tracing::{debug, trace};

/// How the WHERE driver reacts to a condition it cannot finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WhereMode {
    /// The error aborts the parse, like every other clause.
    #[default]
    Strict,
    /// Keep whatever was reduced before the error and report it as truncated.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub where_mode: WhereMode,
    pub having_grammar: ConditionGrammar,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            where_mode: WhereMode::Strict,
            having_grammar: ConditionGrammar::HAVING,
        }
    }
}

impl ParserConfig {
    pub fn with_where_mode(mut self, where_mode: WhereMode) -> Self {
        self.where_mode = where_mode;
        self
    }

    pub fn with_having_grammar(mut self, grammar: ConditionGrammar) -> Self {
        self.having_grammar = grammar;
        self
    }
}

/// A parsed query together with how its WHERE clause ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReport {
    pub query: Query,
    pub where_status: WhereStatus,
}

/// The parser structure: a read-only token slice and a single-owner cursor.
///
/// One parser handles exactly one parse; `parse` and `parse_report` consume it.
pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    pub(crate) config: ParserConfig,
    pub(crate) where_status: WhereStatus,
    pub(crate) depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Parser::with_config(tokens, ParserConfig::default())
    }

    pub fn with_config(tokens: &'a [Token<'a>], config: ParserConfig) -> Self {
        Parser {
            tokens,
            pos: 0,
            config,
            where_status: WhereStatus::Absent,
            depth: 0,
        }
    }

    /// Index of the current token; equals the token count once exhausted.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Current token
    pub fn current(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.pos)
    }

    /// Token after the current one
    pub fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.pos + 1)
    }

    /// Advance to next token, returning the one left behind
    pub fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.pos)?;
        trace!(position = self.pos, kind = %token.kind, text = token.text, "consume token");
        self.pos += 1;
        Some(token)
    }

    /// Consume the current token, checking its kind and text when asked to.
    /// A text expectation names the error even when the kind is what differs.
    pub fn consume(
        &mut self,
        expected_kind: Option<TokenKind>,
        expected_text: Option<&str>,
    ) -> ParseResult<&'a Token<'a>> {
        let position = self.pos;
        let Some(token) = self.current() else {
            let expected = match (expected_kind, expected_text) {
                (_, Some(text)) => text.to_string(),
                (Some(kind), None) => kind.to_string(),
                (None, None) => "token".to_string(),
            };
            return Err(ParseError::unexpected(position, expected, None));
        };

        let kind_matches = expected_kind.map_or(true, |kind| token.kind == kind);
        match expected_text {
            Some(text) if !kind_matches || !token.matches_text(text) => {
                return Err(ParseError::UnexpectedTokenValue {
                    position,
                    expected: text.to_string(),
                    found: Found::from(Some(token)),
                });
            }
            None if !kind_matches => {
                let expected = expected_kind.map_or("token", |kind| kind.as_str());
                return Err(ParseError::unexpected(position, expected, Some(token)));
            }
            _ => {}
        }

        self.pos += 1;
        trace!(position, kind = %token.kind, text = token.text, "consume token");
        Ok(token)
    }

    /// Expect a specific token kind
    pub fn expect(&mut self, kind: TokenKind) -> ParseResult<&'a Token<'a>> {
        self.consume(Some(kind), None)
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> ParseResult<&'a Token<'a>> {
        self.consume(Some(TokenKind::Keyword), Some(keyword))
    }

    pub fn expect_punctuation(&mut self, symbol: &str) -> ParseResult<&'a Token<'a>> {
        self.consume(Some(TokenKind::Punctuation), Some(symbol))
    }

    pub fn check_kind(&self, kind: TokenKind) -> bool {
        self.current().is_some_and(|t| t.kind == kind)
    }

    pub fn check_keyword(&self, keyword: &str) -> bool {
        self.current().is_some_and(|t| t.is_keyword(keyword))
    }

    pub fn check_punctuation(&self, symbol: &str) -> bool {
        self.current().is_some_and(|t| t.is_punctuation(symbol))
    }

    /// Try to consume a keyword
    pub fn try_consume_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Try to consume a punctuation symbol
    pub fn try_consume_punctuation(&mut self, symbol: &str) -> bool {
        if self.check_punctuation(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// `name` or `qualifier.name`, from one token or from IDENTIFIER '.' IDENTIFIER.
    pub fn parse_qualified_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect(TokenKind::Identifier)?.text.to_string();

        if self.try_consume_punctuation(".") {
            let column = self.expect(TokenKind::Identifier)?;
            name.push('.');
            name.push_str(column.text);
        }

        Ok(name)
    }

    /// Parse identifier
    pub fn parse_identifier(&mut self) -> ParseResult<Expr> {
        self.parse_qualified_name().map(Expr::Identifier)
    }

    /// Parse the whole token stream into a `Query`.
    pub fn parse(self) -> ParseResult<Query> {
        self.parse_report().map(|report| report.query)
    }

    /// Like [`Parser::parse`], also reporting whether WHERE was absent, complete or truncated.
    pub fn parse_report(mut self) -> ParseResult<ParseReport> {
        let mut query = Query::default();

        while let Some(token) = self.current() {
            let keyword = if token.kind == TokenKind::Keyword {
                token.normalized()
            } else {
                String::new()
            };

            match keyword.as_str() {
                "SELECT" => {
                    debug!(position = self.pos, "SELECT clause");
                    query.select = Some(self.parse_select()?);
                }
                "FROM" => {
                    debug!(position = self.pos, "FROM clause");
                    query.from = Some(self.parse_from()?);
                }
                "WHERE" => {
                    debug!(position = self.pos, "WHERE clause");
                    query.where_clause = self.parse_where()?;
                }
                "GROUP BY" => {
                    debug!(position = self.pos, "GROUP BY clause");
                    query.group_by = Some(self.parse_group_by()?);
                }
                "HAVING" => {
                    debug!(position = self.pos, "HAVING clause");
                    query.having = Some(self.parse_having()?);
                }
                "ORDER BY" => {
                    debug!(position = self.pos, "ORDER BY clause");
                    query.order_by = Some(self.parse_order_by()?);
                }
                _ if token.is_join_keyword() => {
                    debug!(position = self.pos, join_type = %keyword, "JOIN clauses");
                    query.joins = self.parse_joins()?;
                }
                _ => {
                    trace!(position = self.pos, text = token.text, "skip token");
                    self.advance();
                }
            }
        }

        Ok(ParseReport {
            query,
            where_status: self.where_status,
        })
    }
}

/// Parse an already tokenized SELECT statement with the default configuration.
pub fn parse_tokens(tokens: &[Token]) -> ParseResult<Query> {
    Parser::new(tokens).parse()
}

/// Lex and parse a SELECT statement.
pub fn parse_sql(sql: &str) -> Result<Query, SqlError> {
    let tokens = tokenize(sql)?;
    Ok(Parser::new(&tokens).parse()?)
}

/// Lex, parse and serialize to the canonical map in one go.
pub fn parse_sql_to_json(sql: &str) -> Result<serde_json::Value, SqlError> {
    parse_sql(sql).map(|query| query.to_canonical_map())
}
