// Expression and condition nodes, and the precedence-climbing condition engine
// shared by WHERE and HAVING.

use crate::error::{Construct, Found, ParseError, ParseResult};
use crate::parser::Parser;
use crate::token::{Token, TokenKind};
use recursive::recursive;
use std::fmt;

/// Names accepted as function calls anywhere in a query.
pub const AGGREGATE_FUNCTIONS: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// Deepest NOT / parenthesized nesting a single condition term may reach. Trees are
/// dropped, rendered and serialized recursively, so their depth stays bounded.
pub const MAX_CONDITION_DEPTH: usize = 1_000;

const COMPARISON_OPERATORS: &[&str] = &["=", "!=", "<>", "<", ">", "<=", ">="];

/// Expression and condition nodes. Every node owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Column reference, possibly qualified once (`t.c`)
    Identifier(String),

    /// Number or string, token text kept verbatim (quotes included)
    Literal(String),

    BooleanLiteral(bool),

    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },

    /// `*` in a select list or as the argument of `COUNT(*)`
    Wildcard,

    Comparison {
        left: Box<Expr>,
        operator: Operator,
        right: Box<Expr>,
    },

    LogicalOperation {
        left: Box<Expr>,
        operator: LogicalOp,
        right: Box<Expr>,
    },

    UnaryOperation {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    InList {
        expression: Box<Expr>,
        values: Vec<Expr>,
    },

    Between {
        expression: Box<Expr>,
        lower: Box<Expr>,
        upper: Box<Expr>,
    },

    IsNullOperation {
        expression: Box<Expr>,
        negated: bool,
    },

    Like {
        left: Box<Expr>,
        pattern: Box<Expr>,
    },
}

impl Expr {
    pub fn identifier(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Expr::Literal(text.into())
    }

    pub fn comparison(left: Expr, operator: &str, right: Expr) -> Self {
        Expr::Comparison {
            left: Box::new(left),
            operator: Operator::new(operator),
            right: Box::new(right),
        }
    }

    pub fn logical(left: Expr, operator: LogicalOp, right: Expr) -> Self {
        Expr::LogicalOperation {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn not(operand: Expr) -> Self {
        Expr::UnaryOperation {
            operator: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }
}

/// Comparison operator symbol as written (`=`, `<>`, `>=`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub symbol: String,
}

impl Operator {
    pub fn new(symbol: impl Into<String>) -> Self {
        Operator {
            symbol: symbol.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }

    /// AND binds tighter than OR.
    pub fn precedence(&self) -> u8 {
        match self {
            LogicalOp::Or => 10,
            LogicalOp::And => 20,
        }
    }

    pub fn from_token(token: &Token) -> Option<Self> {
        if token.is_keyword("AND") {
            Some(LogicalOp::And)
        } else if token.is_keyword("OR") {
            Some(LogicalOp::Or)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
        }
    }
}

/// Which predicate forms a clause accepts on top of comparisons and AND/OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionGrammar {
    pub not: bool,
    pub parentheses: bool,
    pub in_list: bool,
    pub between: bool,
    pub like: bool,
    pub is_null: bool,
    pub boolean_literals: bool,
}

impl ConditionGrammar {
    pub const WHERE: ConditionGrammar = ConditionGrammar {
        not: true,
        parentheses: true,
        in_list: true,
        between: true,
        like: true,
        is_null: true,
        boolean_literals: true,
    };

    /// Comparisons chained with AND/OR over identifiers, aggregates and literals.
    pub const HAVING: ConditionGrammar = ConditionGrammar {
        not: false,
        parentheses: false,
        in_list: false,
        between: false,
        like: false,
        is_null: false,
        boolean_literals: false,
    };

    fn require(&self, enabled: bool, position: usize, name: &'static str) -> ParseResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(ParseError::unsupported(position, Construct::Predicate(name)))
        }
    }
}

pub(crate) fn is_aggregate(token: &Token) -> bool {
    token.kind == TokenKind::Keyword
        && AGGREGATE_FUNCTIONS
            .iter()
            .any(|name| token.text.eq_ignore_ascii_case(name))
}

impl<'a> Parser<'a> {
    /// condition := factor ('OR' factor)*
    #[recursive]
    pub fn parse_condition(&mut self, grammar: ConditionGrammar) -> ParseResult<Expr> {
        let mut left = self.parse_factor(grammar)?;

        while self.try_consume_keyword("OR") {
            let right = self.parse_factor(grammar)?;
            left = Expr::logical(left, LogicalOp::Or, right);
        }

        Ok(left)
    }

    /// factor := term ('AND' term)*
    fn parse_factor(&mut self, grammar: ConditionGrammar) -> ParseResult<Expr> {
        let mut left = self.parse_term(grammar)?;

        while self.try_consume_keyword("AND") {
            let right = self.parse_term(grammar)?;
            left = Expr::logical(left, LogicalOp::And, right);
        }

        Ok(left)
    }

    /// term := ['NOT'] postfix
    ///
    /// Every nested NOT and parenthesized condition passes through here, so this is
    /// where nesting depth is counted.
    #[recursive]
    pub fn parse_term(&mut self, grammar: ConditionGrammar) -> ParseResult<Expr> {
        if self.depth >= MAX_CONDITION_DEPTH {
            return Err(ParseError::MalformedCondition {
                position: self.position(),
                reason: format!("condition nests deeper than {} levels", MAX_CONDITION_DEPTH),
            });
        }

        self.depth += 1;
        let term = self.parse_negation(grammar);
        self.depth -= 1;
        term
    }

    fn parse_negation(&mut self, grammar: ConditionGrammar) -> ParseResult<Expr> {
        if self.check_keyword("NOT") {
            grammar.require(grammar.not, self.position(), "NOT")?;
            self.advance();
            let operand = self.parse_term(grammar)?;
            return Ok(Expr::not(operand));
        }

        self.parse_postfix(grammar)
    }

    /// postfix := primary [IS [NOT] NULL | BETWEEN .. AND .. | LIKE .. | IN (..) | op primary]
    fn parse_postfix(&mut self, grammar: ConditionGrammar) -> ParseResult<Expr> {
        let left = self.parse_primary(grammar)?;
        let position = self.position();

        let Some(token) = self.current() else {
            return Ok(left);
        };

        match token.kind {
            TokenKind::Keyword if token.matches_text("IS") => {
                grammar.require(grammar.is_null, position, "IS NULL")?;
                self.parse_is_null(left)
            }
            TokenKind::Keyword if token.matches_text("BETWEEN") => {
                grammar.require(grammar.between, position, "BETWEEN")?;
                self.parse_between(left, grammar)
            }
            TokenKind::Keyword if token.matches_text("LIKE") => {
                grammar.require(grammar.like, position, "LIKE")?;
                self.parse_like(left)
            }
            TokenKind::Keyword if token.matches_text("IN") => {
                grammar.require(grammar.in_list, position, "IN")?;
                self.parse_in_list(left, grammar)
            }
            TokenKind::Operator => {
                if !COMPARISON_OPERATORS.contains(&token.text) {
                    return Err(ParseError::unsupported(
                        position,
                        Construct::CompositeExpression,
                    ));
                }
                self.advance();
                let right = self.parse_primary(grammar)?;
                Ok(Expr::comparison(left, token.text, right))
            }
            _ => Ok(left),
        }
    }

    /// primary := identifier | literal | boolean | aggregate call | '(' condition ')'
    fn parse_primary(&mut self, grammar: ConditionGrammar) -> ParseResult<Expr> {
        let position = self.position();
        let Some(token) = self.current() else {
            return Err(ParseError::unexpected(position, "expression", None));
        };

        match token.kind {
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::Number | TokenKind::String | TokenKind::Literal => {
                self.advance();
                Ok(Expr::literal(token.text))
            }
            TokenKind::Boolean => {
                grammar.require(grammar.boolean_literals, position, "boolean literal")?;
                self.parse_boolean_literal()
            }
            TokenKind::Keyword if self.peek().is_some_and(|t| t.is_punctuation("(")) => {
                self.parse_function_call()
            }
            TokenKind::Punctuation if token.text == "(" => {
                grammar.require(grammar.parentheses, position, "parenthesized condition")?;
                self.advance();
                if self.check_keyword("SELECT") {
                    return Err(ParseError::unsupported(self.position(), Construct::Subquery));
                }
                let inner = self.parse_condition(grammar)?;
                self.expect_punctuation(")")?;
                Ok(inner)
            }
            _ => Err(ParseError::unexpected(position, "expression", Some(token))),
        }
    }

    fn parse_boolean_literal(&mut self) -> ParseResult<Expr> {
        let position = self.position();
        let token = self.expect(TokenKind::Boolean)?;

        if token.matches_text("TRUE") {
            Ok(Expr::BooleanLiteral(true))
        } else if token.matches_text("FALSE") {
            Ok(Expr::BooleanLiteral(false))
        } else {
            Err(ParseError::MalformedBooleanLiteral {
                position,
                text: token.text.to_string(),
            })
        }
    }

    fn parse_is_null(&mut self, expression: Expr) -> ParseResult<Expr> {
        self.expect_keyword("IS")?;
        let negated = self.try_consume_keyword("NOT");

        if self.try_consume_keyword("NULL") {
            Ok(Expr::IsNullOperation {
                expression: Box::new(expression),
                negated,
            })
        } else {
            Err(ParseError::MalformedIsNull {
                position: self.position(),
                found: Found::from(self.current()),
            })
        }
    }

    /// The AND inside BETWEEN belongs to the range, not to the condition chain.
    fn parse_between(&mut self, expression: Expr, grammar: ConditionGrammar) -> ParseResult<Expr> {
        self.expect_keyword("BETWEEN")?;
        let lower = self.parse_primary(grammar)?;
        self.expect_keyword("AND")?;
        let upper = self.parse_primary(grammar)?;

        Ok(Expr::Between {
            expression: Box::new(expression),
            lower: Box::new(lower),
            upper: Box::new(upper),
        })
    }

    fn parse_like(&mut self, left: Expr) -> ParseResult<Expr> {
        self.expect_keyword("LIKE")?;
        let pattern = self.expect(TokenKind::String)?;

        Ok(Expr::Like {
            left: Box::new(left),
            pattern: Box::new(Expr::literal(pattern.text)),
        })
    }

    fn parse_in_list(&mut self, expression: Expr, grammar: ConditionGrammar) -> ParseResult<Expr> {
        self.expect_keyword("IN")?;
        self.expect_punctuation("(")?;

        if self.check_keyword("SELECT") {
            return Err(ParseError::unsupported(self.position(), Construct::Subquery));
        }
        if self.check_punctuation(")") {
            return Err(ParseError::unexpected(
                self.position(),
                "IN list value",
                self.current(),
            ));
        }

        let mut values = vec![self.parse_primary(grammar)?];
        while self.try_consume_punctuation(",") {
            values.push(self.parse_primary(grammar)?);
        }
        self.expect_punctuation(")")?;

        Ok(Expr::InList {
            expression: Box::new(expression),
            values,
        })
    }

    /// Aggregate call: a single `*` or a comma list of column references.
    pub(crate) fn parse_function_call(&mut self) -> ParseResult<Expr> {
        let position = self.position();
        let name_token = self.expect(TokenKind::Keyword)?;
        if !is_aggregate(name_token) {
            return Err(ParseError::unsupported(
                position,
                Construct::Function(name_token.text.to_string()),
            ));
        }
        self.expect_punctuation("(")?;

        let mut args = Vec::new();
        if self.check_kind(TokenKind::Wildcard) {
            self.advance();
            args.push(Expr::Wildcard);
        } else if !self.check_punctuation(")") {
            loop {
                let position = self.position();
                match self.current() {
                    Some(t) if t.kind == TokenKind::Identifier => {
                        args.push(self.parse_identifier()?);
                    }
                    Some(t)
                        if t.kind == TokenKind::Keyword
                            && self.peek().is_some_and(|next| next.is_punctuation("(")) =>
                    {
                        return Err(ParseError::unsupported(
                            position,
                            Construct::NestedFunctionCall,
                        ));
                    }
                    Some(t)
                        if matches!(
                            t.kind,
                            TokenKind::Number
                                | TokenKind::String
                                | TokenKind::Literal
                                | TokenKind::Wildcard
                        ) =>
                    {
                        return Err(ParseError::unsupported(
                            position,
                            Construct::CompositeExpression,
                        ));
                    }
                    other => {
                        return Err(ParseError::unexpected(position, "function argument", other))
                    }
                }

                if !self.try_consume_punctuation(",") {
                    break;
                }
            }
        }

        if self.check_kind(TokenKind::Operator) {
            return Err(ParseError::unsupported(
                self.position(),
                Construct::CompositeExpression,
            ));
        }
        self.expect_punctuation(")")?;

        Ok(Expr::FunctionCall {
            name: name_token.text.to_string(),
            args,
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::Literal(text) => write!(f, "{}", text),
            Expr::BooleanLiteral(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
            Expr::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Wildcard => write!(f, "*"),
            Expr::Comparison {
                left,
                operator,
                right,
            } => write!(f, "{} {} {}", left, operator, right),
            Expr::LogicalOperation {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator.as_str(), right),
            Expr::UnaryOperation { operator, operand } => {
                write!(f, "{} {}", operator.as_str(), operand)
            }
            Expr::InList { expression, values } => {
                write!(f, "{} IN (", expression)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
            Expr::Between {
                expression,
                lower,
                upper,
            } => write!(f, "{} BETWEEN {} AND {}", expression, lower, upper),
            Expr::IsNullOperation {
                expression,
                negated,
            } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", expression)
                } else {
                    write!(f, "{} IS NULL", expression)
                }
            }
            Expr::Like { left, pattern } => write!(f, "{} LIKE {}", left, pattern),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}
