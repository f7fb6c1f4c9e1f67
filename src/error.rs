// Typed parse failures, keyword suggestions and human-facing reports.

use crate::token::{LexError, Token, TokenKind};
use colored::*;
use std::fmt;
use strsim::jaro_winkler;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

/// Failure of the text entry points, which lex before they parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// What the parser saw where it expected something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Token { kind: TokenKind, text: String },
    EndOfInput,
}

impl Found {
    pub fn text(&self) -> Option<&str> {
        match self {
            Found::Token { text, .. } => Some(text),
            Found::EndOfInput => None,
        }
    }
}

impl From<Option<&Token<'_>>> for Found {
    fn from(token: Option<&Token<'_>>) -> Self {
        match token {
            Some(token) => Found::Token {
                kind: token.kind,
                text: token.text.to_string(),
            },
            None => Found::EndOfInput,
        }
    }
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Found::Token { kind, text } => write!(f, "{} '{}'", kind, text),
            Found::EndOfInput => f.write_str("end of input"),
        }
    }
}

/// Syntax the parser recognises but deliberately does not build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Construct {
    Subquery,
    NestedFunctionCall,
    CompositeExpression,
    MultiPredicateJoin,
    /// A call to something other than COUNT, SUM, AVG, MIN or MAX.
    Function(String),
    /// A predicate form switched off in the active condition grammar.
    Predicate(&'static str),
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Construct::Subquery => f.write_str("subqueries are not supported"),
            Construct::NestedFunctionCall => f.write_str("nested function calls are not supported"),
            Construct::CompositeExpression => {
                f.write_str("composite expressions are not supported")
            }
            Construct::MultiPredicateJoin => {
                f.write_str("JOIN ... ON accepts a single comparison only")
            }
            Construct::Function(name) => write!(f, "function {} is not supported", name),
            Construct::Predicate(name) => write!(f, "{} is not allowed in this clause", name),
        }
    }
}

/// Every failure carries the index of the token where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected} at token {position}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: Found,
    },

    #[error("expected '{expected}' at token {position}, found {found}")]
    UnexpectedTokenValue {
        position: usize,
        expected: String,
        found: Found,
    },

    #[error("unsupported construct at token {position}: {construct}")]
    UnsupportedConstruct { position: usize, construct: Construct },

    #[error("malformed boolean literal '{text}' at token {position}")]
    MalformedBooleanLiteral { position: usize, text: String },

    #[error("expected NULL or NOT NULL after IS at token {position}, found {found}")]
    MalformedIsNull { position: usize, found: Found },

    #[error("malformed condition at token {position}: {reason}")]
    MalformedCondition { position: usize, reason: String },
}

impl ParseError {
    pub fn unexpected(position: usize, expected: impl Into<String>, found: Option<&Token>) -> Self {
        ParseError::UnexpectedToken {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unsupported(position: usize, construct: Construct) -> Self {
        ParseError::UnsupportedConstruct {
            position,
            construct,
        }
    }

    pub fn position(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedTokenValue { position, .. }
            | ParseError::UnsupportedConstruct { position, .. }
            | ParseError::MalformedBooleanLiteral { position, .. }
            | ParseError::MalformedIsNull { position, .. }
            | ParseError::MalformedCondition { position, .. } => *position,
        }
    }

    /// A keyword the offending text was probably meant to be.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            ParseError::UnexpectedToken { found, .. }
            | ParseError::UnexpectedTokenValue { found, .. }
            | ParseError::MalformedIsNull { found, .. } => found.text().and_then(suggest_keyword),
            ParseError::UnsupportedConstruct {
                construct: Construct::Function(name),
                ..
            } => suggest_keyword(name),
            ParseError::MalformedBooleanLiteral { text, .. } => suggest_keyword(text),
            _ => None,
        }
    }

    /// Multi-line coloured report pointing at the offending token.
    pub fn report(&self, tokens: &[Token]) -> String {
        let mut out = format!(
            "{} at token {}\n  {}\n",
            "Parse error".red().bold(),
            self.position(),
            self
        );

        if let Some(suggestion) = self.suggestion() {
            out.push_str(&format!(
                "  {} {}\n",
                "Did you mean:".yellow(),
                suggestion.green()
            ));
        }

        if !tokens.is_empty() {
            out.push('\n');
            out.push_str(&token_context(tokens, self.position()));
        }

        out
    }
}

const SUGGESTABLE_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE", "BETWEEN", "AS",
    "ON", "ASC", "DESC", "JOIN", "HAVING", "GROUP BY", "ORDER BY", "TRUE", "FALSE", "COUNT", "SUM",
    "AVG", "MIN", "MAX",
];

/// Suggest similar keywords using Jaro-Winkler distance
pub(crate) fn suggest_keyword(input: &str) -> Option<String> {
    let input_upper = input.to_uppercase();

    SUGGESTABLE_KEYWORDS
        .iter()
        .filter(|&&keyword| keyword != input_upper)
        .map(|&keyword| (keyword, jaro_winkler(&input_upper, keyword)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(keyword, _)| keyword.to_string())
}

/// The token texts on one line with carets under the token at `position`.
fn token_context(tokens: &[Token], position: usize) -> String {
    let mut line = String::new();
    let mut caret_col = None;
    let mut caret_len = 1;

    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        if i == position {
            caret_col = Some(line.chars().count());
            caret_len = token.text.chars().count().max(1);
        }
        line.push_str(token.text);
    }

    let col = caret_col.unwrap_or_else(|| line.chars().count() + 1);
    format!(
        "  | {}\n  | {}{}",
        line,
        " ".repeat(col),
        "^".repeat(caret_len).red()
    )
}
