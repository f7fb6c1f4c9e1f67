// Library exports for the SELECT statement parser
// Tokens in, a clause-level AST out, with a canonical JSON map for comparisons.

pub mod ast;
pub mod canonical;
pub mod clauses;
pub mod error;
pub mod expr;
pub mod parser;
pub mod token;
pub mod where_clause;

// Re-export commonly used types
pub use ast::{
    DerivedTable, Direction, FromClause, GroupByClause, HavingClause, JoinClause, Order,
    OrderByClause, Query, SelectClause, SelectItem, Table, TableReference, TableSource,
    WhereClause,
};
pub use canonical::{walk, Canonical, Child, NodeKind};
pub use error::{Construct, Found, ParseError, ParseResult, SqlError};
pub use expr::{ConditionGrammar, Expr, LogicalOp, Operator, UnaryOp, MAX_CONDITION_DEPTH};
pub use parser::{
    parse_sql, parse_sql_to_json, parse_tokens, ParseReport, Parser, ParserConfig, WhereMode,
};
pub use token::{tokenize, LexError, Token, TokenKind};
pub use where_clause::WhereStatus;
