// WHERE driver: seek the WHERE keyword, then run an operator/operand dual-stack
// over the condition. Operands come from the shared condition engine.

use crate::ast::WhereClause;
use crate::error::{Construct, ParseError, ParseResult};
use crate::expr::{ConditionGrammar, Expr, LogicalOp, MAX_CONDITION_DEPTH};
use crate::parser::{Parser, WhereMode};
use crate::token::{Token, TokenKind};
use tracing::warn;

/// How the most recent WHERE clause ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WhereStatus {
    #[default]
    Absent,
    Complete,
    /// Lenient mode stopped at this error and kept the condition reduced so far.
    Truncated(ParseError),
}

/// Keywords that end a WHERE condition without being an error.
const WHERE_BOUNDARIES: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT", "OFFSET",
];

fn is_where_boundary(token: &Token) -> bool {
    token.is_punctuation(";")
        || (token.kind == TokenKind::Keyword
            && (token.is_join_keyword() || WHERE_BOUNDARIES.iter().any(|kw| token.matches_text(kw))))
}

#[derive(Debug)]
enum StackOp {
    Open { position: usize },
    Connective(LogicalOp),
}

#[derive(Debug)]
struct DualStack {
    operators: Vec<StackOp>,
    operands: Vec<Expr>,
    expect_operand: bool,
    open_groups: usize,
}

impl DualStack {
    fn new() -> Self {
        DualStack {
            operators: Vec::new(),
            operands: Vec::new(),
            expect_operand: true,
            open_groups: 0,
        }
    }

    /// Combine the top connective with the two topmost operands.
    fn reduce(&mut self, operator: LogicalOp, position: usize) -> ParseResult<()> {
        match (self.operands.pop(), self.operands.pop()) {
            (Some(right), Some(left)) => {
                self.operands.push(Expr::logical(left, operator, right));
                Ok(())
            }
            _ => Err(malformed(position, "AND/OR is missing an operand")),
        }
    }

    fn push_operand(&mut self, operand: Expr) {
        self.operands.push(operand);
        self.expect_operand = false;
    }

    /// Reduce every stacked connective that binds at least as tightly, then push.
    fn push_connective(&mut self, operator: LogicalOp, position: usize) -> ParseResult<()> {
        while let Some(StackOp::Connective(top)) = self.operators.last() {
            let top = *top;
            if top.precedence() < operator.precedence() {
                break;
            }
            self.operators.pop();
            self.reduce(top, position)?;
        }
        self.operators.push(StackOp::Connective(operator));
        self.expect_operand = true;
        Ok(())
    }

    /// Groups nest no deeper than a parenthesized term may, which keeps the
    /// reduced tree as shallow as the recursive parser's.
    fn open_group(&mut self, position: usize) -> ParseResult<()> {
        if self.open_groups >= MAX_CONDITION_DEPTH {
            return Err(malformed(
                position,
                &format!("condition nests deeper than {} levels", MAX_CONDITION_DEPTH),
            ));
        }
        self.open_groups += 1;
        self.operators.push(StackOp::Open { position });
        Ok(())
    }

    /// Reduce down to the matching '(' and discard it.
    fn close_group(&mut self, position: usize) -> ParseResult<()> {
        loop {
            match self.operators.pop() {
                Some(StackOp::Connective(operator)) => self.reduce(operator, position)?,
                Some(StackOp::Open { .. }) => {
                    self.open_groups -= 1;
                    return Ok(());
                }
                None => return Err(malformed(position, "unmatched ')'")),
            }
        }
    }

    /// Validate, then reduce what is left right to left. Validation happens before
    /// anything is popped, so a failed finish can still be salvaged.
    fn finish(&mut self, end: usize) -> ParseResult<Option<Expr>> {
        if self.expect_operand && matches!(self.operators.last(), Some(StackOp::Connective(_))) {
            return Err(malformed(end, "condition ends with a dangling AND/OR"));
        }
        if let Some(position) = self.operators.iter().find_map(|op| match op {
            StackOp::Open { position } => Some(*position),
            StackOp::Connective(_) => None,
        }) {
            return Err(malformed(position, "unclosed '('"));
        }

        while let Some(StackOp::Connective(operator)) = self.operators.pop() {
            self.reduce(operator, end)?;
        }
        Ok(self.operands.pop())
    }

    /// Best-effort reduction after a failed scan: a dangling connective and
    /// unmatched '(' are dropped, connectives short of operands are skipped.
    fn salvage(mut self) -> Option<Expr> {
        if self.expect_operand && matches!(self.operators.last(), Some(StackOp::Connective(_))) {
            self.operators.pop();
        }

        while let Some(op) = self.operators.pop() {
            let StackOp::Connective(operator) = op else {
                continue;
            };
            if self.operands.len() < 2 {
                continue;
            }
            if let (Some(right), Some(left)) = (self.operands.pop(), self.operands.pop()) {
                self.operands.push(Expr::logical(left, operator, right));
            }
        }

        self.operands.pop()
    }
}

fn malformed(position: usize, reason: &str) -> ParseError {
    ParseError::MalformedCondition {
        position,
        reason: reason.to_string(),
    }
}

impl<'a> Parser<'a> {
    /// Consume tokens up to and including the next WHERE keyword.
    fn seek_where(&mut self) -> bool {
        while let Some(token) = self.advance() {
            if token.is_keyword("WHERE") {
                return true;
            }
        }
        false
    }

    /// Parse a WHERE clause and record how it ended in `where_status`.
    ///
    /// A WHERE with nothing before the next clause boundary yields `None`.
    pub fn parse_where(&mut self) -> ParseResult<Option<WhereClause>> {
        if !self.seek_where() {
            self.where_status = WhereStatus::Absent;
            return Ok(None);
        }

        let mut stacks = DualStack::new();
        let result = match self.scan_condition(&mut stacks) {
            Ok(()) => stacks.finish(self.position()),
            Err(error) => Err(error),
        };

        match result {
            Ok(condition) => {
                self.where_status = if condition.is_some() {
                    WhereStatus::Complete
                } else {
                    WhereStatus::Absent
                };
                Ok(condition.map(|condition| WhereClause { condition }))
            }
            Err(error) if self.config.where_mode == WhereMode::Strict => Err(error),
            Err(error) => {
                warn!(%error, "WHERE condition truncated");
                let condition = stacks.salvage();
                self.where_status = WhereStatus::Truncated(error);
                Ok(condition.map(|condition| WhereClause { condition }))
            }
        }
    }

    fn scan_condition(&mut self, stacks: &mut DualStack) -> ParseResult<()> {
        while let Some(token) = self.current() {
            if is_where_boundary(token) {
                break;
            }
            let position = self.position();

            if token.is_punctuation("(") {
                if !stacks.expect_operand {
                    return Err(malformed(position, "'(' follows a complete condition"));
                }
                if self.peek().is_some_and(|next| next.is_keyword("SELECT")) {
                    return Err(ParseError::unsupported(position + 1, Construct::Subquery));
                }
                stacks.open_group(position)?;
                self.advance();
            } else if token.is_punctuation(")") {
                if stacks.expect_operand {
                    return Err(malformed(position, "')' closes an incomplete condition"));
                }
                stacks.close_group(position)?;
                self.advance();
            } else if let Some(operator) = LogicalOp::from_token(token) {
                if stacks.expect_operand {
                    return Err(malformed(
                        position,
                        &format!("{} has no left operand", operator.as_str()),
                    ));
                }
                stacks.push_connective(operator, position)?;
                self.advance();
            } else {
                if !stacks.expect_operand {
                    return Err(malformed(position, "missing AND/OR between conditions"));
                }
                let operand = self.parse_term(ConditionGrammar::WHERE)?;
                stacks.push_operand(operand);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseReport, ParserConfig};
    use crate::token::tokenize;

    fn report(sql: &str, mode: WhereMode) -> ParseResult<ParseReport> {
        let tokens = tokenize(sql).unwrap();
        let config = ParserConfig::default().with_where_mode(mode);
        Parser::with_config(&tokens, config).parse_report()
    }

    fn condition(sql: &str) -> String {
        let report = report(sql, WhereMode::Strict).unwrap();
        assert_eq!(report.where_status, WhereStatus::Complete);
        report.query.where_clause.unwrap().condition.to_string()
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            condition("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3"),
            "(a = 1 OR (b = 2 AND c = 3))"
        );
        assert_eq!(
            condition("SELECT * FROM t WHERE a = 1 AND b = 2 OR c = 3"),
            "((a = 1 AND b = 2) OR c = 3)"
        );
    }

    #[test]
    fn test_groups_mixed_with_connectives() {
        assert_eq!(
            condition("SELECT * FROM t WHERE (a = 1 OR b = 2) AND c = 3"),
            "((a = 1 OR b = 2) AND c = 3)"
        );
        assert_eq!(
            condition("SELECT * FROM t WHERE (a = 1 OR b = 2) AND c = 3 OR d = 4"),
            "(((a = 1 OR b = 2) AND c = 3) OR d = 4)"
        );
        assert_eq!(
            condition("SELECT * FROM t WHERE NOT (a = 1 OR b = 2) AND c IS NOT NULL"),
            "(NOT (a = 1 OR b = 2) AND c IS NOT NULL)"
        );
    }

    #[test]
    fn test_condition_stops_at_clause_boundary() {
        let query = report("SELECT a FROM t WHERE a = 1 ORDER BY a", WhereMode::Strict)
            .unwrap()
            .query;

        assert_eq!(query.where_clause.unwrap().condition.to_string(), "a = 1");
        assert_eq!(query.order_by.unwrap().items.len(), 1);
    }

    #[test]
    fn test_seek_skips_leading_tokens() {
        let tokens = tokenize("SELECT a FROM t WHERE x = 1").unwrap();
        let mut parser = Parser::new(&tokens);

        let clause = parser.parse_where().unwrap().unwrap();
        assert_eq!(clause.condition.to_string(), "x = 1");
        assert_eq!(parser.where_status, WhereStatus::Complete);
        assert!(parser.is_exhausted());
    }

    #[test]
    fn test_missing_and_empty_where_are_absent() {
        let tokens = tokenize("SELECT a FROM t").unwrap();
        let mut parser = Parser::new(&tokens);
        assert_eq!(parser.parse_where().unwrap(), None);
        assert_eq!(parser.where_status, WhereStatus::Absent);

        let report = report("SELECT a FROM t WHERE ORDER BY a", WhereMode::Strict).unwrap();
        assert!(report.query.where_clause.is_none());
        assert_eq!(report.where_status, WhereStatus::Absent);
    }

    #[test]
    fn test_strict_mode_rejects_malformed_conditions() {
        let cases = [
            ("SELECT a FROM t WHERE a = 1 AND", 9),
            ("SELECT a FROM t WHERE (a = 1", 5),
            ("SELECT a FROM t WHERE a = 1 b = 2", 8),
            ("SELECT a FROM t WHERE a = 1)", 8),
            ("SELECT a FROM t WHERE OR a = 1", 5),
        ];

        for (sql, position) in cases {
            let err = report(sql, WhereMode::Strict).unwrap_err();
            assert!(
                matches!(err, ParseError::MalformedCondition { position: p, .. } if p == position),
                "{}: {:?}",
                sql,
                err
            );
        }
    }

    #[test]
    fn test_lenient_mode_keeps_partial_condition() {
        let report = report(
            "SELECT a FROM t WHERE a = 1 AND b IS 5 ORDER BY a",
            WhereMode::Lenient,
        )
        .unwrap();

        assert_eq!(
            report.query.where_clause.unwrap().condition,
            Expr::comparison(Expr::identifier("a"), "=", Expr::literal("1"))
        );
        assert!(matches!(
            report.where_status,
            WhereStatus::Truncated(ParseError::MalformedIsNull { position: 11, .. })
        ));
        assert!(report.query.order_by.is_some());
    }

    #[test]
    fn test_lenient_mode_drops_unclosed_group() {
        let report = report("SELECT a FROM t WHERE (a = 1 OR b = 2", WhereMode::Lenient).unwrap();

        assert_eq!(
            report.query.where_clause.unwrap().condition.to_string(),
            "(a = 1 OR b = 2)"
        );
        assert!(matches!(
            report.where_status,
            WhereStatus::Truncated(ParseError::MalformedCondition { position: 5, .. })
        ));
    }

    #[test]
    fn test_lenient_mode_with_nothing_reduced() {
        let report = report("SELECT a FROM t WHERE = 1", WhereMode::Lenient).unwrap();

        assert!(report.query.where_clause.is_none());
        assert!(matches!(report.where_status, WhereStatus::Truncated(_)));
    }

    #[test]
    fn test_subquery_in_where_is_unsupported() {
        let err = report("SELECT a FROM t WHERE (SELECT 1)", WhereMode::Strict).unwrap_err();
        assert_eq!(err, ParseError::unsupported(6, Construct::Subquery));
    }

    #[test]
    fn test_deep_groups_do_not_recurse() {
        let depth = MAX_CONDITION_DEPTH;
        let sql = format!(
            "SELECT * FROM t WHERE {}a = 1{}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        assert_eq!(condition(&sql), "a = 1");
    }

    #[test]
    fn test_group_and_not_nesting_is_bounded() {
        let depth = MAX_CONDITION_DEPTH + 1;
        let sql = format!(
            "SELECT * FROM t WHERE {}a = 1{}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let err = report(&sql, WhereMode::Strict).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedCondition { position, .. } if position == 5 + MAX_CONDITION_DEPTH
        ));

        let sql = format!("SELECT * FROM t WHERE {}a = 1", "NOT ".repeat(100_000));
        let report = report(&sql, WhereMode::Lenient).unwrap();
        assert!(report.query.where_clause.is_none());
        assert!(matches!(
            report.where_status,
            WhereStatus::Truncated(ParseError::MalformedCondition { .. })
        ));
    }

    #[test]
    fn test_lenient_salvage_reduces_around_dropped_group() {
        let report = report(
            "SELECT a FROM t WHERE a = 1 OR (b = 2 AND c = 3 AND d IS 5",
            WhereMode::Lenient,
        )
        .unwrap();

        assert_eq!(
            report.query.where_clause.unwrap().condition.to_string(),
            "(a = 1 OR (b = 2 AND c = 3))"
        );
        assert!(matches!(
            report.where_status,
            WhereStatus::Truncated(ParseError::MalformedIsNull { .. })
        ));
    }
}
