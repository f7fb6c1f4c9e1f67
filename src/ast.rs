// Clause-level nodes of a parsed SELECT statement.
// Nodes are built bottom-up by the clause parsers and never mutated afterwards.

use crate::expr::Expr;
use std::fmt;

/// One SELECT statement, assembled by the dispatcher from whichever clauses it met.
///
/// SELECT and FROM are logically mandatory but a missing one is simply `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub select: Option<SelectClause>,
    pub from: Option<FromClause>,
    pub where_clause: Option<WhereClause>,
    pub joins: Vec<JoinClause>,
    pub group_by: Option<GroupByClause>,
    pub having: Option<HavingClause>,
    pub order_by: Option<OrderByClause>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectClause {
    pub items: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    pub expression: Expr,
    pub alias: Option<String>,
}

/// Only the first table of a comma-separated FROM list is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromClause {
    pub table: TableSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Table(Table),
    Derived(DerivedTable),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub alias: Option<String>,
}

/// Subquery used as a FROM source. The parser rejects subqueries, so these only
/// come from code that builds trees directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTable {
    pub subquery: Box<Query>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    /// Keyword text upper-cased, e.g. `"LEFT JOIN"`. No semantic distinction is made.
    pub join_type: String,
    pub table_ref: TableReference,
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HavingClause {
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupByClause {
    pub columns: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByClause {
    pub items: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: Expr,
    /// Left unset when the query does not say; never defaulted to ASC.
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

// Display implementations render SQL text

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();

        if let Some(select) = &self.select {
            parts.push(select.to_string());
        }
        if let Some(from) = &self.from {
            parts.push(from.to_string());
        }
        parts.extend(self.joins.iter().map(|join| join.to_string()));
        if let Some(where_clause) = &self.where_clause {
            parts.push(where_clause.to_string());
        }
        if let Some(group_by) = &self.group_by {
            parts.push(group_by.to_string());
        }
        if let Some(having) = &self.having {
            parts.push(having.to_string());
        }
        if let Some(order_by) = &self.order_by {
            parts.push(order_by.to_string());
        }

        write!(f, "{}", parts.join(" "))
    }
}

impl fmt::Display for SelectClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        write_list(f, &self.items)
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FROM {}", self.table)
    }
}

impl fmt::Display for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSource::Table(table) => write!(f, "{}", table),
            TableSource::Derived(derived) => write!(f, "{}", derived),
        }
    }
}

// FROM aliases are bare: `FROM users u`
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " {}", alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for DerivedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.subquery)?;
        if let Some(alias) = &self.alias {
            write!(f, " {}", alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ON {}",
            self.join_type, self.table_ref, self.condition
        )
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " {}", alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WHERE {}", self.condition)
    }
}

impl fmt::Display for HavingClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HAVING {}", self.condition)
    }
}

impl fmt::Display for GroupByClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GROUP BY ")?;
        write_list(f, &self.columns)
    }
}

impl fmt::Display for OrderByClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORDER BY ")?;
        write_list(f, &self.items)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column)?;
        if let Some(direction) = self.direction {
            write!(f, " {}", direction.as_str())?;
        }
        Ok(())
    }
}
