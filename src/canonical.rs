// Canonical map serialization: the fixed-shape JSON form used for structural
// equality and handed to downstream canonicalizers.

use crate::ast::{
    DerivedTable, FromClause, GroupByClause, HavingClause, JoinClause, Order, OrderByClause, Query,
    SelectClause, SelectItem, Table, TableReference, TableSource, WhereClause,
};
use crate::expr::{Expr, Operator};
use serde_json::{json, Value};
use std::fmt;

/// The closed set of node tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Query,
    SelectClause,
    SelectItem,
    FromClause,
    Table,
    DerivedTable,
    JoinClause,
    TableReference,
    WhereClause,
    HavingClause,
    GroupByClause,
    OrderByClause,
    Order,
    Identifier,
    Literal,
    BooleanLiteral,
    FunctionCall,
    Wildcard,
    Operator,
    Comparison,
    LogicalOperation,
    UnaryOperation,
    InList,
    Between,
    IsNullOperation,
    Like,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Query => "Query",
            NodeKind::SelectClause => "SelectClause",
            NodeKind::SelectItem => "SelectItem",
            NodeKind::FromClause => "FromClause",
            NodeKind::Table => "Table",
            NodeKind::DerivedTable => "DerivedTable",
            NodeKind::JoinClause => "JoinClause",
            NodeKind::TableReference => "TableReference",
            NodeKind::WhereClause => "WhereClause",
            NodeKind::HavingClause => "HavingClause",
            NodeKind::GroupByClause => "GroupByClause",
            NodeKind::OrderByClause => "OrderByClause",
            NodeKind::Order => "Order",
            NodeKind::Identifier => "Identifier",
            NodeKind::Literal => "Literal",
            NodeKind::BooleanLiteral => "BooleanLiteral",
            NodeKind::FunctionCall => "FunctionCall",
            NodeKind::Wildcard => "Wildcard",
            NodeKind::Operator => "Operator",
            NodeKind::Comparison => "Comparison",
            NodeKind::LogicalOperation => "LogicalOperation",
            NodeKind::UnaryOperation => "UnaryOperation",
            NodeKind::InList => "InList",
            NodeKind::Between => "Between",
            NodeKind::IsNullOperation => "IsNullOperation",
            NodeKind::Like => "Like",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child in the generic view: another node, or an opaque string.
pub enum Child<'a> {
    Node(&'a dyn Canonical),
    Text(&'a str),
}

/// Implemented by every AST node.
pub trait Canonical {
    fn node_kind(&self) -> NodeKind;

    /// `{"node_type": <tag>, <fields in fixed order>}`. Absent optionals are `null`.
    fn to_canonical_map(&self) -> Value;

    /// Children in source order, used by [`walk`] and the generic map.
    fn children(&self) -> Vec<Child<'_>>;

    /// Uniform fallback shape: `{"node_type": <tag>, "children": [...]}`.
    fn to_generic_map(&self) -> Value {
        let children: Vec<Value> = self
            .children()
            .into_iter()
            .map(|child| match child {
                Child::Node(node) => node.to_generic_map(),
                Child::Text(text) => Value::String(text.to_string()),
            })
            .collect();

        json!({
            "node_type": self.node_kind().as_str(),
            "children": children,
        })
    }
}

/// Pre-order traversal over every node reachable through [`Canonical::children`].
pub fn walk<'a, F>(node: &'a dyn Canonical, visit: &mut F)
where
    F: FnMut(&'a dyn Canonical),
{
    visit(node);
    for child in node.children() {
        if let Child::Node(child) = child {
            walk(child, visit);
        }
    }
}

fn map_all<T: Canonical>(nodes: &[T]) -> Vec<Value> {
    nodes.iter().map(Canonical::to_canonical_map).collect()
}

fn map_opt<T: Canonical>(node: &Option<T>) -> Value {
    node.as_ref()
        .map_or(Value::Null, Canonical::to_canonical_map)
}

impl Canonical for Query {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Query
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::Query.as_str(),
            "select": map_opt(&self.select),
            "from": map_opt(&self.from),
            "where": map_opt(&self.where_clause),
            "joins": map_all(&self.joins),
            "group_by": map_opt(&self.group_by),
            "having": map_opt(&self.having),
            "order_by": map_opt(&self.order_by),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        let mut children: Vec<Child<'_>> = Vec::new();
        if let Some(select) = &self.select {
            children.push(Child::Node(select));
        }
        if let Some(from) = &self.from {
            children.push(Child::Node(from));
        }
        if let Some(where_clause) = &self.where_clause {
            children.push(Child::Node(where_clause));
        }
        children.extend(self.joins.iter().map(|join| Child::Node(join)));
        if let Some(group_by) = &self.group_by {
            children.push(Child::Node(group_by));
        }
        if let Some(having) = &self.having {
            children.push(Child::Node(having));
        }
        if let Some(order_by) = &self.order_by {
            children.push(Child::Node(order_by));
        }
        children
    }
}

impl Canonical for SelectClause {
    fn node_kind(&self) -> NodeKind {
        NodeKind::SelectClause
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::SelectClause.as_str(),
            "items": map_all(&self.items),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        self.items.iter().map(|item| Child::Node(item)).collect()
    }
}

impl Canonical for SelectItem {
    fn node_kind(&self) -> NodeKind {
        NodeKind::SelectItem
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::SelectItem.as_str(),
            "expression": self.expression.to_canonical_map(),
            "alias": self.alias,
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        let mut children = vec![Child::Node(&self.expression)];
        if let Some(alias) = &self.alias {
            children.push(Child::Text(alias));
        }
        children
    }
}

impl Canonical for FromClause {
    fn node_kind(&self) -> NodeKind {
        NodeKind::FromClause
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::FromClause.as_str(),
            "table": self.table.to_canonical_map(),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        vec![Child::Node(&self.table)]
    }
}

// A table source is transparent: it reports the kind of whichever source it holds.
impl Canonical for TableSource {
    fn node_kind(&self) -> NodeKind {
        match self {
            TableSource::Table(table) => table.node_kind(),
            TableSource::Derived(derived) => derived.node_kind(),
        }
    }

    fn to_canonical_map(&self) -> Value {
        match self {
            TableSource::Table(table) => table.to_canonical_map(),
            TableSource::Derived(derived) => derived.to_canonical_map(),
        }
    }

    fn children(&self) -> Vec<Child<'_>> {
        match self {
            TableSource::Table(table) => table.children(),
            TableSource::Derived(derived) => derived.children(),
        }
    }
}

impl Canonical for Table {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Table
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::Table.as_str(),
            "name": self.name,
            "alias": self.alias,
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        let mut children = vec![Child::Text(&self.name)];
        if let Some(alias) = &self.alias {
            children.push(Child::Text(alias));
        }
        children
    }
}

impl Canonical for DerivedTable {
    fn node_kind(&self) -> NodeKind {
        NodeKind::DerivedTable
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::DerivedTable.as_str(),
            "subquery": self.subquery.to_canonical_map(),
            "alias": self.alias,
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        let mut children = vec![Child::Node(&*self.subquery)];
        if let Some(alias) = &self.alias {
            children.push(Child::Text(alias));
        }
        children
    }
}

impl Canonical for JoinClause {
    fn node_kind(&self) -> NodeKind {
        NodeKind::JoinClause
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::JoinClause.as_str(),
            "join_type": self.join_type,
            "table": self.table_ref.to_canonical_map(),
            "condition": self.condition.to_canonical_map(),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        vec![
            Child::Text(&self.join_type),
            Child::Node(&self.table_ref),
            Child::Node(&self.condition),
        ]
    }
}

impl Canonical for TableReference {
    fn node_kind(&self) -> NodeKind {
        NodeKind::TableReference
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::TableReference.as_str(),
            "table_name": self.name,
            "alias": self.alias,
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        let mut children = vec![Child::Text(&self.name)];
        if let Some(alias) = &self.alias {
            children.push(Child::Text(alias));
        }
        children
    }
}

impl Canonical for WhereClause {
    fn node_kind(&self) -> NodeKind {
        NodeKind::WhereClause
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::WhereClause.as_str(),
            "condition": self.condition.to_canonical_map(),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        vec![Child::Node(&self.condition)]
    }
}

impl Canonical for HavingClause {
    fn node_kind(&self) -> NodeKind {
        NodeKind::HavingClause
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::HavingClause.as_str(),
            "condition": self.condition.to_canonical_map(),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        vec![Child::Node(&self.condition)]
    }
}

impl Canonical for GroupByClause {
    fn node_kind(&self) -> NodeKind {
        NodeKind::GroupByClause
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::GroupByClause.as_str(),
            "columns": map_all(&self.columns),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        self.columns.iter().map(|column| Child::Node(column)).collect()
    }
}

impl Canonical for OrderByClause {
    fn node_kind(&self) -> NodeKind {
        NodeKind::OrderByClause
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::OrderByClause.as_str(),
            "items": map_all(&self.items),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        self.items.iter().map(|item| Child::Node(item)).collect()
    }
}

impl Canonical for Order {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Order
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::Order.as_str(),
            "column": self.column.to_canonical_map(),
            "direction": self.direction.map(|d| d.as_str()),
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        let mut children = vec![Child::Node(&self.column)];
        if let Some(direction) = self.direction {
            children.push(Child::Text(direction.as_str()));
        }
        children
    }
}

impl Canonical for Operator {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Operator
    }

    fn to_canonical_map(&self) -> Value {
        json!({
            "node_type": NodeKind::Operator.as_str(),
            "symbol": self.symbol,
        })
    }

    fn children(&self) -> Vec<Child<'_>> {
        vec![Child::Text(&self.symbol)]
    }
}

impl Canonical for Expr {
    fn node_kind(&self) -> NodeKind {
        match self {
            Expr::Identifier(_) => NodeKind::Identifier,
            Expr::Literal(_) => NodeKind::Literal,
            Expr::BooleanLiteral(_) => NodeKind::BooleanLiteral,
            Expr::FunctionCall { .. } => NodeKind::FunctionCall,
            Expr::Wildcard => NodeKind::Wildcard,
            Expr::Comparison { .. } => NodeKind::Comparison,
            Expr::LogicalOperation { .. } => NodeKind::LogicalOperation,
            Expr::UnaryOperation { .. } => NodeKind::UnaryOperation,
            Expr::InList { .. } => NodeKind::InList,
            Expr::Between { .. } => NodeKind::Between,
            Expr::IsNullOperation { .. } => NodeKind::IsNullOperation,
            Expr::Like { .. } => NodeKind::Like,
        }
    }

    fn to_canonical_map(&self) -> Value {
        let node_type = self.node_kind().as_str();
        match self {
            Expr::Identifier(name) => json!({ "node_type": node_type, "name": name }),
            Expr::Literal(text) => json!({ "node_type": node_type, "value": text }),
            Expr::BooleanLiteral(value) => json!({ "node_type": node_type, "value": value }),
            Expr::FunctionCall { name, args } => json!({
                "node_type": node_type,
                "name": name,
                "args": map_all(args),
            }),
            Expr::Wildcard => json!({ "node_type": node_type, "value": "*" }),
            Expr::Comparison {
                left,
                operator,
                right,
            } => json!({
                "node_type": node_type,
                "left": left.to_canonical_map(),
                "operator": operator.symbol,
                "right": right.to_canonical_map(),
            }),
            Expr::LogicalOperation {
                left,
                operator,
                right,
            } => json!({
                "node_type": node_type,
                "left": left.to_canonical_map(),
                "operator": operator.as_str(),
                "right": right.to_canonical_map(),
            }),
            Expr::UnaryOperation { operator, operand } => json!({
                "node_type": node_type,
                "operator": operator.as_str(),
                "operand": operand.to_canonical_map(),
            }),
            Expr::InList { expression, values } => json!({
                "node_type": node_type,
                "expression": expression.to_canonical_map(),
                "values": map_all(values),
            }),
            Expr::Between {
                expression,
                lower,
                upper,
            } => json!({
                "node_type": node_type,
                "expression": expression.to_canonical_map(),
                "lower": lower.to_canonical_map(),
                "upper": upper.to_canonical_map(),
            }),
            Expr::IsNullOperation {
                expression,
                negated,
            } => json!({
                "node_type": node_type,
                "expression": expression.to_canonical_map(),
                "negated": negated,
            }),
            Expr::Like { left, pattern } => json!({
                "node_type": node_type,
                "left": left.to_canonical_map(),
                "pattern": pattern.to_canonical_map(),
            }),
        }
    }

    fn children(&self) -> Vec<Child<'_>> {
        match self {
            Expr::Identifier(name) => vec![Child::Text(name)],
            Expr::Literal(text) => vec![Child::Text(text)],
            Expr::BooleanLiteral(value) => {
                vec![Child::Text(if *value { "TRUE" } else { "FALSE" })]
            }
            Expr::FunctionCall { args, .. } => args.iter().map(|arg| Child::Node(arg)).collect(),
            Expr::Wildcard => vec![Child::Text("*")],
            Expr::Comparison {
                left,
                operator,
                right,
            } => vec![
                Child::Node(&**left),
                Child::Node(operator),
                Child::Node(&**right),
            ],
            Expr::LogicalOperation {
                left,
                operator,
                right,
            } => vec![
                Child::Node(&**left),
                Child::Text(operator.as_str()),
                Child::Node(&**right),
            ],
            Expr::UnaryOperation { operator, operand } => {
                vec![Child::Text(operator.as_str()), Child::Node(&**operand)]
            }
            Expr::InList { expression, values } => {
                let mut children = vec![Child::Node(&**expression)];
                children.extend(values.iter().map(|value| Child::Node(value)));
                children
            }
            Expr::Between {
                expression,
                lower,
                upper,
            } => vec![
                Child::Node(&**expression),
                Child::Node(&**lower),
                Child::Node(&**upper),
            ],
            Expr::IsNullOperation { expression, .. } => vec![Child::Node(&**expression)],
            Expr::Like { left, pattern } => {
                vec![Child::Node(&**left), Child::Node(&**pattern)]
            }
        }
    }
}
