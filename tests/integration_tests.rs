// Integration tests that drive the complete flow: tokens in, canonical maps out
use regex::Regex;
use select_ast::{
    parse_sql, parse_sql_to_json, parse_tokens, tokenize, walk, Canonical, Construct, NodeKind,
    ParseError, Parser, ParserConfig, SqlError, Token, WhereMode, WhereStatus,
};
use serde_json::json;

fn kw(text: &'static str) -> Token<'static> {
    Token::keyword(text)
}

fn id(text: &'static str) -> Token<'static> {
    Token::identifier(text)
}

fn op(text: &'static str) -> Token<'static> {
    Token::operator(text)
}

fn punct(text: &'static str) -> Token<'static> {
    Token::punctuation(text)
}

fn select_from(tail: Vec<Token<'static>>) -> Vec<Token<'static>> {
    let mut tokens = vec![kw("SELECT"), id("column1"), kw("FROM"), id("table1")];
    tokens.extend(tail);
    tokens
}

fn where_map(tokens: &[Token]) -> serde_json::Value {
    let query = parse_tokens(tokens).unwrap();
    query.where_clause.unwrap().condition.to_canonical_map()
}

#[test]
fn test_simple_select() {
    let query = parse_tokens(&select_from(vec![])).unwrap();

    assert_eq!(
        query.to_canonical_map(),
        json!({
            "node_type": "Query",
            "select": {
                "node_type": "SelectClause",
                "items": [{
                    "node_type": "SelectItem",
                    "expression": {"node_type": "Identifier", "name": "column1"},
                    "alias": null
                }]
            },
            "from": {
                "node_type": "FromClause",
                "table": {"node_type": "Table", "name": "table1", "alias": null}
            },
            "where": null,
            "joins": [],
            "group_by": null,
            "having": null,
            "order_by": null
        })
    );
}

#[test]
fn test_wildcard_select() {
    let tokens = vec![kw("SELECT"), Token::wildcard(), kw("FROM"), id("table1")];
    let query = parse_tokens(&tokens).unwrap();
    let select = query.select.unwrap();

    assert_eq!(
        select.items[0].expression.to_canonical_map(),
        json!({"node_type": "Wildcard", "value": "*"})
    );
}

#[test]
fn test_where_comparison() {
    let tokens = select_from(vec![
        kw("WHERE"),
        id("column1"),
        op("="),
        Token::string("'value'"),
    ]);

    assert_eq!(
        where_map(&tokens),
        json!({
            "node_type": "Comparison",
            "left": {"node_type": "Identifier", "name": "column1"},
            "operator": "=",
            "right": {"node_type": "Literal", "value": "'value'"}
        })
    );
}

#[test]
fn test_where_and_chain() {
    let tokens = select_from(vec![
        kw("WHERE"),
        id("column1"),
        op("="),
        Token::string("'value'"),
        kw("AND"),
        id("column2"),
        op(">"),
        Token::number("10"),
    ]);

    assert_eq!(
        where_map(&tokens),
        json!({
            "node_type": "LogicalOperation",
            "left": {
                "node_type": "Comparison",
                "left": {"node_type": "Identifier", "name": "column1"},
                "operator": "=",
                "right": {"node_type": "Literal", "value": "'value'"}
            },
            "operator": "AND",
            "right": {
                "node_type": "Comparison",
                "left": {"node_type": "Identifier", "name": "column2"},
                "operator": ">",
                "right": {"node_type": "Literal", "value": "10"}
            }
        })
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    let query = parse_sql("SELECT * FROM t WHERE a=1 OR b=2 AND c=3").unwrap();
    let map = query.where_clause.unwrap().condition.to_canonical_map();

    assert_eq!(map["operator"], "OR");
    assert_eq!(map["left"]["left"]["name"], "a");
    assert_eq!(map["right"]["operator"], "AND");
    assert_eq!(map["right"]["left"]["left"]["name"], "b");
    assert_eq!(map["right"]["right"]["left"]["name"], "c");
}

#[test]
fn test_explicit_parentheses() {
    let query = parse_sql("SELECT * FROM t WHERE (a=1 OR b=2) AND c=3").unwrap();
    let map = query.where_clause.unwrap().condition.to_canonical_map();

    assert_eq!(map["operator"], "AND");
    assert_eq!(map["left"]["operator"], "OR");
    assert_eq!(map["right"]["left"]["name"], "c");
}

#[test]
fn test_in_list() {
    let tokens = select_from(vec![
        kw("WHERE"),
        id("column1"),
        kw("IN"),
        punct("("),
        Token::string("'v1'"),
        punct(","),
        Token::string("'v2'"),
        punct(","),
        Token::string("'v3'"),
        punct(")"),
    ]);

    assert_eq!(
        where_map(&tokens),
        json!({
            "node_type": "InList",
            "expression": {"node_type": "Identifier", "name": "column1"},
            "values": [
                {"node_type": "Literal", "value": "'v1'"},
                {"node_type": "Literal", "value": "'v2'"},
                {"node_type": "Literal", "value": "'v3'"}
            ]
        })
    );
}

#[test]
fn test_empty_in_list_is_rejected() {
    let tokens = select_from(vec![
        kw("WHERE"),
        id("column1"),
        kw("IN"),
        punct("("),
        punct(")"),
    ]);

    let err = parse_tokens(&tokens).unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedToken { position: 8, .. }));

    // Lenient mode treats it as a truncated WHERE instead
    let config = ParserConfig::default().with_where_mode(WhereMode::Lenient);
    let report = Parser::with_config(&tokens, config).parse_report().unwrap();
    assert!(report.query.where_clause.is_none());
    assert!(matches!(report.where_status, WhereStatus::Truncated(_)));
}

#[test]
fn test_between() {
    let tokens = select_from(vec![
        kw("WHERE"),
        id("column1"),
        kw("BETWEEN"),
        Token::number("10"),
        kw("AND"),
        Token::number("20"),
    ]);

    assert_eq!(
        where_map(&tokens),
        json!({
            "node_type": "Between",
            "expression": {"node_type": "Identifier", "name": "column1"},
            "lower": {"node_type": "Literal", "value": "10"},
            "upper": {"node_type": "Literal", "value": "20"}
        })
    );
}

#[test]
fn test_is_null_and_is_not_null() {
    for (tail, negated) in [
        (vec![kw("IS"), kw("NULL")], false),
        (vec![kw("IS"), kw("NOT"), kw("NULL")], true),
    ] {
        let mut where_tokens = vec![kw("WHERE"), id("column1")];
        where_tokens.extend(tail);

        assert_eq!(
            where_map(&select_from(where_tokens)),
            json!({
                "node_type": "IsNullOperation",
                "expression": {"node_type": "Identifier", "name": "column1"},
                "negated": negated
            })
        );
    }
}

#[test]
fn test_like_and_boolean_literal() {
    let query = parse_sql("SELECT * FROM t WHERE name LIKE 'a%' OR active = TRUE").unwrap();
    let map = query.where_clause.unwrap().condition.to_canonical_map();

    assert_eq!(
        map["left"],
        json!({
            "node_type": "Like",
            "left": {"node_type": "Identifier", "name": "name"},
            "pattern": {"node_type": "Literal", "value": "'a%'"}
        })
    );
    assert_eq!(
        map["right"]["right"],
        json!({"node_type": "BooleanLiteral", "value": true})
    );
}

#[test]
fn test_joins_in_source_order() {
    let tokens = vec![
        kw("SELECT"),
        Token::wildcard(),
        kw("FROM"),
        id("a"),
        kw("JOIN"),
        id("b"),
        kw("ON"),
        id("a.id"),
        op("="),
        id("b.a_id"),
        kw("LEFT JOIN"),
        id("c"),
        kw("ON"),
        id("b"),
        punct("."),
        id("id"),
        op("="),
        id("c"),
        punct("."),
        id("b_id"),
        kw("INNER JOIN"),
        id("d AS dd"),
        kw("ON"),
        id("c.id"),
        op("="),
        id("dd.c_id"),
    ];
    let query = parse_tokens(&tokens).unwrap();
    let joins: Vec<_> = query.joins.iter().map(|j| j.to_canonical_map()).collect();

    assert_eq!(joins.len(), 3);
    assert_eq!(
        joins[0],
        json!({
            "node_type": "JoinClause",
            "join_type": "JOIN",
            "table": {"node_type": "TableReference", "table_name": "b", "alias": null},
            "condition": {
                "node_type": "Comparison",
                "left": {"node_type": "Identifier", "name": "a.id"},
                "operator": "=",
                "right": {"node_type": "Identifier", "name": "b.a_id"}
            }
        })
    );
    assert_eq!(joins[1]["join_type"], "LEFT JOIN");
    assert_eq!(joins[1]["condition"]["left"]["name"], "b.id");
    assert_eq!(joins[1]["condition"]["right"]["name"], "c.b_id");
    assert_eq!(joins[2]["join_type"], "INNER JOIN");
    assert_eq!(
        joins[2]["table"],
        json!({"node_type": "TableReference", "table_name": "d", "alias": "dd"})
    );
}

#[test]
fn test_join_alias_with_as_from_sql_text() {
    let map = parse_sql_to_json("SELECT * FROM a JOIN orders AS o ON a.id = o.aid").unwrap();

    assert_eq!(
        map["joins"][0]["table"],
        json!({"node_type": "TableReference", "table_name": "orders", "alias": "o"})
    );
    assert_eq!(map["joins"][0]["condition"]["right"]["name"], "o.aid");
}

#[test]
fn test_group_by_having_count() {
    let tokens = vec![
        kw("SELECT"),
        id("column1"),
        punct(","),
        kw("COUNT"),
        punct("("),
        Token::wildcard(),
        punct(")"),
        kw("FROM"),
        id("table1"),
        kw("GROUP BY"),
        id("column1"),
        kw("HAVING"),
        kw("COUNT"),
        punct("("),
        Token::wildcard(),
        punct(")"),
        op(">"),
        Token::number("5"),
    ];
    let query = parse_tokens(&tokens).unwrap();
    let map = query.to_canonical_map();

    assert_eq!(
        map["group_by"],
        json!({
            "node_type": "GroupByClause",
            "columns": [{"node_type": "Identifier", "name": "column1"}]
        })
    );
    assert_eq!(
        map["having"],
        json!({
            "node_type": "HavingClause",
            "condition": {
                "node_type": "Comparison",
                "left": {
                    "node_type": "FunctionCall",
                    "name": "COUNT",
                    "args": [{"node_type": "Wildcard", "value": "*"}]
                },
                "operator": ">",
                "right": {"node_type": "Literal", "value": "5"}
            }
        })
    );
}

#[test]
fn test_order_by_direction_is_never_defaulted() {
    let map = parse_sql_to_json("SELECT a, b FROM t ORDER BY a, b desc").unwrap();

    assert_eq!(
        map["order_by"]["items"],
        json!([
            {
                "node_type": "Order",
                "column": {"node_type": "Identifier", "name": "a"},
                "direction": null
            },
            {
                "node_type": "Order",
                "column": {"node_type": "Identifier", "name": "b"},
                "direction": "DESC"
            }
        ])
    );
}

#[test]
fn test_canonical_map_is_deterministic() {
    let sql = "SELECT u.id AS uid FROM users u JOIN orders o ON u.id = o.uid \
               WHERE (u.age > 18 OR u.vip = TRUE) AND o.total BETWEEN 10 AND 100 \
               GROUP BY u.id HAVING SUM(o.total) > 1000 ORDER BY u.id DESC";

    let first = serde_json::to_string(&parse_sql_to_json(sql).unwrap()).unwrap();
    let second = serde_json::to_string(&parse_sql_to_json(sql).unwrap()).unwrap();
    assert_eq!(first, second);

    let keys = Regex::new(r#"^\{"node_type":"Query","select":.*,"from":.*,"where":.*,"joins":\[.*\],"group_by":.*,"having":.*,"order_by":.*\}$"#)
        .unwrap();
    assert!(keys.is_match(&first));
}

#[test]
fn test_lexer_and_hand_built_tokens_agree() {
    let lexed = tokenize("SELECT column1 FROM table1 WHERE column1 = 'value'").unwrap();
    let built = select_from(vec![
        kw("WHERE"),
        id("column1"),
        op("="),
        Token::string("'value'"),
    ]);

    assert_eq!(
        parse_tokens(&lexed).unwrap().to_canonical_map(),
        parse_tokens(&built).unwrap().to_canonical_map()
    );
}

#[test]
fn test_rendered_sql_shape() {
    let query = parse_sql(
        "select a as x, max(b) from t tt left join u on tt.id = u.id where a = 1 order by a asc",
    )
    .unwrap();
    let rendered = query.to_string();

    let shape = Regex::new(
        r"^SELECT a AS x, max\(b\) FROM t tt LEFT JOIN u ON tt\.id = u\.id WHERE a = 1 ORDER BY a ASC$",
    )
    .unwrap();
    assert!(shape.is_match(&rendered), "{}", rendered);
}

#[test]
fn test_walk_reaches_every_node() {
    let query = parse_sql("SELECT a FROM t WHERE a IN (1, 2) AND NOT b IS NULL").unwrap();

    let mut kinds = Vec::new();
    walk(&query, &mut |node| kinds.push(node.node_kind()));

    assert_eq!(kinds[0], NodeKind::Query);
    assert!(kinds.contains(&NodeKind::InList));
    assert!(kinds.contains(&NodeKind::UnaryOperation));
    assert!(kinds.contains(&NodeKind::IsNullOperation));
    assert_eq!(
        kinds.iter().filter(|k| **k == NodeKind::Literal).count(),
        2
    );
}

#[test]
fn test_unsupported_constructs() {
    let cases = [
        ("SELECT * FROM (SELECT * FROM t) d", Construct::Subquery),
        ("SELECT MAX(MIN(a)) FROM t", Construct::NestedFunctionCall),
        ("SELECT a + b FROM t", Construct::CompositeExpression),
        (
            "SELECT * FROM a JOIN b ON a.x = b.x OR a.y = b.y",
            Construct::MultiPredicateJoin,
        ),
    ];

    for (sql, expected) in cases {
        match parse_sql(sql) {
            Err(SqlError::Parse(ParseError::UnsupportedConstruct { construct, .. })) => {
                assert_eq!(construct, expected, "{}", sql)
            }
            other => panic!("{}: unexpected result {:?}", sql, other),
        }
    }
}

#[test]
fn test_error_report_names_token_and_expectation() {
    colored::control::set_override(false);
    let tokens = tokenize("SELECT a FROM t WHERE a = 1 AND b IS 5").unwrap();
    let err = parse_tokens(&tokens).unwrap_err();

    assert_eq!(err.position(), 11);
    let report = err.report(&tokens);
    assert!(report.contains("expected NULL or NOT NULL after IS"));
    assert!(report.contains("NUMBER '5'"));
}
