//! Rewrite scenarios: route a statement, then check the emitted SQL
//! units against the original text.

use super::*;
use crate::config::Config;
use crate::router::{Router, UnicastCursor};
use crate::statement::{
    ColumnRef, Dialect, Expr, InsertClause, InsertRow, LimitClause, LimitSegment, Predicate, Span,
    StatementKind, TableRef,
};

fn rule() -> ShardingRule {
    let config = Config::from_str(include_str!("../../../shardkit.toml")).unwrap();
    ShardingRule::new(&config).unwrap()
}

fn rewrite(rule: &ShardingRule, statement: &BoundStatement) -> RewriteOutput {
    let routed = Router::new(rule)
        .route(statement, None, &UnicastCursor::new())
        .unwrap();
    SqlRewriteEngine::new(rule, statement)
        .rewrite(&routed)
        .unwrap()
}

#[test]
fn test_single_routing_only_substitutes_table() {
    let sql = "SELECT * FROM t_order WHERE user_id = $1 AND order_id = $2";
    let mut stmt = BoundStatement::new(sql, StatementKind::Select);
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(14, 21))];
    stmt.parameters = vec![Value::Int(3), Value::Int(5)];
    stmt.where_clause = Some(Predicate::And(vec![
        Predicate::eq(ColumnRef::new("user_id"), Expr::Parameter(0)),
        Predicate::eq(ColumnRef::new("order_id"), Expr::Parameter(1)),
    ]));

    let rule = rule();
    let output = rewrite(&rule, &stmt);

    assert_eq!(output.units.len(), 1);
    let unit = &output.units[0];
    assert_eq!(
        unit.sql,
        "SELECT * FROM t_order_1 WHERE user_id = $1 AND order_id = $2"
    );
    // Parameter list untouched on a single route.
    assert_eq!(unit.parameters, stmt.parameters);
    assert_eq!(
        unit.route.as_ref().unwrap().data_source.actual,
        "ds_1"
    );
}

#[test]
fn test_pagination_inflates_on_fanout() {
    let sql = "SELECT * FROM t_order ORDER BY order_id LIMIT 10 OFFSET 20";
    let mut stmt = BoundStatement::new(sql, StatementKind::Select);
    stmt.dialect = Dialect::MySql;
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(14, 21))];
    stmt.limit = Some(LimitClause {
        row_count: Some(LimitSegment::literal(10, Span::new(46, 48))),
        offset: Some(LimitSegment::literal(20, Span::new(56, 58))),
    });

    let rule = rule();
    let output = rewrite(&rule, &stmt);

    assert_eq!(output.units.len(), 4);
    for unit in &output.units {
        assert!(unit.sql.ends_with("LIMIT 30 OFFSET 0"), "{}", unit.sql);
    }

    // The original values survive for post-merge trimming.
    let limit = output.limit.unwrap();
    assert_eq!(limit.offset, Some(20));
    assert_eq!(limit.row_count, Some(10));
}

#[test]
fn test_pagination_parameters_replaced() {
    let sql = "SELECT * FROM t_order LIMIT $1 OFFSET $2";
    let mut stmt = BoundStatement::new(sql, StatementKind::Select);
    stmt.dialect = Dialect::Postgres;
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(14, 21))];
    stmt.parameters = vec![Value::Int(10), Value::Int(20)];
    stmt.limit = Some(LimitClause {
        row_count: Some(LimitSegment::parameter(0, Span::new(28, 30))),
        offset: Some(LimitSegment::parameter(1, Span::new(38, 40))),
    });

    let rule = rule();
    let output = rewrite(&rule, &stmt);

    assert_eq!(output.units.len(), 4);
    for unit in &output.units {
        // Text untouched, parameters carry the rewrite.
        assert!(unit.sql.ends_with("LIMIT $1 OFFSET $2"));
        assert_eq!(unit.parameters, vec![Value::Int(30), Value::Int(0)]);
    }
}

#[test]
fn test_negative_offset_fails_before_rewrite() {
    let sql = "SELECT * FROM t_order LIMIT $1 OFFSET $2";
    let mut stmt = BoundStatement::new(sql, StatementKind::Select);
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(14, 21))];
    stmt.parameters = vec![Value::Int(10), Value::Int(-3)];
    stmt.limit = Some(LimitClause {
        row_count: Some(LimitSegment::parameter(0, Span::new(28, 30))),
        offset: Some(LimitSegment::parameter(1, Span::new(38, 40))),
    });

    let rule = rule();
    let routed = Router::new(&rule)
        .route(&stmt, None, &UnicastCursor::new())
        .unwrap();
    let error = SqlRewriteEngine::new(&rule, &stmt)
        .rewrite(&routed)
        .unwrap_err();
    assert_eq!(
        error,
        Error::Statement(crate::statement::Error::NegativeOffset(-3))
    );
}

#[test]
fn test_insert_tuples_pruned_per_unit() {
    let sql = "INSERT INTO t_order (user_id, order_id) VALUES (1, 1), (2, 2)";
    let mut stmt = BoundStatement::new(sql, StatementKind::Insert);
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(12, 19))];
    stmt.insert = Some(InsertClause {
        columns: vec!["user_id".into(), "order_id".into()],
        columns_span: Some(Span::new(20, 39)),
        rows: vec![
            InsertRow::new(vec![Expr::from(1), Expr::from(1)], Span::new(47, 53)),
            InsertRow::new(vec![Expr::from(2), Expr::from(2)], Span::new(55, 61)),
        ],
        values_span: Span::new(47, 61),
        on_duplicate_key_parameters: 0,
    });

    let rule = rule();
    let output = rewrite(&rule, &stmt);

    assert_eq!(output.units.len(), 2);
    assert_eq!(
        output.units[0].sql,
        "INSERT INTO t_order_1 (user_id, order_id) VALUES (1, 1)"
    );
    assert_eq!(
        output.units[1].sql,
        "INSERT INTO t_order_0 (user_id, order_id) VALUES (2, 2)"
    );
    assert_eq!(
        output.units[0].route.as_ref().unwrap().data_source.actual,
        "ds_1"
    );
    assert_eq!(
        output.units[1].route.as_ref().unwrap().data_source.actual,
        "ds_0"
    );
}

#[test]
fn test_generated_key_injected_and_reported() {
    let sql = "INSERT INTO t_order (user_id) VALUES ($1), ($2)";
    let mut stmt = BoundStatement::new(sql, StatementKind::Insert);
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(12, 19))];
    stmt.parameters = vec![Value::Int(3), Value::Int(4)];
    stmt.insert = Some(InsertClause {
        columns: vec!["user_id".into()],
        columns_span: Some(Span::new(20, 29)),
        rows: vec![
            InsertRow::new(vec![Expr::Parameter(0)], Span::new(37, 41)),
            InsertRow::new(vec![Expr::Parameter(1)], Span::new(43, 47)),
        ],
        values_span: Span::new(37, 47),
        on_duplicate_key_parameters: 0,
    });

    let rule = rule();
    let output = rewrite(&rule, &stmt);

    let keys = output.generated_keys.as_ref().unwrap();
    assert_eq!(keys.column, "order_id");
    assert_eq!(keys.values.len(), 2);

    // Every tuple lands in exactly one unit, with the generated key
    // appended to the column list and the tuple.
    let mut tuples = 0;
    for unit in &output.units {
        assert!(unit.sql.contains("(user_id, order_id)"), "{}", unit.sql);
        for (index, key) in keys.values.iter().enumerate() {
            if unit.sql.contains(&format!("(${}, {})", index + 1, key)) {
                tuples += 1;
            }
        }
    }
    assert_eq!(tuples, 2);
}

#[test]
fn test_on_duplicate_key_parameters_follow_groups() {
    let sql = "INSERT INTO t_order (user_id, order_id) VALUES ($1, 1), ($2, 1) \
               ON DUPLICATE KEY UPDATE status = $3";
    let mut stmt = BoundStatement::new(sql, StatementKind::Insert);
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(12, 19))];
    stmt.parameters = vec![Value::Int(0), Value::Int(2), Value::from("paid")];
    stmt.insert = Some(InsertClause {
        columns: vec!["user_id".into(), "order_id".into()],
        columns_span: Some(Span::new(20, 39)),
        rows: vec![
            InsertRow::new(vec![Expr::Parameter(0), Expr::from(1)], Span::new(47, 54)),
            InsertRow::new(vec![Expr::Parameter(1), Expr::from(1)], Span::new(56, 63)),
        ],
        values_span: Span::new(47, 63),
        on_duplicate_key_parameters: 1,
    });

    let rule = rule();
    let output = rewrite(&rule, &stmt);

    // user_id 0 and 2 both live in ds_0; one unit carries both groups
    // plus the on-duplicate-key tail.
    assert_eq!(output.units.len(), 1);
    assert_eq!(
        output.units[0].parameters,
        vec![Value::Int(0), Value::Int(2), Value::from("paid")]
    );
}

#[test]
fn test_generic_pass_without_route() {
    let sql = "SELECT * FROM t_plain LIMIT 10 OFFSET 20";
    let mut stmt = BoundStatement::new(sql, StatementKind::Select);
    stmt.tables = vec![TableRef::new("t_plain")];
    stmt.limit = Some(LimitClause {
        row_count: Some(LimitSegment::literal(10, Span::new(28, 30))),
        offset: Some(LimitSegment::literal(20, Span::new(38, 40))),
    });

    let rule = rule();
    let routed = RouteResult {
        route: Default::default(),
        conditions: Default::default(),
    };
    let output = SqlRewriteEngine::new(&rule, &stmt).rewrite(&routed).unwrap();

    assert_eq!(output.units.len(), 1);
    assert_eq!(output.units[0].route, None);
    assert_eq!(output.units[0].sql, sql);
    assert!(output.units[0].parameters.is_empty());
}

#[test]
fn test_remove_token_strips_fragment() {
    let sql = "SELECT * FROM public.t_order WHERE user_id = 1 AND order_id = 1";
    let mut stmt = BoundStatement::new(sql, StatementKind::Select);
    stmt.tables = vec![TableRef::spanned("t_order", Span::new(21, 28))];
    stmt.remove_spans = vec![Span::new(14, 21)];
    stmt.where_clause = Some(Predicate::And(vec![
        Predicate::eq(ColumnRef::new("user_id"), 1),
        Predicate::eq(ColumnRef::new("order_id"), 1),
    ]));

    let rule = rule();
    let output = rewrite(&rule, &stmt);

    assert_eq!(
        output.units[0].sql,
        "SELECT * FROM t_order_1 WHERE user_id = 1 AND order_id = 1"
    );
}
