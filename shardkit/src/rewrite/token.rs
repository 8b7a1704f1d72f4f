//! SQL tokens.
//!
//! A token is one pending edit: a span of the original SQL and what to
//! put there. Tokens are generated fresh per statement, sorted by start
//! position, checked for overlap, and applied in a single left-to-right
//! splice over the untouched original text.

use tracing::trace;

use super::Error;
use crate::rule::ShardingRule;
use crate::statement::{BoundStatement, Limit, LimitValue, Span, StatementKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Logical table name occurrence, replaced per route unit.
    Table { span: Span, logical: String },
    /// Pagination offset literal, zeroed when the statement fans out.
    Offset { span: Span, offset: u64 },
    /// Pagination row count literal, inflated when the statement fans out.
    RowCount { span: Span, row_count: u64 },
    /// The VALUES tuples of an INSERT, pruned per route unit.
    InsertValues { span: Span },
    /// Generated-key column appended to an INSERT column list.
    GeneratedKey { span: Span, column: String },
    /// Fragment that must not survive the rewrite.
    Remove { span: Span },
}

impl Token {
    pub fn span(&self) -> Span {
        match self {
            Token::Table { span, .. }
            | Token::Offset { span, .. }
            | Token::RowCount { span, .. }
            | Token::InsertValues { span }
            | Token::GeneratedKey { span, .. }
            | Token::Remove { span } => *span,
        }
    }
}

pub(super) struct TokenGenerator<'a> {
    statement: &'a BoundStatement,
    rule: &'a ShardingRule,
    multi_routing: bool,
    limit: Option<Limit>,
    generated_key_column: Option<&'a str>,
}

impl<'a> TokenGenerator<'a> {
    pub(super) fn new(
        statement: &'a BoundStatement,
        rule: &'a ShardingRule,
        multi_routing: bool,
        limit: Option<Limit>,
        generated_key_column: Option<&'a str>,
    ) -> Self {
        Self {
            statement,
            rule,
            multi_routing,
            limit,
            generated_key_column,
        }
    }

    /// Ordered, non-overlapping token list.
    pub(super) fn generate(&self) -> Result<Vec<Token>, Error> {
        let mut tokens = vec![];

        self.table_tokens(&mut tokens);
        self.insert_tokens(&mut tokens);
        self.pagination_tokens(&mut tokens);
        for span in &self.statement.remove_spans {
            tokens.push(Token::Remove { span: *span });
        }

        tokens.sort_by_key(|token| token.span().start);

        let sql_len = self.statement.sql.len();
        for pair in tokens.windows(2) {
            if pair[0].span().overlaps(&pair[1].span()) {
                return Err(Error::OverlappingTokens(pair[1].span().start));
            }
        }
        for token in &tokens {
            let span = token.span();
            if span.stop > sql_len || span.start > span.stop {
                return Err(Error::SpanOutOfBounds(span.start, span.stop));
            }
        }

        trace!("generated {} rewrite token(s)", tokens.len());
        Ok(tokens)
    }

    /// Sharded tables get substituted; everything else keeps its name.
    fn table_tokens(&self, tokens: &mut Vec<Token>) {
        for table in &self.statement.tables {
            if !self.rule.is_sharded(&table.name) {
                continue;
            }
            if let Some(span) = table.span {
                tokens.push(Token::Table {
                    span,
                    logical: table.name.clone(),
                });
            }
        }
    }

    fn insert_tokens(&self, tokens: &mut Vec<Token>) {
        if self.statement.kind != StatementKind::Insert {
            return;
        }
        let insert = match &self.statement.insert {
            Some(insert) => insert,
            None => return,
        };
        if insert.rows.is_empty() {
            return;
        }

        tokens.push(Token::InsertValues {
            span: insert.values_span,
        });

        if let (Some(column), Some(columns_span)) =
            (self.generated_key_column, insert.columns_span)
        {
            // Inserted just before the closing paren of the column list.
            tokens.push(Token::GeneratedKey {
                span: Span::at(columns_span.stop.saturating_sub(1)),
                column: column.to_owned(),
            });
        }
    }

    /// Offset goes to zero and the row count absorbs it, so every shard
    /// returns enough rows for the merger to trim globally. Single-routed
    /// statements are left alone.
    fn pagination_tokens(&self, tokens: &mut Vec<Token>) {
        if !self.multi_routing || self.statement.kind != StatementKind::Select {
            return;
        }
        let clause = match &self.statement.limit {
            Some(clause) => clause,
            None => return,
        };
        let limit = match self.limit {
            Some(limit) => limit,
            None => return,
        };

        if let Some(segment) = clause.offset {
            if matches!(segment.value, LimitValue::Literal(_)) {
                tokens.push(Token::Offset {
                    span: segment.span,
                    offset: 0,
                });
            }
        }
        if let Some(segment) = clause.row_count {
            if matches!(segment.value, LimitValue::Literal(_)) {
                tokens.push(Token::RowCount {
                    span: segment.span,
                    row_count: rewritten_row_count(self.statement, limit),
                });
            }
        }
    }
}

/// Row count after the fan-out rewrite, per the dialect whitelist.
pub(super) fn rewritten_row_count(statement: &BoundStatement, limit: Limit) -> u64 {
    let row_count = limit.row_count.unwrap_or(0);
    if statement.dialect.rewrites_row_count() {
        (limit.offset.unwrap_or(0))
            .saturating_add(row_count)
            .min(statement.dialect.max_row_count())
    } else {
        row_count
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::statement::{Dialect, LimitClause, LimitSegment, TableRef};

    fn rule() -> ShardingRule {
        let config = Config::from_str(include_str!("../../../shardkit.toml")).unwrap();
        ShardingRule::new(&config).unwrap()
    }

    #[test]
    fn test_tokens_sorted_and_checked() {
        let sql = "SELECT * FROM t_order LIMIT 10 OFFSET 20";
        let mut stmt = BoundStatement::new(sql, StatementKind::Select);
        stmt.dialect = Dialect::Postgres;
        stmt.tables = vec![TableRef::spanned("t_order", Span::new(14, 21))];
        stmt.limit = Some(LimitClause {
            row_count: Some(LimitSegment::literal(10, Span::new(28, 30))),
            offset: Some(LimitSegment::literal(20, Span::new(38, 40))),
        });

        let rule = rule();
        let limit = stmt.limit.unwrap().resolve(&[]).unwrap();
        let tokens = TokenGenerator::new(&stmt, &rule, true, Some(limit), None)
            .generate()
            .unwrap();

        let starts: Vec<usize> = tokens.iter().map(|t| t.span().start).collect();
        assert_eq!(starts, vec![14, 28, 38]);
        assert!(matches!(tokens[1], Token::RowCount { row_count: 30, .. }));
        assert!(matches!(tokens[2], Token::Offset { offset: 0, .. }));
    }

    #[test]
    fn test_single_routing_leaves_pagination() {
        let sql = "SELECT * FROM t_order LIMIT 10 OFFSET 20";
        let mut stmt = BoundStatement::new(sql, StatementKind::Select);
        stmt.tables = vec![TableRef::spanned("t_order", Span::new(14, 21))];
        stmt.limit = Some(LimitClause {
            row_count: Some(LimitSegment::literal(10, Span::new(28, 30))),
            offset: Some(LimitSegment::literal(20, Span::new(38, 40))),
        });

        let rule = rule();
        let limit = stmt.limit.unwrap().resolve(&[]).unwrap();
        let tokens = TokenGenerator::new(&stmt, &rule, false, Some(limit), None)
            .generate()
            .unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0], Token::Table { .. }));
    }

    #[test]
    fn test_non_whitelisted_dialect_keeps_row_count() {
        let mut stmt = BoundStatement::new("", StatementKind::Select);
        stmt.dialect = Dialect::Oracle;
        let limit = Limit {
            offset: Some(20),
            row_count: Some(10),
        };
        assert_eq!(rewritten_row_count(&stmt, limit), 10);

        stmt.dialect = Dialect::MySql;
        assert_eq!(rewritten_row_count(&stmt, limit), 30);
    }

    #[test]
    fn test_row_count_caps_at_dialect_max() {
        let mut stmt = BoundStatement::new("", StatementKind::Select);
        stmt.dialect = Dialect::MySql;
        let limit = Limit {
            offset: Some(u64::MAX - 1),
            row_count: Some(10),
        };
        assert_eq!(rewritten_row_count(&stmt, limit), i32::MAX as u64);
    }

    #[test]
    fn test_overlapping_tokens_rejected() {
        let mut stmt = BoundStatement::new("SELECT * FROM t_order", StatementKind::Select);
        stmt.tables = vec![TableRef::spanned("t_order", Span::new(14, 21))];
        stmt.remove_spans = vec![Span::new(16, 18)];

        let rule = rule();
        let result = TokenGenerator::new(&stmt, &rule, false, None, None).generate();
        assert_eq!(result, Err(Error::OverlappingTokens(16)));
    }
}
