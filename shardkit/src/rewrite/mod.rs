//! SQL rewrite engine.
//!
//! Turns one routed statement into executable SQL units: the token list
//! is resolved against each route unit and spliced over the original
//! text, and the parameter builder supplies each unit's parameter list.
//! Unit order follows the route context so downstream batch counters
//! stay aligned.

pub mod error;
pub mod parameter;
pub mod token;

pub use error::Error;
pub use parameter::{GroupedParameterBuilder, StandardParameterBuilder};
pub use token::Token;

use tracing::trace;

use crate::router::condition::GeneratedKeys;
use crate::router::{condition_nodes, HintContext, RouteResult, RouteUnit};
use crate::rule::{DataNode, ShardingRule};
use crate::statement::{BoundStatement, Expr, Limit, LimitValue, StatementKind, Value};
use token::{rewritten_row_count, TokenGenerator};

/// One executable statement for one route unit. `route` is absent only
/// for the generic pass over an unrouted statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUnit {
    pub route: Option<RouteUnit>,
    pub sql: String,
    pub parameters: Vec<Value>,
}

/// Everything the executor needs after the rewrite.
#[derive(Debug, Clone, Default)]
pub struct RewriteOutput {
    /// Executable units, in route order.
    pub units: Vec<ExecutionUnit>,
    /// Values produced for an omitted generated-key column, returned to
    /// the client alongside the result.
    pub generated_keys: Option<GeneratedKeys>,
    /// Original pagination values for post-merge trimming.
    pub limit: Option<Limit>,
}

/// Rewrites one bound statement against its route result.
pub struct SqlRewriteEngine<'a> {
    rule: &'a ShardingRule,
    statement: &'a BoundStatement,
    hint: Option<&'a HintContext>,
}

impl<'a> SqlRewriteEngine<'a> {
    pub fn new(rule: &'a ShardingRule, statement: &'a BoundStatement) -> Self {
        Self {
            rule,
            statement,
            hint: None,
        }
    }

    /// Hint values used during routing must be visible here too, so
    /// INSERT tuple pruning matches the route.
    pub fn with_hint(mut self, hint: Option<&'a HintContext>) -> Self {
        self.hint = hint;
        self
    }

    pub fn rewrite(&self, routed: &RouteResult) -> Result<RewriteOutput, Error> {
        // Pagination validation happens before any text is touched.
        let limit = self
            .statement
            .limit
            .as_ref()
            .map(|clause| clause.resolve(&self.statement.parameters))
            .transpose()?;

        let multi_routing = routed.route.len() > 1;
        let generated_column = routed
            .conditions
            .generated_keys
            .as_ref()
            .map(|keys| keys.column.as_str());

        let tokens = TokenGenerator::new(
            self.statement,
            self.rule,
            multi_routing,
            limit,
            generated_column,
        )
        .generate()?;

        let mut output = RewriteOutput {
            generated_keys: routed.conditions.generated_keys.clone(),
            limit,
            ..Default::default()
        };

        if routed.route.is_empty() {
            // No rule matched: one generic pass, no table substitution,
            // no pagination inflation.
            let retained = vec![true; self.rows().len()];
            output.units.push(ExecutionUnit {
                route: None,
                sql: self.splice(&tokens, None, &retained, &routed.conditions.generated_keys)?,
                parameters: self.parameters(limit, false, &retained),
            });
            return Ok(output);
        }

        for unit in routed.route.units() {
            let retained = self.retained_rows(unit, routed)?;
            let sql = self.splice(
                &tokens,
                Some(unit),
                &retained,
                &routed.conditions.generated_keys,
            )?;
            let parameters = self.parameters(limit, multi_routing, &retained);
            trace!(
                "rewrote for \"{}\": {}",
                unit.data_source.actual,
                sql
            );
            output.units.push(ExecutionUnit {
                route: Some(unit.clone()),
                sql,
                parameters,
            });
        }

        Ok(output)
    }

    fn rows(&self) -> &[crate::statement::InsertRow] {
        self.statement
            .insert
            .as_ref()
            .map(|insert| insert.rows.as_slice())
            .unwrap_or(&[])
    }

    /// Which INSERT tuples belong to this unit. A tuple stays when its
    /// own sharding condition routes to the unit's data node; when the
    /// conditions don't line up with the tuples, everything stays.
    fn retained_rows(&self, unit: &RouteUnit, routed: &RouteResult) -> Result<Vec<bool>, Error> {
        let rows = self.rows();
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let conditions = &routed.conditions;
        let logical = match self.statement.tables.first() {
            Some(table) => table.name.as_str(),
            None => return Ok(vec![true; rows.len()]),
        };
        let table = match self.rule.table_rule(logical) {
            Some(table) => table,
            None => return Ok(vec![true; rows.len()]),
        };
        if conditions.degraded || conditions.conditions.len() != rows.len() {
            return Ok(vec![true; rows.len()]);
        }

        let actual = unit.actual_table(logical).unwrap_or(logical);
        let node = DataNode::new(unit.data_source.logical.clone(), actual);

        let mut retained = Vec::with_capacity(rows.len());
        for condition in &conditions.conditions {
            let nodes = condition_nodes(self.rule, table, condition, self.hint)?;
            retained.push(nodes.contains(&node));
        }
        Ok(retained)
    }

    /// Apply the token list in one pass over the original text.
    fn splice(
        &self,
        tokens: &[Token],
        unit: Option<&RouteUnit>,
        retained: &[bool],
        generated_keys: &Option<GeneratedKeys>,
    ) -> Result<String, Error> {
        let sql = &self.statement.sql;
        let mut rewritten = String::with_capacity(sql.len());
        let mut position = 0;

        for token in tokens {
            let span = token.span();
            rewritten.push_str(&sql[position..span.start]);
            match token {
                Token::Table { logical, .. } => {
                    let actual = unit
                        .and_then(|unit| unit.actual_table(logical))
                        .unwrap_or(logical.as_str());
                    rewritten.push_str(actual);
                }
                Token::Offset { offset, .. } => {
                    rewritten.push_str(&offset.to_string());
                }
                Token::RowCount { row_count, .. } => {
                    rewritten.push_str(&row_count.to_string());
                }
                Token::InsertValues { .. } => {
                    rewritten.push_str(&self.insert_values(retained, generated_keys));
                }
                Token::GeneratedKey { column, .. } => {
                    rewritten.push_str(&format!(", {}", column));
                }
                Token::Remove { .. } => {}
            }
            position = span.stop;
        }
        rewritten.push_str(&sql[position..]);

        Ok(rewritten)
    }

    /// Retained tuples' original text, generated key literal appended.
    fn insert_values(&self, retained: &[bool], generated_keys: &Option<GeneratedKeys>) -> String {
        let sql = &self.statement.sql;
        let mut tuples = vec![];

        for (index, row) in self.rows().iter().enumerate() {
            if !retained.get(index).copied().unwrap_or(true) {
                continue;
            }
            let text = &sql[row.span.start..row.span.stop];
            match generated_keys {
                Some(keys) => {
                    let body = text.trim_end().trim_end_matches(')');
                    tuples.push(format!("{}, {})", body, keys.values[index]));
                }
                None => tuples.push(text.to_owned()),
            }
        }

        tuples.join(", ")
    }

    /// Per-unit parameter list.
    fn parameters(&self, limit: Option<Limit>, multi_routing: bool, retained: &[bool]) -> Vec<Value> {
        if self.statement.kind == StatementKind::Insert {
            if let Some(insert) = &self.statement.insert {
                let on_duplicate_start = self
                    .statement
                    .parameters
                    .len()
                    .saturating_sub(insert.on_duplicate_key_parameters);
                let groups = insert
                    .rows
                    .iter()
                    .map(|row| {
                        row.cells
                            .iter()
                            .filter_map(|cell| match cell {
                                Expr::Parameter(index) => {
                                    self.statement.parameters.get(*index).cloned()
                                }
                                Expr::Value(_) => None,
                            })
                            .collect()
                    })
                    .collect();
                let builder = GroupedParameterBuilder::new(
                    groups,
                    self.statement.parameters[on_duplicate_start..].to_vec(),
                );
                return builder.parameters_retained(retained);
            }
        }

        let mut builder = StandardParameterBuilder::new(self.statement.parameters.clone());
        if multi_routing && self.statement.kind == StatementKind::Select {
            if let (Some(clause), Some(limit)) = (&self.statement.limit, limit) {
                if let Some(segment) = clause.offset {
                    if let LimitValue::Parameter(index) = segment.value {
                        builder.replace(index, Value::Int(0));
                    }
                }
                if let Some(segment) = clause.row_count {
                    if let LimitValue::Parameter(index) = segment.value {
                        builder.replace(
                            index,
                            Value::Int(rewritten_row_count(self.statement, limit) as i64),
                        );
                    }
                }
            }
        }
        builder.parameters()
    }
}

#[cfg(test)]
mod test;
