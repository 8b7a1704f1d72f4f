//! Sharding condition extraction.
//!
//! Pulls per-table column constraints out of the bound statement. Only
//! AND-connected predicates are read; anything the extractor can't
//! interpret precisely makes the condition absent, which routes the
//! statement everywhere. Over-inclusive is still correct; wrong is not.

use tracing::debug;

use super::algorithm::{ShardingValues, ValueRange};
use super::Error;
use crate::rule::ShardingRule;
use crate::statement::{BoundStatement, ColumnRef, Expr, Operator, Predicate, Value};
use crate::stats::stats;

/// Constraint on one sharding column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCondition {
    /// Logical table the column belongs to.
    pub table: String,
    pub column: String,
    pub values: ShardingValues,
}

/// All column constraints derived from one statement execution, or from
/// one INSERT value tuple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShardingCondition {
    pub columns: Vec<ColumnCondition>,
}

impl ShardingCondition {
    pub fn values_for(&self, table: &str, column: &str) -> Option<&ShardingValues> {
        self.columns
            .iter()
            .find(|c| {
                c.table.eq_ignore_ascii_case(table) && c.column.eq_ignore_ascii_case(column)
            })
            .map(|c| &c.values)
    }

    fn push(&mut self, table: &str, column: &str, values: ShardingValues) -> bool {
        if let Some(existing) = self
            .columns
            .iter_mut()
            .find(|c| c.table.eq_ignore_ascii_case(table) && c.column.eq_ignore_ascii_case(column))
        {
            match merge(&existing.values, &values) {
                Some(merged) => {
                    existing.values = merged;
                    true
                }
                None => false,
            }
        } else {
            self.columns.push(ColumnCondition {
                table: table.to_owned(),
                column: column.to_owned(),
                values,
            });
            true
        }
    }
}

/// Values generated for an omitted auto-increment column, one per row.
/// Produced before routing so the generated key can steer the route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedKeys {
    pub column: String,
    pub values: Vec<Value>,
}

/// Extraction result. `conditions` holds one entry per statement, or one
/// per value tuple for an INSERT. Empty + `degraded` means the extractor
/// gave up and full routing is in order.
#[derive(Debug, Clone, Default)]
pub struct ShardingConditions {
    pub conditions: Vec<ShardingCondition>,
    pub degraded: bool,
    pub generated_keys: Option<GeneratedKeys>,
}

impl ShardingConditions {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn degraded() -> Self {
        stats().route_degraded();
        Self {
            degraded: true,
            ..Default::default()
        }
    }
}

/// Walks the statement and derives sharding conditions.
pub struct ConditionExtractor<'a> {
    statement: &'a BoundStatement,
    rule: &'a ShardingRule,
}

impl<'a> ConditionExtractor<'a> {
    pub fn new(statement: &'a BoundStatement, rule: &'a ShardingRule) -> Self {
        Self { statement, rule }
    }

    pub fn extract(&self) -> Result<ShardingConditions, Error> {
        if self.statement.insert.is_some() {
            return self.extract_insert();
        }
        self.extract_where()
    }

    fn extract_where(&self) -> Result<ShardingConditions, Error> {
        let predicate = match &self.statement.where_clause {
            Some(predicate) => predicate,
            None => return Ok(ShardingConditions::default()),
        };

        let mut condition = ShardingCondition::default();
        if !self.walk(predicate, &mut condition)? {
            debug!("predicate shape not extractable, degrading to full routing");
            return Ok(ShardingConditions::degraded());
        }

        Ok(ShardingConditions {
            conditions: if condition.columns.is_empty() {
                vec![]
            } else {
                vec![condition]
            },
            ..Default::default()
        })
    }

    /// Returns false when the statement must degrade.
    fn walk(&self, predicate: &Predicate, out: &mut ShardingCondition) -> Result<bool, Error> {
        match predicate {
            Predicate::And(parts) => {
                for part in parts {
                    if !self.walk(part, out)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }

            // OR forces full routing; splitting it per branch is a
            // precision upgrade this engine doesn't attempt.
            Predicate::Or(_) => Ok(false),

            Predicate::Compare { column, op, value } => match self.sharding_table(column)? {
                Attribution::Table(table) => {
                    let value = value.resolve(&self.statement.parameters)?.clone();
                    let values = match op {
                        Operator::Eq => ShardingValues::List(vec![value]),
                        Operator::Gt | Operator::GtEq => ShardingValues::Range(ValueRange {
                            lower: Some(value),
                            upper: None,
                        }),
                        Operator::Lt | Operator::LtEq => ShardingValues::Range(ValueRange {
                            lower: None,
                            upper: Some(value),
                        }),
                    };
                    Ok(out.push(&table, &column.name, values))
                }
                Attribution::None => Ok(true),
                Attribution::Ambiguous => Ok(false),
            },

            Predicate::In { column, values } => match self.sharding_table(column)? {
                Attribution::Table(table) => {
                    let values = values
                        .iter()
                        .map(|expr| expr.resolve(&self.statement.parameters).cloned())
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(out.push(&table, &column.name, ShardingValues::List(values)))
                }
                Attribution::None => Ok(true),
                Attribution::Ambiguous => Ok(false),
            },

            Predicate::Between { column, low, high } => match self.sharding_table(column)? {
                Attribution::Table(table) => {
                    let range = ValueRange {
                        lower: Some(low.resolve(&self.statement.parameters)?.clone()),
                        upper: Some(high.resolve(&self.statement.parameters)?.clone()),
                    };
                    Ok(out.push(&table, &column.name, ShardingValues::Range(range)))
                }
                Attribution::None => Ok(true),
                Attribution::Ambiguous => Ok(false),
            },

            // A subquery hiding the sharding key can't be read here.
            Predicate::Subquery { column } => {
                Ok(!matches!(self.sharding_table(column)?, Attribution::Table(_)))
            }
        }
    }

    /// Which sharded table does this column constrain?
    fn sharding_table(&self, column: &ColumnRef) -> Result<Attribution, Error> {
        if let Some(table) = self.statement.table_for_column(column) {
            let sharded = self
                .rule
                .table_rule(&table.name)
                .map(|rule| {
                    self.rule
                        .sharding_columns(rule)
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(&column.name))
                })
                .unwrap_or(false);
            return Ok(if sharded {
                Attribution::Table(table.name.clone())
            } else {
                Attribution::None
            });
        }

        // Unqualified column in a join: attribute it only when exactly
        // one referenced table shards by it.
        let mut owner = Attribution::None;
        for table in &self.statement.tables {
            if let Some(rule) = self.rule.table_rule(&table.name) {
                let matches = self
                    .rule
                    .sharding_columns(rule)
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&column.name));
                if matches {
                    owner = match owner {
                        Attribution::None => Attribution::Table(table.name.clone()),
                        _ => return Ok(Attribution::Ambiguous),
                    };
                }
            }
        }
        Ok(owner)
    }

    /// One condition per value tuple, so each row routes independently.
    fn extract_insert(&self) -> Result<ShardingConditions, Error> {
        let insert = match &self.statement.insert {
            Some(insert) => insert,
            None => return Ok(ShardingConditions::default()),
        };
        let table = match self.statement.tables.first() {
            Some(table) => table.name.clone(),
            None => return Ok(ShardingConditions::default()),
        };
        let rule = match self.rule.table_rule(&table) {
            Some(rule) => rule,
            None => return Ok(ShardingConditions::default()),
        };

        let generated_keys = rule.generated_key().and_then(|keygen| {
            // Without a declared column list there is no safe place to
            // put a generated value.
            if insert.columns.is_empty() || insert.column_index(&keygen.column).is_some() {
                return None;
            }
            let values = insert
                .rows
                .iter()
                .map(|_| {
                    stats().key_generated();
                    keygen.generator.next_id()
                })
                .collect();
            Some(GeneratedKeys {
                column: keygen.column.clone(),
                values,
            })
        });

        let sharding_columns: Vec<String> = self
            .rule
            .sharding_columns(rule)
            .into_iter()
            .map(str::to_owned)
            .collect();

        let mut conditions = Vec::with_capacity(insert.rows.len());
        for (row_index, row) in insert.rows.iter().enumerate() {
            let mut condition = ShardingCondition::default();
            for column in &sharding_columns {
                if let Some(cell) = insert.column_index(column).and_then(|i| row.cells.get(i)) {
                    let value = match cell {
                        Expr::Value(value) => value.clone(),
                        Expr::Parameter(index) => self
                            .statement
                            .parameters
                            .get(*index)
                            .ok_or(crate::statement::Error::MissingParameter(*index))?
                            .clone(),
                    };
                    condition.push(&table, column, ShardingValues::List(vec![value]));
                } else if let Some(generated) = &generated_keys {
                    if generated.column.eq_ignore_ascii_case(column) {
                        condition.push(
                            &table,
                            column,
                            ShardingValues::List(vec![generated.values[row_index].clone()]),
                        );
                    }
                }
            }
            conditions.push(condition);
        }

        Ok(ShardingConditions {
            conditions,
            degraded: false,
            generated_keys,
        })
    }
}

/// Who owns a predicate column, for sharding purposes.
enum Attribution {
    /// The column shards this table.
    Table(String),
    /// Not a sharding column; the predicate is irrelevant here.
    None,
    /// More than one referenced table shards by this name; forcing a
    /// guess could route wrong, so the statement degrades.
    Ambiguous,
}

/// AND-combine two constraints on the same column. `None` means the
/// combination is beyond this engine and the statement degrades.
fn merge(a: &ShardingValues, b: &ShardingValues) -> Option<ShardingValues> {
    match (a, b) {
        (ShardingValues::List(left), ShardingValues::List(right)) => {
            let merged: Vec<Value> = left.iter().filter(|v| right.contains(v)).cloned().collect();
            Some(ShardingValues::List(merged))
        }

        (ShardingValues::List(list), ShardingValues::Range(range))
        | (ShardingValues::Range(range), ShardingValues::List(list)) => {
            let mut merged = Vec::with_capacity(list.len());
            for value in list {
                if let Some(lower) = &range.lower {
                    match value.partial_cmp(lower) {
                        Some(ordering) if ordering.is_ge() => (),
                        _ => continue,
                    }
                }
                if let Some(upper) = &range.upper {
                    match value.partial_cmp(upper) {
                        Some(ordering) if ordering.is_le() => (),
                        _ => continue,
                    }
                }
                merged.push(value.clone());
            }
            Some(ShardingValues::List(merged))
        }

        (ShardingValues::Range(left), ShardingValues::Range(right)) => {
            let lower = tighter(&left.lower, &right.lower, true)?;
            let upper = tighter(&left.upper, &right.upper, false)?;
            Some(ShardingValues::Range(ValueRange { lower, upper }))
        }
    }
}

fn tighter(a: &Option<Value>, b: &Option<Value>, take_greater: bool) -> Option<Option<Value>> {
    match (a, b) {
        (None, None) => Some(None),
        (Some(value), None) | (None, Some(value)) => Some(Some(value.clone())),
        (Some(left), Some(right)) => {
            let ordering = left.partial_cmp(right)?;
            let pick = if ordering.is_gt() == take_greater {
                left
            } else {
                right
            };
            Some(Some(pick.clone()))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::statement::{StatementKind, TableRef};

    fn rule() -> ShardingRule {
        let config = Config::from_str(include_str!("../../../shardkit.toml")).unwrap();
        ShardingRule::new(&config).unwrap()
    }

    fn select(where_clause: Predicate) -> BoundStatement {
        let mut stmt = BoundStatement::new("SELECT * FROM t_order", StatementKind::Select);
        stmt.tables = vec![TableRef::new("t_order")];
        stmt.where_clause = Some(where_clause);
        stmt
    }

    #[test]
    fn test_equal_and_in() {
        let rule = rule();
        let stmt = select(Predicate::And(vec![
            Predicate::eq(ColumnRef::new("user_id"), 3),
            Predicate::In {
                column: ColumnRef::new("order_id"),
                values: vec![Expr::from(5), Expr::from(7)],
            },
            Predicate::eq(ColumnRef::new("status"), Value::from("open")),
        ]));

        let conditions = ConditionExtractor::new(&stmt, &rule).extract().unwrap();
        assert!(!conditions.degraded);
        assert_eq!(conditions.conditions.len(), 1);

        let condition = &conditions.conditions[0];
        assert_eq!(
            condition.values_for("t_order", "user_id"),
            Some(&ShardingValues::List(vec![Value::Int(3)]))
        );
        assert_eq!(
            condition.values_for("t_order", "order_id"),
            Some(&ShardingValues::List(vec![Value::Int(5), Value::Int(7)]))
        );
        // Non-sharding columns don't produce conditions.
        assert_eq!(condition.values_for("t_order", "status"), None);
    }

    #[test]
    fn test_comparison_pair_fuses_into_range() {
        let rule = rule();
        let stmt = select(Predicate::And(vec![
            Predicate::Compare {
                column: ColumnRef::new("order_id"),
                op: Operator::GtEq,
                value: Expr::from(10),
            },
            Predicate::Compare {
                column: ColumnRef::new("order_id"),
                op: Operator::Lt,
                value: Expr::from(20),
            },
        ]));

        let conditions = ConditionExtractor::new(&stmt, &rule).extract().unwrap();
        let condition = &conditions.conditions[0];
        assert_eq!(
            condition.values_for("t_order", "order_id"),
            Some(&ShardingValues::Range(ValueRange {
                lower: Some(Value::Int(10)),
                upper: Some(Value::Int(20)),
            }))
        );
    }

    #[test]
    fn test_or_degrades() {
        let rule = rule();
        let stmt = select(Predicate::Or(vec![
            Predicate::eq(ColumnRef::new("user_id"), 1),
            Predicate::eq(ColumnRef::new("user_id"), 2),
        ]));

        let conditions = ConditionExtractor::new(&stmt, &rule).extract().unwrap();
        assert!(conditions.degraded);
        assert!(conditions.is_empty());
    }

    #[test]
    fn test_subquery_on_sharding_column_degrades() {
        let rule = rule();
        let stmt = select(Predicate::And(vec![Predicate::Subquery {
            column: ColumnRef::new("user_id"),
        }]));

        let conditions = ConditionExtractor::new(&stmt, &rule).extract().unwrap();
        assert!(conditions.degraded);
    }

    #[test]
    fn test_parameters_resolve() {
        let rule = rule();
        let mut stmt = select(Predicate::eq(
            ColumnRef::new("user_id"),
            Expr::Parameter(0),
        ));
        stmt.parameters = vec![Value::Int(42)];

        let conditions = ConditionExtractor::new(&stmt, &rule).extract().unwrap();
        assert_eq!(
            conditions.conditions[0].values_for("t_order", "user_id"),
            Some(&ShardingValues::List(vec![Value::Int(42)]))
        );
    }

    #[test]
    fn test_contradiction_empties_list() {
        let rule = rule();
        let stmt = select(Predicate::And(vec![
            Predicate::eq(ColumnRef::new("user_id"), 1),
            Predicate::eq(ColumnRef::new("user_id"), 2),
        ]));

        let conditions = ConditionExtractor::new(&stmt, &rule).extract().unwrap();
        assert_eq!(
            conditions.conditions[0].values_for("t_order", "user_id"),
            Some(&ShardingValues::List(vec![]))
        );
    }
}
