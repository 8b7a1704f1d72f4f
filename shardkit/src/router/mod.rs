//! Sharding router.
//!
//! Engine selection is a decision table over the statement shape, not a
//! class hierarchy: transaction control and schema changes broadcast,
//! unsharded statements unicast, single sharded tables route standard,
//! multi-table statements route through their binding group or fall back
//! to an unmerged complex route.

pub mod algorithm;
pub mod broadcast;
pub mod complex;
pub mod condition;
pub mod context;
pub mod decorator;
pub mod error;
pub mod hint;
pub mod standard;
pub mod unicast;


pub use condition::{ConditionExtractor, ShardingCondition, ShardingConditions};
pub use context::{Mapper, RouteContext, RouteUnit};
pub use decorator::{ReadWriteSplitDecorator, RouteDecorator};
pub use error::Error;
pub use hint::HintContext;
pub use unicast::UnicastCursor;

use tracing::debug;

use crate::rule::{DataNode, ShardingRule, TableRule};
use crate::statement::{BoundStatement, StatementKind};
use crate::stats::stats;

/// Route output: the target set plus the conditions that produced it.
/// The rewrite engine consumes both.
#[derive(Debug)]
pub struct RouteResult {
    pub route: RouteContext,
    pub conditions: ShardingConditions,
}

/// Routes one bound statement against a rule snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    rule: &'a ShardingRule,
}

impl<'a> Router<'a> {
    pub fn new(rule: &'a ShardingRule) -> Self {
        Self { rule }
    }

    pub fn route(
        &self,
        statement: &BoundStatement,
        hint: Option<&HintContext>,
        cursor: &UnicastCursor,
    ) -> Result<RouteResult, Error> {
        stats().statement_routed();
        self.validate(statement)?;

        let conditions = ConditionExtractor::new(statement, self.rule).extract()?;
        let route = self.dispatch(statement, &conditions, hint, cursor)?;

        Ok(RouteResult { route, conditions })
    }

    /// Reject statements the engine must not route at all.
    fn validate(&self, statement: &BoundStatement) -> Result<(), Error> {
        if statement.kind != StatementKind::Update {
            return Ok(());
        }
        for assignment in &statement.assignments {
            if let Some(table) = statement.table_for_column(&assignment.column) {
                if let Some(rule) = self.rule.table_rule(&table.name) {
                    let sharded = self
                        .rule
                        .sharding_columns(rule)
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(&assignment.column.name));
                    if sharded {
                        return Err(Error::UpdateShardingColumn(
                            table.name.clone(),
                            assignment.column.name.clone(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn dispatch(
        &self,
        statement: &BoundStatement,
        conditions: &ShardingConditions,
        hint: Option<&HintContext>,
        cursor: &UnicastCursor,
    ) -> Result<RouteContext, Error> {
        let names = statement.table_names();
        let sharded = self.rule.sharded_tables(&names);

        match statement.kind {
            // Transaction control applies everywhere.
            StatementKind::Tcl => broadcast::database(self.rule),

            // Schema changes reach every declared node of the table;
            // admin statements with no sharded table pick one node.
            StatementKind::Ddl | StatementKind::Dal => {
                if sharded.is_empty() {
                    unicast::route(self.rule, &names, cursor)
                } else {
                    broadcast::table(self.rule, &sharded)
                }
            }

            _ => self.dispatch_dml(statement, &names, sharded, conditions, hint, cursor),
        }
    }

    fn dispatch_dml(
        &self,
        statement: &BoundStatement,
        names: &[&str],
        sharded: Vec<&str>,
        conditions: &ShardingConditions,
        hint: Option<&HintContext>,
        cursor: &UnicastCursor,
    ) -> Result<RouteContext, Error> {
        if !names.is_empty() && self.rule.all_broadcast(names.iter().copied()) {
            // Reading a broadcast table anywhere is correct; writing it
            // must reach every copy.
            return if statement.kind.is_read() {
                unicast::route(self.rule, names, cursor)
            } else {
                broadcast::database(self.rule)
            };
        }

        if sharded.is_empty() {
            return unicast::route(self.rule, names, cursor);
        }

        let mut route = if sharded.len() == 1 {
            let table = self
                .rule
                .table_rule(sharded[0])
                .ok_or_else(|| Error::UnknownTable(sharded[0].to_owned()))?;
            standard::StandardRoutingEngine::new(self.rule, table, conditions, hint).route()?
        } else {
            complex::ComplexRoutingEngine::new(self.rule, sharded.clone(), conditions, hint)
                .route()?
        };

        if route.is_empty() {
            return Err(Error::NoRoute(sharded[0].to_owned()));
        }

        // Broadcast tables referenced alongside sharded ones exist in
        // every data source; add them to every unit.
        let broadcast_refs: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| self.rule.is_broadcast(name))
            .collect();
        if !broadcast_refs.is_empty() {
            let units: Vec<RouteUnit> = route
                .units()
                .map(|unit| {
                    let mut unit = unit.clone();
                    for name in &broadcast_refs {
                        unit = unit.with_table(Mapper::identity(*name));
                    }
                    unit
                })
                .collect();
            route.replace_units(units);
        }

        debug!(
            "routed {:?} {:?} to {} unit(s){}",
            statement.kind,
            names,
            route.len(),
            if conditions.degraded { " (degraded)" } else { "" },
        );
        Ok(route)
    }
}

/// Data nodes a single condition maps to. The rewrite engine uses this
/// to decide which INSERT tuples each route unit keeps.
pub(crate) fn condition_nodes(
    rule: &ShardingRule,
    table: &TableRule,
    condition: &ShardingCondition,
    hint: Option<&HintContext>,
) -> Result<Vec<DataNode>, Error> {
    let empty = ShardingConditions::default();
    standard::StandardRoutingEngine::new(rule, table, &empty, hint).route_condition(condition)
}
