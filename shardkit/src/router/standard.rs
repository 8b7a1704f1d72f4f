//! Standard routing: one sharded logical table.

use indexmap::IndexSet;
use tracing::debug;

use super::algorithm::ShardingValues;
use super::condition::{ShardingCondition, ShardingConditions};
use super::context::{Mapper, RouteContext, RouteUnit};
use super::hint::HintContext;
use super::Error;
use crate::rule::{DataNode, ShardingRule, TableRule};

pub(super) struct StandardRoutingEngine<'a> {
    rule: &'a ShardingRule,
    table: &'a TableRule,
    conditions: &'a ShardingConditions,
    hint: Option<&'a HintContext>,
}

impl<'a> StandardRoutingEngine<'a> {
    pub(super) fn new(
        rule: &'a ShardingRule,
        table: &'a TableRule,
        conditions: &'a ShardingConditions,
        hint: Option<&'a HintContext>,
    ) -> Self {
        Self {
            rule,
            table,
            conditions,
            hint,
        }
    }

    pub(super) fn route(&self) -> Result<RouteContext, Error> {
        let mut context = RouteContext::default();

        // No condition at all still routes: every dimension falls back
        // to its full declared target set.
        let fallback = [ShardingCondition::default()];
        let conditions: &[ShardingCondition] = if self.conditions.is_empty() {
            &fallback
        } else {
            &self.conditions.conditions
        };

        for condition in conditions {
            for node in self.route_condition(condition)? {
                let unit = RouteUnit::new(Mapper::identity(&node.data_source)).with_table(
                    Mapper::new(self.table.logical_table(), &node.table),
                );
                context.push(unit);
            }
        }

        debug!(
            "standard route of \"{}\" to {} unit(s)",
            self.table.logical_table(),
            context.len()
        );
        Ok(context)
    }

    /// Data nodes one condition maps to.
    pub(super) fn route_condition(
        &self,
        condition: &ShardingCondition,
    ) -> Result<Vec<DataNode>, Error> {
        let logical = self.table.logical_table();
        let data_sources = self.dimension_targets(
            condition,
            self.rule.database_strategy(self.table),
            self.table.data_source_names(),
            self.hint.and_then(|hint| hint.database_values(logical)),
        )?;

        let mut nodes = vec![];
        for data_source in &data_sources {
            let tables = self.dimension_targets(
                condition,
                self.rule.table_strategy(self.table),
                self.table.table_names_in(data_source),
                self.hint.and_then(|hint| hint.table_values(logical)),
            )?;

            for table in tables {
                let node = DataNode::new(data_source.clone(), table);
                // The cross product is restricted to declared topology.
                if self.table.contains(&node) {
                    nodes.push(node);
                }
            }
        }

        Ok(nodes)
    }

    /// Route one shard dimension: hint values win, then extracted
    /// conditions, then the full declared set.
    fn dimension_targets(
        &self,
        condition: &ShardingCondition,
        strategy: Option<&crate::router::algorithm::ShardingStrategy>,
        available: IndexSet<String>,
        hint_values: Option<&[crate::statement::Value]>,
    ) -> Result<IndexSet<String>, Error> {
        let strategy = match strategy {
            Some(strategy) => strategy,
            None => return Ok(available),
        };

        if let Some(values) = hint_values {
            return strategy
                .algorithm
                .route(&available, &ShardingValues::List(values.to_vec()));
        }

        match condition.values_for(self.table.logical_table(), &strategy.column) {
            Some(values) => strategy.algorithm.route(&available, values),
            None => Ok(available),
        }
    }
}
