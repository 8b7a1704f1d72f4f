//! Multi-table routing: binding groups and unrelated sharded tables.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use super::condition::ShardingConditions;
use super::context::{Mapper, RouteContext, RouteUnit};
use super::hint::HintContext;
use super::standard::StandardRoutingEngine;
use super::Error;
use crate::rule::{BindingTableRule, ShardingRule};

/// Route units × table mappers beyond this get a warning. Nothing is
/// capped; the executor decides what to do with a wide fan-out.
const EXPLOSION_WARN: usize = 32;

pub(super) struct ComplexRoutingEngine<'a> {
    rule: &'a ShardingRule,
    tables: Vec<&'a str>,
    conditions: &'a ShardingConditions,
    hint: Option<&'a HintContext>,
}

impl<'a> ComplexRoutingEngine<'a> {
    pub(super) fn new(
        rule: &'a ShardingRule,
        tables: Vec<&'a str>,
        conditions: &'a ShardingConditions,
        hint: Option<&'a HintContext>,
    ) -> Self {
        Self {
            rule,
            tables,
            conditions,
            hint,
        }
    }

    pub(super) fn route(&self) -> Result<RouteContext, Error> {
        if self.rule.all_in_one_binding_group(self.tables.iter().copied()) {
            self.route_binding()
        } else {
            self.route_unmerged()
        }
    }

    /// All tables share topology: route the driving table, then align
    /// every other table's actual name by shard index.
    fn route_binding(&self) -> Result<RouteContext, Error> {
        let driving_name = self.driving_table();
        let driving = self
            .rule
            .table_rule(driving_name)
            .ok_or_else(|| Error::UnknownTable(driving_name.to_owned()))?;

        // The topology invariant was checked at load; recheck against
        // this statement's tables before relying on it.
        let members = self
            .tables
            .iter()
            .map(|name| {
                self.rule
                    .table_rule(name)
                    .ok_or_else(|| Error::UnknownTable((*name).to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        BindingTableRule::new(self.tables.iter().map(|t| t.to_string()).collect())
            .validate(&members)?;

        let base =
            StandardRoutingEngine::new(self.rule, driving, self.conditions, self.hint).route()?;

        let mut context = RouteContext::default();
        for unit in base.units() {
            let mut bound = unit.clone();
            let data_source = &unit.data_source.logical;
            let driving_actual = unit
                .actual_table(driving_name)
                .ok_or_else(|| Error::NoRoute(driving_name.to_owned()))?
                .to_owned();

            for member in &members {
                if member.logical_table().eq_ignore_ascii_case(driving_name) {
                    continue;
                }
                let actual = BindingTableRule::aligned_actual_table(
                    driving,
                    member,
                    data_source,
                    &driving_actual,
                )?;
                bound = bound.with_table(Mapper::new(member.logical_table(), actual));
            }
            context.push(bound);
        }

        debug!(
            "binding route of {:?} via \"{}\" to {} unit(s)",
            self.tables,
            driving_name,
            context.len()
        );
        Ok(context)
    }

    /// Unrelated sharded tables: independent routes, restricted to the
    /// data sources all of them resolve to.
    fn route_unmerged(&self) -> Result<RouteContext, Error> {
        let mut per_table: Vec<(&str, RouteContext)> = vec![];
        for name in self.tables.iter().copied() {
            let table = self
                .rule
                .table_rule(name)
                .ok_or_else(|| Error::UnknownTable(name.to_owned()))?;
            let routed =
                StandardRoutingEngine::new(self.rule, table, self.conditions, self.hint).route()?;
            per_table.push((name, routed));
        }

        let mut shared: IndexSet<String> = match per_table.first() {
            Some((_, routed)) => routed
                .data_sources()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            None => IndexSet::new(),
        };
        for (_, routed) in per_table.iter().skip(1) {
            let sources = routed.data_sources();
            shared.retain(|ds| sources.contains(ds.as_str()));
        }

        let mut merged: IndexMap<String, RouteUnit> = IndexMap::new();
        let mut mapper_count = 0;
        for (_, routed) in &per_table {
            for unit in routed.units() {
                let data_source = &unit.data_source.actual;
                if !shared.contains(data_source) {
                    continue;
                }
                let entry = merged
                    .entry(data_source.clone())
                    .or_insert_with(|| RouteUnit::new(unit.data_source.clone()));
                for table in &unit.tables {
                    if !entry.tables.contains(table) {
                        entry.tables.push(table.clone());
                        mapper_count += 1;
                    }
                }
            }
        }

        let mut context = RouteContext::default();
        for (_, unit) in merged {
            context.push(unit);
        }

        if context.len() * mapper_count > EXPLOSION_WARN {
            warn!(
                "complex route of {:?} produced {} unit(s) carrying {} table mapper(s)",
                self.tables,
                context.len(),
                mapper_count
            );
        }
        Ok(context)
    }

    /// The table whose condition drives the route: the first one with an
    /// extracted value, else the first referenced.
    fn driving_table(&self) -> &'a str {
        for condition in &self.conditions.conditions {
            if let Some(column) = condition.columns.first() {
                if let Some(name) = self
                    .tables
                    .iter()
                    .copied()
                    .find(|t| t.eq_ignore_ascii_case(&column.table))
                {
                    return name;
                }
            }
        }
        self.tables[0]
    }
}
