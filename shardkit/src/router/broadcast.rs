//! Broadcast routing: every data source, or every declared data node.

use tracing::debug;

use super::context::{Mapper, RouteContext, RouteUnit};
use super::Error;
use crate::rule::ShardingRule;
use crate::stats::stats;

/// One unit per configured data source, no table substitution. Used for
/// transaction control and statements touching only broadcast tables.
pub(super) fn database(rule: &ShardingRule) -> Result<RouteContext, Error> {
    let data_sources = rule.data_source_names();
    if data_sources.is_empty() {
        return Err(Error::NoDataSources);
    }

    stats().broadcast_route();
    let mut context = RouteContext::default();
    for data_source in data_sources {
        context.push(RouteUnit::new(Mapper::identity(data_source)));
    }
    debug!("database broadcast to {} unit(s)", context.len());
    Ok(context)
}

/// One unit per declared data node of each sharded table. Schema changes
/// must reach every physical table.
pub(super) fn table(rule: &ShardingRule, tables: &[&str]) -> Result<RouteContext, Error> {
    stats().broadcast_route();
    let mut context = RouteContext::default();

    for name in tables {
        let table = rule
            .table_rule(name)
            .ok_or_else(|| Error::UnknownTable((*name).to_owned()))?;
        for node in table.data_nodes() {
            context.push(
                RouteUnit::new(Mapper::identity(&node.data_source))
                    .with_table(Mapper::new(table.logical_table(), &node.table)),
            );
        }
    }

    debug!("table broadcast of {:?} to {} unit(s)", tables, context.len());
    Ok(context)
}
