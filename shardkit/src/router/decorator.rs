//! Route decorators.
//!
//! Run after a base route is produced. A decorator may narrow or relabel
//! units (read/write split swaps the physical data source under a read)
//! but never changes which logical tables the route covers.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use once_cell::sync::Lazy;
use tracing::debug;

use super::context::RouteContext;
use super::Error;
use crate::rule::ShardingRule;
use crate::statement::BoundStatement;

pub trait RouteDecorator: Debug {
    fn decorate(
        &self,
        route: &mut RouteContext,
        statement: &BoundStatement,
        rule: &ShardingRule,
    ) -> Result<(), Error>;
}

/// Apply decorators in order.
pub fn apply(
    decorators: &[Box<dyn RouteDecorator>],
    route: &mut RouteContext,
    statement: &BoundStatement,
    rule: &ShardingRule,
) -> Result<(), Error> {
    #[cfg(debug_assertions)]
    let logical_tables: Vec<String> = route
        .units()
        .flat_map(|unit| unit.tables.iter().map(|t| t.logical.clone()))
        .collect();

    for decorator in decorators {
        decorator.decorate(route, statement, rule)?;
    }

    #[cfg(debug_assertions)]
    {
        let after: Vec<String> = route
            .units()
            .flat_map(|unit| unit.tables.iter().map(|t| t.logical.clone()))
            .collect();
        debug_assert_eq!(
            logical_tables, after,
            "decorator changed the logical table set"
        );
    }

    Ok(())
}

static REPLICA_CURSOR: Lazy<AtomicUsize> = Lazy::new(|| AtomicUsize::new(0));

/// Substitutes a configured read replica for the primary on read-only
/// statements. The logical data source name is kept so downstream
/// bookkeeping still groups by primary.
#[derive(Debug, Default)]
pub struct ReadWriteSplitDecorator;

impl RouteDecorator for ReadWriteSplitDecorator {
    fn decorate(
        &self,
        route: &mut RouteContext,
        statement: &BoundStatement,
        rule: &ShardingRule,
    ) -> Result<(), Error> {
        if !statement.kind.is_read() {
            return Ok(());
        }

        let mut units: Vec<_> = route.units().cloned().collect();
        let mut changed = false;
        for unit in &mut units {
            let replicas = rule.replicas(&unit.data_source.logical);
            if replicas.is_empty() {
                continue;
            }
            let pick = REPLICA_CURSOR.fetch_add(1, Relaxed) % replicas.len();
            debug!(
                "read of \"{}\" diverted to replica \"{}\"",
                unit.data_source.logical, replicas[pick]
            );
            unit.data_source.actual = replicas[pick].clone();
            changed = true;
        }

        if changed {
            route.replace_units(units);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::router::context::{Mapper, RouteUnit};
    use crate::statement::{BoundStatement, StatementKind};

    fn rule() -> ShardingRule {
        let config = Config::from_str(include_str!("../../../shardkit.toml")).unwrap();
        ShardingRule::new(&config).unwrap()
    }

    fn route_to(ds: &str) -> RouteContext {
        let mut route = RouteContext::default();
        route.push(RouteUnit::new(Mapper::identity(ds)).with_table(Mapper::new("t_order", "t_order_0")));
        route
    }

    #[test]
    fn test_reads_go_to_replicas() {
        let rule = rule();
        let statement = BoundStatement::new("SELECT 1", StatementKind::Select);
        let mut route = route_to("ds_0");

        apply(
            &[Box::new(ReadWriteSplitDecorator) as Box<dyn RouteDecorator>],
            &mut route,
            &statement,
            &rule,
        )
        .unwrap();

        let unit = route.units().next().unwrap();
        assert_eq!(unit.data_source.logical, "ds_0");
        assert_eq!(unit.data_source.actual, "ds_0_replica");
    }

    #[test]
    fn test_writes_stay_on_primary() {
        let rule = rule();
        let statement = BoundStatement::new("DELETE FROM t_order", StatementKind::Delete);
        let mut route = route_to("ds_0");

        apply(
            &[Box::new(ReadWriteSplitDecorator) as Box<dyn RouteDecorator>],
            &mut route,
            &statement,
            &rule,
        )
        .unwrap();

        assert_eq!(route.units().next().unwrap().data_source.actual, "ds_0");
    }
}
