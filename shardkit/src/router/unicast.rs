//! Unicast routing: one consistent data source.
//!
//! Statements that touch no sharded data (or only broadcast reads) run
//! on a single node. The choice is made once per logical execution and
//! then sticks, so repeated admin statements inside one transaction hit
//! the same node.

use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use tracing::debug;

use super::context::{Mapper, RouteContext, RouteUnit};
use super::Error;
use crate::rule::ShardingRule;

// Shared cursor so consecutive executions spread across data sources.
// Seeded randomly to keep a fleet of fresh processes from piling onto
// the first node.
static NEXT: Lazy<AtomicUsize> = Lazy::new(|| AtomicUsize::new(rand::random::<u16>() as usize));

/// Per-execution pick. Create one per logical execution (transaction),
/// pass it to every route call within it.
#[derive(Debug, Default)]
pub struct UnicastCursor {
    choice: OnceCell<usize>,
}

impl UnicastCursor {
    pub fn new() -> Self {
        Self::default()
    }

    fn offset(&self) -> usize {
        *self.choice.get_or_init(|| NEXT.fetch_add(1, Relaxed))
    }
}

pub(super) fn route(
    rule: &ShardingRule,
    tables: &[&str],
    cursor: &UnicastCursor,
) -> Result<RouteContext, Error> {
    // Sharded tables narrow the candidate set to sources that host them.
    let mut candidates: IndexSet<String> = rule.data_source_names();
    for name in tables {
        if let Some(table) = rule.table_rule(name) {
            let sources = table.data_source_names();
            candidates.retain(|ds| sources.contains(ds));
        }
    }
    if candidates.is_empty() {
        return Err(Error::NoDataSources);
    }

    let index = cursor.offset() % candidates.len();
    let data_source = candidates
        .get_index(index)
        .cloned()
        .ok_or(Error::NoDataSources)?;

    let mut unit = RouteUnit::new(Mapper::identity(&data_source));
    for name in tables {
        let actual = rule
            .table_rule(name)
            .and_then(|table| {
                table
                    .table_names_in(&data_source)
                    .into_iter()
                    .next()
            })
            .unwrap_or_else(|| (*name).to_owned());
        unit = unit.with_table(Mapper::new(*name, actual));
    }

    debug!("unicast route to \"{}\"", data_source);
    let mut context = RouteContext::default();
    context.push(unit);
    Ok(context)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_stable_within_execution() {
        let config = Config::from_str(include_str!("../../../shardkit.toml")).unwrap();
        let rule = ShardingRule::new(&config).unwrap();

        let cursor = UnicastCursor::new();
        let first = route(&rule, &[], &cursor).unwrap();
        for _ in 0..8 {
            let again = route(&rule, &[], &cursor).unwrap();
            assert_eq!(
                first.units().next().unwrap().data_source,
                again.units().next().unwrap().data_source,
            );
        }
    }
}
