//! Immutable rule model.
//!
//! Built from [`crate::config::Config`] at startup or reload. Read-only
//! during execution; a reload swaps the whole snapshot through
//! [`RuleHolder`], never mutating a rule in place.

pub mod binding;
pub mod error;
pub mod keygen;
pub mod table;

pub use binding::BindingTableRule;
pub use error::Error;
pub use keygen::{GeneratedKey, KeyGenerator, Snowflake, UuidGenerator};
pub use table::{DataNode, TableRule};

use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::{IndexMap, IndexSet};

use crate::config::{Config, DataSource};
use crate::router::algorithm::ShardingStrategy;

/// The sharding rule snapshot: table rules, binding groups, broadcast
/// tables, and defaults. Safe for unsynchronized concurrent reads.
#[derive(Debug, Clone, Default)]
pub struct ShardingRule {
    tables: IndexMap<String, TableRule>,
    binding_groups: Vec<BindingTableRule>,
    broadcast_tables: IndexSet<String>,
    data_sources: Vec<DataSource>,
    default_database_strategy: Option<ShardingStrategy>,
    default_table_strategy: Option<ShardingStrategy>,
}

impl ShardingRule {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let mut tables = IndexMap::new();
        for table in &config.tables {
            let rule = TableRule::new(table)?;
            if tables
                .insert(table.name.to_lowercase(), rule)
                .is_some()
            {
                return Err(Error::DuplicateTable(table.name.clone()));
            }
        }

        let declared: IndexSet<&str> = config
            .data_sources
            .iter()
            .map(|ds| ds.name.as_str())
            .collect();
        if !declared.is_empty() {
            for rule in tables.values() {
                for node in rule.data_nodes() {
                    if !declared.contains(node.data_source.as_str()) {
                        return Err(Error::UnknownDataSource(node.to_string()));
                    }
                }
            }
        }

        let rule = Self {
            binding_groups: config
                .binding_groups
                .iter()
                .map(|group| BindingTableRule::new(group.tables.clone()))
                .collect(),
            broadcast_tables: config
                .broadcast_tables
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            data_sources: config.data_sources.clone(),
            default_database_strategy: config
                .defaults
                .database_strategy
                .as_ref()
                .map(ShardingStrategy::from_config),
            default_table_strategy: config
                .defaults
                .table_strategy
                .as_ref()
                .map(ShardingStrategy::from_config),
            tables,
        };

        for group in &rule.binding_groups {
            let members = group
                .tables()
                .iter()
                .map(|name| {
                    rule.table_rule(name)
                        .ok_or_else(|| Error::UnknownBindingTable(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            group.validate(&members)?;
        }

        Ok(rule)
    }

    pub fn table_rule(&self, logical_table: &str) -> Option<&TableRule> {
        self.tables.get(&logical_table.to_lowercase())
    }

    pub fn is_sharded(&self, logical_table: &str) -> bool {
        self.tables.contains_key(&logical_table.to_lowercase())
    }

    pub fn is_broadcast(&self, logical_table: &str) -> bool {
        self.broadcast_tables.contains(&logical_table.to_lowercase())
    }

    pub fn all_broadcast<'a>(&self, tables: impl IntoIterator<Item = &'a str>) -> bool {
        let mut any = false;
        for table in tables {
            if !self.is_broadcast(table) {
                return false;
            }
            any = true;
        }
        any
    }

    /// Referenced tables that have a sharding rule, statement order.
    pub fn sharded_tables<'a>(&self, tables: &[&'a str]) -> Vec<&'a str> {
        tables
            .iter()
            .copied()
            .filter(|table| self.is_sharded(table))
            .collect()
    }

    /// The binding group containing a table, if any.
    pub fn binding_rule(&self, logical_table: &str) -> Option<&BindingTableRule> {
        self.binding_groups
            .iter()
            .find(|group| group.contains(logical_table))
    }

    /// Are all the given tables members of one binding group?
    pub fn all_in_one_binding_group<'a>(
        &self,
        tables: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        let mut tables = tables.into_iter();
        let first = match tables.next() {
            Some(first) => first,
            None => return false,
        };
        match self.binding_rule(first) {
            Some(group) => tables.all(|table| group.contains(table)),
            None => false,
        }
    }

    /// A table's database-dimension strategy, falling back to the default.
    pub fn database_strategy<'a>(&'a self, rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        rule.database_strategy
            .as_ref()
            .or(self.default_database_strategy.as_ref())
    }

    /// A table's table-dimension strategy, falling back to the default.
    pub fn table_strategy<'a>(&'a self, rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        rule.table_strategy
            .as_ref()
            .or(self.default_table_strategy.as_ref())
    }

    /// All sharding columns of a table, both dimensions.
    pub fn sharding_columns<'a>(&'a self, rule: &'a TableRule) -> Vec<&'a str> {
        let mut columns = vec![];
        if let Some(strategy) = self.database_strategy(rule) {
            columns.push(strategy.column.as_str());
        }
        if let Some(strategy) = self.table_strategy(rule) {
            if !columns.contains(&strategy.column.as_str()) {
                columns.push(strategy.column.as_str());
            }
        }
        columns
    }

    /// Every data source named by the configuration, declaration order.
    /// Falls back to the union of table topologies when the data source
    /// list is omitted.
    pub fn data_source_names(&self) -> IndexSet<String> {
        if !self.data_sources.is_empty() {
            return self
                .data_sources
                .iter()
                .map(|ds| ds.name.clone())
                .collect();
        }
        self.tables
            .values()
            .flat_map(|rule| rule.data_source_names())
            .collect()
    }

    /// Read replicas of a data source.
    pub fn replicas(&self, data_source: &str) -> &[String] {
        self.data_sources
            .iter()
            .find(|ds| ds.name == data_source)
            .map(|ds| ds.replicas.as_slice())
            .unwrap_or(&[])
    }
}

/// Hot-swappable rule snapshot holder.
///
/// Executors load the current snapshot once per statement; a config
/// reload publishes a new rule for subsequent statements without
/// disturbing in-flight ones.
#[derive(Debug)]
pub struct RuleHolder {
    inner: ArcSwap<ShardingRule>,
}

impl RuleHolder {
    pub fn new(rule: ShardingRule) -> Self {
        Self {
            inner: ArcSwap::from_pointee(rule),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<ShardingRule> {
        self.inner.load_full()
    }

    /// Publish a new snapshot.
    pub fn swap(&self, rule: ShardingRule) {
        self.inner.store(Arc::new(rule));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;

    fn example() -> ShardingRule {
        let config = Config::from_str(include_str!("../../../shardkit.toml")).unwrap();
        ShardingRule::new(&config).unwrap()
    }

    #[test]
    fn test_build_from_example() {
        let rule = example();

        assert!(rule.is_sharded("t_order"));
        assert!(rule.is_sharded("T_ORDER"));
        assert!(!rule.is_sharded("t_config"));
        assert!(rule.is_broadcast("t_config"));
        assert!(rule.all_in_one_binding_group(["t_order", "t_order_item"]));
        assert!(!rule.all_in_one_binding_group(["t_order", "t_config"]));

        let order = rule.table_rule("t_order").unwrap();
        assert_eq!(rule.sharding_columns(order), vec!["user_id", "order_id"]);
        assert_eq!(rule.replicas("ds_0"), &["ds_0_replica"]);
    }

    #[test]
    fn test_binding_validation_at_load() {
        let source = r#"
            [[tables]]
            name = "a"
            data_nodes = ["ds_0.a_0", "ds_1.a_0"]

            [[tables]]
            name = "b"
            data_nodes = ["ds_0.b_0"]

            [[binding_groups]]
            tables = ["a", "b"]
        "#;
        let config = Config::from_str(source).unwrap();
        assert_eq!(
            ShardingRule::new(&config).unwrap_err(),
            Error::BindingTopologyMismatch("a".into(), "b".into())
        );
    }

    #[test]
    fn test_unknown_data_source() {
        let source = r#"
            [[data_sources]]
            name = "ds_0"

            [[tables]]
            name = "a"
            data_nodes = ["ds_9.a_0"]
        "#;
        let config = Config::from_str(source).unwrap();
        assert!(matches!(
            ShardingRule::new(&config),
            Err(Error::UnknownDataSource(_))
        ));
    }

    #[test]
    fn test_holder_swap() {
        let holder = RuleHolder::new(example());
        let before = holder.load();
        assert!(before.is_sharded("t_order"));

        holder.swap(ShardingRule::default());
        assert!(!holder.load().is_sharded("t_order"));
        // The old snapshot stays valid for in-flight statements.
        assert!(before.is_sharded("t_order"));
    }
}
