//! Table rule and its declared topology.

use std::fmt::Display;

use indexmap::IndexSet;

use super::{keygen::GeneratedKey, Error};
use crate::config;
use crate::router::algorithm::ShardingStrategy;

/// One physical shard location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn new(data_source: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            table: table.into(),
        }
    }

    /// Parse a `"data_source.table"` config entry.
    pub fn parse(node: &str) -> Result<Self, Error> {
        match node.split_once('.') {
            Some((data_source, table)) if !data_source.is_empty() && !table.is_empty() => {
                Ok(Self::new(data_source, table))
            }
            _ => Err(Error::MalformedDataNode(node.to_owned())),
        }
    }
}

impl Display for DataNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

/// Rule for one logical table: its declared actual topology and the
/// strategies slicing it.
#[derive(Debug, Clone)]
pub struct TableRule {
    logical_table: String,
    data_nodes: Vec<DataNode>,
    pub(crate) database_strategy: Option<ShardingStrategy>,
    pub(crate) table_strategy: Option<ShardingStrategy>,
    generated_key: Option<GeneratedKey>,
}

impl TableRule {
    pub fn new(config: &config::Table) -> Result<Self, Error> {
        if config.data_nodes.is_empty() {
            return Err(Error::EmptyTopology(config.name.clone()));
        }
        let data_nodes = config
            .data_nodes
            .iter()
            .map(|node| DataNode::parse(node))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            logical_table: config.name.clone(),
            data_nodes,
            database_strategy: config
                .database_strategy
                .as_ref()
                .map(ShardingStrategy::from_config),
            table_strategy: config
                .table_strategy
                .as_ref()
                .map(ShardingStrategy::from_config),
            generated_key: config
                .key_generator
                .as_ref()
                .map(|keygen| GeneratedKey::new(&keygen.column, keygen.kind)),
        })
    }

    pub fn logical_table(&self) -> &str {
        &self.logical_table
    }

    /// Declared topology, not a derived cartesian product.
    pub fn data_nodes(&self) -> &[DataNode] {
        &self.data_nodes
    }

    /// Data source names, declaration order, deduplicated.
    pub fn data_source_names(&self) -> IndexSet<String> {
        self.data_nodes
            .iter()
            .map(|node| node.data_source.clone())
            .collect()
    }

    /// Actual table names declared within one data source.
    pub fn table_names_in(&self, data_source: &str) -> IndexSet<String> {
        self.data_nodes
            .iter()
            .filter(|node| node.data_source == data_source)
            .map(|node| node.table.clone())
            .collect()
    }

    pub fn contains(&self, node: &DataNode) -> bool {
        self.data_nodes.contains(node)
    }

    pub fn generated_key(&self) -> Option<&GeneratedKey> {
        self.generated_key.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_data_node() {
        let node = DataNode::parse("ds_0.t_order_1").unwrap();
        assert_eq!(node.data_source, "ds_0");
        assert_eq!(node.table, "t_order_1");
        assert_eq!(node.to_string(), "ds_0.t_order_1");

        assert!(DataNode::parse("no_dot").is_err());
        assert!(DataNode::parse(".t").is_err());
        assert!(DataNode::parse("ds.").is_err());
    }

    #[test]
    fn test_topology_views() {
        let table = config::Table {
            name: "t_order".into(),
            data_nodes: vec![
                "ds_0.t_order_0".into(),
                "ds_0.t_order_1".into(),
                "ds_1.t_order_0".into(),
                "ds_1.t_order_1".into(),
            ],
            ..Default::default()
        };
        let rule = TableRule::new(&table).unwrap();

        assert_eq!(
            rule.data_source_names().into_iter().collect::<Vec<_>>(),
            vec!["ds_0", "ds_1"]
        );
        assert_eq!(
            rule.table_names_in("ds_1").into_iter().collect::<Vec<_>>(),
            vec!["t_order_0", "t_order_1"]
        );
        assert!(rule.contains(&DataNode::new("ds_0", "t_order_1")));
        assert!(!rule.contains(&DataNode::new("ds_2", "t_order_1")));
    }
}
