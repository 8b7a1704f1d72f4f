//! Sharding rule configuration.
//!
//! Deserialized from TOML at startup or reload, then validated into the
//! immutable [`crate::rule::ShardingRule`]. Nothing here is consulted on
//! the hot path.

pub mod error;

pub use error::Error;

use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Top-level rule configuration document.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    /// Physical data sources.
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    /// Sharded tables.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Groups of tables with identical shard topology.
    #[serde(default)]
    pub binding_groups: Vec<BindingGroup>,
    /// Tables replicated to every data source.
    #[serde(default)]
    pub broadcast_tables: Vec<String>,
    #[serde(default)]
    pub defaults: Defaults,
}

impl Config {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_owned()));
        }
        let config = Self::from_str(&read_to_string(path)?)?;
        info!(
            "loaded sharding rules for {} tables from {}",
            config.tables.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse from TOML text.
    pub fn from_str(toml: &str) -> Result<Self, Error> {
        Ok(toml::from_str(toml)?)
    }
}

/// One physical database, optionally with read replicas.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DataSource {
    pub name: String,
    #[serde(default)]
    pub replicas: Vec<String>,
}

/// Rule for one logical table.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    /// Declared actual topology, `"data_source.table"` per entry.
    pub data_nodes: Vec<String>,
    #[serde(default)]
    pub database_strategy: Option<Strategy>,
    #[serde(default)]
    pub table_strategy: Option<Strategy>,
    #[serde(default)]
    pub key_generator: Option<KeyGenerator>,
}

/// Sharding strategy: the column carrying the key and the algorithm
/// deciding where values of it go.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Strategy {
    pub column: String,
    pub algorithm: Algorithm,
}

/// Built-in sharding algorithms.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Algorithm {
    /// `value % sharding_count`, target picked by numeric suffix.
    Modulo { sharding_count: usize },
    /// SHA-1 of the value, then modulo.
    Sha1Modulo { sharding_count: usize },
    /// CRC32 of the value, then modulo.
    Crc32Modulo { sharding_count: usize },
    /// Fixed-width buckets between two bounds.
    VolumeRange { lower: i64, upper: i64, volume: i64 },
    /// Explicit ascending bucket boundaries.
    BoundaryRange { boundaries: Vec<i64> },
    /// Modulo over caller-supplied hint values.
    HintModulo { sharding_count: usize },
}

/// Binding group: tables routed together by shard index.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BindingGroup {
    pub tables: Vec<String>,
}

/// Generated-key column of a table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeyGenerator {
    pub column: String,
    #[serde(default)]
    pub kind: KeyGeneratorKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum KeyGeneratorKind {
    #[default]
    Snowflake,
    Uuid,
}

/// Strategies applied to sharded tables that don't declare their own.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Defaults {
    #[serde(default)]
    pub database_strategy: Option<Strategy>,
    #[serde(default)]
    pub table_strategy: Option<Strategy>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_example_config() {
        let source = include_str!("../../../shardkit.toml");
        let config = Config::from_str(source).unwrap();

        assert_eq!(config.data_sources.len(), 2);
        assert_eq!(config.data_sources[0].replicas, vec!["ds_0_replica"]);
        assert_eq!(config.tables.len(), 2);

        let order = &config.tables[0];
        assert_eq!(order.name, "t_order");
        assert_eq!(order.data_nodes.len(), 4);
        assert_eq!(
            order.database_strategy.as_ref().unwrap().algorithm,
            Algorithm::Modulo { sharding_count: 2 }
        );
        assert_eq!(
            order.key_generator.as_ref().unwrap().kind,
            KeyGeneratorKind::Snowflake
        );

        assert_eq!(config.binding_groups[0].tables, vec!["t_order", "t_order_item"]);
        assert_eq!(config.broadcast_tables, vec!["t_config"]);
    }

    #[test]
    fn test_algorithm_variants() {
        let source = r#"
            [[tables]]
            name = "t_span"
            data_nodes = ["ds_0.t_span_0", "ds_1.t_span_1"]

            [tables.database_strategy]
            column = "created_at"
            algorithm = { type = "volume_range", lower = 0, upper = 1000, volume = 100 }

            [tables.table_strategy]
            column = "region"
            algorithm = { type = "crc32_modulo", sharding_count = 2 }
        "#;
        let config = Config::from_str(source).unwrap();
        let table = &config.tables[0];
        assert_eq!(
            table.database_strategy.as_ref().unwrap().algorithm,
            Algorithm::VolumeRange {
                lower: 0,
                upper: 1000,
                volume: 100
            }
        );
    }
}
