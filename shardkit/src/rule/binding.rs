//! Binding table groups.
//!
//! Tables in one group are guaranteed to share shard topology: equal
//! node counts, same data sources, actual tables aligned by index. That
//! guarantee is what lets the router compute one table's route and reuse
//! the shard index for the rest.

use super::{Error, TableRule};

/// One group of binding tables, by logical name.
#[derive(Debug, Clone, Default)]
pub struct BindingTableRule {
    tables: Vec<String>,
}

impl BindingTableRule {
    pub fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn contains(&self, logical_table: &str) -> bool {
        self.tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(logical_table))
    }

    /// Check the topology invariant between the group's table rules.
    /// Runs at rule construction and again when a binding route is taken.
    pub fn validate(&self, rules: &[&TableRule]) -> Result<(), Error> {
        let mut rules = rules.iter();
        let first = match rules.next() {
            Some(first) => first,
            None => return Ok(()),
        };

        for rule in rules {
            let aligned = rule.data_nodes().len() == first.data_nodes().len()
                && rule
                    .data_nodes()
                    .iter()
                    .zip(first.data_nodes())
                    .all(|(a, b)| a.data_source == b.data_source);
            if !aligned {
                return Err(Error::BindingTopologyMismatch(
                    first.logical_table().to_owned(),
                    rule.logical_table().to_owned(),
                ));
            }
        }

        Ok(())
    }

    /// Actual table of `target` aligned with the driving table's routed
    /// actual table, within one data source.
    pub fn aligned_actual_table(
        driving: &TableRule,
        target: &TableRule,
        data_source: &str,
        driving_actual: &str,
    ) -> Result<String, Error> {
        let index = driving
            .table_names_in(data_source)
            .into_iter()
            .position(|table| table == driving_actual);

        index
            .and_then(|index| target.table_names_in(data_source).into_iter().nth(index))
            .ok_or_else(|| {
                Error::BindingTopologyMismatch(
                    driving.logical_table().to_owned(),
                    target.logical_table().to_owned(),
                )
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config;

    fn rule(name: &str, nodes: &[&str]) -> TableRule {
        TableRule::new(&config::Table {
            name: name.into(),
            data_nodes: nodes.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_aligned_actual_table() {
        let order = rule(
            "t_order",
            &["ds_0.t_order_0", "ds_0.t_order_1", "ds_1.t_order_0"],
        );
        let item = rule(
            "t_order_item",
            &["ds_0.t_item_0", "ds_0.t_item_1", "ds_1.t_item_0"],
        );

        let actual =
            BindingTableRule::aligned_actual_table(&order, &item, "ds_0", "t_order_1").unwrap();
        assert_eq!(actual, "t_item_1");
    }

    #[test]
    fn test_validate_mismatch() {
        let order = rule("t_order", &["ds_0.t_order_0", "ds_1.t_order_0"]);
        let item = rule("t_order_item", &["ds_0.t_item_0"]);

        let binding = BindingTableRule::new(vec!["t_order".into(), "t_order_item".into()]);
        assert_eq!(
            binding.validate(&[&order, &item]),
            Err(Error::BindingTopologyMismatch(
                "t_order".into(),
                "t_order_item".into()
            ))
        );
    }
}
