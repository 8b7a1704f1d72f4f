//! Hint-supplied sharding values.
//!
//! An explicit, caller-passed context scoped to one statement execution.
//! Hint values bypass predicate extraction entirely and reach the
//! algorithms as plain value lists.

use std::collections::HashMap;

use crate::statement::Value;

#[derive(Debug, Clone, Default)]
pub struct HintContext {
    database_values: HashMap<String, Vec<Value>>,
    table_values: HashMap<String, Vec<Value>>,
}

impl HintContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_database_value(&mut self, logical_table: &str, value: impl Into<Value>) {
        self.database_values
            .entry(logical_table.to_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn add_table_value(&mut self, logical_table: &str, value: impl Into<Value>) {
        self.table_values
            .entry(logical_table.to_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn database_values(&self, logical_table: &str) -> Option<&[Value]> {
        self.database_values
            .get(&logical_table.to_lowercase())
            .map(|values| values.as_slice())
    }

    pub fn table_values(&self, logical_table: &str) -> Option<&[Value]> {
        self.table_values
            .get(&logical_table.to_lowercase())
            .map(|values| values.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.database_values.is_empty() && self.table_values.is_empty()
    }
}
