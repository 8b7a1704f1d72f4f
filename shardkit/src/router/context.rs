//! Route result types.

use indexmap::IndexSet;

/// Logical-to-actual name mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mapper {
    pub logical: String,
    pub actual: String,
}

impl Mapper {
    pub fn new(logical: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            logical: logical.into(),
            actual: actual.into(),
        }
    }

    /// Logical and actual name are the same.
    pub fn identity(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            logical: name.clone(),
            actual: name,
        }
    }
}

/// One execution target: a data source and the actual tables to address
/// within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteUnit {
    pub data_source: Mapper,
    pub tables: Vec<Mapper>,
}

impl RouteUnit {
    pub fn new(data_source: Mapper) -> Self {
        Self {
            data_source,
            tables: vec![],
        }
    }

    pub fn with_table(mut self, table: Mapper) -> Self {
        self.tables.push(table);
        self
    }

    /// Actual table name for a logical table, when this unit maps it.
    pub fn actual_table(&self, logical: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|mapper| mapper.logical.eq_ignore_ascii_case(logical))
            .map(|mapper| mapper.actual.as_str())
    }
}

/// The routed target set, in insertion order. Downstream executors rely
/// on the order being stable so batch counters stay aligned.
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    units: IndexSet<RouteUnit>,
}

impl RouteContext {
    pub fn push(&mut self, unit: RouteUnit) {
        self.units.insert(unit);
    }

    pub fn units(&self) -> impl Iterator<Item = &RouteUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Exactly one target; pagination stays untouched in this case.
    pub fn is_single_routing(&self) -> bool {
        self.units.len() == 1
    }

    /// Distinct actual data sources, insertion order.
    pub fn data_sources(&self) -> IndexSet<&str> {
        self.units
            .iter()
            .map(|unit| unit.data_source.actual.as_str())
            .collect()
    }

    /// Replace the unit set, preserving the given order.
    pub(crate) fn replace_units(&mut self, units: impl IntoIterator<Item = RouteUnit>) {
        self.units = units.into_iter().collect();
    }
}
