//! Parameter builders.
//!
//! Edits to the positional parameter list are collected as index maps
//! and applied at read time: replacements in place, insertions in
//! descending index order so earlier indices never shift underneath.

use std::collections::BTreeMap;

use fnv::FnvHashMap;

use crate::statement::Value;

/// Flat parameter list with pending edits.
#[derive(Debug, Clone, Default)]
pub struct StandardParameterBuilder {
    original: Vec<Value>,
    replaced: FnvHashMap<usize, Value>,
    added: BTreeMap<usize, Vec<Value>>,
}

impl StandardParameterBuilder {
    pub fn new(original: Vec<Value>) -> Self {
        Self {
            original,
            ..Default::default()
        }
    }

    /// Replace the parameter at `index`.
    pub fn replace(&mut self, index: usize, value: Value) {
        self.replaced.insert(index, value);
    }

    /// Insert a parameter before `index`. An index at or beyond the end
    /// appends.
    pub fn insert(&mut self, index: usize, value: Value) {
        self.added.entry(index).or_default().push(value);
    }

    /// Materialize the edited list.
    pub fn parameters(&self) -> Vec<Value> {
        let mut parameters = self.original.clone();
        for (index, value) in &self.replaced {
            if let Some(slot) = parameters.get_mut(*index) {
                *slot = value.clone();
            }
        }
        for (index, values) in self.added.iter().rev() {
            if *index >= parameters.len() {
                parameters.extend(values.iter().cloned());
            } else {
                for value in values.iter().rev() {
                    parameters.insert(*index, value.clone());
                }
            }
        }
        parameters
    }
}

/// Batched statements: one builder per value-tuple group, plus the
/// shared ON DUPLICATE KEY UPDATE tail.
#[derive(Debug, Clone, Default)]
pub struct GroupedParameterBuilder {
    groups: Vec<StandardParameterBuilder>,
    on_duplicate_key: StandardParameterBuilder,
}

impl GroupedParameterBuilder {
    pub fn new(groups: Vec<Vec<Value>>, on_duplicate_key: Vec<Value>) -> Self {
        Self {
            groups: groups.into_iter().map(StandardParameterBuilder::new).collect(),
            on_duplicate_key: StandardParameterBuilder::new(on_duplicate_key),
        }
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut StandardParameterBuilder> {
        self.groups.get_mut(index)
    }

    pub fn on_duplicate_key_mut(&mut self) -> &mut StandardParameterBuilder {
        &mut self.on_duplicate_key
    }

    /// All groups in order, then the on-duplicate-key parameters.
    pub fn parameters(&self) -> Vec<Value> {
        let retain = vec![true; self.groups.len()];
        self.parameters_retained(&retain)
    }

    /// Only the groups marked retained, then the on-duplicate-key tail.
    /// Used per route unit after tuple pruning.
    pub fn parameters_retained(&self, retained: &[bool]) -> Vec<Value> {
        let mut parameters = vec![];
        for (index, group) in self.groups.iter().enumerate() {
            if retained.get(index).copied().unwrap_or(true) {
                parameters.extend(group.parameters());
            }
        }
        parameters.extend(self.on_duplicate_key.parameters());
        parameters
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_replace_and_insert() {
        let mut builder =
            StandardParameterBuilder::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        builder.replace(1, Value::Int(20));
        builder.insert(0, Value::Int(0));
        builder.insert(3, Value::Int(30));

        assert_eq!(
            builder.parameters(),
            vec![
                Value::Int(0),
                Value::Int(1),
                Value::Int(20),
                Value::Int(30),
                Value::Int(3),
            ]
        );
    }

    #[test]
    fn test_insert_past_end_appends() {
        let mut builder = StandardParameterBuilder::new(vec![Value::Int(1)]);
        builder.insert(7, Value::Int(2));
        assert_eq!(builder.parameters(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_grouped_concatenation() {
        let mut builder = GroupedParameterBuilder::new(
            vec![
                vec![Value::Int(1), Value::Int(2)],
                vec![Value::Int(3), Value::Int(4)],
            ],
            vec![Value::from("dup")],
        );
        builder
            .on_duplicate_key_mut()
            .insert(9, Value::from("tail"));

        let parameters = builder.parameters();
        // Σ(group sizes) + on-duplicate-key parameters, in order.
        assert_eq!(
            parameters,
            vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(4),
                Value::from("dup"),
                Value::from("tail"),
            ]
        );
    }

    #[test]
    fn test_grouped_retention() {
        let builder = GroupedParameterBuilder::new(
            vec![vec![Value::Int(1)], vec![Value::Int(2)]],
            vec![Value::Int(9)],
        );
        assert_eq!(
            builder.parameters_retained(&[false, true]),
            vec![Value::Int(2), Value::Int(9)]
        );
    }
}
