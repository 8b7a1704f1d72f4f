//! INSERT clause of a bound statement.

use super::{Expr, Span};

/// One value tuple of a (possibly multi-row) INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    /// Cell expressions, one per declared column.
    pub cells: Vec<Expr>,
    /// Span of the `(...)` tuple in the original SQL, parens included.
    pub span: Span,
}

impl InsertRow {
    pub fn new(cells: Vec<Expr>, span: Span) -> Self {
        Self { cells, span }
    }

    /// How many parameter markers this tuple carries.
    pub fn parameter_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| matches!(cell, Expr::Parameter(_)))
            .count()
    }
}

/// The column and VALUES structure of an INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertClause {
    /// Declared column names, in order.
    pub columns: Vec<String>,
    /// Span of the column list, parens included. Absent when the
    /// statement relies on positional columns.
    pub columns_span: Option<Span>,
    /// Value tuples, in statement order.
    pub rows: Vec<InsertRow>,
    /// Span covering every tuple after the VALUES keyword.
    pub values_span: Span,
    /// Trailing parameters owned by an ON DUPLICATE KEY UPDATE clause.
    pub on_duplicate_key_parameters: usize,
}

impl InsertClause {
    /// Position of the named column in the tuple, if declared.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(column))
    }
}
