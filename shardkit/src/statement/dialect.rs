//! SQL dialect tags.

/// Dialect of the statement being rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    MySql,
    Postgres,
    H2,
    Oracle,
    SqlServer,
    #[default]
    Generic,
}

impl Dialect {
    /// Dialects whose pagination is plain LIMIT/OFFSET and whose row count
    /// is rewritten to offset + row count when a statement fans out.
    ///
    /// The whitelist is carried over as-is; other dialects keep their
    /// original row count even when multi-routed.
    pub fn rewrites_row_count(&self) -> bool {
        matches!(self, Dialect::MySql | Dialect::Postgres | Dialect::H2)
    }

    /// Largest row count safe to emit after pagination rewrite.
    pub fn max_row_count(&self) -> u64 {
        i32::MAX as u64
    }
}
