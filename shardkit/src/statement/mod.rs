//! Bound statement context.
//!
//! The SQL parser and binder live upstream; what reaches this crate is a
//! statement with tables, predicates, and parameters already resolved,
//! plus the text spans the rewrite engine needs to splice replacements
//! into the original SQL.

pub mod dialect;
pub mod error;
pub mod insert;
pub mod limit;
pub mod value;

pub use dialect::Dialect;
pub use error::Error;
pub use insert::{InsertClause, InsertRow};
pub use limit::{Limit, LimitClause, LimitSegment, LimitValue};
pub use value::Value;

/// Byte range in the original SQL text, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub stop: usize,
}

impl Span {
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Empty span marking an insertion point.
    pub fn at(position: usize) -> Self {
        Self {
            start: position,
            stop: position,
        }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.stop && other.start < self.stop
    }
}

/// Kind of statement, as classified by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Schema changes.
    Ddl,
    /// Administrative statements, e.g. ANALYZE.
    Dal,
    /// Transaction control.
    Tcl,
}

impl StatementKind {
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            StatementKind::Select
                | StatementKind::Insert
                | StatementKind::Update
                | StatementKind::Delete
        )
    }

    pub fn is_read(&self) -> bool {
        matches!(self, StatementKind::Select)
    }
}

/// A table referenced by the statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    /// Logical table name.
    pub name: String,
    pub alias: Option<String>,
    /// Span of the name occurrence to substitute, when the statement
    /// text spells it out.
    pub span: Option<Span>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            span: None,
        }
    }

    pub fn spanned(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            alias: None,
            span: Some(span),
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Does `ident` refer to this table? Alias wins over the name.
    pub fn matches(&self, ident: &str) -> bool {
        match &self.alias {
            Some(alias) => alias.eq_ignore_ascii_case(ident),
            None => self.name.eq_ignore_ascii_case(ident),
        }
    }
}

/// Column reference inside a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Table name or alias qualifier, when written.
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

/// Comparison operators the condition extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

/// Right-hand side of a predicate or an INSERT cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Value(Value),
    /// Zero-based positional parameter marker.
    Parameter(usize),
}

impl Expr {
    /// Resolve against the statement's parameter list.
    pub fn resolve<'a>(&'a self, parameters: &'a [Value]) -> Result<&'a Value, Error> {
        match self {
            Expr::Value(value) => Ok(value),
            Expr::Parameter(index) => {
                parameters.get(*index).ok_or(Error::MissingParameter(*index))
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Value(Value::Int(value))
    }
}

/// Predicate tree of the WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Compare {
        column: ColumnRef,
        op: Operator,
        value: Expr,
    },
    In {
        column: ColumnRef,
        values: Vec<Expr>,
    },
    Between {
        column: ColumnRef,
        low: Expr,
        high: Expr,
    },
    /// Column compared against a subquery. Opaque to the extractor.
    Subquery { column: ColumnRef },
}

impl Predicate {
    pub fn eq(column: ColumnRef, value: impl Into<Expr>) -> Self {
        Predicate::Compare {
            column,
            op: Operator::Eq,
            value: value.into(),
        }
    }

    pub fn between(column: ColumnRef, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Predicate::Between {
            column,
            low: low.into(),
            high: high.into(),
        }
    }
}

/// UPDATE SET assignment, used to validate sharding keys stay put.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
}

/// A statement after parsing and binding, ready to route.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    /// Original SQL text. Rewrites splice over this, never re-indexing.
    pub sql: String,
    pub kind: StatementKind,
    pub dialect: Dialect,
    /// Tables referenced, in statement order.
    pub tables: Vec<TableRef>,
    pub where_clause: Option<Predicate>,
    /// Positional parameters, already decoded.
    pub parameters: Vec<Value>,
    pub limit: Option<LimitClause>,
    pub insert: Option<InsertClause>,
    /// UPDATE SET assignments.
    pub assignments: Vec<Assignment>,
    /// Fragments to strip during rewrite, e.g. schema qualifiers.
    pub remove_spans: Vec<Span>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            sql: sql.into(),
            kind,
            dialect: Dialect::default(),
            tables: vec![],
            where_clause: None,
            parameters: vec![],
            limit: None,
            insert: None,
            assignments: vec![],
            remove_spans: vec![],
        }
    }

    /// Logical names of all referenced tables.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Resolve a column reference to the logical table it belongs to.
    ///
    /// A qualified column follows its qualifier; an unqualified one is
    /// attributed to the only referenced table, or to nothing at all when
    /// the statement joins several and the owner is ambiguous.
    pub fn table_for_column(&self, column: &ColumnRef) -> Option<&TableRef> {
        if let Some(qualifier) = &column.table {
            return self.tables.iter().find(|t| t.matches(qualifier));
        }
        if self.tables.len() == 1 {
            return self.tables.first();
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        let mut stmt = BoundStatement::new(
            "SELECT * FROM t_order o JOIN t_order_item i ON o.order_id = i.order_id",
            StatementKind::Select,
        );
        stmt.tables = vec![
            TableRef::new("t_order").aliased("o"),
            TableRef::new("t_order_item").aliased("i"),
        ];

        let column = ColumnRef::qualified("o", "user_id");
        assert_eq!(stmt.table_for_column(&column).unwrap().name, "t_order");

        let unqualified = ColumnRef::new("user_id");
        assert!(stmt.table_for_column(&unqualified).is_none());
    }

    #[test]
    fn test_span_overlap() {
        assert!(Span::new(0, 5).overlaps(&Span::new(4, 6)));
        assert!(!Span::new(0, 5).overlaps(&Span::new(5, 6)));
    }
}
