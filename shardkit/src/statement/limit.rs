//! LIMIT/OFFSET clause of a bound statement.

use super::{Error, Span, Value};

/// Offset or row count: a literal in the SQL text, or a parameter marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitValue {
    Literal(u64),
    /// Zero-based index into the statement's parameter list.
    Parameter(usize),
}

/// One side of the pagination clause, with the span of its text in the
/// original SQL. Parameter-supplied values have the span of the marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitSegment {
    pub value: LimitValue,
    pub span: Span,
}

impl LimitSegment {
    pub fn literal(value: u64, span: Span) -> Self {
        Self {
            value: LimitValue::Literal(value),
            span,
        }
    }

    pub fn parameter(index: usize, span: Span) -> Self {
        Self {
            value: LimitValue::Parameter(index),
            span,
        }
    }

    fn resolve(&self, parameters: &[Value], negative: fn(i64) -> Error) -> Result<u64, Error> {
        match self.value {
            LimitValue::Literal(value) => Ok(value),
            LimitValue::Parameter(index) => {
                let param = parameters.get(index).ok_or(Error::MissingParameter(index))?;
                let int = param.as_int().ok_or(Error::NotAnInteger(index))?;
                if int < 0 {
                    return Err(negative(int));
                }
                Ok(int as u64)
            }
        }
    }
}

/// Pagination clause as bound by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LimitClause {
    pub offset: Option<LimitSegment>,
    pub row_count: Option<LimitSegment>,
}

/// Resolved pagination values.
///
/// Retains the client-requested offset and row count so the merger can
/// trim results after the per-shard rewrite inflated them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Limit {
    pub offset: Option<u64>,
    pub row_count: Option<u64>,
}

impl LimitClause {
    /// Resolve both sides against the parameter list. Negative values
    /// fail here, before any rewrite happens.
    pub fn resolve(&self, parameters: &[Value]) -> Result<Limit, Error> {
        let offset = self
            .offset
            .map(|segment| segment.resolve(parameters, Error::NegativeOffset))
            .transpose()?;
        let row_count = self
            .row_count
            .map(|segment| segment.resolve(parameters, Error::NegativeRowCount))
            .transpose()?;

        Ok(Limit { offset, row_count })
    }
}
