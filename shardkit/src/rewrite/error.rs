//! Rewrite errors.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    /// Token generation produced overlapping spans. A defect in the
    /// bound statement's spans, surfaced rather than reordered around.
    #[error("overlapping rewrite tokens at byte {0}")]
    OverlappingTokens(usize),

    #[error("token span {0}..{1} is outside the statement text")]
    SpanOutOfBounds(usize, usize),

    #[error("{0}")]
    Statement(#[from] crate::statement::Error),

    #[error("{0}")]
    Router(#[from] crate::router::Error),
}
