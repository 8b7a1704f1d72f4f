//! Bound statement errors.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    #[error("missing parameter: ${0}")]
    MissingParameter(usize),

    #[error("parameter ${0} is not an integer")]
    NotAnInteger(usize),

    #[error("negative offset: {0}")]
    NegativeOffset(i64),

    #[error("negative row count: {0}")]
    NegativeRowCount(i64),
}
