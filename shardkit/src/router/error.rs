//! Router errors.
//!
//! Everything here is fatal for the statement: a configuration defect
//! (algorithm result outside the declared topology, binding mismatch) or
//! an unroutable DML target. Predicate shapes the extractor can't read
//! are *not* errors; those degrade to full routing instead.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    #[error("no sharding rule for table \"{0}\"")]
    UnknownTable(String),

    #[error("no route found for table \"{0}\"")]
    NoRoute(String),

    #[error("algorithm routed to \"{0}\", which is not a declared target")]
    AlgorithmTargetMismatch(String),

    #[error("sharding value {0} has a type this algorithm cannot route")]
    UnroutableValue(String),

    #[error("cannot update sharding column \"{1}\" of table \"{0}\"")]
    UpdateShardingColumn(String, String),

    #[error("no data sources configured")]
    NoDataSources,

    #[error("{0}")]
    Statement(#[from] crate::statement::Error),

    #[error("{0}")]
    Rule(#[from] crate::rule::Error),
}
