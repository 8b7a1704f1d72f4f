//! Rule model errors.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    #[error("malformed data node: \"{0}\", expected \"data_source.table\"")]
    MalformedDataNode(String),

    #[error("data node \"{0}\" references an undeclared data source")]
    UnknownDataSource(String),

    #[error("table \"{0}\" has no data nodes")]
    EmptyTopology(String),

    #[error("duplicate rule for table \"{0}\"")]
    DuplicateTable(String),

    #[error("binding group references unknown table \"{0}\"")]
    UnknownBindingTable(String),

    #[error("binding group topology mismatch between \"{0}\" and \"{1}\"")]
    BindingTopologyMismatch(String, String),
}
