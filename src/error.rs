// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

use crate::types::{RecordId, TableName};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),
    #[error("CBOR error: {0}")]
    Cbor(String),
    /// A stored row did not decode to a field map.
    #[error("invalid row at key {key}")]
    InvalidRow { key: String },
    /// Table name contains ':' or key format is otherwise invalid.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("record {table}:{id} not found")]
    NotFound { table: TableName, id: RecordId },
    #[error("record {table}:{id} already exists")]
    AlreadyExists { table: TableName, id: RecordId },
    #[error("record in {table} has not been saved yet")]
    NotSaved { table: TableName },
    #[error("unknown field {field} on {table}")]
    UnknownField { table: TableName, field: SmolStr },
    #[error("field {field} on {table} is not a foreign key")]
    NotForeignKey { table: TableName, field: SmolStr },
}

impl From<redb::DatabaseError> for RecordError {
    fn from(e: redb::DatabaseError) -> Self {
        RecordError::Redb(e.into())
    }
}

impl From<redb::TransactionError> for RecordError {
    fn from(e: redb::TransactionError) -> Self {
        RecordError::Redb(e.into())
    }
}

impl From<redb::TableError> for RecordError {
    fn from(e: redb::TableError) -> Self {
        RecordError::Redb(e.into())
    }
}

impl From<redb::CommitError> for RecordError {
    fn from(e: redb::CommitError) -> Self {
        RecordError::Redb(e.into())
    }
}

impl From<redb::StorageError> for RecordError {
    fn from(e: redb::StorageError) -> Self {
        RecordError::Redb(e.into())
    }
}
