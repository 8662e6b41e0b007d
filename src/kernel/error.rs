//! Kernel error types

use super::task::TaskId;
use crate::store::StoreError;
use thiserror::Error;

/// Misuse of the process table or persistence failures
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("task {0} is already registered")]
    DuplicateId(TaskId),

    #[error("task id {0} leaves no room for the id counter")]
    IdOutOfRange(TaskId),

    #[error("task ids are exhausted")]
    IdsExhausted,

    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Restore(#[from] RestoreError),
}

/// A persisted task record that cannot be rebuilt
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("no constructor registered for kind {kind:?}")]
    UnknownKind { kind: String },

    #[error("record has no kind tag")]
    MissingKind,

    #[error("record has no valid id")]
    MissingId,

    #[error("malformed {kind} record: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure raised by a task's step; the kernel stops the task
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("fields must serialize to an object, not {0}")]
    NotAnObject(&'static str),

    #[error("field {0:?} is reserved for the record envelope")]
    ReservedField(String),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl TaskError {
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}
