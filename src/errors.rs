//! Typed error hierarchy for the fileroute service.
//!
//! Two top-level enums cover the two subsystems:
//! - `WorkflowError`: state machine guard and transition failures
//! - `StoreError`: persistence and blob storage failures

use thiserror::Error;

use crate::models::{FileStatus, WorkflowAction};

/// Errors from the workflow state machine.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {action} a file in status {from}")]
    InvalidTransition {
        from: FileStatus,
        action: WorkflowAction,
    },

    #[error("User {actor_id} is not permitted to {action} this file")]
    NotPermitted {
        actor_id: i64,
        action: WorkflowAction,
    },

    #[error("Submitting a file requires an assignee")]
    AssigneeRequired,

    #[error("Returning a file requires remarks")]
    RemarksRequired,

    #[error("File is not editable in status {status}")]
    NotEditable { status: FileStatus },

    #[error("Only draft files can be deleted (status is {status})")]
    NotDeletable { status: FileStatus },
}

/// Errors from the persistence layer (SQLite and attachment blobs).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File {id} not found")]
    FileNotFound { id: i64 },

    #[error("User {id} not found")]
    UserNotFound { id: i64 },

    #[error("Attachment {id} not found")]
    AttachmentNotFound { id: i64 },

    #[error("Attachment blob error at {path}: {source}")]
    Blob {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
