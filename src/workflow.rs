//! The file lifecycle state machine.
//!
//! All transition rules live in [`plan_transition`], a pure function of
//! the file's current state and the requested action. The store applies
//! the returned [`Transition`] and records the matching history entry in
//! one SQL transaction; nothing else in the crate mutates `status`.
//!
//! The transition table:
//!
//! | action   | from     | to       | who                 |
//! |----------|----------|----------|---------------------|
//! | submit   | draft    | pending  | creator             |
//! | approve  | pending  | approved | assignee            |
//! | return   | pending  | returned | assignee            |
//! | resubmit | returned | pending  | creator             |
//! | archive  | approved | archived | creator or assignee |

use crate::errors::WorkflowError;
use crate::models::{File, FileStatus, WorkflowAction};

/// A workflow action requested by a user, before validation.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub action: WorkflowAction,
    pub actor_id: i64,
    pub remarks: String,
    /// For `submit`: assignee to route the file to. Ignored elsewhere.
    pub assign_to: Option<i64>,
}

/// A validated transition, ready to be applied by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub action: WorkflowAction,
    pub from: FileStatus,
    pub to: FileStatus,
    pub actor_id: i64,
    pub remarks: String,
    /// The file's assignee after the transition.
    pub assigned_to: Option<i64>,
}

/// Validate `req` against the file's current state and produce the
/// transition to apply, or the guard violation that forbids it.
pub fn plan_transition(file: &File, req: &TransitionRequest) -> Result<Transition, WorkflowError> {
    let action = req.action;

    let to = match (file.status, action) {
        (FileStatus::Draft, WorkflowAction::Submit) => FileStatus::Pending,
        (FileStatus::Pending, WorkflowAction::Approve) => FileStatus::Approved,
        (FileStatus::Pending, WorkflowAction::Return) => FileStatus::Returned,
        (FileStatus::Returned, WorkflowAction::Resubmit) => FileStatus::Pending,
        (FileStatus::Approved, WorkflowAction::Archive) => FileStatus::Archived,
        (from, action) => return Err(WorkflowError::InvalidTransition { from, action }),
    };

    let mut assigned_to = file.assigned_to;

    match action {
        WorkflowAction::Submit => {
            require_creator(file, req)?;
            // A submit may set or replace the assignee; the file must
            // end up assigned to someone.
            if req.assign_to.is_some() {
                assigned_to = req.assign_to;
            }
            if assigned_to.is_none() {
                return Err(WorkflowError::AssigneeRequired);
            }
        }
        WorkflowAction::Approve => require_assignee(file, req)?,
        WorkflowAction::Return => {
            require_assignee(file, req)?;
            if req.remarks.trim().is_empty() {
                return Err(WorkflowError::RemarksRequired);
            }
        }
        WorkflowAction::Resubmit => {
            require_creator(file, req)?;
            if assigned_to.is_none() {
                return Err(WorkflowError::AssigneeRequired);
            }
        }
        WorkflowAction::Archive => {
            let is_creator = file.created_by == req.actor_id;
            let is_assignee = file.assigned_to == Some(req.actor_id);
            if !is_creator && !is_assignee {
                return Err(WorkflowError::NotPermitted {
                    actor_id: req.actor_id,
                    action,
                });
            }
        }
    }

    Ok(Transition {
        action,
        from: file.status,
        to,
        actor_id: req.actor_id,
        remarks: req.remarks.trim().to_string(),
        assigned_to,
    })
}

/// Guard for field edits: only draft and returned files may change.
pub fn check_editable(file: &File) -> Result<(), WorkflowError> {
    if file.status.is_editable() {
        Ok(())
    } else {
        Err(WorkflowError::NotEditable {
            status: file.status,
        })
    }
}

/// Guard for deletion: only drafts may be deleted.
pub fn check_deletable(file: &File) -> Result<(), WorkflowError> {
    if file.status == FileStatus::Draft {
        Ok(())
    } else {
        Err(WorkflowError::NotDeletable {
            status: file.status,
        })
    }
}

fn require_creator(file: &File, req: &TransitionRequest) -> Result<(), WorkflowError> {
    if file.created_by == req.actor_id {
        Ok(())
    } else {
        Err(WorkflowError::NotPermitted {
            actor_id: req.actor_id,
            action: req.action,
        })
    }
}

fn require_assignee(file: &File, req: &TransitionRequest) -> Result<(), WorkflowError> {
    if file.assigned_to == Some(req.actor_id) {
        Ok(())
    } else {
        Err(WorkflowError::NotPermitted {
            actor_id: req.actor_id,
            action: req.action,
        })
    }
}
