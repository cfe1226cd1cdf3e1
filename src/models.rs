use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub designation: String,
    pub office: String,
    pub created_at: String,
}

/// Kind of document being routed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Letter,
    Memo,
    Note,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Letter => "letter",
            Self::Memo => "memo",
            Self::Note => "note",
        }
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "letter" => Ok(Self::Letter),
            "memo" => Ok(Self::Memo),
            "note" => Ok(Self::Note),
            _ => Err(format!("Invalid file kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Routine,
    Urgent,
    Immediate,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Urgent => "urgent",
            Self::Immediate => "immediate",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routine" => Ok(Self::Routine),
            "urgent" => Ok(Self::Urgent),
            "immediate" => Ok(Self::Immediate),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Lifecycle status of a file. `Archived` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Draft,
    Pending,
    Approved,
    Returned,
    Archived,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Returned => "returned",
            Self::Archived => "archived",
        }
    }

    /// All statuses, in dashboard display order.
    pub const ALL: [FileStatus; 5] = [
        Self::Draft,
        Self::Pending,
        Self::Approved,
        Self::Returned,
        Self::Archived,
    ];

    /// Whether the file's fields may still be edited in this status.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Returned)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "returned" => Ok(Self::Returned),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid file status: {}", s)),
        }
    }
}

/// Workflow action requested against a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Submit,
    Approve,
    Return,
    Resubmit,
    Archive,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Return => "return",
            Self::Resubmit => "resubmit",
            Self::Archive => "archive",
        }
    }
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit" => Ok(Self::Submit),
            "approve" => Ok(Self::Approve),
            "return" => Ok(Self::Return),
            "resubmit" => Ok(Self::Resubmit),
            "archive" => Ok(Self::Archive),
            _ => Err(format!("Invalid workflow action: {}", s)),
        }
    }
}

/// A routed document (letter/memo/note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    /// Unique human-facing number, `F-YYYYMM-NNNN`, sequenced per month.
    pub file_number: String,
    pub title: String,
    pub body: String,
    pub kind: FileKind,
    pub priority: Priority,
    pub status: FileStatus,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// One entry in a file's transition log. The API returns these
/// newest-first, matching the prepended-log contract of the original
/// system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub file_id: i64,
    pub action: WorkflowAction,
    pub actor_id: i64,
    pub from_status: FileStatus,
    pub to_status: FileStatus,
    pub remarks: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub file_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub file_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub byte_size: i64,
    pub sha256: String,
    /// Path of the blob relative to the attachments root (`YYYY/MM/...`).
    pub rel_path: String,
    pub uploaded_by: i64,
    pub created_at: String,
}

// API view types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDetail {
    pub file: File,
    pub history: Vec<HistoryEntry>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: FileStatus,
    pub count: i64,
}

/// One row of recent activity on the dashboard: a history entry joined
/// with its file number for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRow {
    pub file_id: i64,
    pub file_number: String,
    pub action: WorkflowAction,
    pub actor_id: i64,
    pub to_status: FileStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub recent: Vec<ActivityRow>,
}
