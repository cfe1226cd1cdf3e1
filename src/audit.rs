//! Append-only audit trail of workflow actions.
//!
//! One JSON line per action, in daily files named
//! `actions-YYYY-MM-DD.jsonl` under the audit directory. These files are
//! the record of who did what to which file, independent of the
//! database.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::{FileStatus, HistoryEntry, WorkflowAction};

/// A single audited action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: String,
    pub file_id: i64,
    pub file_number: String,
    pub action: WorkflowAction,
    pub actor_id: i64,
    pub from_status: FileStatus,
    pub to_status: FileStatus,
    pub remarks: String,
}

pub struct AuditTrail {
    audit_dir: PathBuf,
    // Serializes appends so concurrent handlers never interleave lines.
    write_lock: Mutex<()>,
}

impl AuditTrail {
    pub fn new(audit_dir: &Path) -> Self {
        Self {
            audit_dir: audit_dir.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append a committed transition to today's log file.
    pub fn record(&self, file_number: &str, entry: &HistoryEntry) -> Result<()> {
        let record = AuditRecord {
            at: Utc::now().to_rfc3339(),
            file_id: entry.file_id,
            file_number: file_number.to_string(),
            action: entry.action,
            actor_id: entry.actor_id,
            from_status: entry.from_status,
            to_status: entry.to_status,
            remarks: entry.remarks.clone(),
        };
        let line = serde_json::to_string(&record).context("Failed to serialize audit record")?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("audit lock poisoned: {}", e))?;
        fs::create_dir_all(&self.audit_dir).context("Failed to create audit directory")?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.today_file())
            .context("Failed to open audit log file")?;
        writeln!(f, "{}", line).context("Failed to append audit record")?;
        Ok(())
    }

    /// Read back the most recent `limit` records from today's file,
    /// newest first. Older files are not consulted.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let path = self.today_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).context("Failed to read audit log file")?;
        let mut records = Vec::new();
        for line in content.lines().rev() {
            if records.len() == limit {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord =
                serde_json::from_str(line).context("Failed to parse audit record")?;
            records.push(record);
        }
        Ok(records)
    }

    fn today_file(&self) -> PathBuf {
        self.audit_dir
            .join(format!("actions-{}.jsonl", Utc::now().format("%Y-%m-%d")))
    }
}
