//! Attachment blobs on disk.
//!
//! Blobs live under `<data_dir>/attachments/YYYY/MM/<uuid8>-<name>`, with
//! metadata in the `attachments` table pointing at the relative path.
//! Writes go through a temp file in the same directory and are renamed
//! into place, so a crash mid-upload never leaves a partial blob behind.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::StoreError;

/// A blob written to disk, ready to be recorded in the database.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub file_name: String,
    pub content_type: String,
    pub byte_size: i64,
    pub sha256: String,
    pub rel_path: String,
}

#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Write `data` under the current year/month directory and return
    /// its metadata.
    pub fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredBlob, StoreError> {
        let file_name = sanitize_name(original_name);
        let now = Utc::now();
        let dir = self
            .root
            .join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()));
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Blob {
            path: dir.display().to_string(),
            source: e,
        })?;

        let prefix = Uuid::new_v4().simple().to_string();
        let stored_name = format!("{}-{}", &prefix[..8], file_name);
        let dest = dir.join(&stored_name);

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::Blob {
            path: dir.display().to_string(),
            source: e,
        })?;
        tmp.write_all(data).map_err(|e| StoreError::Blob {
            path: dest.display().to_string(),
            source: e,
        })?;
        tmp.persist(&dest).map_err(|e| StoreError::Blob {
            path: dest.display().to_string(),
            source: e.error,
        })?;

        let digest = Sha256::digest(data);
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        let rel_path = format!(
            "{:04}/{:02}/{}",
            now.year(),
            now.month(),
            stored_name
        );

        Ok(StoredBlob {
            file_name,
            content_type,
            byte_size: data.len() as i64,
            sha256: format!("{:x}", digest),
            rel_path,
        })
    }

    /// Read a blob back by its stored relative path.
    pub fn read(&self, rel_path: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(rel_path)?;
        std::fs::read(&path).map_err(|e| StoreError::Blob {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Delete a blob. Missing blobs are not an error so that record
    /// cleanup can always proceed.
    pub fn remove(&self, rel_path: &str) -> Result<(), StoreError> {
        let path = self.resolve(rel_path)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Blob {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Join a stored relative path onto the root, rejecting anything
    /// that could escape it.
    fn resolve(&self, rel_path: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(rel_path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StoreError::Blob {
                path: rel_path.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "attachment path escapes blob root",
                ),
            });
        }
        Ok(self.root.join(rel))
    }
}

/// Keep letters, digits, dots, dashes and underscores from an uploaded
/// name; everything else becomes an underscore.
fn sanitize_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['_', '.']).is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}
