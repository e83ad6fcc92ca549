// SPDX-License-Identifier: MIT
//! Reconciler — decides drift for one (file, key) pair and applies the fix.
//!
//! Drift is exact string inequality against the expectation; an absent key
//! always drifts. On drift the current file content is copied to a backup
//! artifact first, then the located value span is spliced in place and the
//! whole file rewritten. All other bytes are preserved. There is no in-cycle
//! retry: a failed patch is simply re-detected on the next cycle.

pub mod backup;

use crate::extract::{self, FileFormat, Observed};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A detected divergence between a file's value and its expectation.
#[derive(Debug, Clone, Serialize)]
pub struct DriftEvent {
    pub id: String,
    pub file: PathBuf,
    pub key: String,
    pub expected: String,
    /// Observed value, or `"<absent>"` when the key was not present.
    pub observed: String,
    /// Whether the file was patched. False in dry-run mode and when a
    /// structured key is absent (nested structure is never synthesized).
    pub fixed: bool,
    /// Backup artifact written before the patch, when one was taken.
    pub backup: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("cannot read {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("backup failed for {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("patch failed for {path}: {source}")]
    Patch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Check one (file, key) pair and patch the file if its value drifted.
///
/// Returns `Ok(None)` when the observed value already matches, otherwise a
/// [`DriftEvent`] describing what was found and whether it was fixed.
/// `dry_run` reports drift without touching the file or writing a backup.
pub async fn reconcile_entry(
    path: &Path,
    key: &str,
    format: FileFormat,
    expected: &str,
    dry_run: bool,
) -> Result<Option<DriftEvent>, ReconcileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReconcileError::Access {
            path: path.to_path_buf(),
            source,
        })?;

    let observed = extract::extract(&content, key, format);
    if let Observed::Present(ref v) = observed {
        if v == expected {
            return Ok(None);
        }
    }

    let mut event = DriftEvent {
        id: uuid::Uuid::new_v4().to_string(),
        file: path.to_path_buf(),
        key: key.to_string(),
        expected: expected.to_string(),
        observed: observed.display().to_string(),
        fixed: false,
        backup: None,
        timestamp: Utc::now(),
    };

    if dry_run {
        return Ok(Some(event));
    }

    let new_content = match patched_content(&content, key, format, expected) {
        Some(c) => c,
        None => {
            // Absent structured key: nested blocks are never synthesized
            // from a textual scope search. Reported unfixed, retried next
            // cycle in case the application materializes the block.
            debug!(file = %path.display(), key, "absent structured key — cannot patch");
            return Ok(Some(event));
        }
    };

    let backup_path = backup::write_backup(path, &content).await.map_err(|source| {
        ReconcileError::Backup {
            path: path.to_path_buf(),
            source,
        }
    })?;

    tokio::fs::write(path, new_content)
        .await
        .map_err(|source| ReconcileError::Patch {
            path: path.to_path_buf(),
            source,
        })?;

    event.fixed = true;
    event.backup = Some(backup_path);
    Ok(Some(event))
}

/// Full replacement content with `expected` in place of the current value,
/// or `None` when no textual fix exists for this format.
fn patched_content(
    content: &str,
    key: &str,
    format: FileFormat,
    expected: &str,
) -> Option<String> {
    if let Some(span) = extract::locate(content, key, format) {
        let mut out = String::with_capacity(content.len() + expected.len());
        out.push_str(&content[..span.start]);
        out.push_str(expected);
        out.push_str(&content[span.end..]);
        return Some(out);
    }
    match format {
        // Missing assignment: append it, so the file converges instead of
        // re-reporting the same drift forever.
        FileFormat::LineAssignment => {
            let mut out = String::with_capacity(content.len() + key.len() + expected.len() + 2);
            out.push_str(content);
            if !content.is_empty() && !content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(expected);
            out.push('\n');
            Some(out)
        }
        FileFormat::Structured => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
