// SPDX-License-Identifier: MIT
//! Backup artifacts — full pre-patch copies written next to the original.
//!
//! Named `<filename>.<UTC timestamp>.bak`, with a numeric suffix when two
//! patches land within the same second. Backups are never pruned; recovery
//! is a manual operator action.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt as _;

/// Write `content` to a fresh backup file adjacent to `path` and return the
/// backup's path. Uses `create_new` so an existing artifact is never
/// overwritten.
pub async fn write_backup(path: &Path, content: &str) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?
        .to_string_lossy();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let base = format!("{file_name}.{stamp}.bak");

    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            parent.join(&base)
        } else {
            parent.join(format!("{base}.{counter}"))
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(mut f) => {
                f.write_all(content.as_bytes()).await?;
                f.flush().await?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                counter += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
