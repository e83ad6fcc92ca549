// SPDX-License-Identifier: MIT
//! Expectation table — the immutable (file, key) → expected-value mapping.
//!
//! Built once at startup from the loaded config and never mutated;
//! reconfiguration requires a restart. Declaration order of files and of
//! keys within a file is preserved, because the monitor loop guarantees
//! checks run in that order.

use crate::config::FileSpec;
use crate::extract::FileFormat;
use std::collections::HashSet;
use std::path::PathBuf;

/// One logical key and its expected on-disk value.
#[derive(Debug, Clone)]
pub struct Expectation {
    pub key: String,
    /// Expected value; may be empty.
    pub expected: String,
}

/// A file registered for drift checking, with its expectations in
/// declaration order.
#[derive(Debug, Clone)]
pub struct WatchedFile {
    pub path: PathBuf,
    pub format: FileFormat,
    pub expectations: Vec<Expectation>,
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("no [[file]] sections declared — nothing to monitor")]
    NoWatchedFiles,
    #[error("empty key declared for {file}")]
    EmptyKey { file: PathBuf },
    #[error("duplicate key {key} declared for {file}")]
    DuplicateKey { file: PathBuf, key: String },
}

/// Immutable table of watched files and their expected values.
#[derive(Debug, Clone)]
pub struct ExpectationTable {
    files: Vec<WatchedFile>,
}

impl ExpectationTable {
    /// Validate and build the table from parsed `[[file]]` sections.
    ///
    /// Rejects an empty declaration list, empty keys, and duplicate
    /// (file, key) pairs (keys are unique per file path, even across
    /// separate sections naming the same path).
    pub fn from_specs(specs: &[FileSpec]) -> Result<Self, TableError> {
        if specs.is_empty() {
            return Err(TableError::NoWatchedFiles);
        }

        let mut seen: HashSet<(PathBuf, String)> = HashSet::new();
        let mut files = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut expectations = Vec::with_capacity(spec.expect.len());
            for e in &spec.expect {
                if e.key.is_empty() {
                    return Err(TableError::EmptyKey {
                        file: spec.path.clone(),
                    });
                }
                if !seen.insert((spec.path.clone(), e.key.clone())) {
                    return Err(TableError::DuplicateKey {
                        file: spec.path.clone(),
                        key: e.key.clone(),
                    });
                }
                expectations.push(Expectation {
                    key: e.key.clone(),
                    expected: e.value.clone(),
                });
            }
            files.push(WatchedFile {
                path: spec.path.clone(),
                format: spec.format,
                expectations,
            });
        }

        Ok(Self { files })
    }

    /// Watched files in declaration order.
    pub fn files(&self) -> &[WatchedFile] {
        &self.files
    }

    /// Total number of (file, key) pairs checked per cycle.
    pub fn entry_count(&self) -> usize {
        self.files.iter().map(|f| f.expectations.len()).sum()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
