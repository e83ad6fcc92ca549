// SPDX-License-Identifier: MIT
//! Value extraction — locates the current value of a logical key inside a
//! watched file's raw content, per declared on-disk format.
//!
//! Extraction is best-effort textual scanning, not a full parse: malformed
//! documents yield `Observed::Absent` rather than an error, so one broken
//! file can never fail a whole cycle. Each format exposes `locate`, which
//! returns the byte span of the current value; extraction and patching share
//! that single scoping implementation.

use serde::{Deserialize, Serialize};

pub mod line_assignment;
pub mod structured;

/// Declared on-disk syntax of a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileFormat {
    /// One `KEY=VALUE` assignment per line (env-style).
    LineAssignment,
    /// Nested brace-delimited blocks with quoted string fields, addressed
    /// by a dotted key path (e.g. `Server.BindAddr`).
    Structured,
}

/// Byte span of a key's current value within file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub start: usize,
    pub end: usize,
}

/// The value observed for a key at a point in time.
///
/// `Absent` is distinct from `Present("")`: a key that never appears and a
/// key assigned the empty string are different states, and both are
/// reported distinctly in drift events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Absent,
    Present(String),
}

impl Observed {
    /// Rendering used in drift events and logs.
    pub fn display(&self) -> &str {
        match self {
            Observed::Absent => "<absent>",
            Observed::Present(v) => v,
        }
    }
}

/// Locate the byte span of `key`'s current value in `content`.
pub fn locate(content: &str, key: &str, format: FileFormat) -> Option<FieldSpan> {
    match format {
        FileFormat::LineAssignment => line_assignment::locate(content, key),
        FileFormat::Structured => structured::locate(content, key),
    }
}

/// Extract the current value of `key` from `content`. Never fails; a key
/// that cannot be found (including in malformed documents) is `Absent`.
pub fn extract(content: &str, key: &str, format: FileFormat) -> Observed {
    match locate(content, key, format) {
        Some(span) => Observed::Present(content[span.start..span.end].to_string()),
        None => Observed::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_dispatches_by_format() {
        let env = "HOST=1.2.3.4\n";
        assert_eq!(
            extract(env, "HOST", FileFormat::LineAssignment),
            Observed::Present("1.2.3.4".to_string())
        );

        let doc = r#"Server { "BindAddr" = "127.0.0.1" }"#;
        assert_eq!(
            extract(doc, "Server.BindAddr", FileFormat::Structured),
            Observed::Present("127.0.0.1".to_string())
        );
    }

    #[test]
    fn test_absent_is_not_empty() {
        assert_eq!(
            extract("OTHER=x\n", "HOST", FileFormat::LineAssignment),
            Observed::Absent
        );
        assert_eq!(
            extract("HOST=\n", "HOST", FileFormat::LineAssignment),
            Observed::Present(String::new())
        );
    }
}
