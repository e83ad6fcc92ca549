// SPDX-License-Identifier: MIT
//! `line-assignment` format: one `KEY=VALUE` per line.
//!
//! A key matches only at column 0, immediately followed by `=`. The value is
//! everything after the first `=` up to the line terminator, untrimmed.
//! Commented or indented assignments never match.

use super::FieldSpan;

/// Byte span of the value on the first `KEY=` line, if any.
pub fn locate(content: &str, key: &str) -> Option<FieldSpan> {
    if key.is_empty() {
        return None;
    }
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        // Strip the terminator (and a CR before it) so CRLF files keep
        // their line endings byte-identical through a patch.
        let body = line.trim_end_matches('\n').trim_end_matches('\r');
        if let Some(rest) = body.strip_prefix(key) {
            if rest.starts_with('=') {
                let start = offset + key.len() + 1;
                return Some(FieldSpan {
                    start,
                    end: start + rest.len() - 1,
                });
            }
        }
        offset += line.len();
    }
    None
}
