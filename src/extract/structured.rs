// SPDX-License-Identifier: MIT
//! `structured` format: nested brace-delimited blocks with quoted string
//! fields, addressed by a dotted key path.
//!
//! `Server.BindAddr` means: find the block introduced by `Server` (the name,
//! bare or quoted, followed by an optional `:`/`=` and an opening brace),
//! then the nearest quoted field named `BindAddr` inside it. This is scoped
//! textual scanning, not a document parse: it works the same on JSON-ish,
//! HOCON-ish, and other brace/quote dialects, and tolerates malformed input
//! by returning `None`. Unbalanced braces clamp the scope to end-of-content.

use super::FieldSpan;
use std::ops::Range;

/// Byte span of the quoted value for `key_path`, if present.
pub fn locate(content: &str, key_path: &str) -> Option<FieldSpan> {
    if key_path.is_empty() {
        return None;
    }
    let segments: Vec<&str> = key_path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let (leaf, parents) = segments.split_last()?;

    let mut scope = 0..content.len();
    for parent in parents {
        scope = block_scope(content, scope, parent)?;
    }
    quoted_field(content, scope, leaf)
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Occurrences of `name` within `scope` that stand alone as a token
/// (not embedded in a longer identifier). Returns absolute byte offsets.
fn token_positions(content: &str, scope: Range<usize>, name: &str) -> Vec<usize> {
    let hay = &content[scope.clone()];
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = hay[from..].find(name) {
        let start = from + rel;
        let end = start + name.len();
        let before_ok = start == 0 || !hay[..start].chars().next_back().map_or(false, is_ident);
        let after_ok = end >= hay.len() || !hay[end..].chars().next().map_or(false, is_ident);
        if before_ok && after_ok {
            out.push(scope.start + start);
        }
        from = end;
    }
    out
}

/// Narrow `scope` to the inside of the block introduced by `name`:
/// `name { ... }`, `"name": { ... }`, or `name = { ... }`.
fn block_scope(content: &str, scope: Range<usize>, name: &str) -> Option<Range<usize>> {
    let bytes = content.as_bytes();
    for pos in token_positions(content, scope.clone(), name) {
        let mut i = pos + name.len();
        if i < scope.end && bytes[i] == b'"' {
            i += 1; // closing quote of a quoted name
        }
        while i < scope.end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < scope.end && (bytes[i] == b':' || bytes[i] == b'=') {
            i += 1;
            while i < scope.end && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
        }
        if i < scope.end && bytes[i] == b'{' {
            let open = i;
            let mut depth = 0usize;
            for (j, &b) in bytes[open..scope.end].iter().enumerate() {
                match b {
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(open + 1..open + j);
                        }
                    }
                    _ => {}
                }
            }
            // Unbalanced block: clamp to end of scope rather than failing.
            return Some(open + 1..scope.end);
        }
    }
    None
}

/// The quoted value of the first field named `name` within `scope`:
/// `name = "value"`, `"name": "value"`, and mixed quoting forms.
fn quoted_field(content: &str, scope: Range<usize>, name: &str) -> Option<FieldSpan> {
    let bytes = content.as_bytes();
    for pos in token_positions(content, scope.clone(), name) {
        let mut i = pos + name.len();
        if i < scope.end && bytes[i] == b'"' {
            i += 1;
        }
        while i < scope.end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= scope.end || (bytes[i] != b':' && bytes[i] != b'=') {
            continue;
        }
        i += 1;
        while i < scope.end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < scope.end && bytes[i] == b'"' {
            let start = i + 1;
            if let Some(rel) = content[start..scope.end].find('"') {
                return Some(FieldSpan {
                    start,
                    end: start + rel,
                });
            }
            // Unterminated quote: treat as absent.
        }
    }
    None
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of<'a>(content: &'a str, key: &str) -> Option<&'a str> {
        locate(content, key).map(|s| &content[s.start..s.end])
    }

    const JSONISH: &str = r#"{
  "Server": {
    "BindAddr": "127.0.0.1",
    "Port": "8080"
  },
  "Client": {
    "BindAddr": "0.0.0.0"
  }
}"#;

    #[test]
    fn test_scoped_lookup_jsonish() {
        assert_eq!(value_of(JSONISH, "Server.BindAddr"), Some("127.0.0.1"));
        assert_eq!(value_of(JSONISH, "Client.BindAddr"), Some("0.0.0.0"));
    }

    #[test]
    fn test_hoconish_equals_form() {
        let doc = "Server {\n  BindAddr = \"10.0.0.1\"\n}\n";
        assert_eq!(value_of(doc, "Server.BindAddr"), Some("10.0.0.1"));
    }

    #[test]
    fn test_deep_path() {
        let doc = r#"App { Net { Listen = "any" } Disk { Listen = "none" } }"#;
        assert_eq!(value_of(doc, "App.Net.Listen"), Some("any"));
        assert_eq!(value_of(doc, "App.Disk.Listen"), Some("none"));
    }

    #[test]
    fn test_top_level_field() {
        assert_eq!(value_of(r#""Mode": "fast""#, "Mode"), Some("fast"));
    }

    #[test]
    fn test_missing_parent_block() {
        assert_eq!(value_of(JSONISH, "Database.BindAddr"), None);
    }

    #[test]
    fn test_missing_leaf() {
        assert_eq!(value_of(JSONISH, "Server.MaxConns"), None);
    }

    #[test]
    fn test_token_boundary() {
        // `BindAddress` must not satisfy a lookup for `BindAddr`.
        let doc = r#"Server { "BindAddress": "9.9.9.9" }"#;
        assert_eq!(value_of(doc, "Server.BindAddr"), None);
    }

    #[test]
    fn test_unbalanced_braces_clamp() {
        let doc = "Server {\n  BindAddr = \"10.0.0.1\"\n"; // missing close
        assert_eq!(value_of(doc, "Server.BindAddr"), Some("10.0.0.1"));
    }

    #[test]
    fn test_unterminated_quote_is_absent() {
        let doc = "Server { BindAddr = \"10.0.0.1";
        assert_eq!(value_of(doc, "Server.BindAddr"), None);
    }

    #[test]
    fn test_empty_quoted_value() {
        let doc = r#"Server { Motd = "" }"#;
        assert_eq!(value_of(doc, "Server.Motd"), Some(""));
    }

    #[test]
    fn test_malformed_never_panics() {
        for doc in ["", "{", "}", "\"", "Server", "Server {", "= \"x\""] {
            let _ = locate(doc, "Server.BindAddr");
        }
    }
}
