//! Codec for the shared `.env` secret file.
//!
//! Lines are `KEY=VALUE`, `KEY="VALUE"` or `KEY='VALUE'`, `#` comments, or
//! blank. The serializer quotes any value that would not survive an unquoted
//! round trip, and the parser inverts exactly the escapes the serializer
//! writes, so `parse(&serialize(&m)) == m` for every valid mapping.

use indexmap::IndexMap;

/// Insertion-ordered key/value mapping decoded from an env file. Updating an
/// existing key keeps its position; use `shift_remove` to delete so the
/// remaining entries keep their order.
pub type EnvMap = IndexMap<String, String>;

/// Decode env-file content. Malformed lines (no `=`, empty key) are skipped.
pub fn parse(content: &str) -> EnvMap {
    let mut map = EnvMap::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), decode_value(value.trim()));
    }

    map
}

/// Encode a mapping as env-file content, one entry per line, with a
/// trailing newline. An empty mapping encodes to an empty string.
pub fn serialize(map: &EnvMap) -> String {
    let mut out = String::new();
    for (key, value) in map.iter() {
        out.push_str(key);
        out.push('=');
        if needs_quoting(value) {
            out.push('"');
            out.push_str(&escape(value));
            out.push('"');
        } else {
            out.push_str(value);
        }
        out.push('\n');
    }
    out
}

/// Whether a value must be written double-quoted.
pub fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            // Unknown escapes are kept as written
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Strip one matching outer quote pair. Only double-quoted content is
/// unescaped.
fn decode_value(value: &str) -> String {
    let mut chars = value.chars();
    match (chars.next(), chars.next_back()) {
        (Some('"'), Some('"')) => unescape(chars.as_str()),
        (Some('\''), Some('\'')) => chars.as_str().to_string(),
        _ => value.to_string(),
    }
}
