//! Whitelist sanitization of outbound message fields.
//!
//! The sole gate between caller-supplied data and the wire. Deliberately
//! permissive about shape (missing optional fields pass through) and strict
//! about type and size: unknown fields, wrong-typed values, and oversized
//! text never reach the renderer.

use serde_json::{Map, Value};

/// Text fields are truncated to this many characters before transmission.
pub const MAX_TEXT_LEN: usize = 1000;

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Text,
    Number,
}

/// Field whitelist: name and the JSON type accepted for it. Anything not in
/// this table is dropped before serialization.
const WHITELIST: &[(&str, FieldKind)] = &[
    ("id", FieldKind::Text),
    ("text", FieldKind::Text),
    ("color", FieldKind::Text),
    ("size", FieldKind::Text),
    ("shape", FieldKind::Text),
    ("fill", FieldKind::Text),
    ("command", FieldKind::Text),
    ("x", FieldKind::Number),
    ("y", FieldKind::Number),
    ("ttl", FieldKind::Number),
    ("w", FieldKind::Number),
    ("h", FieldKind::Number),
];

/// Filter a raw message down to whitelisted, correctly-typed fields.
///
/// Never fails: invalid fields are dropped one by one rather than rejecting
/// the whole message, so a malformed optional field cannot block an otherwise
/// valid display update. The output key set is always a subset of the
/// whitelist, and `sanitize(sanitize(m)) == sanitize(m)`.
pub fn sanitize(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut cleaned = Map::new();
    for (name, kind) in WHITELIST {
        let Some(value) = raw.get(*name) else {
            continue;
        };
        match kind {
            FieldKind::Text => {
                if let Value::String(text) = value {
                    cleaned.insert(
                        (*name).to_string(),
                        Value::String(truncate_chars(text, MAX_TEXT_LEN)),
                    );
                }
            }
            FieldKind::Number => {
                if value.is_number() {
                    cleaned.insert((*name).to_string(), value.clone());
                }
            }
        }
    }
    cleaned
}

/// Truncate to a character count, never splitting a UTF-8 sequence.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
