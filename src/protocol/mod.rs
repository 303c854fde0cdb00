//! Line-delimited JSON control protocol: message shapes and sanitization.

mod message;
mod sanitize;

pub use message::{
    command_message, probe_message, ShapeMessage, TextMessage, DEFAULT_SIZE, DEFAULT_TTL, PROBE_ID,
};
pub use sanitize::{sanitize, MAX_TEXT_LEN};

use serde_json::Map;

/// Classify a message for metrics by the fields it carries.
pub(crate) fn message_kind(fields: &Map<String, serde_json::Value>) -> &'static str {
    if fields.contains_key("command") {
        "command"
    } else if fields.contains_key("shape") {
        "shape"
    } else if fields.contains_key("text") {
        "text"
    } else {
        "raw"
    }
}
