//! Typed builders for the control messages the renderer understands.
//!
//! The wire format is one compact JSON object per line. Builders produce a
//! `serde_json::Map` so the send path can sanitize field-by-field without
//! caring which message shape it was handed.

use serde_json::{json, Map, Value};

/// Seconds a message stays on screen when the caller does not say otherwise.
pub const DEFAULT_TTL: i64 = 4;

/// Default text size understood by the renderer.
pub const DEFAULT_SIZE: &str = "normal";

/// Reserved message id used by liveness probes. The renderer can filter
/// messages with this id instead of drawing them.
pub const PROBE_ID: &str = "overwire.probe";

/// A positioned text label: `{id, text, color, size, x, y, ttl}`.
#[derive(Debug, Clone)]
pub struct TextMessage {
    pub id: String,
    pub text: String,
    pub color: String,
    pub size: String,
    pub x: i64,
    pub y: i64,
    pub ttl: i64,
}

impl TextMessage {
    pub fn new(id: &str, text: &str, color: &str, x: i64, y: i64) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            color: color.to_string(),
            size: DEFAULT_SIZE.to_string(),
            x,
            y,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn size(mut self, size: &str) -> Self {
        self.size = size.to_string();
        self
    }

    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(self.id));
        fields.insert("color".to_string(), json!(self.color));
        fields.insert("text".to_string(), json!(self.text));
        fields.insert("size".to_string(), json!(self.size));
        fields.insert("x".to_string(), json!(self.x));
        fields.insert("y".to_string(), json!(self.y));
        fields.insert("ttl".to_string(), json!(self.ttl));
        fields
    }
}

/// A geometric primitive: `{id, shape, color, fill, x, y, w, h, ttl}`.
#[derive(Debug, Clone)]
pub struct ShapeMessage {
    pub id: String,
    pub shape: String,
    pub color: String,
    pub fill: String,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub ttl: i64,
}

impl ShapeMessage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        shape: &str,
        color: &str,
        fill: &str,
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        ttl: i64,
    ) -> Self {
        Self {
            id: id.to_string(),
            shape: shape.to_string(),
            color: color.to_string(),
            fill: fill.to_string(),
            x,
            y,
            w,
            h,
            ttl,
        }
    }

    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(self.id));
        fields.insert("shape".to_string(), json!(self.shape));
        fields.insert("color".to_string(), json!(self.color));
        fields.insert("fill".to_string(), json!(self.fill));
        fields.insert("x".to_string(), json!(self.x));
        fields.insert("y".to_string(), json!(self.y));
        fields.insert("w".to_string(), json!(self.w));
        fields.insert("h".to_string(), json!(self.h));
        fields.insert("ttl".to_string(), json!(self.ttl));
        fields
    }
}

/// A bare command message: `{command}`. The only command the renderer acts
/// on today is `exit`, sent during shutdown.
pub fn command_message(command: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("command".to_string(), json!(command));
    fields
}

/// The no-op message a liveness probe round-trips: reserved id, empty text,
/// shortest ttl. Renderers drop it without drawing.
pub fn probe_message() -> Map<String, Value> {
    TextMessage::new(PROBE_ID, "", "black", 0, 0).ttl(1).fields()
}
