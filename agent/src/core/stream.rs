//! Decoding of line-delimited streaming chunks.
//!
//! Model CLIs have emitted several chunk shapes over time. Recognition order
//! is fixed: direct fragment keys, then `message.content` as a string, then a
//! nested key inside an object-valued content. The key names come from
//! [`ChunkShapes`] so they can be changed through configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key names used to recognize streaming chunk shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkShapes {
    /// Top-level keys holding a text fragment, tried in order.
    pub fragment_keys: Vec<String>,
    /// Key of the nested message object.
    pub message_key: String,
    /// Key of the content field inside the message object.
    pub content_key: String,
    /// Keys tried in order when the content field is itself an object.
    pub nested_content_keys: Vec<String>,
    /// Boolean key that marks the final chunk.
    pub done_key: String,
}

impl Default for ChunkShapes {
    fn default() -> Self {
        Self {
            fragment_keys: vec!["response".to_string()],
            message_key: "message".to_string(),
            content_key: "content".to_string(),
            nested_content_keys: vec![
                "text".to_string(),
                "parts".to_string(),
                "content".to_string(),
            ],
            done_key: "done".to_string(),
        }
    }
}

/// What one stdout line contributes to the accumulated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    pub fragment: Option<LineFragment>,
    /// The line carried an explicit completion flag.
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFragment {
    /// Text extracted from a recognized chunk shape.
    Chunk(String),
    /// A line that was not a JSON object, kept verbatim.
    Raw(String),
}

impl ChunkShapes {
    /// Decode one stdout line. Blank lines contribute nothing.
    pub fn decode_line(&self, line: &str) -> DecodedLine {
        let line = line.trim();
        if line.is_empty() {
            return DecodedLine {
                fragment: None,
                done: false,
            };
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(obj)) => DecodedLine {
                fragment: self
                    .extract_fragment(&obj)
                    .filter(|text| !text.is_empty())
                    .map(LineFragment::Chunk),
                done: obj.get(&self.done_key).and_then(Value::as_bool) == Some(true),
            },
            Ok(Value::String(text)) => DecodedLine {
                fragment: Some(LineFragment::Raw(text)),
                done: false,
            },
            Ok(other) => DecodedLine {
                fragment: Some(LineFragment::Raw(other.to_string())),
                done: false,
            },
            Err(_) => DecodedLine {
                fragment: Some(LineFragment::Raw(line.to_string())),
                done: false,
            },
        }
    }

    fn extract_fragment(&self, obj: &Map<String, Value>) -> Option<String> {
        if let Some(text) = self
            .fragment_keys
            .iter()
            .find_map(|key| obj.get(key).and_then(Value::as_str))
        {
            return Some(text.to_string());
        }
        let content = obj
            .get(&self.message_key)
            .and_then(Value::as_object)?
            .get(&self.content_key)?;
        match content {
            Value::String(text) => Some(text.clone()),
            Value::Object(nested) => self
                .nested_content_keys
                .iter()
                .find_map(|key| nested.get(key).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Accumulates fragments from a stream.
///
/// Chunk text is concatenated as-is; raw lines are kept on their own line so
/// they never fuse with neighbouring words.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buf: String,
    chunks: usize,
    raw_lines: usize,
}

impl StreamAccumulator {
    pub fn push(&mut self, fragment: LineFragment) {
        match fragment {
            LineFragment::Chunk(text) => {
                self.chunks += 1;
                self.buf.push_str(&text);
            }
            LineFragment::Raw(text) => {
                self.raw_lines += 1;
                if !self.buf.is_empty() && !self.buf.ends_with(char::is_whitespace) {
                    self.buf.push('\n');
                }
                self.buf.push_str(&text);
                self.buf.push('\n');
            }
        }
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn raw_lines(&self) -> usize {
        self.raw_lines
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
