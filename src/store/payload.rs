//! Metadata stored with each chunk vector

use qdrant_client::qdrant::{value::Kind, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Payload key holding the chunk text in backends without a text column
pub const TEXT_KEY: &str = "text";

/// Provenance of a chunk, persisted next to its vector
///
/// Carries no timestamps: re-upserting an unchanged chunk writes identical data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkPayload {
    /// Path relative to the data directory
    pub source_path: String,

    /// Final path component, shown as the source of an answer
    pub file_name: String,

    /// Detected document format ("pdf", "plaintext", "markdown", "docx")
    pub format: String,

    /// Character offset of the chunk within the document
    pub start_offset: usize,

    /// Chunk length in characters
    pub length: usize,

    /// Position of the chunk within the document
    pub chunk_index: usize,

    /// blake3 hash of the extracted document text
    pub doc_hash: String,
}

impl ChunkPayload {
    /// Convert to Qdrant payload format, with the chunk text alongside
    pub fn to_qdrant_payload(&self, text: &str) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert(TEXT_KEY.to_string(), string_to_qdrant(text));
        map.insert("source_path".to_string(), string_to_qdrant(&self.source_path));
        map.insert("file_name".to_string(), string_to_qdrant(&self.file_name));
        map.insert("format".to_string(), string_to_qdrant(&self.format));
        map.insert("start_offset".to_string(), int_to_qdrant(self.start_offset as i64));
        map.insert("length".to_string(), int_to_qdrant(self.length as i64));
        map.insert("chunk_index".to_string(), int_to_qdrant(self.chunk_index as i64));
        map.insert("doc_hash".to_string(), string_to_qdrant(&self.doc_hash));

        map
    }

    /// Split a stored JSON payload into chunk text and metadata
    pub fn from_stored(mut map: Map<String, Value>) -> (String, Self) {
        let text = match map.remove(TEXT_KEY) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        (text, map.into())
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::IntegerValue(i)),
    }
}

impl From<Map<String, Value>> for ChunkPayload {
    fn from(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map)).unwrap_or_default()
    }
}

/// Convert Qdrant value to serde_json Value
pub fn json_from_qdrant_value(v: QdrantValue) -> Value {
    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
