//! Core types for live collections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Field holding the creation timestamp by convention.
pub const CREATED_AT: &str = "createdAt";

/// Field name the store identifier is merged under.
pub const ID_FIELD: &str = "id";

/// Field map of a document.
pub type Fields = Map<String, Value>;

/// Store-assigned unique identifier for a document.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Derive an identifier from a collection name and a per-store counter.
    ///
    /// The digest also covers the current time so ids do not repeat across
    /// store instances.
    pub fn generate(collection: &str, counter: u64, len: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(collection.as_bytes());
        hasher.update(counter.to_le_bytes());
        hasher.update(Timestamp::now().0.to_le_bytes());
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(len.clamp(1, 64));
        DocumentId(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        DocumentId(s)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        // A clock before the epoch reads as zero.
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }

    /// Read a timestamp stored in a document field.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().map(Timestamp)
    }

    pub fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A raw entry as held by the backing store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (assigned by store).
    pub id: DocumentId,

    /// Application-defined fields.
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Creation timestamp, if one has been committed.
    pub fn created_at(&self) -> Option<Timestamp> {
        self.fields.get(CREATED_AT).and_then(Timestamp::from_value)
    }
}

/// A projected record: document fields with the store identifier merged in.
///
/// Serializes as a flat JSON object carrying an `id` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: DocumentId,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Timestamp held in the default `createdAt` field.
    ///
    /// Collections projected with a custom `ProjectorConfig::timestamp_field`
    /// should read it through [`Record::timestamp`].
    pub fn created_at(&self) -> Option<Timestamp> {
        self.timestamp(CREATED_AT)
    }

    /// Timestamp held in `field`, if it is a number.
    pub fn timestamp(&self, field: &str) -> Option<Timestamp> {
        self.fields.get(field).and_then(Timestamp::from_value)
    }

    /// Flatten into one JSON object with the store id under `id`.
    pub fn to_object(&self) -> Fields {
        let mut out = self.fields.clone();
        out.insert(ID_FIELD.to_string(), Value::String(self.id.0.clone()));
        out
    }
}

/// Build a field map from a JSON value. Non-object values yield an empty map.
pub fn fields_from(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = DocumentId::generate("projects", 1, 20);
        let b = DocumentId::generate("projects", 2, 20);
        assert_eq!(a.as_str().len(), 20);
        assert_ne!(a, b);
    }

    #[test]
    fn test_document_created_at() {
        let doc = Document::new("a", fields_from(json!({"title": "X", "createdAt": 42})));
        assert_eq!(doc.created_at(), Some(Timestamp(42)));

        let pending = Document::new("b", fields_from(json!({"title": "X"})));
        assert_eq!(pending.created_at(), None);
    }

    #[test]
    fn test_record_timestamp_reads_named_field() {
        let record = Record {
            id: DocumentId::from("abc"),
            fields: fields_from(json!({"postedAt": 7, "createdAt": 3})),
        };
        assert_eq!(record.timestamp("postedAt"), Some(Timestamp(7)));
        assert_eq!(record.created_at(), Some(Timestamp(3)));
        assert_eq!(record.timestamp("editedAt"), None);
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = Record {
            id: DocumentId::from("abc"),
            fields: fields_from(json!({"title": "Tracker", "createdAt": 7})),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": "abc", "title": "Tracker", "createdAt": 7}));

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_fields_from_non_object() {
        assert!(fields_from(json!([1, 2])).is_empty());
    }
}
