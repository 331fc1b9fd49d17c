//! Documents and read snapshots.
//!
//! A document is a schemaless JSON object that always carries an `id` field
//! equal to the key it is stored under. Reads hand out [`DocumentSnapshot`]s,
//! which report whether the document existed at the time of the read.
//!
//! # Examples
//!
//! ```rust
//! use offline_docstore::document::{DocumentSnapshot, to_document};
//! use serde_json::json;
//!
//! let data = to_document(&json!({"name": "Dr. John Smith", "role": "teacher"}))?;
//! let snapshot = DocumentSnapshot::new("teacher-1", Some(data));
//!
//! assert!(snapshot.exists());
//! assert_eq!(snapshot.get("role"), Some(&json!("teacher")));
//! # Ok::<(), offline_docstore::error::StoreError>(())
//! ```

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{StoreError, StoreResult};

/// Field name injected into every stored document.
pub const ID_FIELD: &str = "id";

/// Field name to JSON value.
pub type Document = Map<String, JsonValue>;

/// Converts any serializable value into a [`Document`].
///
/// Fails with [`StoreError::Validation`] when the value does not serialize
/// to a JSON object (documents are always objects).
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::Validation(format!(
            "documents must be JSON objects, got {}",
            json_type_name(&other)
        ))),
    }
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Point-in-time read of a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    data: Option<Document>,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, data: Option<Document>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Stored fields, or `None` when the document was absent.
    pub fn data(&self) -> Option<&Document> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Document> {
        self.data
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.data.as_ref().and_then(|d| d.get(field))
    }

    /// Deserializes the stored fields into `T`.
    ///
    /// Returns `Ok(None)` for an absent document.
    pub fn deserialize<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        match &self.data {
            Some(data) => Ok(Some(serde_json::from_value(JsonValue::Object(data.clone()))?)),
            None => Ok(None),
        }
    }
}

/// Result of a collection read or query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub docs: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(docs: Vec<DocumentSnapshot>) -> Self {
        Self { docs }
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentSnapshot> {
        self.docs.iter()
    }

    pub fn deserialize_all<T: DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        self.docs
            .iter()
            .filter_map(|doc| doc.deserialize::<T>().transpose())
            .collect()
    }

    /// Decodes every document that fits `T`. Documents that do not are
    /// skipped and logged.
    pub fn deserialize_valid<T: DeserializeOwned>(&self) -> Vec<T> {
        self.docs
            .iter()
            .filter_map(|doc| match doc.deserialize::<T>() {
                Ok(value) => value,
                Err(e) => {
                    warn!("Skipping document '{}' that does not decode: {e}", doc.id);
                    None
                }
            })
            .collect()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}
