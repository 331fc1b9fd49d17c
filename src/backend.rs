//! The async seam between document handles and whatever holds the data.
//!
//! [`LocalBackend`] answers every call synchronously from a
//! [`StorageMedium`], keeping one JSON blob per collection. A remote backend
//! can implement [`DocumentBackend`] and be dropped in behind the same
//! handles.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use crate::document::{Document, DocumentSnapshot, QuerySnapshot, ID_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::query::{matches_all, Condition};
use crate::storage_medium::StorageMedium;

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<DocumentSnapshot>;

    /// Replaces the document wholesale. The stored `id` field always equals `id`.
    async fn set_document(&self, collection: &str, id: &str, data: Document) -> StoreResult<()>;

    /// Shallow-merges `partial` into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] when the document is absent.
    async fn update_document(&self, collection: &str, id: &str, partial: Document) -> StoreResult<()>;

    /// Shallow-merges `partial` only if the stored document satisfies
    /// `precondition`, checked and written under one lock.
    ///
    /// Returns `Ok(false)` without writing when the precondition fails, and
    /// [`StoreError::NotFound`] when the document is absent.
    async fn update_document_if(
        &self,
        collection: &str,
        id: &str,
        precondition: &Condition,
        partial: Document,
    ) -> StoreResult<bool>;

    /// Removing an absent document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()>;

    async fn list_documents(&self, collection: &str) -> StoreResult<QuerySnapshot>;

    async fn run_query(&self, collection: &str, conditions: &[Condition]) -> StoreResult<QuerySnapshot>;

    async fn clear_collection(&self, collection: &str) -> StoreResult<()>;

    fn generate_id(&self) -> String;
}

/// Collection blob: document id to document.
type CollectionData = BTreeMap<String, Document>;

/// Backend over a local [`StorageMedium`].
///
/// Each collection lives under `<scope_prefix><name>` as a JSON object
/// mapping document ids to documents. Every mutation rewrites the whole blob
/// before returning.
pub struct LocalBackend {
    medium: Arc<dyn StorageMedium>,
    scope_prefix: String,
    // Serializes read-modify-write cycles on collection blobs.
    lock: Mutex<()>,
}

impl LocalBackend {
    pub fn new(medium: Arc<dyn StorageMedium>, scope_prefix: impl Into<String>) -> Self {
        Self {
            medium,
            scope_prefix: scope_prefix.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn medium(&self) -> &Arc<dyn StorageMedium> {
        &self.medium
    }

    fn storage_key(&self, collection: &str) -> String {
        format!("{}{}", self.scope_prefix, collection)
    }

    /// Loads a collection blob. Text that does not parse is discarded and
    /// the key reinitialized to an empty collection.
    fn load(&self, collection: &str) -> StoreResult<CollectionData> {
        let key = self.storage_key(collection);
        let Some(text) = self.medium.get_item(&key)? else {
            return Ok(CollectionData::new());
        };

        match serde_json::from_str::<CollectionData>(&text) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!("Corrupt data under '{key}', resetting collection to empty: {e}");
                self.medium.set_item(&key, "{}")?;
                Ok(CollectionData::new())
            }
        }
    }

    fn save(&self, collection: &str, data: &CollectionData) -> StoreResult<()> {
        let key = self.storage_key(collection);
        let text = serde_json::to_string(data)?;
        self.medium.set_item(&key, &text)
    }

    fn snapshots(data: CollectionData) -> Vec<DocumentSnapshot> {
        data.into_iter()
            .map(|(id, doc)| DocumentSnapshot::new(id, Some(doc)))
            .collect()
    }
}

#[async_trait]
impl DocumentBackend for LocalBackend {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<DocumentSnapshot> {
        let _guard = self.lock.lock();
        let mut data = self.load(collection)?;
        Ok(DocumentSnapshot::new(id, data.remove(id)))
    }

    async fn set_document(&self, collection: &str, id: &str, mut doc: Document) -> StoreResult<()> {
        let _guard = self.lock.lock();
        let mut data = self.load(collection)?;

        doc.insert(ID_FIELD.to_string(), JsonValue::String(id.to_string()));
        data.insert(id.to_string(), doc);

        self.save(collection, &data)?;
        debug!("Set document {collection}/{id}");
        Ok(())
    }

    async fn update_document(&self, collection: &str, id: &str, partial: Document) -> StoreResult<()> {
        let _guard = self.lock.lock();
        let mut data = self.load(collection)?;

        let existing = data
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        merge(existing, partial);

        self.save(collection, &data)?;
        debug!("Updated document {collection}/{id}");
        Ok(())
    }

    async fn update_document_if(
        &self,
        collection: &str,
        id: &str,
        precondition: &Condition,
        partial: Document,
    ) -> StoreResult<bool> {
        let _guard = self.lock.lock();
        let mut data = self.load(collection)?;

        let existing = data
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        if !precondition.matches(existing) {
            debug!("Precondition on {collection}/{id} not met, update skipped");
            return Ok(false);
        }
        merge(existing, partial);

        self.save(collection, &data)?;
        debug!("Conditionally updated document {collection}/{id}");
        Ok(true)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let _guard = self.lock.lock();
        let mut data = self.load(collection)?;

        if data.remove(id).is_some() {
            self.save(collection, &data)?;
            debug!("Deleted document {collection}/{id}");
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> StoreResult<QuerySnapshot> {
        let _guard = self.lock.lock();
        let data = self.load(collection)?;
        Ok(QuerySnapshot::new(Self::snapshots(data)))
    }

    async fn run_query(&self, collection: &str, conditions: &[Condition]) -> StoreResult<QuerySnapshot> {
        let _guard = self.lock.lock();
        let mut data = self.load(collection)?;
        data.retain(|_, doc| matches_all(conditions, doc));
        Ok(QuerySnapshot::new(Self::snapshots(data)))
    }

    async fn clear_collection(&self, collection: &str) -> StoreResult<()> {
        let _guard = self.lock.lock();
        self.medium.remove_item(&self.storage_key(collection))?;
        Ok(())
    }

    fn generate_id(&self) -> String {
        generate_id()
    }
}

/// Shallow merge that never rewrites the id field.
fn merge(existing: &mut Document, partial: Document) {
    for (field, value) in partial {
        if field != ID_FIELD {
            existing.insert(field, value);
        }
    }
}

/// `mock-<unix millis>-<9 random base36-ish chars>`.
///
/// Unique with overwhelming probability; collisions are not detected.
pub fn generate_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("mock-{millis}-{}", &random[..9])
}
