//! Collection / document / query handles.
//!
//! A [`Store`] is a cheap, cloneable handle over a [`DocumentBackend`]. It is
//! passed explicitly to whatever needs it; there is no process-wide
//! instance.
//!
//! ```rust
//! use offline_docstore::store::Store;
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let store = Store::in_memory();
//! let users = store.collection("users");
//!
//! users.doc("teacher-1").set(&json!({"role": "teacher", "status": "approved"})).await?;
//! users.doc("teacher-2").set(&json!({"role": "teacher", "status": "pending"})).await?;
//!
//! let approved = users
//!     .where_("role", "==", "teacher")?
//!     .where_("status", "==", "approved")?
//!     .get()
//!     .await?;
//! assert_eq!(approved.len(), 1);
//! assert_eq!(approved.docs[0].id, "teacher-1");
//! # Ok::<(), offline_docstore::error::StoreError>(())
//! # }).unwrap();
//! ```

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::backend::{DocumentBackend, LocalBackend};
use crate::config::{MediumKind, StoreConfig, DEFAULT_SCOPE_PREFIX};
use crate::document::{to_document, DocumentSnapshot, QuerySnapshot};
use crate::error::{StoreError, StoreResult};
use crate::query::{Condition, Operator};
use crate::storage_medium::{LmdbMedium, MemoryMedium, StorageMedium};

/// Builds the storage medium named by the configuration.
pub fn open_medium(config: &StoreConfig) -> StoreResult<Arc<dyn StorageMedium>> {
    match config.medium {
        MediumKind::Lmdb => Ok(Arc::new(LmdbMedium::open(&config.name, config.map_size)?)),
        MediumKind::Memory => Ok(Arc::new(MemoryMedium::new())),
    }
}

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentBackend>,
}

impl Store {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Opens a local store as described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let medium = open_medium(config)?;
        info!("Document store '{}' opened ({:?} medium)", config.name, config.medium);
        Ok(Self::from_medium(medium, &config.scope_prefix))
    }

    pub fn from_medium(medium: Arc<dyn StorageMedium>, scope_prefix: &str) -> Self {
        Self::new(Arc::new(LocalBackend::new(medium, scope_prefix)))
    }

    /// A fresh, unshared in-memory store.
    pub fn in_memory() -> Self {
        Self::from_medium(Arc::new(MemoryMedium::new()), DEFAULT_SCOPE_PREFIX)
    }

    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    pub fn collection(&self, name: &str) -> CollectionRef {
        if name.contains('/') {
            warn!("Collection name '{name}' contains '/', it cannot be addressed by path");
        }
        CollectionRef {
            backend: Arc::clone(&self.backend),
            name: name.to_string(),
        }
    }

    /// Resolves a `"<collection>/<id>"` path.
    pub fn doc(&self, path: &str) -> StoreResult<DocumentRef> {
        match path.split_once('/') {
            Some((collection, id))
                if !collection.is_empty() && !id.is_empty() && !id.contains('/') =>
            {
                Ok(self.collection(collection).doc(id))
            }
            _ => Err(StoreError::InvalidPath(path.to_string())),
        }
    }

    /// Drops every document of a collection by removing its storage key.
    pub async fn clear_collection(&self, name: &str) -> StoreResult<()> {
        self.backend.clear_collection(name).await
    }
}

#[derive(Clone)]
pub struct CollectionRef {
    backend: Arc<dyn DocumentBackend>,
    name: String,
}

impl CollectionRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self, id: &str) -> DocumentRef {
        DocumentRef {
            backend: Arc::clone(&self.backend),
            collection: self.name.clone(),
            id: id.to_string(),
        }
    }

    /// Handle for a document under a freshly generated id.
    pub fn new_doc(&self) -> DocumentRef {
        let id = self.backend.generate_id();
        self.doc(&id)
    }

    pub async fn add<T: Serialize + ?Sized>(&self, data: &T) -> StoreResult<DocumentRef> {
        let doc_ref = self.new_doc();
        doc_ref.set(data).await?;
        Ok(doc_ref)
    }

    /// Every document in the collection.
    pub async fn get(&self) -> StoreResult<QuerySnapshot> {
        self.backend.list_documents(&self.name).await
    }

    /// Starts a query. `op` is the textual operator (`"=="`, `"array-contains"`, ...).
    pub fn where_(&self, field: &str, op: &str, value: impl Into<JsonValue>) -> StoreResult<Query> {
        self.query().where_(field, op, value)
    }

    pub fn query(&self) -> Query {
        Query {
            backend: Arc::clone(&self.backend),
            collection: self.name.clone(),
            conditions: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct DocumentRef {
    backend: Arc<dyn DocumentBackend>,
    collection: String,
    id: String,
}

impl DocumentRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    pub async fn get(&self) -> StoreResult<DocumentSnapshot> {
        self.backend.get_document(&self.collection, &self.id).await
    }

    pub async fn set<T: Serialize + ?Sized>(&self, data: &T) -> StoreResult<()> {
        let doc = to_document(data)?;
        self.backend.set_document(&self.collection, &self.id, doc).await
    }

    pub async fn update<T: Serialize + ?Sized>(&self, partial: &T) -> StoreResult<()> {
        let doc = to_document(partial)?;
        self.backend.update_document(&self.collection, &self.id, doc).await
    }

    /// Shallow-merges `partial` only while `precondition` holds on the stored
    /// document. Returns whether the write happened.
    pub async fn update_if<T: Serialize + ?Sized>(
        &self,
        precondition: &Condition,
        partial: &T,
    ) -> StoreResult<bool> {
        let doc = to_document(partial)?;
        self.backend
            .update_document_if(&self.collection, &self.id, precondition, doc)
            .await
    }

    pub async fn delete(&self) -> StoreResult<()> {
        self.backend.delete_document(&self.collection, &self.id).await
    }
}

/// Chain of conditions over one collection, combined with AND.
#[derive(Clone)]
pub struct Query {
    backend: Arc<dyn DocumentBackend>,
    collection: String,
    conditions: Vec<Condition>,
}

impl Query {
    pub fn where_(self, field: &str, op: &str, value: impl Into<JsonValue>) -> StoreResult<Self> {
        let operator: Operator = op.parse()?;
        Ok(self.filter(Condition::new(field, operator, value)))
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub async fn get(&self) -> StoreResult<QuerySnapshot> {
        self.backend.run_query(&self.collection, &self.conditions).await
    }
}
