//! # Offline Docstore
//!
//! A local document store that imitates a cloud document database's
//! collection / document / query API on top of a string-keyed persistent
//! medium, plus the account, appointment and messaging flows of a
//! role-based (admin / teacher / student) booking application built on it.
//!
//! ## Features
//!
//! - **Collections of schemaless documents**: `collection(name).doc(id)`
//!   handles with `get`, `set`, `update` (shallow merge), `delete` and `add`
//! - **Chained queries**: `where_("status", "==", "approved")` filters with
//!   `==`, `!=`, `<`, `<=`, `>`, `>=` and `array-contains`
//! - **Swappable backends**: handles talk to an async [`backend::DocumentBackend`];
//!   the local backend persists to LMDB or memory
//! - **Self-healing storage**: unreadable blobs are reset to empty and logged
//! - **FFI surface**: C functions returning JSON envelopes, see [`ffi`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use offline_docstore::{Store, StoreConfig};
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let store = Store::open(&StoreConfig::lmdb("booking"))?;
//!
//! let appointments = store.collection("appointments");
//! let doc = appointments.add(&json!({"teacherId": "teacher-1", "status": "pending"})).await?;
//! doc.update(&json!({"status": "approved"})).await?;
//!
//! let snapshot = doc.get().await?;
//! assert_eq!(snapshot.get("status"), Some(&json!("approved")));
//! # Ok::<(), offline_docstore::StoreError>(())
//! # }).unwrap();
//! ```

pub mod accounts;
pub mod app_response;
pub mod appointments;
pub mod backend;
pub mod config;
pub mod credentials;
pub mod document;
pub mod error;
pub mod ffi;
pub mod messages;
pub mod models;
pub mod query;
pub mod seed;
pub mod storage_medium;
pub mod store;
mod test;

pub use crate::config::StoreConfig;
pub use crate::document::{Document, DocumentSnapshot, QuerySnapshot};
pub use crate::error::{StoreError, StoreResult};
pub use crate::store::{CollectionRef, DocumentRef, Query, Store};
