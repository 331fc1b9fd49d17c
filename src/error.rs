//! Error type shared by every layer of the store.
//!
//! Reads of absent documents are not errors (they yield a snapshot whose
//! [`exists`](crate::document::DocumentSnapshot::exists) is `false`); writes
//! that target an absent document are. Corrupted blobs never show up here:
//! they are repaired in place and logged.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("document '{id}' not found in collection '{collection}'")]
    NotFound { collection: String, id: String },

    #[error("invalid document path '{0}', expected '<collection>/<id>'")]
    InvalidPath(String),

    #[error("unsupported query operator '{0}'")]
    InvalidOperator(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("role mismatch: account is '{actual}', login requested '{requested}'")]
    RoleMismatch { requested: String, actual: String },

    #[error("account '{0}' is pending approval")]
    PendingApproval(String),

    #[error("account '{0}' was rejected by an administrator")]
    AccountRejected(String),

    #[error("cannot move appointment '{id}' from '{from}' to '{to}'")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl From<lmdb::Error> for StoreError {
    fn from(err: lmdb::Error) -> Self {
        match err {
            lmdb::Error::Corrupted => StoreError::Storage("database is corrupted".to_string()),
            lmdb::Error::MapFull => StoreError::Storage("map size exhausted".to_string()),
            _ => StoreError::Storage(format!("LMDB error: {err}")),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(format!("IO error: {err}"))
    }
}
