use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// JSON envelope handed back across the FFI boundary.
#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    NotFound(String),
    AlreadyExists(String),
    ValidationError(String),
    BadRequest(String),
    Ok(serde_json::Value),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(value) => write!(f, "Ok: {}", value),
        }
    }
}

impl From<StoreError> for AppResponse {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppResponse::NotFound(err.to_string()),
            StoreError::AlreadyExists(_) => AppResponse::AlreadyExists(err.to_string()),
            StoreError::InvalidPath(_) | StoreError::InvalidOperator(_) => {
                AppResponse::BadRequest(err.to_string())
            }
            StoreError::Validation(_)
            | StoreError::InvalidCredentials
            | StoreError::RoleMismatch { .. }
            | StoreError::PendingApproval(_)
            | StoreError::AccountRejected(_)
            | StoreError::InvalidTransition { .. } => AppResponse::ValidationError(err.to_string()),
            StoreError::Serialization(_) => AppResponse::SerializationError(err.to_string()),
            StoreError::Storage(_) => AppResponse::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppResponse {
    fn from(err: serde_json::Error) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl AppResponse {
    pub fn success(value: impl Into<serde_json::Value>) -> Self {
        AppResponse::Ok(value.into())
    }
}
