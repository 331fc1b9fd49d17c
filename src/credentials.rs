//! Emulated email/password authentication.
//!
//! Credentials live in a flat JSON array under their own storage key, apart
//! from the document collections; the signed-in user is persisted under a
//! second key so a reopened store restores the session.
//!
//! Passwords are kept in plaintext. This store is a development fixture for
//! running the booking flows offline and must not back real accounts.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::backend::generate_id;
use crate::error::{StoreError, StoreResult};
use crate::storage_medium::StorageMedium;

const CREDENTIALS_KEY: &str = "auth/users";
const SESSION_KEY: &str = "auth/session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub uid: String,
    pub email: String,
    pub password: String,
}

/// The authenticated user as seen by callers; never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
}

impl From<&CredentialRecord> for AuthUser {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            uid: record.uid.clone(),
            email: record.email.clone(),
            email_verified: true,
        }
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    medium: Arc<dyn StorageMedium>,
    credentials_key: String,
    session_key: String,
    current: Arc<RwLock<Option<AuthUser>>>,
}

impl CredentialStore {
    pub fn new(medium: Arc<dyn StorageMedium>, scope_prefix: &str) -> StoreResult<Self> {
        let session_key = format!("{scope_prefix}{SESSION_KEY}");
        let current = match medium.get_item(&session_key)? {
            Some(text) => match serde_json::from_str::<AuthUser>(&text) {
                Ok(user) => {
                    info!("Restored session for {}", user.email);
                    Some(user)
                }
                Err(e) => {
                    warn!("Discarding unreadable session record: {e}");
                    medium.remove_item(&session_key)?;
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            medium,
            credentials_key: format!("{scope_prefix}{CREDENTIALS_KEY}"),
            session_key,
            current: Arc::new(RwLock::new(current)),
        })
    }

    /// Reads the credential list, resetting it when it is not a JSON array
    /// of records.
    fn load(&self) -> StoreResult<Vec<CredentialRecord>> {
        let Some(text) = self.medium.get_item(&self.credentials_key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&text) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!("Credential list is unreadable, resetting to empty: {e}");
                self.medium.set_item(&self.credentials_key, "[]")?;
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, records: &[CredentialRecord]) -> StoreResult<()> {
        let text = serde_json::to_string(records)?;
        self.medium.set_item(&self.credentials_key, &text)
    }

    fn set_current(&self, user: Option<AuthUser>) -> StoreResult<()> {
        match &user {
            Some(u) => self.medium.set_item(&self.session_key, &serde_json::to_string(u)?)?,
            None => {
                self.medium.remove_item(&self.session_key)?;
            }
        }
        *self.current.write() = user;
        Ok(())
    }

    /// Registers a new account and signs it in.
    pub fn create_user(&self, email: &str, password: &str) -> StoreResult<AuthUser> {
        let mut records = self.load()?;
        if records.iter().any(|r| r.email == email) {
            return Err(StoreError::AlreadyExists(format!("account with email {email}")));
        }

        let record = CredentialRecord {
            uid: generate_id(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let user = AuthUser::from(&record);
        records.push(record);
        self.save(&records)?;

        info!("Created account {} for {}", user.uid, user.email);
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> StoreResult<AuthUser> {
        let records = self.load()?;
        let record = records
            .iter()
            .find(|r| r.email == email && r.password == password)
            .ok_or(StoreError::InvalidCredentials)?;

        let user = AuthUser::from(record);
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    pub fn sign_out(&self) -> StoreResult<()> {
        self.set_current(None)
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.current.read().clone()
    }

    /// Inserts or replaces the credential for `email`. Used for seeded accounts.
    pub fn upsert_credential(&self, uid: &str, email: &str, password: &str) -> StoreResult<()> {
        let mut records = self.load()?;
        records.retain(|r| r.email != email);
        records.push(CredentialRecord {
            uid: uid.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        });
        self.save(&records)
    }

    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<CredentialRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.email == email))
    }

    pub fn remove_credential(&self, uid: &str) -> StoreResult<bool> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.uid != uid);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }
}
