//! Scoped string-keyed, string-valued persistent maps.
//!
//! The store keeps one serialized blob per collection under a single key, so
//! a medium only needs whole-value get/set/remove. [`LmdbMedium`] persists to
//! an LMDB environment on disk and survives process restarts;
//! [`MemoryMedium`] lives as long as its last clone.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};

pub trait StorageMedium: Send + Sync {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;
    /// Returns whether the key was present.
    fn remove_item(&self, key: &str) -> StoreResult<bool>;
    /// Removes every key in the medium.
    fn clear(&self) -> StoreResult<()>;
}

struct LmdbHandle {
    env: Environment,
    db: Database,
}

/// LMDB-backed medium. The environment lives in `<name>.lmdb/`.
pub struct LmdbMedium {
    path: PathBuf,
    handle: RwLock<Option<LmdbHandle>>,
}

impl LmdbMedium {
    pub fn open(name: &str, map_size: usize) -> StoreResult<Self> {
        let path = PathBuf::from(format!("{name}.lmdb"));
        std::fs::create_dir_all(&path)?;

        info!("Opening LMDB environment at {}", path.display());
        let handle = Self::open_handle(&path, map_size)?;

        Ok(Self {
            path,
            handle: RwLock::new(Some(handle)),
        })
    }

    fn open_handle(path: &Path, map_size: usize) -> StoreResult<LmdbHandle> {
        let env = Environment::new()
            .set_map_size(map_size)
            .set_max_dbs(1)
            .open(path)?;
        let db = env.create_db(None, DatabaseFlags::empty())?;
        Ok(LmdbHandle { env, db })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops the environment. Later calls fail until the medium is reopened.
    pub fn close(&self) -> StoreResult<()> {
        match self.handle.write().take() {
            Some(handle) => {
                if let Err(e) = handle.env.sync(true) {
                    warn!("Failed to sync LMDB environment before close: {e}");
                }
                info!("LMDB environment at {} closed", self.path.display());
            }
            None => debug!("LMDB environment at {} already closed", self.path.display()),
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.handle.read().is_some()
    }

    fn with_handle<T>(&self, f: impl FnOnce(&LmdbHandle) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.handle.read();
        match guard.as_ref() {
            Some(handle) => f(handle),
            None => Err(StoreError::Storage(format!(
                "database at {} is closed",
                self.path.display()
            ))),
        }
    }
}

impl StorageMedium for LmdbMedium {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_handle(|h| {
            let txn = h.env.begin_ro_txn()?;
            let value = match txn.get(h.db, &key) {
                Ok(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                Err(lmdb::Error::NotFound) => None,
                Err(e) => return Err(e.into()),
            };
            txn.abort();
            Ok(value)
        })
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_handle(|h| {
            let mut txn = h.env.begin_rw_txn()?;
            txn.put(h.db, &key, &value, WriteFlags::empty())?;
            txn.commit()?;
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> StoreResult<bool> {
        self.with_handle(|h| {
            let mut txn = h.env.begin_rw_txn()?;
            match txn.del(h.db, &key, None) {
                Ok(()) => {
                    txn.commit()?;
                    Ok(true)
                }
                Err(lmdb::Error::NotFound) => {
                    txn.abort();
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn clear(&self) -> StoreResult<()> {
        self.with_handle(|h| {
            let mut txn = h.env.begin_rw_txn()?;
            txn.clear_db(h.db)?;
            txn.commit()?;
            Ok(())
        })
    }
}

/// In-memory medium. Clones share the same map, so two stores built from
/// clones of one medium observe each other's writes.
#[derive(Clone, Default)]
pub struct MemoryMedium {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<bool> {
        Ok(self.items.write().remove(key).is_some())
    }

    fn clear(&self) -> StoreResult<()> {
        self.items.write().clear();
        Ok(())
    }
}
