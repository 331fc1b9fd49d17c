//! C-compatible surface for host UIs.
//!
//! Every function returns a JSON [`AppResponse`] envelope as a heap C string
//! that must be released with [`docstore_free_string`]. The store's async
//! operations are driven to completion on the calling thread.
//!
//! ```no_run
//! use std::ffi::CString;
//! use offline_docstore::ffi::{docstore_open, docstore_set, docstore_get, docstore_free_string};
//!
//! let config = CString::new(r#"{"name":"booking","seed_demo_data":true}"#).unwrap();
//! let state = docstore_open(config.as_ptr());
//!
//! let path = CString::new("users/student-1").unwrap();
//! let data = CString::new(r#"{"name":"Ana","role":"student"}"#).unwrap();
//! docstore_free_string(docstore_set(state, path.as_ptr(), data.as_ptr()));
//!
//! let result = docstore_get(state, path.as_ptr());
//! docstore_free_string(result);
//! ```

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use futures::executor::block_on;
use log::{info, warn};
use serde_json::{json, Value as JsonValue};

use crate::app_response::AppResponse;
use crate::config::StoreConfig;
use crate::credentials::CredentialStore;
use crate::document::{DocumentSnapshot, QuerySnapshot};
use crate::error::StoreResult;
use crate::query::Condition;
use crate::seed::seed_demo_data;
use crate::store::{open_medium, Store};

/// Everything a host process holds on to between calls.
pub struct DocStoreState {
    pub config: StoreConfig,
    pub store: Store,
    pub credentials: CredentialStore,
}

impl DocStoreState {
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let medium = open_medium(&config)?;
        let store = Store::from_medium(medium.clone(), &config.scope_prefix);
        let credentials = CredentialStore::new(medium, &config.scope_prefix)?;

        if config.seed_demo_data && block_on(seed_demo_data(&store, &credentials))? {
            info!("Demo data seeded into '{}'", config.name);
        }

        Ok(Self {
            config,
            store,
            credentials,
        })
    }
}

fn snapshot_json(snapshot: DocumentSnapshot) -> JsonValue {
    let exists = snapshot.exists();
    let id = snapshot.id.clone();
    json!({
        "id": id,
        "exists": exists,
        "data": snapshot.into_data(),
    })
}

fn query_json(snapshot: QuerySnapshot) -> JsonValue {
    let docs: Vec<JsonValue> = snapshot.into_iter().map(snapshot_json).collect();
    json!({ "empty": docs.is_empty(), "docs": docs })
}

/// Opens (or creates) a store from a JSON [`StoreConfig`].
///
/// With the LMDB medium the environment lives in `<name>.lmdb/`. When
/// `seed_demo_data` is set, sample teachers and admins are written on the
/// first open of the scope.
///
/// # Parameters
///
/// * `config_json` - A null-terminated C string holding a [`StoreConfig`]
///   object. Missing fields take their defaults.
///
/// # Returns
///
/// A pointer to the [`DocStoreState`] on success, or a null pointer on
/// failure. Release it with [`docstore_close`].
///
/// # Safety
///
/// `config_json` must be null or point to a valid null-terminated string.
/// The returned pointer must not be used after [`docstore_close`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use offline_docstore::ffi::{docstore_close, docstore_free_string, docstore_open};
///
/// let config = CString::new(r#"{"name":"campus","medium":"memory"}"#).unwrap();
/// let state = docstore_open(config.as_ptr());
///
/// if !state.is_null() {
///     docstore_free_string(docstore_close(state));
/// }
/// ```
///
/// # Errors
///
/// Returns null pointer if:
/// - The config pointer is null or not valid UTF-8
/// - The config is not valid JSON or names an unknown medium
/// - The medium cannot be opened or seeding fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_open(config_json: *const c_char) -> *mut DocStoreState {
    let text = match c_ptr_to_string(config_json, "config") {
        Ok(text) => text,
        Err(e) => {
            warn!("docstore_open: {e}");
            return std::ptr::null_mut();
        }
    };

    let config = match StoreConfig::from_json_str(&text) {
        Ok(config) => config,
        Err(e) => {
            warn!("docstore_open: invalid configuration: {e}");
            return std::ptr::null_mut();
        }
    };

    match DocStoreState::open(config) {
        Ok(state) => Box::into_raw(Box::new(state)),
        Err(e) => {
            warn!("docstore_open: failed to open store: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Replaces the document at `path` (`"<collection>/<id>"`) with `json`.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`docstore_open`]
/// * `path` - Document path as a null-terminated C string
/// * `json_ptr` - A JSON object; its `id` field is overwritten with the path id
///
/// # Returns
///
/// `{"Ok": {"id": ...}}` on success.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`docstore_open`]; the string
/// pointers must be null or valid null-terminated strings.
///
/// # Errors
///
/// - `BadRequest` for null pointers, invalid UTF-8 or a malformed path
/// - `SerializationError` when `json_ptr` is not JSON
/// - `ValidationError` when the JSON is not an object
/// - `DatabaseError` when the write fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_set(
    state: *mut DocStoreState,
    path: *const c_char,
    json_ptr: *const c_char,
) -> *mut c_char {
    respond(state, |s| {
        let path = c_ptr_to_string(path, "path")?;
        let data = parse_json(json_ptr)?;
        let doc_ref = s.store.doc(&path)?;
        block_on(doc_ref.set(&data))?;
        Ok(json!({ "id": doc_ref.id() }))
    })
}

/// Reads the document at `path`.
///
/// # Returns
///
/// `{"Ok": {"id", "exists", "data"}}`. An absent document is not an error:
/// `exists` is `false` and `data` is `null`.
///
/// # Safety
///
/// Same pointer requirements as [`docstore_set`].
///
/// # Errors
///
/// - `BadRequest` for null pointers, invalid UTF-8 or a malformed path
/// - `DatabaseError` when the read fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_get(state: *mut DocStoreState, path: *const c_char) -> *mut c_char {
    respond(state, |s| {
        let path = c_ptr_to_string(path, "path")?;
        let snapshot = block_on(s.store.doc(&path)?.get())?;
        Ok(snapshot_json(snapshot))
    })
}

/// Shallow-merges `json` into an existing document.
///
/// Top-level fields of `json` replace the stored ones; other fields are
/// kept. The `id` field is never changed.
///
/// # Safety
///
/// Same pointer requirements as [`docstore_set`].
///
/// # Errors
///
/// - `NotFound` when no document exists at `path`; nothing is written
/// - `BadRequest`, `SerializationError`, `ValidationError` as for [`docstore_set`]
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_update(
    state: *mut DocStoreState,
    path: *const c_char,
    json_ptr: *const c_char,
) -> *mut c_char {
    respond(state, |s| {
        let path = c_ptr_to_string(path, "path")?;
        let partial = parse_json(json_ptr)?;
        let doc_ref = s.store.doc(&path)?;
        block_on(doc_ref.update(&partial))?;
        Ok(json!({ "id": doc_ref.id() }))
    })
}

/// Removes the document at `path`. Deleting an absent document succeeds.
///
/// # Safety
///
/// Same pointer requirements as [`docstore_set`].
///
/// # Errors
///
/// - `BadRequest` for null pointers, invalid UTF-8 or a malformed path
/// - `DatabaseError` when the write fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_delete(state: *mut DocStoreState, path: *const c_char) -> *mut c_char {
    respond(state, |s| {
        let path = c_ptr_to_string(path, "path")?;
        let doc_ref = s.store.doc(&path)?;
        block_on(doc_ref.delete())?;
        Ok(json!({ "id": doc_ref.id() }))
    })
}

/// Adds a document under a generated id and returns that id.
///
/// # Returns
///
/// `{"Ok": {"id": "mock-<millis>-<random>"}}` on success.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`docstore_open`]; the string
/// pointers must be null or valid null-terminated strings.
///
/// # Errors
///
/// Same as [`docstore_set`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_add(
    state: *mut DocStoreState,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *mut c_char {
    respond(state, |s| {
        let collection = c_ptr_to_string(collection, "collection")?;
        let data = parse_json(json_ptr)?;
        let doc_ref = block_on(s.store.collection(&collection).add(&data))?;
        Ok(json!({ "id": doc_ref.id() }))
    })
}

/// Lists every document of a collection in ascending id order.
///
/// # Returns
///
/// `{"Ok": {"empty": bool, "docs": [...]}}`, each entry shaped like a
/// [`docstore_get`] result.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`docstore_open`];
/// `collection` must be null or a valid null-terminated string.
///
/// # Errors
///
/// - `BadRequest` for null pointers or invalid UTF-8
/// - `DatabaseError` when the read fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_list(state: *mut DocStoreState, collection: *const c_char) -> *mut c_char {
    respond(state, |s| {
        let collection = c_ptr_to_string(collection, "collection")?;
        let snapshot = block_on(s.store.collection(&collection).get())?;
        Ok(query_json(snapshot))
    })
}

/// Runs `conditions_json`, an array of `{"field", "operator", "value"}`
/// objects combined with AND, against a collection.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`docstore_open`]
/// * `collection` - Collection name
/// * `conditions_json` - e.g. `[{"field":"role","operator":"==","value":"teacher"}]`
///
/// # Returns
///
/// The same shape as [`docstore_list`], restricted to matching documents.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`docstore_open`]; the string
/// pointers must be null or valid null-terminated strings.
///
/// # Errors
///
/// - `BadRequest` for null pointers, invalid UTF-8, malformed conditions or
///   an unknown operator
/// - `DatabaseError` when the read fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_query(
    state: *mut DocStoreState,
    collection: *const c_char,
    conditions_json: *const c_char,
) -> *mut c_char {
    respond(state, |s| {
        let collection = c_ptr_to_string(collection, "collection")?;
        let text = c_ptr_to_string(conditions_json, "conditions")?;
        let conditions: Vec<Condition> = serde_json::from_str(&text)
            .map_err(|e| AppResponse::BadRequest(format!("Invalid conditions: {e}")))?;

        let query = conditions
            .into_iter()
            .fold(s.store.collection(&collection).query(), |q, c| q.filter(c));
        let snapshot = block_on(query.get())?;
        Ok(query_json(snapshot))
    })
}

/// Releases the state and closes its medium.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`docstore_open`]. It must
/// not be used after this call, and must not be closed twice.
///
/// # Errors
///
/// `BadRequest` when `state` is null.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_close(state: *mut DocStoreState) -> *mut c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to docstore_close".to_string());
        return response_to_c_string(&error);
    }

    let state = unsafe { Box::from_raw(state) };
    info!("Closing document store '{}'", state.config.name);
    drop(state);

    response_to_c_string(&AppResponse::success("Store closed successfully"))
}

/// Frees a string returned by any `docstore_*` function.
///
/// # Safety
///
/// `ptr` must be null or a string returned by this library that has not
/// been freed yet. Null is ignored.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn docstore_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

fn respond(
    state: *mut DocStoreState,
    f: impl FnOnce(&DocStoreState) -> Result<JsonValue, AppResponse>,
) -> *mut c_char {
    let Some(state) = (unsafe { state.as_ref() }) else {
        return response_to_c_string(&AppResponse::BadRequest("Null state pointer".to_string()));
    };

    match f(state) {
        Ok(value) => response_to_c_string(&AppResponse::Ok(value)),
        Err(response) => response_to_c_string(&response),
    }
}

fn parse_json(ptr: *const c_char) -> Result<JsonValue, AppResponse> {
    let text = c_ptr_to_string(ptr, "JSON")?;
    serde_json::from_str(&text)
        .map_err(|e| AppResponse::SerializationError(format!("Invalid JSON: {e}")))
}

/// Serializes the envelope into an owned C string; null if that fails.
fn response_to_c_string(response: &AppResponse) -> *mut c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null_mut();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null_mut()
        }
    }
}

fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, AppResponse> {
    if ptr.is_null() {
        return Err(AppResponse::BadRequest(format!("Null {field_name} pointer")));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => Err(AppResponse::BadRequest(format!(
            "Invalid UTF-8 in {field_name}: {e}"
        ))),
    }
}
