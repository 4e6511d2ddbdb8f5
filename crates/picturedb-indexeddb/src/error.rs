//! IndexedDB backend errors and their mapping onto `StoreError`

use picturedb_core::StoreError;
use thiserror::Error;
use wasm_bindgen::JsCast;

/// Result of a low-level IndexedDB call
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// What went wrong at the IndexedDB layer.
///
/// Each variant carries the browser's own description. Store operations turn
/// these into the operation's `StoreError` kind with the `into_*` methods.
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// No `indexedDB` global (non-browser host, disabled storage)
    #[error("indexedDB unavailable: {0}")]
    NotAvailable(String),

    /// Open request or schema upgrade failed
    #[error("open failed: {0}")]
    Open(String),

    /// Transaction could not start, aborted, or failed to commit
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// A request fired `error`
    #[error("request failed: {0}")]
    Request(String),

    /// A stored value did not have the `{ id, data }` shape
    #[error("malformed record: {0}")]
    Convert(String),
}

impl From<wasm_bindgen::JsValue> for IndexedDbError {
    fn from(thrown: wasm_bindgen::JsValue) -> Self {
        IndexedDbError::Request(describe_js(&thrown))
    }
}

/// Human-readable description of a thrown JS value.
///
/// DOMExceptions and Errors serialize to `{}`, so they are rendered as
/// "Name: message" the way browsers print them.
pub(crate) fn describe_js(val: &wasm_bindgen::JsValue) -> String {
    if let Some(s) = val.as_string() {
        return s;
    }
    if let Some(e) = val.dyn_ref::<web_sys::DomException>() {
        return format!("{}: {}", e.name(), e.message());
    }
    if let Some(e) = val.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", String::from(e.name()), String::from(e.message()));
    }
    js_sys::JSON::stringify(val)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", val))
}

impl IndexedDbError {
    /// Description without the backend prefix.
    fn into_description(self) -> String {
        match self {
            IndexedDbError::NotAvailable(msg)
            | IndexedDbError::Open(msg)
            | IndexedDbError::Transaction(msg)
            | IndexedDbError::Request(msg)
            | IndexedDbError::Convert(msg) => msg,
        }
    }

    /// Classify as a failed open.
    pub fn into_open(self) -> StoreError {
        match self {
            IndexedDbError::NotAvailable(msg) => StoreError::NotAvailable(msg),
            other => StoreError::StoreOpen(other.into_description()),
        }
    }

    /// Classify as a failed add.
    pub fn into_write(self) -> StoreError {
        StoreError::Write(self.into_description())
    }

    /// Classify as a failed read.
    pub fn into_read(self) -> StoreError {
        StoreError::Read(self.into_description())
    }

    /// Classify as a failed delete.
    pub fn into_delete(self) -> StoreError {
        StoreError::Delete(self.into_description())
    }
}
