//! Browser WASM bindings using wasm-bindgen and IndexedDB storage
//!
//! One [`ImageStore`] per page, created by the first [`get_instance`] call and
//! shared by every [`PictureStore`] handle after that. Later calls ignore their
//! arguments: the database name, version and collection are fixed once the
//! store exists.
//!
//! Async methods return JS Promises built with `future_to_promise`, so each
//! call owns an `Rc` of the store for as long as its operation runs.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Promise;
use picturedb_core::{ImageBytes, ImageId, ImageStore, StoreConfig, StoreError, StoreResult};
use picturedb_indexeddb::convert::record_to_js;
use picturedb_indexeddb::IndexedDbFactory;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::Blob;

use crate::source::BlobSource;

type BrowserStore = ImageStore<IndexedDbFactory>;

// WASM is single-threaded; Rc<RefCell<>> is enough to share across async boundaries
thread_local! {
    static STORE: RefCell<Option<Rc<BrowserStore>>> = RefCell::new(None);
}

/// The page's store, created from `config` on first use.
///
/// Subsequent calls return the existing store whatever `config` says.
pub fn shared_store(config: StoreConfig) -> StoreResult<Rc<BrowserStore>> {
    STORE.with(|s| {
        let mut s = s.borrow_mut();
        if let Some(store) = s.as_ref() {
            if store.config() != &config {
                debug!(
                    requested = ?config,
                    active = ?store.config(),
                    "store already created; ignoring new parameters"
                );
            }
            return Ok(store.clone());
        }

        let store = Rc::new(ImageStore::new(IndexedDbFactory::new(), config)?);
        *s = Some(store.clone());
        Ok(store)
    })
}

/// Get the page's image store, creating it on the first call.
///
/// Missing arguments take the defaults `"PictureDB"`, `1`, `"images"`.
#[wasm_bindgen(js_name = getInstance)]
pub fn get_instance(
    database_name: Option<String>,
    database_version: Option<u32>,
    collection_name: Option<String>,
) -> Result<PictureStore, JsValue> {
    // Route Rust panics to console.error instead of "RuntimeError: unreachable"
    console_error_panic_hook::set_once();

    let defaults = StoreConfig::default();
    let config = StoreConfig {
        database_name: database_name.unwrap_or(defaults.database_name),
        database_version: database_version.unwrap_or(defaults.database_version),
        collection_name: collection_name.unwrap_or(defaults.collection_name),
    };

    let inner = shared_store(config).map_err(to_js_error)?;
    Ok(PictureStore { inner })
}

/// JS handle to the page's image store.
#[wasm_bindgen]
pub struct PictureStore {
    inner: Rc<BrowserStore>,
}

#[wasm_bindgen]
impl PictureStore {
    /// Open the database. Await before any other call.
    pub fn initialize(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            store.initialize().await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Store raw bytes. Resolves with the new record id.
    #[wasm_bindgen(js_name = addImage)]
    pub fn add_image(&self, bytes: Vec<u8>, mime_type: Option<String>) -> Promise {
        let store = self.inner.clone();
        let source = match mime_type {
            Some(mime) => ImageBytes::with_mime_type(bytes, mime),
            None => ImageBytes::new(bytes),
        };
        future_to_promise(async move {
            let id = store.add_image(&source).await.map_err(to_js_error)?;
            Ok(id_to_js(id))
        })
    }

    /// Store a `File`/`Blob`. Resolves with the new record id.
    #[wasm_bindgen(js_name = addImageFile)]
    pub fn add_image_file(&self, file: Blob) -> Promise {
        let store = self.inner.clone();
        let source = BlobSource::new(file);
        future_to_promise(async move {
            let id = store.add_image(&source).await.map_err(to_js_error)?;
            Ok(id_to_js(id))
        })
    }

    /// All records as `[{ id, data }]`, in id order.
    #[wasm_bindgen(js_name = getImages)]
    pub fn get_images(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let records = store.get_images().await.map_err(to_js_error)?;
            let array = js_sys::Array::new();
            for record in &records {
                let obj = record_to_js(record).map_err(|e| to_js_error(e.into_read()))?;
                array.push(&obj);
            }
            Ok(array.into())
        })
    }

    /// Delete a record by id; unknown ids are ignored.
    #[wasm_bindgen(js_name = removeImage)]
    pub fn remove_image(&self, id: f64) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let id = js_to_id(id).map_err(to_js_error)?;
            store.remove_image(id).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Number of stored records.
    #[wasm_bindgen(js_name = countImages)]
    pub fn count_images(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let count = store.count_images().await.map_err(to_js_error)?;
            Ok(JsValue::from_f64(count as f64))
        })
    }

    /// Delete every record.
    #[wasm_bindgen(js_name = clearImages)]
    pub fn clear_images(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            store.clear_images().await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Close the connection; `initialize()` reopens it.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Name of the database this store opens.
    #[wasm_bindgen(getter, js_name = databaseName)]
    pub fn database_name(&self) -> String {
        self.inner.config().database_name.clone()
    }

    /// Schema version this store opens.
    #[wasm_bindgen(getter, js_name = databaseVersion)]
    pub fn database_version(&self) -> u32 {
        self.inner.config().database_version
    }

    /// Collection holding the images.
    #[wasm_bindgen(getter, js_name = collectionName)]
    pub fn collection_name(&self) -> String {
        self.inner.config().collection_name.clone()
    }

    /// Lifecycle state: "Uninitialized", "Opening", "Ready", "Failed" or "Closed".
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        format!("{:?}", self.inner.state())
    }
}

/// Check if the page's store has been created.
#[wasm_bindgen(js_name = hasInstance)]
pub fn has_instance() -> bool {
    STORE.with(|s| s.borrow().is_some())
}

/// Get the picturedb-wasm version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// JS `Error` named after the error kind, so callers can branch on `err.name`.
fn to_js_error(err: StoreError) -> JsValue {
    let js_err = js_sys::Error::new(&err.to_string());
    js_err.set_name(err.kind());
    js_err.into()
}

fn id_to_js(id: ImageId) -> JsValue {
    JsValue::from_f64(id as f64)
}

/// JS numbers are doubles; only integral values are valid keys.
fn js_to_id(id: f64) -> StoreResult<ImageId> {
    if !id.is_finite() || id.fract() != 0.0 {
        return Err(StoreError::Delete(format!(
            "DataError: {} is not a valid image id",
            id
        )));
    }
    Ok(id as ImageId)
}
