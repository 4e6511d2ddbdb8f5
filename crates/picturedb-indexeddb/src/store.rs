//! IndexedDB backend implementing the PictureDB store contract.
//!
//! Each handle method runs exactly one request in its own transaction. Writes
//! await the transaction's `complete` event; reads return on request success.

use std::fmt;

use picturedb_core::{ImageId, Record, Schema, StoreFactory, StoreHandle, StoreResult};
use wasm_bindgen::JsValue;
use web_sys::{IdbDatabase, IdbTransactionMode};

use crate::convert::{js_to_records, record_to_js};
use crate::error::IndexedDbError;
use crate::idb;

/// Opens IndexedDB connections from the global `indexedDB` factory.
///
/// Holds no state; the factory is looked up at open time, so constructing one
/// outside a browser is fine.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbFactory;

impl IndexedDbFactory {
    pub fn new() -> Self {
        Self
    }

    /// Drop `name` entirely. Used for teardown between test runs.
    pub async fn delete_database(name: &str) -> crate::Result<()> {
        idb::delete_database(name).await
    }
}

impl StoreFactory for IndexedDbFactory {
    type Handle = IndexedDbHandle;

    async fn open(&self, name: &str, version: u32, schema: &Schema) -> StoreResult<Self::Handle> {
        let db = idb::open_database(name, version, &schema.collection)
            .await
            .map_err(|e| e.into_open())?;
        let on_versionchange = idb::watch_version_change(&db);
        Ok(IndexedDbHandle {
            db,
            _on_versionchange: on_versionchange,
        })
    }
}

/// An open IndexedDB connection.
///
/// Yields to other connections: a `versionchange` from another tab or worker
/// closes it, after which operations fail with `InvalidStateError`.
pub struct IndexedDbHandle {
    db: IdbDatabase,
    _on_versionchange: idb::EventClosure,
}

impl fmt::Debug for IndexedDbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedDbHandle")
            .field("name", &self.db.name())
            .field("version", &self.db.version())
            .finish()
    }
}

impl Drop for IndexedDbHandle {
    fn drop(&mut self) {
        idb::unwatch_version_change(&self.db);
        self.db.close();
    }
}

impl StoreHandle for IndexedDbHandle {
    async fn add(&self, collection: &str, record: &Record) -> StoreResult<()> {
        let js_val = record_to_js(record).map_err(|e| e.into_write())?;

        let (tx, store) =
            idb::begin_transaction(&self.db, collection, IdbTransactionMode::Readwrite)
                .map_err(|e| e.into_write())?;
        let done = idb::watch_transaction(&tx);

        let req = match store.add(&js_val) {
            Ok(req) => req,
            Err(e) => {
                // Nothing was queued; let the empty transaction finish first
                let _ = idb::await_transaction(done).await;
                return Err(IndexedDbError::from(e).into_write());
            }
        };
        idb::await_write(&req, done).await.map_err(|e| e.into_write())
    }

    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let (_tx, store) =
            idb::begin_transaction(&self.db, collection, IdbTransactionMode::Readonly)
                .map_err(|e| e.into_read())?;

        let req = store
            .get_all()
            .map_err(|e| IndexedDbError::from(e).into_read())?;
        let result = idb::await_request(&req).await.map_err(|e| e.into_read())?;

        js_to_records(&result).map_err(|e| e.into_read())
    }

    async fn count(&self, collection: &str) -> StoreResult<usize> {
        let (_tx, store) =
            idb::begin_transaction(&self.db, collection, IdbTransactionMode::Readonly)
                .map_err(|e| e.into_read())?;

        let req = store
            .count()
            .map_err(|e| IndexedDbError::from(e).into_read())?;
        let result = idb::await_request(&req).await.map_err(|e| e.into_read())?;

        result.as_f64().map(|n| n as usize).ok_or_else(|| {
            IndexedDbError::Request("count() did not return a number".into()).into_read()
        })
    }

    async fn delete(&self, collection: &str, id: ImageId) -> StoreResult<()> {
        let (tx, store) =
            idb::begin_transaction(&self.db, collection, IdbTransactionMode::Readwrite)
                .map_err(|e| e.into_delete())?;
        let done = idb::watch_transaction(&tx);

        let key = JsValue::from_f64(id as f64);
        let req = match store.delete(&key) {
            Ok(req) => req,
            Err(e) => {
                let _ = idb::await_transaction(done).await;
                return Err(IndexedDbError::from(e).into_delete());
            }
        };
        idb::await_write(&req, done).await.map_err(|e| e.into_delete())
    }

    async fn clear(&self, collection: &str) -> StoreResult<()> {
        let (tx, store) =
            idb::begin_transaction(&self.db, collection, IdbTransactionMode::Readwrite)
                .map_err(|e| e.into_delete())?;
        let done = idb::watch_transaction(&tx);

        let req = match store.clear() {
            Ok(req) => req,
            Err(e) => {
                let _ = idb::await_transaction(done).await;
                return Err(IndexedDbError::from(e).into_delete());
            }
        };
        idb::await_write(&req, done).await.map_err(|e| e.into_delete())
    }

    fn close(&self) {
        idb::unwatch_version_change(&self.db);
        self.db.close();
    }
}
