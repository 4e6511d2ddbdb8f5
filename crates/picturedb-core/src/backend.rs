//! Backend contract for the embedded key-value store
//!
//! A backend opens a named, versioned database (running the schema migration
//! when the version increases) and hands back a handle that performs one
//! operation per short-lived transaction. Implementations:
//! - Browser: `picturedb-indexeddb`
//! - Testing/native: [`MemoryFactory`](crate::memory::MemoryFactory)
//!
//! All futures are `!Send`: the store lives on a single-threaded event loop.
//!
//! Completion semantics every backend must honour:
//! - `add`, `delete` and `clear` resolve on transaction *complete* (commit),
//!   never merely on request success.
//! - `get_all` and `count` resolve on request success.
//! - Errors carry the operation's kind (`Write`, `Read`, `Delete`) and the
//!   description reported by the store.

use crate::error::StoreResult;
use crate::record::{ImageId, Record, KEY_PATH};

/// Schema applied by the migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Record collection created if absent
    pub collection: String,
    /// Primary key path inside each record
    pub key_path: &'static str,
}

impl Schema {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key_path: KEY_PATH,
        }
    }
}

/// Opens database connections.
#[allow(async_fn_in_trait)]
pub trait StoreFactory {
    type Handle: StoreHandle;

    /// Open (or create) `name` at `version`.
    ///
    /// On first creation or version increase the backend creates
    /// `schema.collection` if it does not already exist. Failures are
    /// reported as `StoreError::StoreOpen`.
    async fn open(&self, name: &str, version: u32, schema: &Schema) -> StoreResult<Self::Handle>;
}

/// An open database connection.
#[allow(async_fn_in_trait)]
pub trait StoreHandle {
    /// Insert a new record. A key collision is a `StoreError::Write`.
    async fn add(&self, collection: &str, record: &Record) -> StoreResult<()>;

    /// All records in ascending key order.
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>>;

    /// Number of records.
    async fn count(&self, collection: &str) -> StoreResult<usize>;

    /// Delete a record if present. Missing keys are not an error.
    async fn delete(&self, collection: &str, id: ImageId) -> StoreResult<()>;

    /// Delete every record.
    async fn clear(&self, collection: &str) -> StoreResult<()>;

    /// Close the connection. Later transactions fail.
    fn close(&self);
}
