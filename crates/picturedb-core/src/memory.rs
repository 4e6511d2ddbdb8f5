//! In-memory storage backend
//!
//! A HashMap/BTreeMap-based emulation of a versioned, transactional key-value
//! store. Useful for:
//! - Unit and integration testing on native targets
//! - Development without a browser
//!
//! It follows the event model of the browser store: each request settles its
//! own success/error event, and a readwrite transaction only applies its staged
//! operations when it completes. A failing request aborts the transaction.
//! Faults can be injected to exercise every error path.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tracing::debug;

use crate::backend::{Schema, StoreFactory, StoreHandle};
use crate::error::{StoreError, StoreResult};
use crate::pending::{event, EventSlot, Pending};
use crate::record::{ImageId, Record};

const CONSTRAINT_ERROR: &str = "ConstraintError: Key already exists in the object store.";
const ABORT_ERROR: &str = "AbortError: The transaction was aborted.";
const CLOSING_ERROR: &str = "InvalidStateError: The database connection is closing.";

/// Failure points that can be injected. Each injected fault fires once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// The open request errors
    Open,
    /// The next add request errors
    Add,
    /// The next read (getAll/count) request errors
    Read,
    /// The next delete/clear request errors
    Delete,
    /// The next readwrite transaction fails to commit after its request succeeded
    Commit,
}

type Collection = BTreeMap<ImageId, Record>;

#[derive(Debug, Default)]
struct Database {
    version: u32,
    upgrades: usize,
    collections: BTreeMap<String, Collection>,
}

#[derive(Debug, Default)]
struct Registry {
    databases: HashMap<String, Database>,
    faults: HashMap<Fault, String>,
    opens: usize,
}

impl Registry {
    fn take_fault(&mut self, fault: Fault) -> Option<String> {
        self.faults.remove(&fault)
    }
}

/// Factory for in-memory databases.
///
/// Clones share the same set of databases, so a second factory clone sees
/// what the first one persisted (like two tabs on the same origin).
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    registry: Rc<RefCell<Registry>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation at `fault` fail with `description`.
    pub fn inject_fault(&self, fault: Fault, description: impl Into<String>) {
        self.registry
            .borrow_mut()
            .faults
            .insert(fault, description.into());
    }

    /// Stored schema version of a database, if it exists.
    pub fn version(&self, name: &str) -> Option<u32> {
        self.registry
            .borrow()
            .databases
            .get(name)
            .map(|db| db.version)
    }

    /// How many times the migration step ran for a database.
    pub fn upgrade_count(&self, name: &str) -> usize {
        self.registry
            .borrow()
            .databases
            .get(name)
            .map(|db| db.upgrades)
            .unwrap_or(0)
    }

    /// Total number of open requests that reached the store.
    pub fn open_count(&self) -> usize {
        self.registry.borrow().opens
    }

    /// Collection names of a database, sorted.
    pub fn collections(&self, name: &str) -> Vec<String> {
        self.registry
            .borrow()
            .databases
            .get(name)
            .map(|db| db.collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Process an open request: version check, then migration if the version increased.
    fn process_open(&self, name: &str, version: u32, schema: &Schema) -> Result<(), String> {
        let mut registry = self.registry.borrow_mut();
        if let Some(description) = registry.take_fault(Fault::Open) {
            return Err(description);
        }
        if version == 0 {
            return Err("TypeError: The version provided must not be 0.".into());
        }
        registry.opens += 1;

        let db = registry.databases.entry(name.to_string()).or_default();
        if version < db.version {
            return Err(format!(
                "VersionError: The requested version ({}) is less than the existing version ({}).",
                version, db.version
            ));
        }
        if version > db.version {
            debug!(database = name, from = db.version, to = version, "upgrade needed");
            if !db.collections.contains_key(&schema.collection) {
                debug!(database = name, collection = %schema.collection, "creating collection");
                db.collections
                    .insert(schema.collection.clone(), Collection::new());
            }
            db.version = version;
            db.upgrades += 1;
        }
        Ok(())
    }
}

impl StoreFactory for MemoryFactory {
    type Handle = MemoryHandle;

    async fn open(&self, name: &str, version: u32, schema: &Schema) -> StoreResult<Self::Handle> {
        let (slot, pending) = event();
        match self.process_open(name, version, schema) {
            Ok(()) => slot.succeed(()),
            Err(description) => slot.fail(description),
        }
        pending.await.map_err(StoreError::StoreOpen)?;

        Ok(MemoryHandle {
            registry: self.registry.clone(),
            name: name.to_string(),
            closed: Cell::new(false),
        })
    }
}

/// An open in-memory database connection.
#[derive(Debug)]
pub struct MemoryHandle {
    registry: Rc<RefCell<Registry>>,
    name: String,
    closed: Cell<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ReadOnly,
    ReadWrite,
}

enum Op {
    Add(Record),
    Delete(ImageId),
    Clear,
}

/// A transaction scoped to one collection.
struct Transaction<'a> {
    handle: &'a MemoryHandle,
    collection: String,
    mode: Mode,
    staged: RefCell<Vec<Op>>,
    aborted: Cell<bool>,
    complete: EventSlot<()>,
}

impl MemoryHandle {
    /// Start a transaction; returns it with its completion event.
    fn transaction(&self, collection: &str, mode: Mode) -> Result<(Transaction<'_>, Pending<()>), String> {
        if self.closed.get() {
            return Err(CLOSING_ERROR.into());
        }
        let exists = self
            .registry
            .borrow()
            .databases
            .get(&self.name)
            .is_some_and(|db| db.collections.contains_key(collection));
        if !exists {
            return Err(format!(
                "NotFoundError: The object store '{}' was not found.",
                collection
            ));
        }

        let (complete, done) = event();
        Ok((
            Transaction {
                handle: self,
                collection: collection.to_string(),
                mode,
                staged: RefCell::new(Vec::new()),
                aborted: Cell::new(false),
                complete,
            },
            done,
        ))
    }
}

impl Transaction<'_> {
    fn with_committed<T>(&self, f: impl FnOnce(&Collection) -> T) -> Option<T> {
        let registry = self.handle.registry.borrow();
        registry
            .databases
            .get(&self.handle.name)
            .and_then(|db| db.collections.get(&self.collection))
            .map(f)
    }

    fn take_fault(&self, fault: Fault) -> Option<String> {
        self.handle.registry.borrow_mut().take_fault(fault)
    }

    /// Issue a request: `outcome` decides success or error, errors abort the transaction.
    fn request<T>(&self, outcome: Result<T, String>) -> Pending<T> {
        let (slot, pending) = event();
        match outcome {
            Ok(value) => slot.succeed(value),
            Err(description) => {
                self.aborted.set(true);
                slot.fail(description);
            }
        }
        pending
    }

    fn add(&self, record: &Record) -> Pending<()> {
        let outcome = match self.take_fault(Fault::Add) {
            Some(description) => Err(description),
            None => {
                let staged_dup = self.staged.borrow().iter().any(|op| match op {
                    Op::Add(r) => r.id == record.id,
                    _ => false,
                });
                let committed_dup = self
                    .with_committed(|c| c.contains_key(&record.id))
                    .unwrap_or(false);
                if staged_dup || committed_dup {
                    Err(CONSTRAINT_ERROR.to_string())
                } else {
                    self.staged.borrow_mut().push(Op::Add(record.clone()));
                    Ok(())
                }
            }
        };
        self.request(outcome)
    }

    fn get_all(&self) -> Pending<Vec<Record>> {
        let outcome = match self.take_fault(Fault::Read) {
            Some(description) => Err(description),
            None => Ok(self
                .with_committed(|c| c.values().cloned().collect())
                .unwrap_or_default()),
        };
        self.request(outcome)
    }

    fn count(&self) -> Pending<usize> {
        let outcome = match self.take_fault(Fault::Read) {
            Some(description) => Err(description),
            None => Ok(self.with_committed(|c| c.len()).unwrap_or(0)),
        };
        self.request(outcome)
    }

    fn delete(&self, id: ImageId) -> Pending<()> {
        let outcome = match self.take_fault(Fault::Delete) {
            Some(description) => Err(description),
            None => {
                self.staged.borrow_mut().push(Op::Delete(id));
                Ok(())
            }
        };
        self.request(outcome)
    }

    fn clear(&self) -> Pending<()> {
        let outcome = match self.take_fault(Fault::Delete) {
            Some(description) => Err(description),
            None => {
                self.staged.borrow_mut().push(Op::Clear);
                Ok(())
            }
        };
        self.request(outcome)
    }

    /// No further requests: commit staged operations, or abort.
    fn finish(self) {
        if self.aborted.get() {
            self.complete.fail(ABORT_ERROR);
            return;
        }
        if self.mode == Mode::ReadWrite {
            if let Some(description) = self.take_fault(Fault::Commit) {
                self.complete.fail(description);
                return;
            }
            let mut registry = self.handle.registry.borrow_mut();
            let collection = registry
                .databases
                .get_mut(&self.handle.name)
                .and_then(|db| db.collections.get_mut(&self.collection));
            if let Some(collection) = collection {
                for op in self.staged.take() {
                    match op {
                        Op::Add(record) => {
                            collection.insert(record.id, record);
                        }
                        Op::Delete(id) => {
                            collection.remove(&id);
                        }
                        Op::Clear => collection.clear(),
                    }
                }
            }
        }
        self.complete.succeed(());
    }
}

impl StoreHandle for MemoryHandle {
    async fn add(&self, collection: &str, record: &Record) -> StoreResult<()> {
        let (tx, complete) = self
            .transaction(collection, Mode::ReadWrite)
            .map_err(StoreError::Write)?;
        let request = tx.add(record);
        tx.finish();

        request.await.map_err(StoreError::Write)?;
        complete.await.map_err(StoreError::Write)
    }

    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let (tx, _complete) = self
            .transaction(collection, Mode::ReadOnly)
            .map_err(StoreError::Read)?;
        let request = tx.get_all();
        tx.finish();

        request.await.map_err(StoreError::Read)
    }

    async fn count(&self, collection: &str) -> StoreResult<usize> {
        let (tx, _complete) = self
            .transaction(collection, Mode::ReadOnly)
            .map_err(StoreError::Read)?;
        let request = tx.count();
        tx.finish();

        request.await.map_err(StoreError::Read)
    }

    async fn delete(&self, collection: &str, id: ImageId) -> StoreResult<()> {
        let (tx, complete) = self
            .transaction(collection, Mode::ReadWrite)
            .map_err(StoreError::Delete)?;
        let request = tx.delete(id);
        tx.finish();

        request.await.map_err(StoreError::Delete)?;
        complete.await.map_err(StoreError::Delete)
    }

    async fn clear(&self, collection: &str) -> StoreResult<()> {
        let (tx, complete) = self
            .transaction(collection, Mode::ReadWrite)
            .map_err(StoreError::Delete)?;
        let request = tx.clear();
        tx.finish();

        request.await.map_err(StoreError::Delete)?;
        complete.await.map_err(StoreError::Delete)
    }

    fn close(&self) {
        if !self.closed.replace(true) {
            debug!(database = %self.name, "connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    fn open(factory: &MemoryFactory, version: u32) -> StoreResult<MemoryHandle> {
        block_on(factory.open("PictureDB", version, &Schema::new("images")))
    }

    #[test]
    fn test_first_open_creates_collection() {
        let factory = MemoryFactory::new();
        open(&factory, 1).unwrap();
        assert_eq!(factory.version("PictureDB"), Some(1));
        assert_eq!(factory.collections("PictureDB"), vec!["images"]);
        assert_eq!(factory.upgrade_count("PictureDB"), 1);
    }

    #[test]
    fn test_reopen_same_version_skips_upgrade() {
        let factory = MemoryFactory::new();
        open(&factory, 1).unwrap();
        open(&factory, 1).unwrap();
        assert_eq!(factory.upgrade_count("PictureDB"), 1);
        assert_eq!(factory.open_count(), 2);
    }

    #[test]
    fn test_lower_version_is_rejected() {
        let factory = MemoryFactory::new();
        open(&factory, 2).unwrap();
        let err = open(&factory, 1).unwrap_err();
        assert!(matches!(err, StoreError::StoreOpen(ref msg) if msg.starts_with("VersionError")));
    }

    #[test]
    fn test_duplicate_key_aborts_transaction() {
        let factory = MemoryFactory::new();
        let handle = open(&factory, 1).unwrap();
        let record = Record::new(1, "data:image/png;base64,");
        block_on(handle.add("images", &record)).unwrap();

        let err = block_on(handle.add("images", &record)).unwrap_err();
        assert_eq!(err, StoreError::Write(CONSTRAINT_ERROR.into()));
        assert_eq!(block_on(handle.count("images")).unwrap(), 1);
    }

    #[test]
    fn test_commit_fault_discards_staged_write() {
        let factory = MemoryFactory::new();
        let handle = open(&factory, 1).unwrap();
        factory.inject_fault(Fault::Commit, "QuotaExceededError");

        let err = block_on(handle.add("images", &Record::new(1, "x"))).unwrap_err();
        assert_eq!(err, StoreError::Write("QuotaExceededError".into()));
        assert!(block_on(handle.get_all("images")).unwrap().is_empty());
    }

    #[test]
    fn test_faults_fire_once() {
        let factory = MemoryFactory::new();
        let handle = open(&factory, 1).unwrap();
        factory.inject_fault(Fault::Read, "UnknownError");

        assert!(block_on(handle.count("images")).is_err());
        assert_eq!(block_on(handle.count("images")).unwrap(), 0);
    }

    #[test]
    fn test_closed_handle_rejects_transactions() {
        let factory = MemoryFactory::new();
        let handle = open(&factory, 1).unwrap();
        handle.close();
        let err = block_on(handle.get_all("images")).unwrap_err();
        assert_eq!(err, StoreError::Read(CLOSING_ERROR.into()));
    }

    #[test]
    fn test_unknown_collection() {
        let factory = MemoryFactory::new();
        let handle = open(&factory, 1).unwrap();
        let err = block_on(handle.delete("thumbnails", 1)).unwrap_err();
        assert!(matches!(err, StoreError::Delete(ref msg) if msg.starts_with("NotFoundError")));
    }

    #[test]
    fn test_get_all_in_key_order() {
        let factory = MemoryFactory::new();
        let handle = open(&factory, 1).unwrap();
        for id in [30, 10, 20] {
            block_on(handle.add("images", &Record::new(id, "x"))).unwrap();
        }
        let ids: Vec<ImageId> = block_on(handle.get_all("images"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }
}
