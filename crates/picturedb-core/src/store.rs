//! Image store: lifecycle owner of one database handle and the CRUD operations on it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use tracing::{debug, info, warn};

use crate::backend::{Schema, StoreFactory, StoreHandle};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::id::{Clock, IdGenerator, SystemClock};
use crate::record::{DataUri, ImageId, Record};
use crate::source::ImageSource;

type OpenFuture<H> = Shared<LocalBoxFuture<'static, StoreResult<Rc<H>>>>;

/// Lifecycle state of an [`ImageStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// `initialize()` has not been called
    Uninitialized,
    /// The open request is in flight
    Opening,
    /// The handle is open and cached
    Ready,
    /// The open request failed; terminal
    Failed,
    /// `close()` released the handle
    Closed,
}

enum Lifecycle<H> {
    Uninitialized,
    Opening(OpenFuture<H>),
    Ready(Rc<H>),
    Failed(StoreError),
    Closed,
}

impl<H> Lifecycle<H> {
    fn state(&self) -> StoreState {
        match self {
            Lifecycle::Uninitialized => StoreState::Uninitialized,
            Lifecycle::Opening(_) => StoreState::Opening,
            Lifecycle::Ready(_) => StoreState::Ready,
            Lifecycle::Failed(_) => StoreState::Failed,
            Lifecycle::Closed => StoreState::Closed,
        }
    }
}

/// Stores images as data URIs in one collection of a named, versioned database.
///
/// Construct one per application and share it by reference; it owns the only
/// handle to the database. Call [`initialize`](Self::initialize) and await it
/// before any other operation; until then every operation fails with
/// [`StoreError::NotInitialized`].
///
/// Each operation runs in its own short-lived transaction. Writes resolve when
/// the transaction commits, reads when the request succeeds. The store does no
/// locking of its own; ordering between operations that are not awaited in
/// sequence is up to the backend.
pub struct ImageStore<F: StoreFactory, C: Clock = SystemClock> {
    factory: F,
    config: StoreConfig,
    ids: IdGenerator<C>,
    lifecycle: RefCell<Lifecycle<F::Handle>>,
}

impl<F: StoreFactory, C: Clock> fmt::Debug for ImageStore<F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageStore")
            .field("config", &self.config)
            .field("state", &self.lifecycle.borrow().state())
            .finish_non_exhaustive()
    }
}

impl<F> ImageStore<F, SystemClock>
where
    F: StoreFactory + Clone + 'static,
{
    /// Create an uninitialized store. Ids come from the wall clock.
    pub fn new(factory: F, config: StoreConfig) -> StoreResult<Self> {
        Self::with_clock(factory, config, SystemClock)
    }
}

impl<F, C> ImageStore<F, C>
where
    F: StoreFactory + Clone + 'static,
    C: Clock,
{
    /// Create an uninitialized store with a custom id clock.
    pub fn with_clock(factory: F, config: StoreConfig, clock: C) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            factory,
            config,
            ids: IdGenerator::new(clock),
            lifecycle: RefCell::new(Lifecycle::Uninitialized),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn state(&self) -> StoreState {
        self.lifecycle.borrow().state()
    }

    /// Open the database, creating or upgrading the schema as needed.
    ///
    /// Calls made while the open is in flight share its outcome; calls after
    /// success return immediately. A failed open is terminal: every later call
    /// returns the same `StoreError::StoreOpen`.
    pub async fn initialize(&self) -> StoreResult<()> {
        let opening = {
            let mut lifecycle = self.lifecycle.borrow_mut();
            let in_flight = match &*lifecycle {
                Lifecycle::Ready(_) => return Ok(()),
                Lifecycle::Failed(err) => return Err(err.clone()),
                Lifecycle::Opening(opening) => Some(opening.clone()),
                Lifecycle::Uninitialized | Lifecycle::Closed => None,
            };
            match in_flight {
                Some(opening) => opening,
                None => {
                    let opening = self.open_future();
                    *lifecycle = Lifecycle::Opening(opening.clone());
                    opening
                }
            }
        };

        let outcome = opening.await;

        let mut lifecycle = self.lifecycle.borrow_mut();
        let settling = matches!(*lifecycle, Lifecycle::Opening(_));
        match outcome {
            Ok(handle) => {
                if settling {
                    info!(
                        database = %self.config.database_name,
                        version = self.config.database_version,
                        "image store ready"
                    );
                    *lifecycle = Lifecycle::Ready(handle);
                }
                Ok(())
            }
            Err(err) => {
                if settling {
                    warn!(database = %self.config.database_name, error = %err, "image store failed to open");
                    *lifecycle = Lifecycle::Failed(err.clone());
                }
                Err(err)
            }
        }
    }

    fn open_future(&self) -> OpenFuture<F::Handle> {
        let factory = self.factory.clone();
        let name = self.config.database_name.clone();
        let version = self.config.database_version;
        let schema = Schema::new(self.config.collection_name.clone());

        debug!(database = %name, version, collection = %schema.collection, "opening image store");
        async move {
            let handle = factory.open(&name, version, &schema).await?;
            Ok(Rc::new(handle))
        }
        .boxed_local()
        .shared()
    }

    /// The cached handle, or `NotInitialized`.
    fn handle(&self) -> StoreResult<Rc<F::Handle>> {
        match &*self.lifecycle.borrow() {
            Lifecycle::Ready(handle) => Ok(handle.clone()),
            _ => Err(StoreError::NotInitialized),
        }
    }

    /// Read `source`, encode it as a data URI and store it under a fresh id.
    ///
    /// Resolves with the new id once the write transaction has committed.
    pub async fn add_image<S: ImageSource>(&self, source: &S) -> StoreResult<ImageId> {
        let handle = self.handle()?;
        let data = encode_source(source).await?;
        let record = Record::new(self.ids.next_id(), data);

        handle.add(&self.config.collection_name, &record).await?;
        Ok(record.id)
    }

    /// Like [`add_image`](Self::add_image) with a caller-chosen id.
    ///
    /// An id that is already taken fails with `StoreError::Write`.
    pub async fn add_image_with_id<S: ImageSource>(
        &self,
        id: ImageId,
        source: &S,
    ) -> StoreResult<()> {
        let handle = self.handle()?;
        let data = encode_source(source).await?;

        handle
            .add(&self.config.collection_name, &Record::new(id, data))
            .await
    }

    /// Every stored record, in key order.
    pub async fn get_images(&self) -> StoreResult<Vec<Record>> {
        let handle = self.handle()?;
        handle.get_all(&self.config.collection_name).await
    }

    /// Delete the record with `id` if it exists. Missing ids are not an error.
    pub async fn remove_image(&self, id: ImageId) -> StoreResult<()> {
        let handle = self.handle()?;
        handle.delete(&self.config.collection_name, id).await
    }

    /// Number of stored records.
    pub async fn count_images(&self) -> StoreResult<usize> {
        let handle = self.handle()?;
        handle.count(&self.config.collection_name).await
    }

    /// Delete every record.
    pub async fn clear_images(&self) -> StoreResult<()> {
        let handle = self.handle()?;
        handle.clear(&self.config.collection_name).await
    }

    /// Release the handle. Operations fail with `NotInitialized` until the
    /// store is initialized again.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle.borrow_mut();
        let handle = match &*lifecycle {
            Lifecycle::Ready(handle) => handle.clone(),
            _ => return,
        };
        handle.close();
        *lifecycle = Lifecycle::Closed;
        debug!(database = %self.config.database_name, "image store closed");
    }
}

async fn encode_source<S: ImageSource>(source: &S) -> StoreResult<String> {
    let bytes = source.read_bytes().await?;
    let mime_type = source.mime_type();
    Ok(DataUri::new(mime_type.as_deref(), bytes).to_string())
}
