//! PictureDB core - client-side image persistence over an embedded key-value store
//!
//! This crate holds everything that does not depend on a particular store:
//! the record model, data URI encoding, id generation, the error taxonomy, the
//! backend contract, and [`ImageStore`], which owns the lifecycle of a single
//! versioned database handle and exposes async CRUD on one image collection.
//!
//! Browser persistence lives in `picturedb-indexeddb`; [`MemoryFactory`] is an
//! in-memory backend with the same event and transaction semantics, for tests
//! and native use.
//!
//! # Example
//!
//! ```rust
//! use picturedb_core::{ImageBytes, ImageStore, MemoryFactory, StoreConfig};
//!
//! # futures::executor::block_on(async {
//! let store = ImageStore::new(MemoryFactory::new(), StoreConfig::default())?;
//! store.initialize().await?;
//!
//! let id = store.add_image(&ImageBytes::with_mime_type(vec![1, 2, 3], "image/png")).await?;
//! let images = store.get_images().await?;
//! assert_eq!(images[0].data, "data:image/png;base64,AQID");
//!
//! store.remove_image(id).await?;
//! assert!(store.get_images().await?.is_empty());
//! # Ok::<(), picturedb_core::StoreError>(())
//! # }).unwrap();
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod id;
pub mod memory;
pub mod pending;
pub mod record;
pub mod source;
pub mod store;

pub use backend::{Schema, StoreFactory, StoreHandle};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use id::{Clock, IdGenerator, SystemClock};
pub use memory::{Fault, MemoryFactory, MemoryHandle};
pub use record::{DataUri, ImageId, Record};
pub use source::{ImageBytes, ImageSource};
pub use store::{ImageStore, StoreState};
