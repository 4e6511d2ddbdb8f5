//! IndexedDB storage backend for PictureDB images (browser WASM)
//!
//! This crate implements the `picturedb-core` backend contract on top of the
//! browser's IndexedDB, so an [`ImageStore`](picturedb_core::ImageStore) built
//! with [`IndexedDbFactory`] persists images across page loads.
//!
//! IndexedDB reports outcomes through `onsuccess`/`onerror`/`oncomplete`
//! callbacks; the [`idb`] module turns each request and transaction into a
//! future. Writes resolve on transaction commit, reads on request success.
//!
//! # Schema
//!
//! One object store (the configured collection name, `"images"` by default)
//! with `id` as keyPath. Values are `{ id: number, data: string }` where `data`
//! is a base64 data URI.
//!
//! # Example
//!
//! ```rust,ignore
//! use picturedb_core::{ImageBytes, ImageStore, StoreConfig};
//! use picturedb_indexeddb::IndexedDbFactory;
//!
//! let store = ImageStore::new(IndexedDbFactory::new(), StoreConfig::default())?;
//! store.initialize().await?;
//!
//! let id = store.add_image(&ImageBytes::with_mime_type(bytes, "image/png")).await?;
//! for record in store.get_images().await? {
//!     render(&record.data);
//! }
//! store.remove_image(id).await?;
//! ```

pub mod convert;
pub mod error;
pub mod idb;
pub mod store;

pub use error::{IndexedDbError, Result};
pub use store::{IndexedDbFactory, IndexedDbHandle};
