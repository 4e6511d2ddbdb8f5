//! PictureDB browser bindings
//!
//! The composition root for the browser: holds the one [`ImageStore`] of the
//! page and exposes it to JavaScript through wasm-bindgen. DOM wiring (forms,
//! file inputs, `<img>` rendering) stays in JavaScript and calls this API.
//!
//! ```js
//! import init, { getInstance } from "picturedb_wasm";
//!
//! await init();
//! const db = getInstance("PictureDB", 1, "images");
//! await db.initialize();
//! await db.addImageFile(input.files[0]);
//! for (const { id, data } of await db.getImages()) { /* <img src={data}> */ }
//! ```
//!
//! Failures reject with a JS `Error` whose `name` is the error kind
//! (`StoreOpenError`, `DecodeError`, `WriteError`, `ReadError`, `DeleteError`,
//! `NotInitializedError`, ...).
//!
//! [`ImageStore`]: picturedb_core::ImageStore

pub mod browser;
pub mod source;

pub use browser::{get_instance, shared_store, PictureStore};
pub use source::BlobSource;
