//! `Blob`/`File` as an image source

use picturedb_core::{ImageSource, StoreError, StoreResult};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Blob;

/// Reads a `Blob` (or `File`, which extends it) the way `FileReader` would.
pub struct BlobSource {
    blob: Blob,
}

impl BlobSource {
    pub fn new(blob: Blob) -> Self {
        Self { blob }
    }
}

impl ImageSource for BlobSource {
    fn mime_type(&self) -> Option<String> {
        Some(self.blob.type_()).filter(|t| !t.is_empty())
    }

    async fn read_bytes(&self) -> StoreResult<Vec<u8>> {
        let buffer = JsFuture::from(self.blob.array_buffer())
            .await
            .map_err(|e| StoreError::Decode(describe(&e)))?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }
}

fn describe(val: &JsValue) -> String {
    if let Some(err) = val.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", String::from(err.name()), String::from(err.message()));
    }
    val.as_string().unwrap_or_else(|| format!("{:?}", val))
}
