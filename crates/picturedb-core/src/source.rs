//! Binary image sources accepted by [`ImageStore::add_image`](crate::ImageStore::add_image)

use crate::error::StoreResult;

/// Something that can asynchronously produce the bytes of an image.
///
/// The browser crate implements this for `Blob`/`File`; [`ImageBytes`] covers
/// bytes that are already in memory. Read failures must be reported as
/// [`StoreError::Decode`](crate::StoreError::Decode).
#[allow(async_fn_in_trait)]
pub trait ImageSource {
    /// MIME type declared by the source, if any.
    fn mime_type(&self) -> Option<String>;

    /// Read the full payload.
    async fn read_bytes(&self) -> StoreResult<Vec<u8>>;
}

/// In-memory image payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    mime_type: Option<String>,
    bytes: Vec<u8>,
}

impl ImageBytes {
    /// Bytes whose type will be sniffed when encoded.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: None,
            bytes: bytes.into(),
        }
    }

    /// Bytes with a declared MIME type.
    pub fn with_mime_type(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            bytes: bytes.into(),
        }
    }
}

impl ImageSource for ImageBytes {
    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    async fn read_bytes(&self) -> StoreResult<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}
