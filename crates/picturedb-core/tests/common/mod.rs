//! Shared helpers for image store integration tests

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use picturedb_core::{
    Clock, ImageBytes, ImageSource, ImageStore, MemoryFactory, StoreConfig, StoreError,
    StoreResult,
};

/// Smallest valid PNG signature plus the start of an IHDR chunk.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Install a test subscriber once; honours RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Clock frozen at a settable instant, shared with the test body.
#[derive(Clone)]
pub struct FixedClock(pub Rc<Cell<i64>>);

impl FixedClock {
    pub fn at(millis: i64) -> Self {
        Self(Rc::new(Cell::new(millis)))
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0.get()
    }
}

/// Source whose read always fails, like an unreadable file.
pub struct UnreadableSource;

impl ImageSource for UnreadableSource {
    fn mime_type(&self) -> Option<String> {
        Some("image/png".into())
    }

    async fn read_bytes(&self) -> StoreResult<Vec<u8>> {
        Err(StoreError::Decode("NotReadableError: file could not be read".into()))
    }
}

pub fn png() -> ImageBytes {
    ImageBytes::with_mime_type(PNG_BYTES, "image/png")
}

/// Default "PictureDB" v1 / "images" store over a fresh memory backend.
pub fn memory_store(clock: FixedClock) -> (MemoryFactory, ImageStore<MemoryFactory, FixedClock>) {
    init_tracing();
    let factory = MemoryFactory::new();
    let store = ImageStore::with_clock(factory.clone(), StoreConfig::default(), clock).unwrap();
    (factory, store)
}

/// Initialized store ready for CRUD.
pub async fn ready_store(clock: FixedClock) -> (MemoryFactory, ImageStore<MemoryFactory, FixedClock>) {
    let (factory, store) = memory_store(clock);
    store.initialize().await.unwrap();
    (factory, store)
}
