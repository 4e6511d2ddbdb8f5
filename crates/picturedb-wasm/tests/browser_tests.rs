//! JS-facing API tests; run in a headless browser with `wasm-pack test --headless --firefox`
//!
//! `getInstance` hands out one store per page, so every test here shares it.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Promise, Reflect};
use picturedb_wasm::{get_instance, PictureStore};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const DB_NAME: &str = "PictureDB-bindings";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn store() -> PictureStore {
    get_instance(Some(DB_NAME.into()), Some(1), Some("images".into())).unwrap()
}

async fn settle(promise: Promise) -> Result<JsValue, JsValue> {
    JsFuture::from(promise).await
}

fn error_name(err: &JsValue) -> String {
    err.dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.name()))
        .unwrap_or_default()
}

#[wasm_bindgen_test]
async fn test_round_trip_through_promises() {
    let db = store();
    settle(db.initialize()).await.unwrap();
    assert_eq!(db.state(), "Ready");
    settle(db.clear_images()).await.unwrap();

    let id = settle(db.add_image(PNG_BYTES.to_vec(), None))
        .await
        .unwrap()
        .as_f64()
        .unwrap();

    let images: Array = settle(db.get_images()).await.unwrap().unchecked_into();
    assert_eq!(images.length(), 1);
    let first = images.get(0);
    assert_eq!(Reflect::get(&first, &"id".into()).unwrap().as_f64(), Some(id));
    let data = Reflect::get(&first, &"data".into()).unwrap().as_string().unwrap();
    assert!(data.starts_with("data:image/png;base64,"));

    settle(db.remove_image(id)).await.unwrap();
    let count = settle(db.count_images()).await.unwrap().as_f64();
    assert_eq!(count, Some(0.0));
}

#[wasm_bindgen_test]
async fn test_get_instance_ignores_later_arguments() {
    let first = store();
    let second =
        get_instance(Some("Elsewhere".into()), Some(7), Some("thumbnails".into())).unwrap();
    assert!(picturedb_wasm::browser::has_instance());

    assert_eq!(second.database_name(), DB_NAME);
    assert_eq!(second.database_version(), 1);
    assert_eq!(second.collection_name(), "images");

    // One store behind both handles: initializing through one readies the other
    settle(first.initialize()).await.unwrap();
    assert_eq!(second.state(), "Ready");
    assert_eq!(second.state(), first.state());
}

#[wasm_bindgen_test]
async fn test_fractional_id_rejects_with_delete_error() {
    let err = settle(store().remove_image(1.5)).await.unwrap_err();
    assert_eq!(error_name(&err), "DeleteError");
}
