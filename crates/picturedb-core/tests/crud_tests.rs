//! CRUD operation tests for ImageStore over the memory backend

#![cfg(not(target_arch = "wasm32"))]

mod common;

use common::{png, ready_store, FixedClock, UnreadableSource, PNG_BYTES};
use picturedb_core::{DataUri, Fault, ImageBytes, Record, StoreError};
use pretty_assertions::assert_eq;

const T: i64 = 1686733930721;

#[tokio::test]
async fn test_add_and_get_round_trip() {
    let (_, store) = ready_store(FixedClock::at(T)).await;

    let id = store.add_image(&png()).await.unwrap();
    assert_eq!(id, T);

    let images = store.get_images().await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, T);
    assert!(images[0].data.starts_with("data:image/png;base64,"));

    let decoded = images[0].decode().unwrap();
    assert_eq!(decoded.bytes, PNG_BYTES);
}

#[tokio::test]
async fn test_picture_db_scenario() {
    let (_, store) = ready_store(FixedClock::at(T)).await;
    let file_a = png();

    store.add_image(&file_a).await.unwrap();
    let expected = DataUri::new(Some("image/png"), PNG_BYTES.to_vec()).to_string();
    assert_eq!(
        store.get_images().await.unwrap(),
        vec![Record::new(T, expected)]
    );

    store.remove_image(T).await.unwrap();
    assert_eq!(store.get_images().await.unwrap(), vec![]);
}

#[tokio::test]
async fn test_adds_in_same_millisecond_get_distinct_ids() {
    let (_, store) = ready_store(FixedClock::at(T)).await;

    let first = store.add_image(&png()).await.unwrap();
    let second = store.add_image(&png()).await.unwrap();
    let third = store.add_image(&png()).await.unwrap();

    assert_eq!(vec![first, second, third], vec![T, T + 1, T + 2]);
    assert_eq!(store.count_images().await.unwrap(), 3);
}

#[tokio::test]
async fn test_new_record_id_is_unique_among_existing() {
    let clock = FixedClock::at(T);
    let (_, store) = ready_store(clock.clone()).await;

    store.add_image(&png()).await.unwrap();
    clock.0.set(T + 50);
    let id = store.add_image(&png()).await.unwrap();

    let ids: Vec<i64> = store
        .get_images()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids.iter().filter(|&&other| other == id).count(), 1);
}

#[tokio::test]
async fn test_sniffs_mime_when_source_declares_none() {
    let (_, store) = ready_store(FixedClock::at(T)).await;

    store.add_image(&ImageBytes::new(PNG_BYTES)).await.unwrap();
    let images = store.get_images().await.unwrap();
    assert!(images[0].data.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_add_with_explicit_id() {
    let (_, store) = ready_store(FixedClock::at(T)).await;

    store.add_image_with_id(42, &png()).await.unwrap();
    let images = store.get_images().await.unwrap();
    assert_eq!(images[0].id, 42);
}

#[tokio::test]
async fn test_add_with_taken_id_fails_with_write_error() {
    let (_, store) = ready_store(FixedClock::at(T)).await;
    store.add_image_with_id(42, &png()).await.unwrap();

    let err = store.add_image_with_id(42, &png()).await.unwrap_err();
    assert!(matches!(err, StoreError::Write(ref msg) if msg.contains("ConstraintError")));
    assert_eq!(store.count_images().await.unwrap(), 1);
}

#[tokio::test]
async fn test_unreadable_source_fails_with_decode_error() {
    let (_, store) = ready_store(FixedClock::at(T)).await;

    let err = store.add_image(&UnreadableSource).await.unwrap_err();
    assert_eq!(err.kind(), "DecodeError");
    assert!(store.get_images().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_resolves_on_commit_not_request_success() {
    let (factory, store) = ready_store(FixedClock::at(T)).await;

    // The add request itself succeeds; the transaction then fails to commit.
    factory.inject_fault(Fault::Commit, "QuotaExceededError: quota exceeded");
    let err = store.add_image(&png()).await.unwrap_err();

    assert_eq!(
        err,
        StoreError::Write("QuotaExceededError: quota exceeded".into())
    );
    assert!(store.get_images().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_request_failure_fails_with_write_error() {
    let (factory, store) = ready_store(FixedClock::at(T)).await;
    factory.inject_fault(Fault::Add, "DataError: invalid key");

    let err = store.add_image(&png()).await.unwrap_err();
    assert_eq!(err, StoreError::Write("DataError: invalid key".into()));
}

#[tokio::test]
async fn test_read_failure_fails_with_read_error() {
    let (factory, store) = ready_store(FixedClock::at(T)).await;
    factory.inject_fault(Fault::Read, "UnknownError: backing store failed");

    let err = store.get_images().await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Read("UnknownError: backing store failed".into())
    );
}

#[tokio::test]
async fn test_delete_then_read() {
    let (_, store) = ready_store(FixedClock::at(T)).await;
    let keep = store.add_image(&png()).await.unwrap();
    let gone = store.add_image(&png()).await.unwrap();

    store.remove_image(gone).await.unwrap();

    let ids: Vec<i64> = store
        .get_images()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![keep]);
}

#[tokio::test]
async fn test_delete_nonexistent_is_noop() {
    let (_, store) = ready_store(FixedClock::at(T)).await;
    store.add_image(&png()).await.unwrap();
    let before = store.get_images().await.unwrap();

    store.remove_image(1).await.unwrap();

    assert_eq!(store.get_images().await.unwrap(), before);
}

#[tokio::test]
async fn test_delete_failure_fails_with_delete_error() {
    let (factory, store) = ready_store(FixedClock::at(T)).await;
    let id = store.add_image(&png()).await.unwrap();
    factory.inject_fault(Fault::Delete, "UnknownError: disk I/O");

    let err = store.remove_image(id).await.unwrap_err();
    assert_eq!(err.kind(), "DeleteError");

    // The store stays usable after an operation-level failure
    store.remove_image(id).await.unwrap();
    assert_eq!(store.count_images().await.unwrap(), 0);
}

#[tokio::test]
async fn test_clear_images() {
    let (_, store) = ready_store(FixedClock::at(T)).await;
    for _ in 0..3 {
        store.add_image(&png()).await.unwrap();
    }

    store.clear_images().await.unwrap();
    assert_eq!(store.count_images().await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_images_returns_key_order() {
    let (_, store) = ready_store(FixedClock::at(T)).await;
    store.add_image_with_id(300, &png()).await.unwrap();
    store.add_image_with_id(100, &png()).await.unwrap();
    store.add_image_with_id(200, &png()).await.unwrap();

    let ids: Vec<i64> = store
        .get_images()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![100, 200, 300]);
}
