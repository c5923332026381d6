//! Saves into the directory-backed media index.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use image_saver::error::SaveError;
use image_saver::permission::mock::{MockPermissions, PromptBehavior};
use image_saver::permission::{ConsentDecision, PermissionProvider, PermissionState, ScriptedConsent};
use image_saver::persist::RecordOptions;
use image_saver::platform::Platform;
use image_saver::request::SavedImage;
use image_saver::saver::ImageSaver;
use image_saver::store::{DirectoryMediaStore, MediaQuery, MediaStore, MediaValues, RecordHandle};
use tempfile::TempDir;

use crate::common::fixtures::{SourceImages, path_str};
use crate::common::init_test_logging;

fn saver(
    platform: Platform,
    store: &Arc<DirectoryMediaStore>,
    permissions: Arc<dyn PermissionProvider>,
) -> ImageSaver {
    ImageSaver::builder(platform)
        .media_store(store.clone())
        .permissions(permissions)
        .record_options(RecordOptions::default())
        .consent_timeout(Some(Duration::from_secs(5)))
        .build()
        .expect("saver builds")
}

fn open_store(dir: &TempDir) -> Arc<DirectoryMediaStore> {
    Arc::new(DirectoryMediaStore::open(dir.path().join("store")).expect("store opens"))
}

fn granting() -> Arc<dyn PermissionProvider> {
    Arc::new(ScriptedConsent::new(
        PermissionState::Undetermined,
        ConsentDecision::Granted,
    ))
}

#[tokio::test]
async fn scoped_save_creates_one_visible_record_with_identical_bytes() {
    init_test_logging();
    let sources = SourceImages::new();
    let (source, bytes) = sources.jpeg("photo.jpg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let saved = saver(Platform::MediaIndex, &store, granting())
        .save_image(Some(path_str(&source)))
        .await
        .expect("save succeeds");

    let records = store.query(&MediaQuery::all()).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.display_name, "photo.jpg");
    assert_eq!(record.mime_type, "image/jpeg");
    assert_eq!(record.relative_path, "Pictures/StarGallery");
    assert!(!record.is_pending);

    let stored = std::fs::read(record.location.as_ref().unwrap()).unwrap();
    assert_eq!(stored, bytes);

    match saved {
        SavedImage::MediaRecord {
            handle,
            bytes: copied,
            sha256,
            ..
        } => {
            assert_eq!(handle, record.handle.to_string());
            assert_eq!(copied, bytes.len() as u64);
            assert_eq!(sha256, hex::encode(Sha256::digest(&bytes)));
        }
        other => panic!("expected a media record, got {other:?}"),
    }
}

#[tokio::test]
async fn scoped_save_never_consults_permissions() {
    let sources = SourceImages::new();
    let (source, _) = sources.jpeg("photo.jpg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let permissions = Arc::new(MockPermissions::new(PermissionState::Denied));

    saver(Platform::MediaIndex, &store, permissions.clone())
        .save_image(Some(path_str(&source)))
        .await
        .expect("save succeeds");

    assert_eq!(permissions.status_queries(), 0);
    assert_eq!(permissions.prompts(), 0);
}

#[tokio::test]
async fn legacy_save_after_grant_lands_in_default_collection() {
    let sources = SourceImages::new();
    let (source, bytes) = sources.jpeg("holiday.jpg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    saver(Platform::LegacyMediaIndex, &store, granting())
        .save_image(Some(path_str(&source)))
        .await
        .expect("save succeeds");

    let records = store.query(&MediaQuery::visible()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].relative_path, "Pictures");
    assert_eq!(records[0].size, bytes.len() as u64);
}

#[tokio::test]
async fn legacy_denial_leaves_store_empty() {
    let sources = SourceImages::new();
    let (source, _) = sources.jpeg("photo.jpg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let denying = Arc::new(ScriptedConsent::new(
        PermissionState::Undetermined,
        ConsentDecision::Denied,
    ));

    let result = saver(Platform::LegacyMediaIndex, &store, denying)
        .save_image(Some(path_str(&source)))
        .await;

    assert_eq!(result, Err(SaveError::PermissionDenied));
    assert!(store.query(&MediaQuery::all()).unwrap().is_empty());
}

#[tokio::test]
async fn granted_state_is_remembered_between_saves() {
    let sources = SourceImages::new();
    let (first, _) = sources.jpeg("a.jpg");
    let (second, _) = sources.jpeg("b.jpg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let permissions = Arc::new(MockPermissions::new(PermissionState::Undetermined));
    let saver = saver(Platform::LegacyMediaIndex, &store, permissions.clone());

    saver.save_image(Some(path_str(&first))).await.unwrap();
    saver.save_image(Some(path_str(&second))).await.unwrap();

    assert_eq!(permissions.prompts(), 1);
    assert_eq!(store.query(&MediaQuery::visible()).unwrap().len(), 2);
}

#[tokio::test]
async fn saving_the_same_file_twice_keeps_both() {
    let sources = SourceImages::new();
    let (source, _) = sources.jpeg("photo.jpg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let saver = saver(Platform::MediaIndex, &store, granting());

    saver.save_image(Some(path_str(&source))).await.unwrap();
    saver.save_image(Some(path_str(&source))).await.unwrap();

    let records = store.query(&MediaQuery::visible()).unwrap();
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].handle, records[1].handle);
    assert_ne!(records[0].location, records[1].location);
}

#[tokio::test]
async fn missing_source_is_invalid_path_and_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let permissions = Arc::new(MockPermissions::new(PermissionState::Undetermined));
    let saver = saver(Platform::LegacyMediaIndex, &store, permissions.clone());

    for path in [None, Some(""), Some("/definitely/not/here.jpg")] {
        assert_eq!(saver.save_image(path).await, Err(SaveError::InvalidPath));
    }
    assert_eq!(permissions.prompts(), 0);
    assert!(store.query(&MediaQuery::all()).unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_prompts_resume_their_own_paths() {
    let sources = SourceImages::new();
    let (first, first_bytes) = sources.jpeg("first.jpg");
    let second = sources.raw("second.jpg", b"not really a jpeg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let permissions = Arc::new(
        MockPermissions::new(PermissionState::Undetermined).with_behavior(PromptBehavior::Hold),
    );
    let saver = Arc::new(saver(Platform::LegacyMediaIndex, &store, permissions.clone()));

    let a = saver.dispatch(Some(path_str(&first)));
    let b = saver.dispatch(Some(path_str(&second)));
    permissions.wait_for_held(2).await;
    assert_eq!(saver.gate().pending_count(), 2);

    let gate = saver.gate();
    assert!(gate.on_permission_result(b.request_id().unwrap(), ConsentDecision::Granted));
    assert!(gate.on_permission_result(a.request_id().unwrap(), ConsentDecision::Granted));
    a.wait().await.unwrap();
    b.wait().await.unwrap();

    let records = store.query(&MediaQuery::visible()).unwrap();
    assert_eq!(records.len(), 2);
    let first_record = records
        .iter()
        .find(|r| r.display_name == "first.jpg")
        .expect("first.jpg saved");
    assert_eq!(
        std::fs::read(first_record.location.as_ref().unwrap()).unwrap(),
        first_bytes
    );
    let second_record = records
        .iter()
        .find(|r| r.display_name == "second.jpg")
        .expect("second.jpg saved");
    assert_eq!(
        std::fs::read(second_record.location.as_ref().unwrap()).unwrap(),
        b"not really a jpeg"
    );
}

#[tokio::test]
async fn unanswered_prompt_times_out_as_denied() {
    let sources = SourceImages::new();
    let (source, _) = sources.jpeg("photo.jpg");
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let permissions = Arc::new(
        MockPermissions::new(PermissionState::Undetermined).with_behavior(PromptBehavior::Hold),
    );
    let saver = ImageSaver::builder(Platform::LegacyMediaIndex)
        .media_store(store.clone())
        .permissions(permissions)
        .consent_timeout(Some(Duration::from_millis(50)))
        .build()
        .unwrap();

    let result = saver.save_image(Some(path_str(&source))).await;

    assert_eq!(result, Err(SaveError::PermissionDenied));
    assert_eq!(saver.gate().pending_count(), 0);
    assert!(store.query(&MediaQuery::all()).unwrap().is_empty());
}

#[test]
fn purge_removes_orphaned_pending_records() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let orphan = store
        .insert(
            &MediaValues::new()
                .display_name("orphan.jpg")
                .mime_type("image/jpeg")
                .relative_path("Pictures/StarGallery")
                .pending(true),
        )
        .unwrap()
        .unwrap();
    let orphan_path = store.record_path(&orphan).unwrap();
    assert!(orphan_path.exists());

    assert_eq!(store.purge_stale_pending(Duration::from_secs(3600)).unwrap(), 0);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(store.purge_stale_pending(Duration::ZERO).unwrap(), 1);

    assert!(!orphan_path.exists());
    assert!(store.query(&MediaQuery::all()).unwrap().is_empty());
    assert!(store.record_path(&orphan).is_err());
    assert!("media://videos/1".parse::<RecordHandle>().is_err());
}
