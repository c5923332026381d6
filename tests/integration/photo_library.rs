//! Saves through the directory-backed photo library.

use std::sync::Arc;
use std::time::Duration;

use image_saver::error::SaveError;
use image_saver::library::mock::MockPhotoLibrary;
use image_saver::library::{AuthorizationSource, AuthorizationStatus, DirectoryPhotoLibrary};
use image_saver::permission::mock::{MockPermissions, PromptBehavior};
use image_saver::permission::{ConsentDecision, PermissionState};
use image_saver::platform::Platform;
use image_saver::request::SavedImage;
use image_saver::saver::ImageSaver;
use tempfile::TempDir;

use crate::common::fixtures::{SourceImages, path_str};

fn saver(library: Arc<DirectoryPhotoLibrary>) -> ImageSaver {
    ImageSaver::builder(Platform::PhotoLibrary)
        .photo_library(library)
        .build()
        .expect("saver builds")
}

#[tokio::test]
async fn authorized_save_creates_one_decodable_asset() {
    let sources = SourceImages::new();
    let source = sources.image("sunset.png", 40, 30);
    let root = TempDir::new().unwrap();
    let library = Arc::new(DirectoryPhotoLibrary::new(
        root.path(),
        AuthorizationSource::Fixed(AuthorizationStatus::Authorized),
    ));

    let saved = saver(library.clone())
        .save_image(Some(path_str(&source)))
        .await
        .expect("save succeeds");

    let assets = library.assets().unwrap();
    assert_eq!(assets.len(), 1);
    let SavedImage::LibraryAsset { asset_id } = saved else {
        panic!("expected a library asset");
    };
    assert_eq!(assets[0].file_stem().unwrap().to_str(), Some(asset_id.as_str()));

    let decoded = image::open(&assets[0]).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (40, 30));
}

#[tokio::test]
async fn limited_access_still_saves() {
    let sources = SourceImages::new();
    let source = sources.image("a.png", 8, 8);
    let root = TempDir::new().unwrap();
    let library = Arc::new(DirectoryPhotoLibrary::new(
        root.path(),
        AuthorizationSource::scripted(ConsentDecision::Granted, true),
    ));

    saver(library.clone())
        .save_image(Some(path_str(&source)))
        .await
        .expect("limited access allows writes");
    assert_eq!(library.assets().unwrap().len(), 1);
}

#[tokio::test]
async fn denied_and_restricted_create_nothing() {
    let sources = SourceImages::new();
    let source = sources.image("a.png", 8, 8);

    for status in [AuthorizationStatus::Denied, AuthorizationStatus::Restricted] {
        let root = TempDir::new().unwrap();
        let library = Arc::new(DirectoryPhotoLibrary::new(
            root.path(),
            AuthorizationSource::Fixed(status),
        ));

        let result = saver(library.clone())
            .save_image(Some(path_str(&source)))
            .await;
        assert_eq!(result, Err(SaveError::PermissionDenied), "{status:?}");
        assert!(library.assets().unwrap().is_empty());
    }
}

#[tokio::test]
async fn scripted_denial_is_permission_denied() {
    let sources = SourceImages::new();
    let source = sources.image("a.png", 8, 8);
    let root = TempDir::new().unwrap();
    let library = Arc::new(DirectoryPhotoLibrary::new(
        root.path(),
        AuthorizationSource::scripted(ConsentDecision::Denied, false),
    ));

    let result = saver(library.clone())
        .save_image(Some(path_str(&source)))
        .await;
    assert_eq!(result, Err(SaveError::PermissionDenied));
    assert!(library.assets().unwrap().is_empty());
}

#[tokio::test]
async fn undecodable_file_is_invalid_path_before_authorization() {
    let sources = SourceImages::new();
    let source = sources.raw("notes.jpg", b"plain text, not pixels");
    let library = Arc::new(MockPhotoLibrary::new(AuthorizationStatus::Authorized));
    let saver = ImageSaver::builder(Platform::PhotoLibrary)
        .photo_library(library.clone())
        .build()
        .unwrap();

    let result = saver.save_image(Some(path_str(&source))).await;

    assert_eq!(result, Err(SaveError::InvalidPath));
    assert_eq!(library.authorization_requests(), 0);
    assert!(library.created().is_empty());
}

#[tokio::test]
async fn failed_change_request_is_save_failed() {
    let sources = SourceImages::new();
    let source = sources.image("a.png", 8, 8);
    let library = Arc::new(MockPhotoLibrary::new(AuthorizationStatus::Authorized));
    library.fail_next_change("disk full");
    let saver = ImageSaver::builder(Platform::PhotoLibrary)
        .photo_library(library.clone())
        .build()
        .unwrap();

    let result = saver.save_image(Some(path_str(&source))).await;

    assert_eq!(result, Err(SaveError::SaveFailed("disk full".to_string())));
    assert!(library.created().is_empty());
}

#[tokio::test]
async fn unanswered_prompt_ends_in_permission_denied() {
    let sources = SourceImages::new();
    let source = sources.image("a.png", 8, 8);
    let root = TempDir::new().unwrap();
    let provider = Arc::new(
        MockPermissions::new(PermissionState::Undetermined).with_behavior(PromptBehavior::Hold),
    );
    let library = Arc::new(DirectoryPhotoLibrary::new(
        root.path(),
        AuthorizationSource::Prompt {
            provider: provider.clone(),
            limited: false,
        },
    ));
    let saver = ImageSaver::builder(Platform::PhotoLibrary)
        .photo_library(library.clone())
        .consent_timeout(Some(Duration::from_millis(50)))
        .build()
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        saver.save_image(Some(path_str(&source))),
    )
    .await
    .expect("save finishes once the consent timeout passes");

    assert_eq!(result, Err(SaveError::PermissionDenied));
    assert_eq!(provider.prompts(), 1);
    assert!(library.assets().unwrap().is_empty());
}

#[tokio::test]
async fn answer_after_timeout_prompts_again_on_next_save() {
    let sources = SourceImages::new();
    let source = sources.image("a.png", 8, 8);
    let root = TempDir::new().unwrap();
    let provider = Arc::new(
        MockPermissions::new(PermissionState::Undetermined).with_behavior(PromptBehavior::Hold),
    );
    let library = Arc::new(DirectoryPhotoLibrary::new(
        root.path(),
        AuthorizationSource::Prompt {
            provider: provider.clone(),
            limited: false,
        },
    ));
    let saver = Arc::new(
        ImageSaver::builder(Platform::PhotoLibrary)
            .photo_library(library.clone())
            .consent_timeout(Some(Duration::from_millis(300)))
            .build()
            .unwrap(),
    );

    let first = saver.save_image(Some(path_str(&source))).await;
    assert_eq!(first, Err(SaveError::PermissionDenied));

    // The timed-out prompt left no decision behind, so the next save asks.
    let pending = saver.dispatch(Some(path_str(&source)));
    provider.wait_for_held(2).await;
    assert!(!provider.resolve_next(ConsentDecision::Granted));
    assert!(provider.resolve_next(ConsentDecision::Granted));

    assert!(pending.wait().await.is_ok());
    assert_eq!(provider.prompts(), 2);
    assert_eq!(library.assets().unwrap().len(), 1);
}
