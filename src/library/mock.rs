//! Mock photo library for unit testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use image::DynamicImage;

use super::{AuthorizationStatus, PhotoLibrary};

/// Mock photo library that records authorization requests and assets.
pub struct MockPhotoLibrary {
    status: AuthorizationStatus,
    failure: Mutex<Option<String>>,
    authorization_requests: AtomicUsize,
    created: Mutex<Vec<(u32, u32)>>,
}

impl MockPhotoLibrary {
    #[must_use]
    pub fn new(status: AuthorizationStatus) -> Self {
        Self {
            status,
            failure: Mutex::new(None),
            authorization_requests: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Make the next change request fail with `error`.
    pub fn fail_next_change(&self, error: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.into());
    }

    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    /// Dimensions of every asset created so far.
    pub fn created(&self) -> Vec<(u32, u32)> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PhotoLibrary for MockPhotoLibrary {
    async fn request_authorization(&self) -> AuthorizationStatus {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.status
    }

    async fn create_asset(&self, image: DynamicImage) -> Result<String, String> {
        tokio::task::yield_now().await;
        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        created.push((image.width(), image.height()));
        Ok(format!("mock-asset-{}", created.len()))
    }
}
