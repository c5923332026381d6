//! Photo-library persistence: decode, authorize, then one asset change.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::Persister;
use crate::error::SaveError;
use crate::image_ops::decode_image;
use crate::library::{AuthorizationStatus, PhotoLibrary};
use crate::request::{SaveRequest, SaveResult, SavedImage};

/// Creates a photo-library asset from the decoded source image.
///
/// The source is decoded before authorization is requested, so an
/// undecodable file never triggers a prompt.
pub struct LibraryPersister {
    library: Arc<dyn PhotoLibrary>,
    consent_timeout: Option<Duration>,
}

impl LibraryPersister {
    pub fn new(library: Arc<dyn PhotoLibrary>) -> Self {
        Self {
            library,
            consent_timeout: None,
        }
    }

    /// Bound how long authorization may stay undecided. Running out counts
    /// as a refusal.
    #[must_use]
    pub const fn with_consent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.consent_timeout = timeout;
        self
    }

    async fn authorize(&self) -> Result<AuthorizationStatus, SaveError> {
        let Some(limit) = self.consent_timeout else {
            return Ok(self.library.request_authorization().await);
        };
        tokio::time::timeout(limit, self.library.request_authorization())
            .await
            .map_err(|_| {
                warn!(
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "Timed out waiting for photo library authorization"
                );
                SaveError::PermissionDenied
            })
    }
}

#[async_trait]
impl Persister for LibraryPersister {
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn persist(&self, request: &SaveRequest) -> SaveResult {
        let source = request.source.clone();
        let image = tokio::task::spawn_blocking(move || decode_image(&source))
            .await
            .map_err(|e| SaveError::save_failed(format!("Decode task failed: {e}")))??;

        let status = self.authorize().await?;
        if !status.allows_writes() {
            info!(?status, "Photo library authorization refused");
            return Err(SaveError::PermissionDenied);
        }
        debug!(?status, "Photo library authorization granted");

        match self.library.create_asset(image).await {
            Ok(asset_id) => {
                info!(asset_id, "Saved image to photo library");
                Ok(SavedImage::LibraryAsset { asset_id })
            }
            Err(detail) => {
                warn!(error = %detail, "Photo library rejected the change");
                Err(SaveError::SaveFailed(detail))
            }
        }
    }
}
