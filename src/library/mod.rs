//! Photo library abstraction.
//!
//! A photo library owns the user's assets and is only changed through
//! authorization-gated, atomic change requests that complete asynchronously.

mod directory;
pub mod mock;

pub use directory::{AuthorizationSource, DirectoryPhotoLibrary};

use async_trait::async_trait;
use clap::ValueEnum;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Library authorization level reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
    /// Partial access; still allows adding new assets.
    Limited,
}

impl AuthorizationStatus {
    /// Whether this status allows creating assets.
    pub const fn allows_writes(self) -> bool {
        matches!(self, Self::Authorized | Self::Limited)
    }
}

/// Platform photo library API.
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Ask for add-to-library authorization, prompting the user if the
    /// platform has not decided yet.
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Create one asset from `image` in a single change request.
    ///
    /// Returns the new asset id, or the platform's error description.
    async fn create_asset(&self, image: DynamicImage) -> Result<String, String>;
}
