//! Persistence adapters.
//!
//! Two interchangeable strategies write a validated image into shared
//! storage: [`DirectRegistration`] streams bytes into a media-index record,
//! [`LibraryPersister`] hands a decoded image to the photo library.

mod direct;
mod library;

pub use direct::DirectRegistration;
pub use library::LibraryPersister;

use async_trait::async_trait;

use crate::request::{SaveRequest, SaveResult};

/// Default MIME type for new media records.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Default sub-collection for platforms with path-scoped collections.
pub const DEFAULT_COLLECTION: &str = "Pictures/StarGallery";

/// Column choices for new media-index records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOptions {
    pub mime_type: String,
    pub collection: String,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// Writes one image into shared storage.
///
/// Called only after write access is confirmed for the request.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn persist(&self, request: &SaveRequest) -> SaveResult;
}
