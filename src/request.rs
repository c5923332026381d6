//! Per-request data: identity, the validated source, and the outcome.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::SaveError;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A save request whose source path has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub id: RequestId,
    pub source: PathBuf,
}

impl SaveRequest {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            id: RequestId::next(),
            source: source.into(),
        }
    }

    /// Base name of the source file, used as the record display name.
    pub fn display_name(&self) -> Option<String> {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Where a successfully saved image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SavedImage {
    /// A finalized media-index record.
    MediaRecord {
        handle: String,
        display_name: String,
        bytes: u64,
        sha256: String,
    },
    /// A photo-library asset.
    LibraryAsset { asset_id: String },
}

/// Outcome of one save request.
pub type SaveResult = Result<SavedImage, SaveError>;

/// Stage of a request within the save state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    Received,
    ValidatingPath,
    CheckingPermission,
    AwaitingUser,
    Persisting,
    Succeeded,
    Failed,
}

impl SaveStage {
    /// Whether the request has its final outcome.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}
