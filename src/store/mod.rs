//! Media index abstraction.
//!
//! A media index is a catalog of shared images keyed by record handles. New
//! records may start *pending* (invisible to other consumers) and become
//! visible once their bytes are written and the flag is cleared.

mod directory;
pub mod mock;

pub use directory::DirectoryMediaStore;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, SaverError};

/// Collection used when an insert names none.
pub const DEFAULT_COLLECTION: &str = "Pictures";

const HANDLE_PREFIX: &str = "media://images/";

/// Opaque handle to a media-index record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordHandle(String);

impl RecordHandle {
    pub fn from_id(id: i64) -> Self {
        Self(format!("{HANDLE_PREFIX}{id}"))
    }

    /// Numeric record id encoded in the handle.
    pub fn id(&self) -> Result<i64> {
        self.0
            .strip_prefix(HANDLE_PREFIX)
            .and_then(|rest| rest.parse().ok())
            .ok_or_else(|| SaverError::RecordNotFound {
                handle: self.0.clone(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordHandle {
    type Err = SaverError;

    fn from_str(s: &str) -> Result<Self> {
        let handle = Self(s.to_string());
        handle.id()?;
        Ok(handle)
    }
}

/// Column values for an insert or update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaValues {
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub relative_path: Option<String>,
    pub is_pending: Option<bool>,
}

impl MediaValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn pending(mut self, pending: bool) -> Self {
        self.is_pending = Some(pending);
        self
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A record as reported by [`MediaStore::query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    pub handle: RecordHandle,
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
    pub is_pending: bool,
    pub size: u64,
    pub date_added: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
}

/// Filter for [`MediaStore::query`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaQuery {
    pub include_pending: bool,
}

impl MediaQuery {
    pub const fn visible() -> Self {
        Self {
            include_pending: false,
        }
    }

    pub const fn all() -> Self {
        Self {
            include_pending: true,
        }
    }
}

/// Platform media index API.
///
/// Calls are blocking; async callers run them on a blocking task.
pub trait MediaStore: Send + Sync {
    /// Create a record. `Ok(None)` means the index refused it.
    fn insert(&self, values: &MediaValues) -> Result<Option<RecordHandle>>;

    /// Open a write stream over a record's bytes.
    fn open_writer(&self, handle: &RecordHandle) -> Result<Box<dyn Write + Send>>;

    /// Update a record's columns, returning the number of rows changed.
    fn update(&self, handle: &RecordHandle, values: &MediaValues) -> Result<usize>;

    fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRecord>>;
}
