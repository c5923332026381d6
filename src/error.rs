//! Error types for image-saver operations.
//!
//! Two layers exist: [`SaveError`] is the typed outcome a host sees for a
//! single save request, while [`SaverError`] covers the surrounding
//! infrastructure (configuration, the media index, the CLI).

use thiserror::Error;

/// Typed failure of a single save request.
///
/// Each variant maps to exactly one wire error code (see [`SaveError::code`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    #[error("Invalid image path")]
    InvalidPath,

    #[error("No permission to write to the photo library")]
    PermissionDenied,

    #[error("Failed to save image: {0}")]
    SaveFailed(String),
}

impl SaveError {
    /// Wire error code reported to the host.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath => "INVALID_PATH",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::SaveFailed(_) => "SAVE_FAILED",
        }
    }

    /// Human-readable message that accompanies the code.
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InvalidPath => "Invalid image path",
            Self::PermissionDenied => "No permission to write to the photo library",
            Self::SaveFailed(_) => "Failed to save image",
        }
    }

    /// Underlying failure description, if any.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::SaveFailed(detail) => Some(detail.as_str()),
            _ => None,
        }
    }

    /// Build a `SaveFailed` from any displayable failure.
    pub fn save_failed(detail: impl std::fmt::Display) -> Self {
        Self::SaveFailed(detail.to_string())
    }
}

/// Infrastructure error type for image-saver.
#[derive(Error, Debug)]
pub enum SaverError {
    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Unknown platform '{name}': expected media-index, legacy-media-index or photo-library")]
    UnknownPlatform { name: String },

    // Media index errors
    #[error("Media index error: {0}")]
    MediaIndex(String),

    #[error("Media record not found: {handle}")]
    RecordNotFound { handle: String },

    // Method channel errors
    #[error("Malformed method call: {0}")]
    MalformedCall(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl SaverError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParse(_)
                | Self::UnknownPlatform { .. }
                | Self::MalformedCall(_)
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => Some("Omit --config to use built-in defaults"),
            Self::UnknownPlatform { .. } => {
                Some("Use --platform media-index, legacy-media-index or photo-library")
            }
            Self::MalformedCall(_) => {
                Some(r#"Pass a JSON object like {"method":"saveImage","arguments":{"path":"..."}}"#)
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SaverError {
    fn from(e: rusqlite::Error) -> Self {
        Self::MediaIndex(e.to_string())
    }
}

/// Convenience type alias for Results using SaverError.
pub type Result<T> = std::result::Result<T, SaverError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| SaverError::Other(format!("{}: {e}", f().into())))
    }
}
