//! Platform selection and the capability descriptor derived from it.
//!
//! The descriptor is resolved once when an [`crate::saver::ImageSaver`] is
//! built and never re-evaluated per request.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SaverError;

/// First Android API level whose media index is app-scoped for writes.
pub const SCOPED_STORAGE_SDK: u32 = 29;

/// Storage model of the platform the saver runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Unified media index with path-scoped collections and pending entries.
    #[default]
    MediaIndex,
    /// Media index that needs an explicit storage-write grant.
    LegacyMediaIndex,
    /// Photo library mutated through authorization-gated change requests.
    PhotoLibrary,
}

impl Platform {
    /// Select the media-index flavour for an Android API level.
    pub const fn from_android_sdk(level: u32) -> Self {
        if level >= SCOPED_STORAGE_SDK {
            Self::MediaIndex
        } else {
            Self::LegacyMediaIndex
        }
    }

    /// Capability descriptor for this platform.
    pub const fn capabilities(self) -> PlatformCapabilities {
        match self {
            Self::MediaIndex => PlatformCapabilities {
                requires_explicit_grant: false,
                uses_pending_media_flag: true,
                uses_library_asset_api: false,
            },
            Self::LegacyMediaIndex => PlatformCapabilities {
                requires_explicit_grant: true,
                uses_pending_media_flag: false,
                uses_library_asset_api: false,
            },
            // Authorization is requested at point of use by the library itself.
            Self::PhotoLibrary => PlatformCapabilities {
                requires_explicit_grant: false,
                uses_pending_media_flag: false,
                uses_library_asset_api: true,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MediaIndex => "media-index",
            Self::LegacyMediaIndex => "legacy-media-index",
            Self::PhotoLibrary => "photo-library",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SaverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "media-index" | "media_index" | "android" => Ok(Self::MediaIndex),
            "legacy-media-index" | "legacy_media_index" | "android-legacy" => {
                Ok(Self::LegacyMediaIndex)
            }
            "photo-library" | "photo_library" | "ios" => Ok(Self::PhotoLibrary),
            _ => Err(SaverError::UnknownPlatform {
                name: s.to_string(),
            }),
        }
    }
}

/// What the platform needs from the save pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformCapabilities {
    /// The OS holds a write grant that must be checked and possibly requested.
    pub requires_explicit_grant: bool,
    /// New records start pending and are made visible after the copy.
    pub uses_pending_media_flag: bool,
    /// Images go through the photo-library asset API instead of the media index.
    pub uses_library_asset_api: bool,
}
