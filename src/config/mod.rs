//! Configuration for image-saver.
//!
//! Settings come from a TOML file; any field left out takes its default.
//! A missing file at the default location is not an error.

mod path;

pub use path::{PathResolver, default_config_path, default_store_dir, home_dir, resolve_path};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SaverError};
use crate::permission::PermissionState;
use crate::persist::{DEFAULT_COLLECTION, DEFAULT_MIME_TYPE, RecordOptions};
use crate::platform::Platform;

const DEFAULT_CONSENT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_PENDING_MAX_AGE_HOURS: u64 = 7 * 24;

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaverConfig {
    /// Storage model to target.
    pub platform: Platform,
    /// Root directory of the shared media store / photo library.
    pub store_dir: PathBuf,
    /// Sub-collection for records on pending-flag platforms.
    pub collection: String,
    /// MIME type recorded for new media entries.
    pub mime_type: String,
    /// Seconds to wait for a consent decision; 0 waits forever.
    pub consent_timeout_secs: u64,
    /// Age after which orphaned pending records are purged.
    pub pending_max_age_hours: u64,
    /// Grant state before any prompt has been answered.
    pub initial_permission: PermissionState,
    /// Report `limited` rather than full library authorization.
    pub limited_library_access: bool,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            store_dir: default_store_dir(),
            collection: DEFAULT_COLLECTION.to_string(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            consent_timeout_secs: DEFAULT_CONSENT_TIMEOUT_SECS,
            pending_max_age_hours: DEFAULT_PENDING_MAX_AGE_HOURS,
            initial_permission: PermissionState::Undetermined,
            limited_library_access: false,
        }
    }
}

impl SaverConfig {
    /// Load from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(SaverError::ConfigNotFound {
                        path: path.display().to_string(),
                    });
                }
                Self::from_file(path)
            }
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path),
                None => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parse a config file, resolving its paths against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        let resolver = PathResolver::new(path)?;
        config.store_dir = resolver.resolve(&config.store_dir)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| SaverError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SaverError::Other(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if !self.mime_type.starts_with("image/") {
            return Err(SaverError::ConfigInvalid(format!(
                "mime_type must be an image type, got '{}'",
                self.mime_type
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(SaverError::ConfigInvalid(
                "collection must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn consent_timeout(&self) -> Option<Duration> {
        (self.consent_timeout_secs > 0).then(|| Duration::from_secs(self.consent_timeout_secs))
    }

    /// Age past which a pending record counts as orphaned. Huge hour
    /// counts clamp to the largest representable age.
    pub const fn pending_max_age(&self) -> Duration {
        Duration::from_secs(self.pending_max_age_hours.saturating_mul(3600))
    }

    pub fn record_options(&self) -> RecordOptions {
        RecordOptions {
            mime_type: self.mime_type.clone(),
            collection: self.collection.clone(),
        }
    }
}
