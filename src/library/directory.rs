//! Photo library stored as JPEG assets under a directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AuthorizationStatus, PhotoLibrary};
use crate::image_ops::encode_jpeg;
use crate::permission::{
    ConsentAnswer, ConsentDecision, PermissionGate, PermissionProvider, PermissionState,
    ScriptedConsent, TerminalConsent,
};
use crate::request::RequestId;

/// Where a library's authorization answer comes from.
#[derive(Clone)]
pub enum AuthorizationSource {
    /// Always report this status.
    Fixed(AuthorizationStatus),
    /// Prompt through a consent provider once; the answer sticks.
    Prompt {
        provider: Arc<dyn PermissionProvider>,
        limited: bool,
    },
}

impl AuthorizationSource {
    /// Build a source from a CLI consent answer.
    pub fn from_answer(answer: ConsentAnswer, limited: bool) -> Self {
        match answer {
            ConsentAnswer::Allow if limited => Self::Fixed(AuthorizationStatus::Limited),
            ConsentAnswer::Allow => Self::Fixed(AuthorizationStatus::Authorized),
            ConsentAnswer::Deny => Self::Fixed(AuthorizationStatus::Denied),
            ConsentAnswer::Ask => Self::Prompt {
                provider: Arc::new(TerminalConsent::new(PermissionState::Undetermined)),
                limited,
            },
        }
    }

    /// A prompt answered asynchronously with a fixed decision.
    pub fn scripted(decision: ConsentDecision, limited: bool) -> Self {
        Self::Prompt {
            provider: Arc::new(ScriptedConsent::new(PermissionState::Undetermined, decision)),
            limited,
        }
    }
}

enum Authorizer {
    Fixed(AuthorizationStatus),
    Prompt { gate: PermissionGate, limited: bool },
}

/// Photo library persisted as `<root>/Library/<uuid>.jpg`.
pub struct DirectoryPhotoLibrary {
    assets_dir: PathBuf,
    authorizer: Authorizer,
    decided: Mutex<Option<AuthorizationStatus>>,
}

impl DirectoryPhotoLibrary {
    pub fn new(root: impl AsRef<Path>, source: AuthorizationSource) -> Self {
        let authorizer = match source {
            AuthorizationSource::Fixed(status) => Authorizer::Fixed(status),
            AuthorizationSource::Prompt { provider, limited } => Authorizer::Prompt {
                gate: PermissionGate::explicit(provider),
                limited,
            },
        };
        Self {
            assets_dir: root.as_ref().join("Library"),
            authorizer,
            decided: Mutex::new(None),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// Paths of every stored asset, sorted.
    pub fn assets(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut assets = match fs::read_dir(&self.assets_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "jpg"))
                .collect::<Vec<_>>(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        assets.sort();
        Ok(assets)
    }
}

async fn prompt(gate: &PermissionGate, limited: bool) -> AuthorizationStatus {
    // A settled denial is reported without asking again.
    let granted = match gate.current_state() {
        PermissionState::Denied => false,
        PermissionState::Granted | PermissionState::Undetermined => {
            gate.authorize(RequestId::next()).await.is_ok()
        }
    };
    match (granted, limited) {
        (true, true) => AuthorizationStatus::Limited,
        (true, false) => AuthorizationStatus::Authorized,
        (false, _) => AuthorizationStatus::Denied,
    }
}

#[async_trait]
impl PhotoLibrary for DirectoryPhotoLibrary {
    async fn request_authorization(&self) -> AuthorizationStatus {
        // Held across the prompt so concurrent saves share one decision.
        let mut decided = self.decided.lock().await;
        if let Some(status) = *decided {
            return status;
        }
        let status = match &self.authorizer {
            Authorizer::Fixed(status) => *status,
            Authorizer::Prompt { gate, limited } => {
                info!("Requesting photo library authorization");
                prompt(gate, *limited).await
            }
        };
        debug!(?status, "Photo library authorization decided");
        *decided = Some(status);
        status
    }

    async fn create_asset(&self, image: DynamicImage) -> Result<String, String> {
        let dir = self.assets_dir.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let bytes = encode_jpeg(&image).map_err(|e| e.to_string())?;
            fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
            let asset_id = Uuid::new_v4().to_string();
            let tmp = dir.join(format!(".{asset_id}.tmp"));
            // Write then rename, so the change lands whole or not at all.
            fs::write(&tmp, &bytes).map_err(|e| e.to_string())?;
            if let Err(e) = fs::rename(&tmp, dir.join(format!("{asset_id}.jpg"))) {
                let _ = fs::remove_file(&tmp);
                return Err(e.to_string());
            }
            Ok(asset_id)
        })
        .await
        .map_err(|e| format!("Asset creation task failed: {e}"))?;

        match &outcome {
            Ok(asset_id) => info!(asset_id, "Created photo library asset"),
            Err(e) => warn!(error = %e, "Photo library change failed"),
        }
        outcome
    }
}
