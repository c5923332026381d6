//! The save pipeline: validate, gate, persist, report.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{Result, SaveError, SaverError};
use crate::library::PhotoLibrary;
use crate::permission::{
    ConsentDecision, ConsentTicket, PermissionGate, PermissionProvider, PermissionState,
};
use crate::persist::{DirectRegistration, LibraryPersister, Persister, RecordOptions};
use crate::platform::{Platform, PlatformCapabilities};
use crate::reporter::{self, Responder};
use crate::request::{RequestId, SaveRequest, SaveResult, SaveStage};
use crate::store::MediaStore;

fn stage(id: Option<RequestId>, stage: SaveStage) {
    match id {
        Some(id) if stage.is_terminal() => info!(request_id = %id, ?stage, "Save finished"),
        Some(id) => debug!(request_id = %id, ?stage, "Save stage"),
        None => debug!(?stage, "Save stage"),
    }
}

/// Check the caller's path and turn it into a request.
///
/// Only reads metadata; never prompts and never touches the store.
pub fn validate_path(path: Option<&str>) -> std::result::Result<SaveRequest, SaveError> {
    stage(None, SaveStage::ValidatingPath);
    let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
        return Err(SaveError::InvalidPath);
    };
    if !Path::new(path).is_file() {
        warn!(path, "Image path does not name a readable file");
        return Err(SaveError::InvalidPath);
    }
    Ok(SaveRequest::new(path))
}

/// A save in flight.
pub struct PendingSave {
    request_id: Option<RequestId>,
    rx: tokio::sync::oneshot::Receiver<SaveResult>,
}

impl PendingSave {
    /// Id of the request, or `None` if it was rejected before one was issued.
    pub const fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Wait for the single result of this request.
    pub async fn wait(self) -> SaveResult {
        reporter::receive(self.rx).await
    }
}

/// Permission-gated image persistence for one platform.
pub struct ImageSaver {
    platform: Platform,
    capabilities: PlatformCapabilities,
    gate: PermissionGate,
    persister: Arc<dyn Persister>,
}

impl ImageSaver {
    pub fn builder(platform: Platform) -> ImageSaverBuilder {
        ImageSaverBuilder::new(platform)
    }

    pub const fn platform(&self) -> Platform {
        self.platform
    }

    pub const fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    pub const fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    /// Save the image at `path`, waiting through any consent prompt.
    pub async fn save_image(&self, path: Option<&str>) -> SaveResult {
        stage(None, SaveStage::Received);
        let request = validate_path(path).inspect_err(|_| stage(None, SaveStage::Failed))?;
        self.run(&request).await
    }

    /// Gate and persist an already validated request.
    pub async fn run(&self, request: &SaveRequest) -> SaveResult {
        let span = info_span!(
            "save_image",
            request_id = %request.id,
            path = %request.source.display()
        );
        async {
            stage(Some(request.id), SaveStage::CheckingPermission);
            if let Err(err) = self.gate.ensure_write_access(request).await {
                stage(Some(request.id), SaveStage::Failed);
                return Err(err);
            }

            stage(Some(request.id), SaveStage::Persisting);
            let result = self.persister.persist(request).await;
            match &result {
                Ok(_) => stage(Some(request.id), SaveStage::Succeeded),
                Err(err) => {
                    warn!(code = err.code(), error = %err, "Save failed");
                    stage(Some(request.id), SaveStage::Failed);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Start a save on its own task and return a handle to its result.
    ///
    /// Invalid paths are answered immediately without spawning anything.
    pub fn dispatch(self: &Arc<Self>, path: Option<&str>) -> PendingSave {
        let request = match validate_path(path) {
            Ok(request) => request,
            Err(err) => {
                let (responder, rx) = Responder::channel(RequestId::next());
                responder.deliver(Err(err));
                return PendingSave {
                    request_id: None,
                    rx,
                };
            }
        };

        let (responder, rx) = Responder::channel(request.id);
        let saver = Arc::clone(self);
        let request_id = request.id;
        tokio::spawn(async move {
            let result = saver.run(&request).await;
            responder.deliver(result);
        });
        PendingSave {
            request_id: Some(request_id),
            rx,
        }
    }
}

/// Wires the platform ports into an [`ImageSaver`].
pub struct ImageSaverBuilder {
    platform: Platform,
    permissions: Option<Arc<dyn PermissionProvider>>,
    store: Option<Arc<dyn MediaStore>>,
    library: Option<Arc<dyn PhotoLibrary>>,
    options: RecordOptions,
    consent_timeout: Option<Duration>,
}

impl ImageSaverBuilder {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            permissions: None,
            store: None,
            library: None,
            options: RecordOptions::default(),
            consent_timeout: None,
        }
    }

    #[must_use]
    pub fn permissions(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = Some(provider);
        self
    }

    #[must_use]
    pub fn media_store(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn photo_library(mut self, library: Arc<dyn PhotoLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    #[must_use]
    pub fn record_options(mut self, options: RecordOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn consent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.consent_timeout = timeout;
        self
    }

    /// Resolve capabilities once and pick the persistence strategy.
    pub fn build(self) -> Result<ImageSaver> {
        let capabilities = self.platform.capabilities();

        let persister: Arc<dyn Persister> = if capabilities.uses_library_asset_api {
            let library = self.library.ok_or_else(|| {
                SaverError::ConfigInvalid(format!("{} needs a photo library", self.platform))
            })?;
            Arc::new(LibraryPersister::new(library).with_consent_timeout(self.consent_timeout))
        } else {
            let store = self.store.ok_or_else(|| {
                SaverError::ConfigInvalid(format!("{} needs a media store", self.platform))
            })?;
            Arc::new(DirectRegistration::new(store, self.options, capabilities))
        };

        let permissions: Arc<dyn PermissionProvider> = match self.permissions {
            Some(provider) => provider,
            None if capabilities.requires_explicit_grant => {
                return Err(SaverError::ConfigInvalid(format!(
                    "{} needs a permission provider",
                    self.platform
                )));
            }
            None => Arc::new(AlwaysGranted),
        };

        debug!(platform = %self.platform, ?capabilities, "Image saver ready");
        Ok(ImageSaver {
            platform: self.platform,
            capabilities,
            gate: PermissionGate::new(capabilities, permissions).with_timeout(self.consent_timeout),
            persister,
        })
    }
}

/// Provider for platforms that never ask.
struct AlwaysGranted;

impl PermissionProvider for AlwaysGranted {
    fn status(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn request(&self, ticket: ConsentTicket) {
        ticket.resolve(ConsentDecision::Granted);
    }
}
