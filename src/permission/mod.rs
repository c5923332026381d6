//! Permission gate for shared-storage writes.
//!
//! The gate asks the platform for the current grant and, when the platform
//! requires one and it is missing, issues a consent request and suspends the
//! save until the decision comes back. Suspended requests are tracked in a
//! map keyed by [`RequestId`], so concurrent saves never share a slot.

mod consent;
pub mod mock;

pub use consent::{ConsentAnswer, ScriptedConsent, TerminalConsent};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::error::SaveError;
use crate::platform::PlatformCapabilities;
use crate::request::{RequestId, SaveRequest, SaveStage};

/// Grant state for shared-storage writes as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

/// The user's answer to one consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Granted,
    Denied,
}

impl ConsentDecision {
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// OS-side permission API.
///
/// `status` must answer synchronously. `request` starts the asynchronous
/// consent flow and returns at once; the decision is delivered later through
/// the ticket.
pub trait PermissionProvider: Send + Sync {
    fn status(&self) -> PermissionState;

    fn request(&self, ticket: ConsentTicket);
}

type Continuations = HashMap<RequestId, oneshot::Sender<ConsentDecision>>;

/// Suspended requests awaiting a consent decision.
#[derive(Clone, Default)]
pub struct PendingAuthorizations {
    inner: Arc<Mutex<Continuations>>,
}

impl PendingAuthorizations {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Continuations> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park a request and return the receiver its decision will arrive on.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<ConsentDecision> {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert(id, tx).is_some() {
            warn!(request_id = %id, "Replaced an existing pending authorization");
        }
        rx
    }

    /// Resume the request parked under `id`. The entry is removed whatever
    /// the decision. Returns false if nothing was waiting.
    pub fn resolve(&self, id: RequestId, decision: ConsentDecision) -> bool {
        let Some(tx) = self.lock().remove(&id) else {
            warn!(request_id = %id, ?decision, "Consent decision for unknown request ignored");
            return false;
        };
        debug!(request_id = %id, ?decision, "Resuming suspended request");
        tx.send(decision).is_ok()
    }

    /// Drop the entry for `id` without a decision.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Handle a provider uses to deliver the decision for one request.
///
/// Dropping an unresolved ticket abandons the request, which the gate
/// reports as a denial.
pub struct ConsentTicket {
    id: RequestId,
    pending: PendingAuthorizations,
    resolved: bool,
}

impl ConsentTicket {
    pub(crate) fn new(id: RequestId, pending: PendingAuthorizations) -> Self {
        Self {
            id,
            pending,
            resolved: false,
        }
    }

    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Deliver the user's decision. Returns false if the request had already
    /// been resumed or timed out.
    pub fn resolve(mut self, decision: ConsentDecision) -> bool {
        self.resolved = true;
        self.pending.resolve(self.id, decision)
    }
}

impl Drop for ConsentTicket {
    fn drop(&mut self) {
        if !self.resolved && self.pending.cancel(self.id) {
            warn!(request_id = %self.id, "Consent ticket dropped without a decision");
        }
    }
}

impl std::fmt::Debug for ConsentTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentTicket")
            .field("id", &self.id)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

/// Clears a parked request when its waiter stops waiting before a decision.
struct Parked<'a> {
    pending: &'a PendingAuthorizations,
    id: RequestId,
}

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        if self.pending.cancel(self.id) {
            debug!(request_id = %self.id, "Stopped waiting for permission decision");
        }
    }
}

/// Decides whether a save may proceed to persistence.
pub struct PermissionGate {
    capabilities: PlatformCapabilities,
    provider: Arc<dyn PermissionProvider>,
    pending: PendingAuthorizations,
    timeout: Option<Duration>,
}

impl PermissionGate {
    pub fn new(capabilities: PlatformCapabilities, provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            capabilities,
            provider,
            pending: PendingAuthorizations::new(),
            timeout: None,
        }
    }

    /// Gate that consults `provider` on every platform.
    pub fn explicit(provider: Arc<dyn PermissionProvider>) -> Self {
        let capabilities = PlatformCapabilities {
            requires_explicit_grant: true,
            uses_pending_media_flag: false,
            uses_library_asset_api: false,
        };
        Self::new(capabilities, provider)
    }

    /// Bound how long a request may wait for the user.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current grant state; platforms without an explicit grant always
    /// report `Granted` without asking the provider.
    pub fn current_state(&self) -> PermissionState {
        if self.capabilities.requires_explicit_grant {
            self.provider.status()
        } else {
            PermissionState::Granted
        }
    }

    /// Return once writing is allowed for `request`, prompting if needed.
    pub async fn ensure_write_access(&self, request: &SaveRequest) -> Result<(), SaveError> {
        self.authorize(request.id).await
    }

    /// Return once writing is allowed, parking the wait under `id` while
    /// the user decides.
    pub async fn authorize(&self, id: RequestId) -> Result<(), SaveError> {
        let state = self.current_state();
        if state == PermissionState::Granted {
            trace!(request_id = %id, "Write access already granted");
            return Ok(());
        }

        debug!(
            request_id = %id,
            ?state,
            stage = ?SaveStage::AwaitingUser,
            "Write access not granted, suspending"
        );
        let decision = self.pending.register(id);
        let _parked = Parked {
            pending: &self.pending,
            id,
        };
        info!(request_id = %id, "Requesting storage write permission");
        self.provider.request(ConsentTicket::new(id, self.pending.clone()));

        let outcome = match self.timeout {
            Some(limit) => {
                if let Ok(outcome) = tokio::time::timeout(limit, decision).await {
                    outcome
                } else {
                    warn!(
                        request_id = %id,
                        timeout_secs = limit.as_secs(),
                        "Timed out waiting for permission decision"
                    );
                    return Err(SaveError::PermissionDenied);
                }
            }
            None => decision.await,
        };

        match outcome {
            Ok(ConsentDecision::Granted) => {
                info!(request_id = %id, "Storage write permission granted");
                Ok(())
            }
            Ok(ConsentDecision::Denied) => {
                info!(request_id = %id, "Storage write permission denied");
                Err(SaveError::PermissionDenied)
            }
            Err(_) => {
                warn!(request_id = %id, "Permission request abandoned");
                Err(SaveError::PermissionDenied)
            }
        }
    }

    /// Host entry point for a decision arriving outside a ticket.
    pub fn on_permission_result(&self, id: RequestId, decision: ConsentDecision) -> bool {
        self.pending.resolve(id, decision)
    }

    /// Number of requests currently waiting for the user.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
