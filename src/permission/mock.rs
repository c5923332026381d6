//! Mock permission provider for unit testing.
//!
//! Counts status queries and prompts, and can answer, hold, or ignore the
//! consent tickets it receives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::trace;

use super::{ConsentDecision, ConsentTicket, PermissionProvider, PermissionState};

/// What the mock does with a consent ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBehavior {
    /// Resolve immediately with the given decision.
    Answer(ConsentDecision),
    /// Keep the ticket until the test resolves it.
    Hold,
    /// Drop the ticket unanswered.
    Ignore,
}

/// Mock OS permission API.
pub struct MockPermissions {
    state: Mutex<PermissionState>,
    behavior: PromptBehavior,
    held: Mutex<VecDeque<ConsentTicket>>,
    status_queries: AtomicUsize,
    prompts: AtomicUsize,
}

impl MockPermissions {
    #[must_use]
    pub fn new(state: PermissionState) -> Self {
        Self {
            state: Mutex::new(state),
            behavior: PromptBehavior::Answer(ConsentDecision::Granted),
            held: Mutex::new(VecDeque::new()),
            status_queries: AtomicUsize::new(0),
            prompts: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: PromptBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn set_state(&self, state: PermissionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> usize {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Resolve the oldest held ticket.
    pub fn resolve_next(&self, decision: ConsentDecision) -> bool {
        let ticket = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        ticket.is_some_and(|t| t.resolve(decision))
    }

    /// Wait until at least `count` tickets are held.
    pub async fn wait_for_held(&self, count: usize) {
        while self.held() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl PermissionProvider for MockPermissions {
    fn status(&self) -> PermissionState {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, ticket: ConsentTicket) {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        trace!(request_id = %ticket.id(), behavior = ?self.behavior, "Mock prompt");
        match self.behavior {
            PromptBehavior::Answer(decision) => {
                if decision.is_granted() {
                    self.set_state(PermissionState::Granted);
                } else {
                    self.set_state(PermissionState::Denied);
                }
                ticket.resolve(decision);
            }
            PromptBehavior::Hold => self
                .held
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(ticket),
            PromptBehavior::Ignore => drop(ticket),
        }
    }
}
